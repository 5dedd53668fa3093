pub mod components;
mod layout;
pub mod screens;
mod theme;

pub use layout::{Layout, LogViewerAreas};
pub use theme::Theme;
