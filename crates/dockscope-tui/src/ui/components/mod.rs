mod help_overlay;
mod input_bar;
mod status_bar;

pub use help_overlay::HelpOverlay;
pub use input_bar::InputBar;
pub use status_bar::StatusBar;
