//! TUI components for dockscope
//!
//! This crate provides the terminal user interface for dockscope,
//! including view state, keybindings, event handling, and the log viewer.

pub mod app;
pub mod config;
pub mod tui;
pub mod ui;

pub use app::{Action, AppState, InputMode, UiState};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use tui::{Event, EventHandler, Tui};
pub use ui::components::{HelpOverlay, InputBar, StatusBar};
pub use ui::screens::LogViewerScreen;
pub use ui::{Layout, Theme};
