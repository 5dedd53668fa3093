use ratatui::style::{Color, Modifier, Style};

use dockscope_logs::{EntryKind, Highlight};
use dockscope_types::ConnectionState;

/// Color theme for the application
pub struct Theme;

impl Theme {
    // Base colors
    pub const BG: Color = Color::Reset;
    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;

    // Accent colors
    pub const PRIMARY: Color = Color::Cyan;
    pub const HIGHLIGHT: Color = Color::Yellow;

    // Status colors
    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;

    // Border styles
    pub fn border() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::HIGHLIGHT)
    }

    // Text styles
    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn text_highlight() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    // Status bar
    pub fn status_bar() -> Style {
        Style::default().fg(Self::FG).bg(Color::DarkGray)
    }

    pub fn status_bar_key() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    pub fn message() -> Style {
        Style::default()
            .fg(Self::WARNING)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    /// Header badge for the connection state
    pub fn connection(state: ConnectionState) -> Style {
        Style::default()
            .fg(state.color())
            .add_modifier(Modifier::BOLD)
    }

    /// Base style of an entry's message text
    pub fn entry(kind: EntryKind) -> Style {
        match kind {
            EntryKind::LogLine => Self::text(),
            other => Style::default().fg(other.color()),
        }
    }

    /// Style for one highlight class, layered over the entry style
    pub fn highlight(highlight: Highlight) -> Style {
        match highlight {
            Highlight::Error => Style::default()
                .fg(Self::ERROR)
                .add_modifier(Modifier::BOLD),
            Highlight::Success => Style::default().fg(Self::SUCCESS),
            Highlight::Address => Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::UNDERLINED),
            Highlight::Timestamp => Style::default().fg(Self::FG_DIM),
            Highlight::Search => Style::default()
                .fg(Color::Black)
                .bg(Self::HIGHLIGHT)
                .add_modifier(Modifier::BOLD),
            Highlight::Label(kind) => Style::default()
                .fg(kind.color())
                .add_modifier(Modifier::BOLD),
        }
    }
}
