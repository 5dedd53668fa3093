use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::app::InputMode;
use crate::ui::Theme;

/// Single-line input for the search term or container name
pub struct InputBar;

impl InputBar {
    pub fn render(frame: &mut Frame, area: Rect, mode: InputMode, text: &str) {
        let title = match mode {
            InputMode::Search => " Search ",
            InputMode::Container => " Container ",
        };

        let line = Line::from(vec![
            Span::styled(format!(" {}", mode.prompt()), Theme::text_highlight()),
            Span::styled(text.to_string(), Theme::text()),
            Span::styled(
                "█",
                Style::default()
                    .fg(Theme::HIGHLIGHT)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled("  [Enter] Apply  [Esc] Cancel", Theme::text_dim()),
        ]);

        let widget = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border_focused())
                .title(Span::styled(title, Theme::title())),
        );

        frame.render_widget(widget, area);
    }
}
