use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};

use dockscope_logs::{fragments, render_entry};
use dockscope_types::LogEntry;

use crate::app::AppState;
use crate::ui::components::{HelpOverlay, InputBar, StatusBar};
use crate::ui::{Layout, Theme};

/// Log viewer screen
pub struct LogViewerScreen;

impl LogViewerScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState) {
        let areas = Layout::log_viewer(frame.area(), state.ui.input.is_some());

        Self::render_header(frame, areas.header, state);
        if let (Some(area), Some(mode)) = (areas.input, state.ui.input) {
            InputBar::render(frame, area, mode, &state.ui.input_text);
        }
        Self::render_logs(frame, areas.logs, state);
        Self::render_status_bar(frame, areas.status, state);

        if state.ui.help_visible {
            HelpOverlay::render(frame);
        }
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
        let container = match state.container.as_deref() {
            Some(name) if !name.is_empty() => Span::styled(name.to_string(), Theme::text_highlight()),
            _ => Span::styled("no container ([o] to choose)", Theme::text_dim()),
        };

        let title = Line::from(vec![
            Span::styled("dockscope", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            container,
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(
                format!("● {}", state.connection.label()),
                Theme::connection(state.connection),
            ),
        ]);

        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut AppState) {
        let total_logs = state.logs().len();
        let inner_height = area.height.saturating_sub(2) as usize;
        state.ui.page_size = inner_height;

        let max_scroll = state.max_scroll();
        if state.ui.auto_scroll {
            state.ui.log_scroll = max_scroll;
        }
        state.ui.log_scroll = state.ui.log_scroll.min(max_scroll);

        let search = state.ui.search_term.as_deref();
        let lines: Vec<Line> = state
            .logs()
            .iter()
            .skip(state.ui.log_scroll)
            .take(inner_height)
            .map(|entry| entry_line(entry, search, state.ui.show_timestamps))
            .collect();

        let title = match state.matching_count() {
            Some(matching) => format!(" Logs ({total_logs}, {matching} matching) "),
            None => format!(" Logs ({total_logs}) "),
        };

        let logs_widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(title, Theme::title())),
        );

        frame.render_widget(logs_widget, area);

        if total_logs > inner_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));
            let mut scrollbar_state = ScrollbarState::default()
                .content_length(max_scroll)
                .position(state.ui.log_scroll);

            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        let counts = state.kind_counts();
        let right = format!(
            "SYS:{} ERR:{} OUT:{} STDERR:{} | {} logs {}",
            counts.system + counts.lifecycle,
            counts.error,
            counts.line,
            counts.stderr,
            counts.total(),
            if state.ui.auto_scroll { "▼" } else { " " }
        );

        let status = StatusBar::new()
            .hints([
                ("o", "Container"),
                ("s", "Start"),
                ("x", "Stop"),
                ("/", "Search"),
                ("e", "Export"),
                ("?", "Help"),
            ])
            .message(state.ui.message.as_deref())
            .right(right);

        frame.render_widget(status, area);
    }
}

/// Styled line for one entry: optional time, label and highlighted message
pub fn entry_line(entry: &LogEntry, search: Option<&str>, show_time: bool) -> Line<'static> {
    let base = Theme::entry(entry.kind);
    let mut spans = Vec::new();

    if show_time {
        spans.push(Span::styled(
            format!("{} ", entry.display_time()),
            Theme::text_dim(),
        ));
    }

    for fragment in fragments(&render_entry(entry, search)) {
        let style = fragment
            .highlights
            .iter()
            .fold(base, |style: Style, h| style.patch(Theme::highlight(*h)));
        spans.push(Span::styled(fragment.text, style));
    }

    Line::from(spans)
}
