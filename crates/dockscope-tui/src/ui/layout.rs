use ratatui::layout::{Constraint, Direction, Layout as RatatuiLayout, Rect};

/// Regions of the log viewer screen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogViewerAreas {
    pub header: Rect,
    pub input: Option<Rect>,
    pub logs: Rect,
    pub status: Rect,
}

/// Layout helper for consistent screen layouts
pub struct Layout;

impl Layout {
    /// Header, optional input bar, log content and status bar
    pub fn log_viewer(area: Rect, show_input: bool) -> LogViewerAreas {
        let mut constraints = vec![Constraint::Length(3)];
        if show_input {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(1));
        constraints.push(Constraint::Length(1));

        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        if show_input {
            LogViewerAreas {
                header: chunks[0],
                input: Some(chunks[1]),
                logs: chunks[2],
                status: chunks[3],
            }
        } else {
            LogViewerAreas {
                header: chunks[0],
                input: None,
                logs: chunks[1],
                status: chunks[2],
            }
        }
    }

    /// Centered popup no larger than the area minus a margin
    pub fn popup(area: Rect, width: u16, height: u16) -> Rect {
        let width = width.min(area.width.saturating_sub(4));
        let height = height.min(area.height.saturating_sub(4));
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        Rect::new(x, y, width, height)
    }
}
