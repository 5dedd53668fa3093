use std::collections::VecDeque;
use std::sync::Arc;

use dockscope_logs::{DEFAULT_CAPACITY, KindCounts};
use dockscope_types::{ConnectionState, LogEntry};

use super::Action;

/// What the input bar is collecting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Search,
    Container,
}

impl InputMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Search => "/",
            Self::Container => "container: ",
        }
    }
}

/// UI-specific transient state
pub struct UiState {
    /// Active input bar, if any
    pub input: Option<InputMode>,

    /// Text typed into the input bar
    pub input_text: String,

    /// Term highlighted in output lines
    pub search_term: Option<String>,

    /// Is help overlay visible?
    pub help_visible: bool,

    /// Transient message shown in the status line
    pub message: Option<String>,

    // Log viewer specific state
    /// Scroll position in log viewer
    pub log_scroll: usize,

    /// Auto-scroll enabled (follow mode)?
    pub auto_scroll: bool,

    /// Show time prefix in log viewer?
    pub show_timestamps: bool,

    /// Visible log rows, updated on render
    pub page_size: usize,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            input: None,
            input_text: String::new(),
            search_term: None,
            help_visible: false,
            message: None,
            log_scroll: 0,
            auto_scroll: true,
            show_timestamps: true,
            page_size: 20,
        }
    }
}

/// View state of the terminal front end
///
/// Holds a local mirror of the stream buffer, fed from a subscription, so
/// rendering never touches the manager's lock.
pub struct AppState {
    logs: VecDeque<Arc<LogEntry>>,
    capacity: usize,

    /// Last observed connection lifecycle state
    pub connection: ConnectionState,

    /// Last connection status event
    pub connected: bool,

    /// Container currently being streamed
    pub container: Option<String>,

    pub ui: UiState,

    pub should_quit: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, None)
    }
}

impl AppState {
    pub fn new(capacity: usize, container: Option<String>) -> Self {
        let capacity = capacity.max(1);
        Self {
            logs: VecDeque::with_capacity(capacity),
            capacity,
            connection: ConnectionState::Idle,
            connected: false,
            container,
            ui: UiState::default(),
            should_quit: false,
        }
    }

    // ------------------------------------------------------------------
    // Log mirror
    // ------------------------------------------------------------------

    /// Replace the mirror with a subscription's history
    pub fn load_history(&mut self, history: Vec<Arc<LogEntry>>) {
        let skip = history.len().saturating_sub(self.capacity);
        self.logs = history.into_iter().skip(skip).collect();
        self.ui.log_scroll = self.ui.log_scroll.min(self.logs.len());
    }

    /// Append a live entry, evicting the oldest beyond capacity
    pub fn push_entry(&mut self, entry: Arc<LogEntry>) {
        self.logs.push_back(entry);
        if self.logs.len() > self.capacity {
            self.logs.pop_front();
            // Keep a paused view anchored on the same lines
            if !self.ui.auto_scroll {
                self.ui.log_scroll = self.ui.log_scroll.saturating_sub(1);
            }
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
        self.ui.log_scroll = 0;
    }

    pub fn logs(&self) -> &VecDeque<Arc<LogEntry>> {
        &self.logs
    }

    pub fn kind_counts(&self) -> KindCounts {
        KindCounts::tally(self.logs.iter().map(|e| e.as_ref()))
    }

    /// Output entries containing the search term, case-insensitively
    pub fn matching_count(&self) -> Option<usize> {
        let term = self.ui.search_term.as_deref()?.to_lowercase();
        Some(
            self.logs
                .iter()
                .filter(|e| e.kind.is_output() && e.message.to_lowercase().contains(&term))
                .count(),
        )
    }

    // ------------------------------------------------------------------
    // Input bar
    // ------------------------------------------------------------------

    pub fn open_input(&mut self, mode: InputMode) {
        self.ui.input_text = match mode {
            InputMode::Search => self.ui.search_term.clone().unwrap_or_default(),
            InputMode::Container => self.container.clone().unwrap_or_default(),
        };
        self.ui.input = Some(mode);
    }

    pub fn input_char(&mut self, c: char) {
        if !c.is_control() {
            self.ui.input_text.push(c);
        }
    }

    /// Pasted text goes in as a single line
    pub fn input_paste(&mut self, text: &str) {
        self.ui
            .input_text
            .extend(text.chars().filter(|c| !c.is_control()));
    }

    pub fn input_backspace(&mut self) {
        self.ui.input_text.pop();
    }

    pub fn input_clear(&mut self) {
        self.ui.input_text.clear();
    }

    pub fn cancel_input(&mut self) {
        self.ui.input = None;
        self.ui.input_text.clear();
    }

    /// Close the input bar, returning the follow-up action (if any)
    pub fn submit_input(&mut self) -> Option<Action> {
        let mode = self.ui.input.take()?;
        let text = std::mem::take(&mut self.ui.input_text).trim().to_string();
        match mode {
            InputMode::Search => {
                self.ui.search_term = (!text.is_empty()).then_some(text);
                None
            }
            InputMode::Container => Some(Action::StartStreaming(text)),
        }
    }

    pub fn clear_search(&mut self) {
        self.ui.search_term = None;
    }

    // ------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------

    /// Highest scroll offset that still fills a page
    pub fn max_scroll(&self) -> usize {
        self.logs.len().saturating_sub(self.ui.page_size)
    }

    pub fn scroll_up(&mut self, n: usize) {
        let from = if self.ui.auto_scroll {
            self.max_scroll()
        } else {
            self.ui.log_scroll.min(self.max_scroll())
        };
        self.ui.auto_scroll = false;
        self.ui.log_scroll = from.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.ui.log_scroll = (self.ui.log_scroll + n).min(self.max_scroll());
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.ui.page_size.max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.ui.page_size.max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.ui.auto_scroll = false;
        self.ui.log_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.ui.auto_scroll = true;
        self.ui.log_scroll = self.max_scroll();
    }

    /// Flip follow mode, returning the new value
    pub fn toggle_auto_scroll(&mut self) -> bool {
        self.ui.auto_scroll = !self.ui.auto_scroll;
        if self.ui.auto_scroll {
            self.ui.log_scroll = self.max_scroll();
        }
        self.ui.auto_scroll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockscope_types::EntryKind;
    use pretty_assertions::assert_eq;

    fn entry(kind: EntryKind, msg: &str) -> Arc<LogEntry> {
        Arc::new(LogEntry::new(kind, msg))
    }

    fn messages(state: &AppState) -> Vec<String> {
        state.logs().iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_mirror_respects_capacity() {
        let mut state = AppState::new(3, None);
        state.load_history(
            (0..5)
                .map(|n| entry(EntryKind::LogLine, &n.to_string()))
                .collect(),
        );
        assert_eq!(messages(&state), vec!["2", "3", "4"]);

        state.push_entry(entry(EntryKind::LogLine, "5"));
        assert_eq!(messages(&state), vec!["3", "4", "5"]);
    }

    #[test]
    fn test_paused_view_stays_anchored() {
        let mut state = AppState::new(3, None);
        state.ui.page_size = 1;
        for n in 0..3 {
            state.push_entry(entry(EntryKind::LogLine, &n.to_string()));
        }
        state.scroll_up(1);
        assert_eq!(state.ui.log_scroll, 1);

        state.push_entry(entry(EntryKind::LogLine, "3"));
        assert_eq!(state.ui.log_scroll, 0);
        assert_eq!(state.logs()[state.ui.log_scroll].message, "1");
    }

    #[test]
    fn test_counts_and_matches() {
        let mut state = AppState::default();
        state.push_entry(entry(EntryKind::System, "Connecting to logs for web..."));
        state.push_entry(entry(EntryKind::LogLine, "GET /health 200"));
        state.push_entry(entry(EntryKind::LogError, "health check failed"));
        state.push_entry(entry(EntryKind::Error, "Health is bad"));

        let counts = state.kind_counts();
        assert_eq!((counts.system, counts.line, counts.stderr, counts.error), (1, 1, 1, 1));

        assert_eq!(state.matching_count(), None);
        state.ui.search_term = Some("HEALTH".into());
        assert_eq!(state.matching_count(), Some(2));
    }

    #[test]
    fn test_search_input_flow() {
        let mut state = AppState::default();
        state.open_input(InputMode::Search);
        for c in "err".chars() {
            state.input_char(c);
        }
        state.input_backspace();
        state.input_paste("r\n");
        assert_eq!(state.ui.input_text, "err");

        assert_eq!(state.submit_input(), None);
        assert_eq!(state.ui.search_term.as_deref(), Some("err"));
        assert_eq!(state.ui.input, None);

        // Reopening starts from the current term; an empty submit clears it
        state.open_input(InputMode::Search);
        assert_eq!(state.ui.input_text, "err");
        state.input_clear();
        state.submit_input();
        assert_eq!(state.ui.search_term, None);
    }

    #[test]
    fn test_container_prompt_submits_start() {
        let mut state = AppState::new(10, Some("web".into()));
        state.open_input(InputMode::Container);
        assert_eq!(state.ui.input_text, "web");

        state.input_clear();
        state.input_paste("  db  ");
        assert_eq!(state.submit_input(), Some(Action::StartStreaming("db".into())));
    }

    #[test]
    fn test_cancel_input_keeps_search() {
        let mut state = AppState::default();
        state.ui.search_term = Some("x".into());
        state.open_input(InputMode::Search);
        state.input_char('y');
        state.cancel_input();
        assert_eq!(state.ui.input, None);
        assert_eq!(state.ui.search_term.as_deref(), Some("x"));
        assert_eq!(state.submit_input(), None);
    }

    #[test]
    fn test_scrolling_and_follow() {
        let mut state = AppState::default();
        state.ui.page_size = 10;
        for n in 0..30 {
            state.push_entry(entry(EntryKind::LogLine, &n.to_string()));
        }

        state.scroll_to_bottom();
        assert_eq!(state.ui.log_scroll, 20);

        state.page_up();
        assert!(!state.ui.auto_scroll);
        assert_eq!(state.ui.log_scroll, 10);

        state.scroll_down(100);
        assert_eq!(state.ui.log_scroll, 20);

        state.scroll_to_top();
        assert_eq!(state.ui.log_scroll, 0);

        assert!(state.toggle_auto_scroll());
        assert_eq!(state.ui.log_scroll, 20);
        assert!(!state.toggle_auto_scroll());
    }

    #[test]
    fn test_clear_resets_scroll() {
        let mut state = AppState::default();
        state.push_entry(entry(EntryKind::LogLine, "a"));
        state.ui.log_scroll = 1;
        state.clear_logs();
        assert!(state.logs().is_empty());
        assert_eq!(state.ui.log_scroll, 0);
    }
}
