/// All possible actions in the application (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,

    // Streaming
    StartStreaming(String),
    RestartStreaming,
    StopStreaming,
    ClearLogs,
    ExportLogs,

    // Log viewer navigation
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollToTop,
    ScrollToBottom,
    PageUp,
    PageDown,
    ToggleAutoScroll,
    ToggleTimestamps,

    // Input bar
    OpenSearch,
    OpenContainerPrompt,
    InputChar(char),
    InputPaste(String),
    InputBackspace,
    InputClear,
    InputSubmit,
    InputCancel,
    ClearSearch,

    // Messages
    ShowMessage(String),
    DismissMessage,

    // Render request
    Render,
}
