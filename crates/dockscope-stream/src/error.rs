use thiserror::Error;

/// Failures acquiring a stream token or validating a start request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Please select a container first")]
    MissingContainer,

    #[error("not authenticated for log streaming")]
    Unauthenticated,

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("token request failed: {0}")]
    Request(String),
}

/// Failures of the underlying duplex connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Handshake rejected with HTTP status {0}")]
    Rejected(u16),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Socket error: {0}")]
    Socket(String),
}

impl TransportError {
    /// The server refused the handshake because the token is no longer valid
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Rejected(401 | 403))
    }
}

/// Errors surfaced by the log stream manager
///
/// The `Display` text of lifecycle errors is what appears in the log feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Failed to authenticate for log streaming: {0}")]
    Auth(#[from] AuthError),

    #[error("Failed to connect to log service: {0}")]
    Connection(#[from] TransportError),

    #[error("Failed to start logs: {0}")]
    StartRequest(TransportError),

    #[error("WebSocket connection error: {0}")]
    Socket(TransportError),

    #[error("Failed to parse log message: {0}")]
    Protocol(String),

    #[error("Failed to reconnect after {0} attempts")]
    RetryExhausted(u32),

    #[error("Log streaming was cancelled before it started")]
    Cancelled,

    #[error("Log stream manager has shut down")]
    ManagerClosed,
}
