//! Log streaming client for dockscope
//!
//! This crate opens an authenticated WebSocket to the log service, feeds the
//! log buffer and recovers from connection loss with bounded backoff.

mod config;
mod error;
mod manager;
mod policy;
mod protocol;
mod token;
mod transport;

pub use config::{DEFAULT_API_URL, StreamConfig, websocket_base_for};
pub use error::{AuthError, StreamError, TransportError};
pub use manager::{LogStreamManager, StreamEvent, Subscription};
pub use policy::ReconnectPolicy;
pub use protocol::{ABNORMAL_CLOSURE, ControlMessage, NO_STATUS_CLOSURE, NORMAL_CLOSURE};
pub use token::{HttpTokenProvider, StaticTokenProvider, TokenProvider};
pub use transport::{Connection, Connector, TransportEvent, WsConnection, WsConnector};

// Re-export types used in our public API
pub use dockscope_types::{ConnectionState, EntryKind, LogEntry};
