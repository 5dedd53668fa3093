use dockscope_logs::DEFAULT_CAPACITY;

use crate::policy::ReconnectPolicy;

/// API base used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost";

/// Settings for a [`LogStreamManager`](crate::LogStreamManager)
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// API base URL (token endpoint lives here)
    pub api_url: String,

    /// Explicit streaming base (`ws://host:port`), derived from `api_url` when unset
    pub stream_url: Option<String>,

    /// Log buffer capacity
    pub buffer_size: usize,

    /// Reconnect backoff
    pub reconnect: ReconnectPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            stream_url: None,
            buffer_size: DEFAULT_CAPACITY,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl StreamConfig {
    /// Base of the streaming endpoint, without trailing slash
    pub fn stream_base(&self) -> String {
        match &self.stream_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => websocket_base_for(&self.api_url),
        }
    }

    /// Full streaming URL for `token`
    pub fn stream_url_for(&self, token: &str) -> String {
        format!("{}/ws/logs/{}", self.stream_base(), token)
    }
}

/// Map an HTTP(S) base URL to the matching WS(S) base
pub fn websocket_base_for(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    }
}
