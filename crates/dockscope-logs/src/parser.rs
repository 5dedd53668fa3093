use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use dockscope_types::{EntryKind, LogEntry};

/// Leading `YYYY-MM-DDTHH:MM:SS` on container output
static LEADING_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").expect("valid regex"));

/// Server → client frame
#[derive(Debug, Deserialize)]
struct ServerFrame {
    #[serde(rename = "type")]
    kind: EntryKind,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Parser turning text frames from the log service into log entries
pub struct LogParser;

impl LogParser {
    /// Parse one text frame
    ///
    /// Fails on malformed JSON, a missing or unknown `type`, or a non-string
    /// `message`. The caller decides how to surface the failure.
    pub fn parse(raw: &str) -> Result<LogEntry, serde_json::Error> {
        let frame: ServerFrame = serde_json::from_str(raw)?;
        let message = frame.message.unwrap_or_default();

        let timestamp = match frame.timestamp.filter(|ts| !ts.is_empty()) {
            Some(ts) => Some(ts),
            None if frame.kind.carries_timestamp() => {
                Self::extract_leading_timestamp(&message).map(str::to_string)
            }
            None => None,
        };

        Ok(LogEntry::new(frame.kind, message).with_timestamp(timestamp))
    }

    /// Extract an ISO-8601 timestamp from the beginning of a message
    pub fn extract_leading_timestamp(message: &str) -> Option<&str> {
        LEADING_TIMESTAMP.find(message).map(|m| m.as_str())
    }
}
