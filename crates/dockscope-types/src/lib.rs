//! Shared types for dockscope
//!
//! This crate contains data structures used across multiple dockscope crates.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

// ============================================================================
// Log Types
// ============================================================================

/// Classification of a log entry, mirroring the `type` discriminator on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    System,
    Error,
    LogsStarted,
    LogsStopped,
    LogLine,
    LogError,
}

impl EntryKind {
    /// All kinds, in display order
    pub const ALL: [EntryKind; 6] = [
        Self::System,
        Self::Error,
        Self::LogsStarted,
        Self::LogsStopped,
        Self::LogLine,
        Self::LogError,
    ];

    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Error => "error",
            Self::LogsStarted => "logs_started",
            Self::LogsStopped => "logs_stopped",
            Self::LogLine => "log_line",
            Self::LogError => "log_error",
        }
    }

    /// Inline label shown before the message (`log_line` has none)
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::System => Some("SYSTEM:"),
            Self::Error => Some("ERROR:"),
            Self::LogsStarted => Some("STARTED:"),
            Self::LogsStopped => Some("STOPPED:"),
            Self::LogError => Some("STDERR:"),
            Self::LogLine => None,
        }
    }

    /// Whether this kind carries container output (and gets content highlighting)
    pub fn is_output(&self) -> bool {
        matches!(self, Self::LogLine | Self::LogError)
    }

    /// Whether the message may begin with a container timestamp
    pub fn carries_timestamp(&self) -> bool {
        self.is_output()
    }

    /// Get display color for this kind
    pub fn color(&self) -> Color {
        match self {
            Self::System => Color::Cyan,
            Self::Error => Color::Red,
            Self::LogsStarted => Color::Green,
            Self::LogsStopped => Color::Blue,
            Self::LogLine => Color::White,
            Self::LogError => Color::Yellow,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log entry
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    /// Sequence number assigned by the buffer on append
    pub id: u64,

    /// Entry classification
    pub kind: EntryKind,

    /// Message text as received (unescaped)
    pub message: String,

    /// Server supplied or extracted timestamp (if available)
    pub timestamp: Option<String>,

    /// When the client received or created this entry
    pub received_at: DateTime<Utc>,
}

impl LogEntry {
    /// Create a new entry stamped with the current time
    pub fn new(kind: EntryKind, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind,
            message: message.into(),
            timestamp: None,
            received_at: Utc::now(),
        }
    }

    /// Client generated status entry
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(EntryKind::System, message)
    }

    /// Client generated error entry
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EntryKind::Error, message)
    }

    /// Attach a timestamp
    pub fn with_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Time of day to show next to the entry (HH:MM:SS)
    ///
    /// Prefers the entry's own timestamp and falls back to receipt time.
    pub fn display_time(&self) -> String {
        self.timestamp
            .as_deref()
            .and_then(parse_time_of_day)
            .unwrap_or_else(|| {
                self.received_at
                    .with_timezone(&Local)
                    .format("%H:%M:%S")
                    .to_string()
            })
    }
}

/// Parse an ISO-8601 timestamp into a local HH:MM:SS string
fn parse_time_of_day(ts: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Local).format("%H:%M:%S").to_string());
    }
    // Zone-less timestamps are taken as local wall time
    let head = ts.get(..19)?;
    NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.format("%H:%M:%S").to_string())
}

// ============================================================================
// Connection Types
// ============================================================================

/// Lifecycle of the streaming connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Reconnecting,
}

impl ConnectionState {
    /// Short display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "streaming",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Get display color for this state
    pub fn color(&self) -> Color {
        match self {
            Self::Idle => Color::DarkGray,
            Self::Connecting | Self::Reconnecting => Color::Yellow,
            Self::Open => Color::Green,
            Self::Closing => Color::Magenta,
        }
    }
}
