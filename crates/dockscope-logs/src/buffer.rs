use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use dockscope_types::{EntryKind, LogEntry};

use crate::format;

/// Number of entries retained for replay
pub const DEFAULT_CAPACITY: usize = 1000;

/// Thread-safe ring buffer for log entries
///
/// Entries are shared as `Arc<LogEntry>` so snapshots and subscriber fan-out
/// never deep-copy message text.
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage
    entries: Arc<RwLock<VecDeque<Arc<LogEntry>>>>,

    /// Maximum capacity
    capacity: usize,

    /// Next entry ID
    next_id: Arc<AtomicU64>,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity (at least one entry)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append an entry at the tail, evicting the oldest if over capacity
    pub fn append(&self, mut entry: LogEntry) -> Arc<LogEntry> {
        entry.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(entry);
        let mut entries = self.entries.write();
        entries.push_back(Arc::clone(&entry));
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        entry
    }

    /// Copy of the current contents in insertion order
    pub fn snapshot(&self) -> Vec<Arc<LogEntry>> {
        self.entries.read().iter().cloned().collect()
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.write().clear();
        self.next_id.store(0, Ordering::SeqCst);
    }

    /// Total entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the last N entries
    pub fn tail(&self, n: usize) -> Vec<Arc<LogEntry>> {
        let entries = self.entries.read();
        let start = entries.len().saturating_sub(n);
        entries.iter().skip(start).cloned().collect()
    }

    /// Get entry count per kind
    pub fn kind_counts(&self) -> KindCounts {
        KindCounts::tally(self.entries.read().iter().map(|e| e.as_ref()))
    }

    /// Export all entries as plain text lines
    pub fn export_plain(&self) -> String {
        self.entries
            .read()
            .iter()
            .map(|e| format::plain_line(e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Counts per entry kind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub system: usize,
    pub error: usize,
    pub lifecycle: usize,
    pub line: usize,
    pub stderr: usize,
}

impl KindCounts {
    /// Count entries per kind
    pub fn tally<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> Self {
        let mut counts = Self::default();
        for entry in entries {
            match entry.kind {
                EntryKind::System => counts.system += 1,
                EntryKind::Error => counts.error += 1,
                EntryKind::LogsStarted | EntryKind::LogsStopped => counts.lifecycle += 1,
                EntryKind::LogLine => counts.line += 1,
                EntryKind::LogError => counts.stderr += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.system + self.error + self.lifecycle + self.line + self.stderr
    }
}
