//! Log processing for dockscope
//!
//! This crate provides the bounded log buffer, the server frame parser and
//! the content formatter (escaping and highlighting).

mod buffer;
pub mod format;
mod parser;

pub use buffer::{DEFAULT_CAPACITY, KindCounts, LogBuffer};
pub use format::{
    Fragment, Highlight, escape, escape_opt, fragments, highlight, highlight_search_term, plain_line,
    render_entry,
};
pub use parser::LogParser;

// Re-export types used in our public API
pub use dockscope_types::{EntryKind, LogEntry};
