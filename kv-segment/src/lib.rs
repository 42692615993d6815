//! Append-only log segment storage.
//!
//! A directory of `segment-<id>.log` files, exactly one of which ("current")
//! is open for writes at any time. Older segments are immutable until
//! background compaction replaces a run of them with one equivalent file.
//!
//! # Architecture
//!
//! - Every mutation is appended as a length-implicit, newline-delimited
//!   JSON [`LogEntry`] and `fsync`ed before the write returns.
//! - Segments roll once they cross `max_segment_size`.
//! - Compaction keeps only each key's most recent entry and drops entries
//!   whose latest kind is a delete, never touching the current segment.
//! - Recovery replays every segment in ID order; a truncated trailing
//!   record from a crash is skipped with a warning.

mod config;
mod entry;
mod error;
mod manager;

pub use config::SegmentConfig;
pub use entry::{EntryKind, LogEntry};
pub use error::{SegmentError, SegmentResult};
pub use manager::SegmentManager;
