//! The unit of persistence: one logged mutation.

use serde::{Deserialize, Serialize};

/// High-level kind used by compaction to decide survivorship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Set,
    Delete,
}

/// A single persisted record: `{timestamp, operation, key, value?, metadata?}`.
///
/// Entries are serialized one per line as JSON — simple to append, simple
/// to skip a truncated trailing record during recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub kind: EntryKind,
    pub key: String,
    pub value: Option<Vec<u8>>,
    pub metadata: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn set(timestamp: i64, key: impl Into<String>, value: Vec<u8>, metadata: Option<String>) -> Self {
        Self { timestamp, kind: EntryKind::Set, key: key.into(), value: Some(value), metadata }
    }

    #[must_use]
    pub fn delete(timestamp: i64, key: impl Into<String>) -> Self {
        Self { timestamp, kind: EntryKind::Delete, key: key.into(), value: None, metadata: None }
    }
}
