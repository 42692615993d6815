//! Error types for segment storage.

use thiserror::Error;

/// Result type for segment operations.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Errors that can occur while appending, rotating, compacting or
/// recovering log segments.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// IO error (file system).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A logged entry could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A segment file referenced by the ID range was not found on disk.
    /// Unlike a corrupt trailing record, a missing file in the middle of
    /// the sequence means recovery cannot proceed.
    #[error("missing segment file: {0}")]
    MissingSegment(String),

    /// Compaction could not produce a valid replacement segment.
    #[error("compaction of segment {segment} failed: {reason}")]
    CompactionFailed { segment: String, reason: String },
}
