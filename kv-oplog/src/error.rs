//! Errors surfaced by the operation log.

/// Result type alias using [`OpLogError`].
pub type OpLogResult<T> = std::result::Result<T, OpLogError>;

#[derive(Debug, thiserror::Error)]
pub enum OpLogError {
    #[error(transparent)]
    Segment(#[from] kv_segment::SegmentError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation log entry at {key} is missing its payload")]
    MissingPayload { key: String },
}
