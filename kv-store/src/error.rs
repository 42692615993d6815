//! Errors surfaced by the Store.

/// Result type alias using [`StoreError`].
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A mutator was applied to a key already holding a different CRDT kind
    /// (e.g. `LPUSH` against a key holding a string).
    #[error("WRONGTYPE key {key} holds {existing}, not {requested}")]
    WrongType { key: String, existing: &'static str, requested: &'static str },

    #[error("no such key: {0}")]
    NoSuchKey(String),

    #[error("index out of range")]
    IndexOutOfRange,

    #[error(transparent)]
    Segment(#[from] kv_segment::SegmentError),

    #[error(transparent)]
    Crdt(#[from] kv_crdt::Error),
}
