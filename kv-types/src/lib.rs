//! Shared identifiers, timestamps and operation records for crdt-kv.
//!
//! This crate defines the fundamental, CRDT-agnostic types used throughout
//! the rest of the workspace:
//! - [`ReplicaId`] — a replica's self-chosen identity
//! - [`Timestamp`] — wall-clock time used only as an LWW tiebreaker
//! - [`ElementId`] — stable identity for CRDT collection elements
//! - [`Operation`] / [`OperationId`] — the replicated mutation record
//!
//! Domain-specific CRDT algebra lives in `kv-crdt`, not here.

mod element_id;
mod operation;
mod replica;
mod timestamp;

pub use element_id::{ElementId, ParseElementIdError};
pub use operation::{Operation, OperationId, OperationKind, ParseOperationIdError};
pub use replica::ReplicaId;
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur constructing or parsing the shared types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidElementId(#[from] ParseElementIdError),

    #[error(transparent)]
    InvalidOperationId(#[from] ParseOperationIdError),
}
