//! Errors the Syncer can hit talking to a peer. All of these are
//! transient-replication-category failures: the tick that produced one is
//! logged and retried on the next tick, never surfaced to a client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request to peer failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("peer returned unexpected status {status}")]
    UnexpectedStatus { status: reqwest::StatusCode },

    #[error("applying pulled operation: {0}")]
    Apply(#[from] kv_server::CommandError),
}

pub type SyncResult<T> = Result<T, SyncError>;
