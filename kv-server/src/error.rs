//! The client-visible error taxonomy.
//!
//! Only [`CommandError`] ever reaches a client; everything else (transient
//! replication failures, persistence errors, invariant violations) is
//! logged and handled internally per the error taxonomy — see
//! [`crate::Server::handle_operation`] and the Syncer crate for those paths.

/// Result type alias using [`CommandError`].
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Errors surfaced verbatim to the client, Redis-prefix style.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a valid float")]
    NotAFloat,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR {0}")]
    Persistence(String),
}

impl From<kv_store::StoreError> for CommandError {
    fn from(err: kv_store::StoreError) -> Self {
        match err {
            kv_store::StoreError::WrongType { .. } => Self::WrongType,
            kv_store::StoreError::IndexOutOfRange => Self::IndexOutOfRange,
            kv_store::StoreError::NoSuchKey(_) => Self::Syntax,
            // Persistence and CRDT-internal failures are PersistenceError /
            // InvariantViolation in the taxonomy — logged, and surfaced to
            // the caller only as a generic error so the client still gets a
            // reply rather than a hung connection.
            other @ (kv_store::StoreError::Segment(_) | kv_store::StoreError::Crdt(_)) => {
                tracing::error!(error = %other, "persistence or invariant error applying command");
                Self::Persistence(other.to_string())
            }
        }
    }
}
