//! The unit of replication: an immutable, globally-identified mutation.

use crate::{ReplicaId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ULID-like identifier for one [`Operation`]: `"<ts>-<replicaID>-<seq>"`.
///
/// Distinct from [`crate::ElementId`] even though the shape is identical —
/// operation IDs namespace the Operation Log and the Syncer's seen-set,
/// element IDs namespace CRDT internals. Conflating them would let a
/// collision in one domain silently alias into the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId {
    pub timestamp: Timestamp,
    pub replica_id: ReplicaId,
    pub seq: u64,
}

impl OperationId {
    #[must_use]
    pub const fn new(timestamp: Timestamp, replica_id: ReplicaId, seq: u64) -> Self {
        Self {
            timestamp,
            replica_id,
            seq,
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.timestamp.as_nanos(), self.replica_id, self.seq)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid operation id: {0}")]
pub struct ParseOperationIdError(String);

impl FromStr for OperationId {
    type Err = ParseOperationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (Some(ts), Some(rid), Some(seq)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ParseOperationIdError(s.to_string()));
        };
        let ts: i64 = ts.parse().map_err(|_| ParseOperationIdError(s.to_string()))?;
        let seq: u64 = seq.parse().map_err(|_| ParseOperationIdError(s.to_string()))?;
        Ok(Self::new(Timestamp::from_nanos(ts), ReplicaId::new(rid), seq))
    }
}

/// High-level kind used by compaction to decide survivorship. `command`
/// below still carries the exact mutation (`LPUSH`, `ZINCRBY`, ...); `kind`
/// only distinguishes "this produced a value" from "this removed one".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Set,
    Delete,
}

/// An immutable, replicated mutation record.
///
/// `args` are the pre-parsed command arguments — decoding the wire protocol
/// is the job of a gateway layered in front of this crate, not this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_id: OperationId,
    pub timestamp: Timestamp,
    pub replica_id: ReplicaId,
    pub command: String,
    pub args: Vec<String>,
    pub kind: OperationKind,
}

impl Operation {
    #[must_use]
    pub fn new(
        operation_id: OperationId,
        timestamp: Timestamp,
        replica_id: ReplicaId,
        command: impl Into<String>,
        args: Vec<String>,
        kind: OperationKind,
    ) -> Self {
        Self {
            operation_id,
            timestamp,
            replica_id,
            command: command.into(),
            args,
            kind,
        }
    }
}
