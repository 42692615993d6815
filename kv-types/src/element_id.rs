//! Stable element identity shared by every collection CRDT.
//!
//! RGA list cells, OR-Set add-tags, hash field versions and ZSet members
//! are all identified the same way: `"<ts>-<replicaID>-<seq>"`. `seq` is a
//! counter local to the CRDT instance that produced the ID, so the triple
//! as a whole is globally unique even though two replicas may mint IDs at
//! the same wall-clock nanosecond.

use crate::{ReplicaId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Globally-unique handle for one CRDT element (list cell, set tag, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId {
    pub timestamp: Timestamp,
    pub replica_id: ReplicaId,
    pub seq: u64,
}

impl ElementId {
    #[must_use]
    pub const fn new(timestamp: Timestamp, replica_id: ReplicaId, seq: u64) -> Self {
        Self {
            timestamp,
            replica_id,
            seq,
        }
    }
}

impl PartialOrd for ElementId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElementId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.replica_id.cmp(&other.replica_id))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.timestamp.as_nanos(), self.replica_id, self.seq)
    }
}

/// Parse error for [`ElementId::from_str`].
#[derive(Debug, thiserror::Error)]
#[error("invalid element id: {0}")]
pub struct ParseElementIdError(String);

impl FromStr for ElementId {
    type Err = ParseElementIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (Some(ts), Some(rid), Some(seq)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ParseElementIdError(s.to_string()));
        };
        let ts: i64 = ts.parse().map_err(|_| ParseElementIdError(s.to_string()))?;
        let seq: u64 = seq.parse().map_err(|_| ParseElementIdError(s.to_string()))?;
        Ok(Self::new(Timestamp::from_nanos(ts), ReplicaId::new(rid), seq))
    }
}
