//! The tagged CRDT value envelope.
//!
//! A stored value is one of seven per-type algebras (string, int counter,
//! float counter, list, set, hash, zset) plus an optional TTL. Merging two
//! values of different kinds is a malformed-data error rather than a panic —
//! a foreign operation can only ever disagree about kind when replication or
//! storage has corrupted something upstream, so callers get a typed error to
//! surface instead of this crate guessing which side to trust.

use crate::{CrdtHash, FloatCounter, IntCounter, OrSet, Rga, VectorClock, ZSet};
use kv_types::Timestamp;
use serde::{Deserialize, Serialize};

/// Error produced by value-level operations in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("type mismatch merging crdt value: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: &'static str },
    #[error("invalid value data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The per-type payload of a stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CrdtData {
    Str(crate::LwwRegister),
    Int(IntCounter),
    Float(FloatCounter),
    List(Rga<Vec<u8>>),
    Set(OrSet<Vec<u8>>),
    Hash(CrdtHash),
    ZSet(ZSet),
}

impl CrdtData {
    /// The Redis-facing type name, used in `WRONGTYPE` messages upstream.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Hash(_) => "hash",
            Self::ZSet(_) => "zset",
        }
    }
}

/// A stored value: a tagged CRDT payload plus optional TTL metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrdtValue {
    pub data: CrdtData,
    pub expire_at: Option<Timestamp>,
}

impl CrdtValue {
    #[must_use]
    pub fn new(data: CrdtData, expire_at: Option<Timestamp>) -> Self {
        Self { data, expire_at }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.data.kind()
    }

    /// Whether `now` is past this value's expiration, if it has one.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expire_at.map(|at| now > at).unwrap_or(false)
    }

    /// Merges `other` into `self`. Both sides must carry the same variant;
    /// a mismatch is reported rather than silently picking one side, since a
    /// type clash here means storage or replication is already corrupt.
    ///
    /// TTL merge is live-wins: the later `expire_at` survives, and a value
    /// with no TTL at all beats one with an already-expired TTL.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        match (&mut self.data, &other.data) {
            (CrdtData::Str(a), CrdtData::Str(b)) => a.merge(b),
            (CrdtData::Int(a), CrdtData::Int(b)) => a.merge(b),
            (CrdtData::Float(a), CrdtData::Float(b)) => a.merge(b),
            (CrdtData::List(a), CrdtData::List(b)) => a.merge(b),
            (CrdtData::Set(a), CrdtData::Set(b)) => a.merge(b),
            (CrdtData::Hash(a), CrdtData::Hash(b)) => a.merge(b),
            (CrdtData::ZSet(a), CrdtData::ZSet(b)) => a.merge(b),
            _ => {
                return Err(Error::TypeMismatch {
                    expected: self.data.kind(),
                    found: other.data.kind(),
                })
            }
        }
        self.expire_at = merge_expiry(self.expire_at, other.expire_at);
        Ok(())
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.merge(other)?;
        Ok(result)
    }

    /// Drops collection-internal tombstones older than `cutoff` (nanoseconds
    /// since the epoch). No-op for variants without tombstones.
    pub fn gc(&mut self, cutoff: i64) {
        match &mut self.data {
            CrdtData::Str(_) | CrdtData::Int(_) | CrdtData::Float(_) => {}
            CrdtData::List(l) => l.gc(cutoff),
            CrdtData::Set(s) => s.gc(cutoff),
            CrdtData::Hash(h) => h.gc(cutoff),
            CrdtData::ZSet(z) => z.gc(cutoff),
        }
    }

    /// Serializes this value to JSON bytes, e.g. for the segment log.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::InvalidData(e.to_string()))
    }

    /// Deserializes a value previously produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidData(e.to_string()))
    }
}

fn merge_expiry(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
    match (a, b) {
        (None, _) | (_, None) => None,
        (Some(a), Some(b)) => Some(a.max(b)),
    }
}

/// Used only by callers that need a vector clock representative of a value
/// as a whole (e.g. sync watermarking); per-type internals track their own
/// finer-grained clocks for merge decisions.
#[must_use]
pub fn vector_clock_of(data: &CrdtData) -> VectorClock {
    match data {
        CrdtData::Str(r) => r.vector_clock().clone(),
        CrdtData::Int(c) => c.vector_clock().clone(),
        CrdtData::Float(c) => c.vector_clock().clone(),
        CrdtData::List(_) | CrdtData::Set(_) | CrdtData::Hash(_) | CrdtData::ZSet(_) => VectorClock::new(),
    }
}
