//! Accumulative counters for the Integer and Float CRDT value types.
//!
//! Replication for counters is primarily op-based: each `INCRBY` is a
//! separate [`kv_types::Operation`] with a unique ID, applied at most once
//! because the Operation Log's dedup guarantees it. [`IntCounter::merge`] and
//! [`FloatCounter::merge`] exist only as the state-based fallback used for
//! bulk snapshot transfer (e.g. seeding a brand new replica) — summing two
//! full accumulators is not safe to use for ongoing per-operation
//! replication, since it would double-count operations both sides already
//! share.

use crate::VectorClock;
use kv_types::ReplicaId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An accumulative 64-bit integer counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntCounter {
    /// Per-replica running total, so state-based merges can take a pointwise
    /// max without double-counting a replica's own prior contribution.
    per_replica: BTreeMap<ReplicaId, i64>,
    vector_clock: VectorClock,
}

impl IntCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a local or replayed delta for `replica_id`.
    pub fn apply_delta(&mut self, replica_id: ReplicaId, delta: i64) {
        *self.per_replica.entry(replica_id.clone()).or_insert(0) += delta;
        self.vector_clock.inc(replica_id);
    }

    /// Current accumulated value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.per_replica.values().sum()
    }

    #[must_use]
    pub fn vector_clock(&self) -> &VectorClock {
        &self.vector_clock
    }

    /// State-based fallback merge: per-replica max, not sum, so merging the
    /// same snapshot twice stays idempotent.
    pub fn merge(&mut self, other: &Self) {
        for (replica_id, &total) in &other.per_replica {
            let entry = self.per_replica.entry(replica_id.clone()).or_insert(0);
            *entry = (*entry).max(total);
        }
        self.vector_clock.update(&other.vector_clock);
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

impl PartialEq for IntCounter {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value() && self.per_replica == other.per_replica
    }
}

impl Eq for IntCounter {}

/// An accumulative IEEE-754 double counter backing `INCRBYFLOAT`.
///
/// Stored as a canonical `f64`, never as a scaled integer — a prior
/// implementation scaled floats to integers on write and forgot to reverse
/// the scaling on read, corrupting every value it touched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloatCounter {
    per_replica: BTreeMap<ReplicaId, f64>,
    vector_clock: VectorClock,
}

impl FloatCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_delta(&mut self, replica_id: ReplicaId, delta: f64) {
        *self.per_replica.entry(replica_id.clone()).or_insert(0.0) += delta;
        self.vector_clock.inc(replica_id);
    }

    /// Current accumulated value.
    ///
    /// Floating-point addition is not associative at the bit level, so the
    /// result can depend on operation order — acceptable under the same
    /// contract Redis's own `INCRBYFLOAT` makes.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.per_replica.values().sum()
    }

    #[must_use]
    pub fn vector_clock(&self) -> &VectorClock {
        &self.vector_clock
    }

    pub fn merge(&mut self, other: &Self) {
        for (replica_id, &total) in &other.per_replica {
            let entry = self.per_replica.entry(replica_id.clone()).or_insert(0.0);
            if total > *entry {
                *entry = total;
            }
        }
        self.vector_clock.update(&other.vector_clock);
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}
