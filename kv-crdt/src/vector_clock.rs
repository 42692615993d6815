//! Vector Clock for causality tracking.
//!
//! A vector clock tracks logical time across replicas, enabling determination
//! of causality (happens-before relationships) between operations.
//!
//! Use cases:
//! - Detecting concurrent writes for LWW/ZSet tie-breaking
//! - Ordering writes for CRDT merge
//! - Sync protocol causal metadata

use kv_types::ReplicaId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Causality relationship between two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    /// First clock happened before second.
    Before,
    /// First clock happened after second.
    After,
    /// Clocks are concurrent (neither happened before the other).
    Concurrent,
    /// Clocks are identical.
    Equal,
}

/// A Vector Clock for tracking causality across replicas.
///
/// Each replica has a logical counter that increments with each operation it
/// produces. Comparing vector clocks determines if two operations are
/// causally related or concurrent. Backed by a `BTreeMap` (not a `HashMap`)
/// so that serialization always emits keys in sorted order, making vector
/// clocks content-addressable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorClock {
    clocks: BTreeMap<ReplicaId, u64>,
}

impl VectorClock {
    /// Creates a new empty vector clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clocks: BTreeMap::new(),
        }
    }

    /// Creates a vector clock with a single replica's initial time.
    #[must_use]
    pub fn for_replica(replica_id: ReplicaId) -> Self {
        let mut clocks = BTreeMap::new();
        clocks.insert(replica_id, 0);
        Self { clocks }
    }

    /// Creates a vector clock with a single replica already at a known
    /// logical time. Used to reconstruct a deterministic per-operation clock
    /// from a replicated operation's own `(replica_id, seq)`, without
    /// replaying `inc` seq times.
    #[must_use]
    pub fn with_entry(replica_id: ReplicaId, time: u64) -> Self {
        let mut clocks = BTreeMap::new();
        clocks.insert(replica_id, time);
        Self { clocks }
    }

    /// Returns the logical time for a replica (0 if not present).
    #[must_use]
    pub fn get(&self, replica_id: &ReplicaId) -> u64 {
        self.clocks.get(replica_id).copied().unwrap_or(0)
    }

    /// Returns all replicas and their times.
    pub fn entries(&self) -> impl Iterator<Item = (&ReplicaId, &u64)> {
        self.clocks.iter()
    }

    /// Returns the number of replicas tracked by the clock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    /// Returns true if the clock has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// Increments the clock for a replica and returns the new time.
    ///
    /// Called when the replica produces a new operation.
    pub fn inc(&mut self, replica_id: ReplicaId) -> u64 {
        let entry = self.clocks.entry(replica_id).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Returns a copy of this vector clock.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Merges another vector clock into this one (pointwise max).
    ///
    /// Commutative, associative, idempotent.
    pub fn update(&mut self, other: &Self) {
        for (replica_id, &time) in &other.clocks {
            let entry = self.clocks.entry(replica_id.clone()).or_insert(0);
            if time > *entry {
                *entry = time;
            }
        }
    }

    /// Creates a new clock that is the pointwise-max merge of this and another.
    #[must_use]
    pub fn updated(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.update(other);
        result
    }

    /// Compares this clock with another to determine causal ordering.
    #[must_use]
    pub fn compare(&self, other: &Self) -> CausalOrder {
        let mut dominated_by_self = true; // self >= other for every replica
        let mut dominated_by_other = true; // other >= self for every replica

        let all_replicas: std::collections::BTreeSet<_> =
            self.clocks.keys().chain(other.clocks.keys()).collect();

        for replica_id in all_replicas {
            let self_time = self.get(replica_id);
            let other_time = other.get(replica_id);

            if self_time < other_time {
                dominated_by_self = false;
            }
            if other_time < self_time {
                dominated_by_other = false;
            }
        }

        match (dominated_by_self, dominated_by_other) {
            (true, true) => CausalOrder::Equal,
            (true, false) => CausalOrder::After,
            (false, true) => CausalOrder::Before,
            (false, false) => CausalOrder::Concurrent,
        }
    }

    /// Returns true if this clock causally happened before the other.
    #[must_use]
    pub fn happens_before(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Before
    }

    /// Returns true if this clock causally happened after the other.
    #[must_use]
    pub fn happens_after(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::After
    }

    /// Returns true if this clock is concurrent with the other.
    #[must_use]
    pub fn is_concurrent(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Concurrent
    }

    /// Returns true if this clock dominates the other (`self >= other` pointwise).
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        matches!(self.compare(other), CausalOrder::After | CausalOrder::Equal)
    }

    /// Structural equality, distinct from the `PartialEq` impl below which
    /// treats two clocks as equal whenever their causal order is `Equal`.
    #[must_use]
    pub fn equal(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Equal
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Equal
    }
}

impl Eq for VectorClock {}
