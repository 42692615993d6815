//! Last-Writer-Wins register for the String value type.
//!
//! Concurrent writes are resolved by vector clock first, wall-clock timestamp
//! second, and replica ID third. Resolution happens strictly before the
//! vector clocks are merged: merging first would make the two clocks equal
//! and the comparison would collapse to a tie every time, silently losing
//! genuine ordering information.

use crate::VectorClock;
use kv_types::{ReplicaId, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A Last-Writer-Wins register holding an opaque byte string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LwwRegister {
    data: Vec<u8>,
    timestamp: Timestamp,
    replica_id: ReplicaId,
    vector_clock: VectorClock,
}

impl LwwRegister {
    /// Creates a register from a fresh local write.
    #[must_use]
    pub fn new(data: Vec<u8>, timestamp: Timestamp, replica_id: ReplicaId, vector_clock: VectorClock) -> Self {
        Self {
            data,
            timestamp,
            replica_id,
            vector_clock,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    #[must_use]
    pub fn replica_id(&self) -> &ReplicaId {
        &self.replica_id
    }

    #[must_use]
    pub fn vector_clock(&self) -> &VectorClock {
        &self.vector_clock
    }

    /// Overwrites this register with a new write if its timestamp is
    /// strictly greater than the current one. Returns whether the write took
    /// effect — the Store's `Set` is a no-op when the incoming write is not
    /// newer. The caller supplies a vector clock that already reflects the
    /// writing replica's own causal history (e.g. the prior clock with that
    /// replica's entry incremented); this method does not merge clocks.
    pub fn set(&mut self, data: Vec<u8>, timestamp: Timestamp, replica_id: ReplicaId, vector_clock: VectorClock) -> bool {
        if timestamp <= self.timestamp {
            return false;
        }
        self.data = data;
        self.timestamp = timestamp;
        self.replica_id = replica_id;
        self.vector_clock = vector_clock;
        true
    }

    /// Returns true if `other` should win over `self` under LWW rules.
    fn other_wins(&self, other: &Self) -> bool {
        match self.vector_clock.compare(&other.vector_clock) {
            crate::CausalOrder::Before => true,
            crate::CausalOrder::After | crate::CausalOrder::Equal => false,
            crate::CausalOrder::Concurrent => {
                match other.timestamp.cmp(&self.timestamp) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => other.replica_id > self.replica_id,
                }
            }
        }
    }

    /// Merges another register into this one.
    ///
    /// Compares first, then merges vector clocks into the winner — never the
    /// other way around.
    pub fn merge(&mut self, other: &Self) {
        let winner_wins = self.other_wins(other);
        let mut merged_vc = self.vector_clock.updated(&other.vector_clock);
        if winner_wins {
            self.data = other.data.clone();
            self.timestamp = other.timestamp;
            self.replica_id = other.replica_id.clone();
        }
        std::mem::swap(&mut self.vector_clock, &mut merged_vc);
    }

    /// Creates a new register that is the merge of this and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

impl PartialEq for LwwRegister {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data && self.timestamp == other.timestamp && self.replica_id == other.replica_id
    }
}

impl Eq for LwwRegister {}
