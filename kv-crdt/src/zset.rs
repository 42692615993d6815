//! Sorted Set CRDT.
//!
//! Effective score = `score + sum(live deltas)`. `ZADD` sets the base
//! `score` under LWW, existence-guarded by `added_vc`; `ZINCRBY` adds to a
//! per-replica delta accumulator, each entry stamped with the vector clock
//! observed at the moment of that increment. `ZREM` stamps `removed_vc` as
//! an observed-remove: the base score is dropped once `removed_vc` dominates
//! `added_vc` (the remove observed the add), and any individual delta entry
//! is dropped once `removed_vc` dominates that entry's own stamp. A
//! concurrent `ZINCRBY` whose stamp the remove never saw is not dominated,
//! so it survives merge and re-admits the member carrying only its
//! accumulated delta — the dropped base score does not come back.
//!
//! Keeping `score_timestamp` separate from `update_timestamp` matters too:
//! an element that used one shared timestamp for both would let a later
//! `ZINCRBY` perturb the LWW comparison on the base `score`, flipping which
//! side's `ZADD` wins even though the increment never touched the score.

use crate::VectorClock;
use kv_types::{ReplicaId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeltaEntry {
    total: f64,
    vc: VectorClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Member {
    score: f64,
    score_timestamp: Timestamp,
    score_replica: ReplicaId,
    added_vc: VectorClock,
    removed_vc: Option<VectorClock>,
    /// Per-replica `ZINCRBY` accumulation, each stamped with the vector
    /// clock observed at that increment.
    delta: HashMap<ReplicaId, DeltaEntry>,
    update_timestamp: Timestamp,
}

impl Member {
    fn dominated_by_removal(&self, vc: &VectorClock) -> bool {
        self.removed_vc.as_ref().map(|removed| removed.dominates(vc)).unwrap_or(false)
    }

    fn score_live(&self) -> bool {
        !self.dominated_by_removal(&self.added_vc)
    }

    fn delta_total(&self) -> f64 {
        self.delta
            .values()
            .filter(|entry| !self.dominated_by_removal(&entry.vc))
            .map(|entry| entry.total)
            .sum()
    }

    fn exists(&self) -> bool {
        self.score_live()
            || self
                .delta
                .values()
                .any(|entry| !self.dominated_by_removal(&entry.vc))
    }

    fn effective_score(&self) -> f64 {
        let base = if self.score_live() { self.score } else { 0.0 };
        base + self.delta_total()
    }
}

/// A CRDT sorted set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZSet {
    members: HashMap<String, Member>,
}

impl ZSet {
    #[must_use]
    pub fn new() -> Self {
        Self { members: HashMap::new() }
    }

    fn live(&self, member: &str) -> Option<&Member> {
        self.members.get(member).filter(|m| m.exists())
    }

    #[must_use]
    pub fn score(&self, member: &str) -> Option<f64> {
        self.live(member).map(Member::effective_score)
    }

    #[must_use]
    pub fn contains(&self, member: &str) -> bool {
        self.live(member).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.values().filter(|m| m.exists()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(member, score)` pairs sorted ascending by effective score, then by
    /// member name for a deterministic tie-break.
    #[must_use]
    pub fn range_by_score(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .members
            .iter()
            .filter(|(_, m)| m.exists())
            .map(|(name, m)| (name.clone(), m.effective_score()))
            .collect();
        out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        out
    }

    #[must_use]
    pub fn rank(&self, member: &str) -> Option<usize> {
        self.range_by_score().iter().position(|(name, _)| name == member)
    }

    /// Sets the base score for `member` under LWW guarded by `added_vc`.
    /// Returns whether the write took effect.
    pub fn add(
        &mut self,
        member: impl Into<String>,
        score: f64,
        timestamp: Timestamp,
        replica_id: ReplicaId,
        added_vc: VectorClock,
    ) -> bool {
        let member = member.into();
        if let Some(existing) = self.members.get(&member) {
            let wins = match existing.added_vc.compare(&added_vc) {
                crate::CausalOrder::After | crate::CausalOrder::Equal => false,
                crate::CausalOrder::Before => true,
                crate::CausalOrder::Concurrent => match timestamp.cmp(&existing.score_timestamp) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => replica_id > existing.score_replica,
                },
            };
            if !wins {
                return false;
            }
            let mut member_entry = existing.clone();
            member_entry.score = score;
            member_entry.score_timestamp = timestamp;
            member_entry.score_replica = replica_id;
            member_entry.added_vc = added_vc;
            member_entry.removed_vc = None;
            self.members.insert(member, member_entry);
            return true;
        }
        self.members.insert(
            member,
            Member {
                score,
                score_timestamp: timestamp,
                score_replica: replica_id,
                added_vc,
                removed_vc: None,
                delta: HashMap::new(),
                update_timestamp: timestamp,
            },
        );
        true
    }

    /// Accumulates `delta` into `member`'s per-replica counter, creating the
    /// member at score 0 if absent. Returns the new effective score.
    pub fn incr_by(
        &mut self,
        member: impl Into<String>,
        delta: f64,
        update_timestamp: Timestamp,
        replica_id: ReplicaId,
        vc: VectorClock,
    ) -> f64 {
        let member = member.into();
        let entry = self.members.entry(member).or_insert_with(|| Member {
            score: 0.0,
            score_timestamp: update_timestamp,
            score_replica: replica_id.clone(),
            added_vc: vc.clone(),
            removed_vc: None,
            delta: HashMap::new(),
            update_timestamp,
        });
        let delta_entry = entry.delta.entry(replica_id).or_insert_with(|| DeltaEntry {
            total: 0.0,
            vc: vc.clone(),
        });
        delta_entry.total += delta;
        delta_entry.vc.update(&vc);
        entry.update_timestamp = update_timestamp;
        entry.effective_score()
    }

    /// Observed-remove: stamps `removed_vc` for `member`. Returns whether the
    /// member was present.
    pub fn remove(&mut self, member: &str, removed_vc: VectorClock) -> bool {
        if let Some(existing) = self.members.get_mut(member) {
            if !existing.exists() {
                return false;
            }
            existing.removed_vc = Some(match existing.removed_vc.take() {
                Some(prior) => prior.updated(&removed_vc),
                None => removed_vc,
            });
            return true;
        }
        false
    }

    /// Merges another ZSet into this one, member by member.
    pub fn merge(&mut self, other: &Self) {
        for (name, other_member) in &other.members {
            match self.members.get_mut(name) {
                Some(existing) => merge_member(existing, other_member),
                None => {
                    self.members.insert(name.clone(), other_member.clone());
                }
            }
        }
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Drops members that no longer exist and whose last touch predates
    /// `cutoff`.
    pub fn gc(&mut self, cutoff: i64) {
        self.members.retain(|_, m| m.exists() || m.update_timestamp.as_nanos() >= cutoff);
    }
}

fn merge_member(existing: &mut Member, other: &Member) {
    existing.removed_vc = match (existing.removed_vc.take(), other.removed_vc.clone()) {
        (Some(a), Some(b)) => Some(a.updated(&b)),
        (a, b) => a.or(b),
    };

    let other_wins_score = match existing.added_vc.compare(&other.added_vc) {
        crate::CausalOrder::Before => true,
        crate::CausalOrder::After | crate::CausalOrder::Equal => false,
        crate::CausalOrder::Concurrent => match existing.score_timestamp.cmp(&other.score_timestamp) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => other.score_replica > existing.score_replica,
        },
    };
    existing.added_vc.update(&other.added_vc);
    if other_wins_score {
        existing.score = other.score;
        existing.score_timestamp = other.score_timestamp;
        existing.score_replica = other.score_replica.clone();
    }

    for (replica_id, other_entry) in &other.delta {
        match existing.delta.get_mut(replica_id) {
            Some(entry) => {
                if other_entry.total > entry.total {
                    entry.total = other_entry.total;
                }
                entry.vc.update(&other_entry.vc);
            }
            None => {
                existing.delta.insert(replica_id.clone(), other_entry.clone());
            }
        }
    }

    existing.update_timestamp = existing.update_timestamp.max(other.update_timestamp);
}
