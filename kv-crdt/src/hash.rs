//! Hash CRDT: OR-field LWW for string fields, per-field counter for
//! counter fields.
//!
//! Each field is independently versioned. String fields resolve concurrent
//! writes by `(timestamp, replica_id)` LWW; counter fields (`HINCRBY`,
//! `HINCRBYFLOAT`) accumulate. If a merge ever sees one side holding a
//! string field and the other holding a counter field with the same name,
//! the counter wins — it carries operation-replay semantics a plain LWW
//! value does not.

use kv_types::{ElementId, ReplicaId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum FieldValue {
    Str(Vec<u8>),
    Counter(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Field {
    id: ElementId,
    value: FieldValue,
    timestamp: Timestamp,
    replica_id: ReplicaId,
    deleted: bool,
    deleted_at: Option<i64>,
}

impl Field {
    fn is_counter(&self) -> bool {
        matches!(self.value, FieldValue::Counter(_))
    }
}

/// A CRDT hash map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrdtHash {
    fields: HashMap<String, Field>,
}

impl CrdtHash {
    #[must_use]
    pub fn new() -> Self {
        Self { fields: HashMap::new() }
    }

    fn live(&self, name: &str) -> Option<&Field> {
        self.fields.get(name).filter(|f| !f.deleted)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        match &self.live(name)?.value {
            FieldValue::Str(bytes) => Some(bytes.clone()),
            FieldValue::Counter(v) => Some(v.to_string().into_bytes()),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.live(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.values().filter(|f| !f.deleted).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &Field)> {
        self.fields.iter().filter(|(_, f)| !f.deleted)
    }

    /// Keys of all live fields.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    /// `(name, bytes)` pairs of all live fields, counters rendered as text.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        self.iter()
            .map(|(k, f)| {
                let v = match &f.value {
                    FieldValue::Str(b) => b.clone(),
                    FieldValue::Counter(n) => n.to_string().into_bytes(),
                };
                (k.clone(), v)
            })
            .collect()
    }

    /// Sets a string field under LWW, guarded by `(timestamp, replica_id)`.
    /// Returns whether the write took effect.
    pub fn set_str(
        &mut self,
        name: impl Into<String>,
        bytes: Vec<u8>,
        id: ElementId,
        timestamp: Timestamp,
        replica_id: ReplicaId,
    ) -> bool {
        let name = name.into();
        if let Some(existing) = self.fields.get(&name) {
            if !existing.is_counter() && !lww_wins(timestamp, &replica_id, existing.timestamp, &existing.replica_id) {
                return false;
            }
        }
        self.fields.insert(
            name,
            Field {
                id,
                value: FieldValue::Str(bytes),
                timestamp,
                replica_id,
                deleted: false,
                deleted_at: None,
            },
        );
        true
    }

    /// Accumulates `delta` into a counter field, creating it at 0 first if
    /// absent or if the existing field is a (losing) string field.
    pub fn incr_by(
        &mut self,
        name: impl Into<String>,
        delta: f64,
        id: ElementId,
        timestamp: Timestamp,
        replica_id: ReplicaId,
    ) -> f64 {
        let name = name.into();
        let field = self.fields.entry(name).or_insert_with(|| Field {
            id: id.clone(),
            value: FieldValue::Counter(0.0),
            timestamp,
            replica_id: replica_id.clone(),
            deleted: false,
            deleted_at: None,
        });
        let current = match &field.value {
            FieldValue::Counter(v) => *v,
            FieldValue::Str(_) => 0.0,
        };
        field.value = FieldValue::Counter(current + delta);
        field.timestamp = timestamp;
        field.replica_id = replica_id;
        field.deleted = false;
        field.deleted_at = None;
        current + delta
    }

    /// Removes a field, returning whether it was present.
    pub fn remove(&mut self, name: &str, deleted_at: i64) -> bool {
        if let Some(field) = self.fields.get_mut(name) {
            if !field.deleted {
                field.deleted = true;
                field.deleted_at = Some(deleted_at);
                return true;
            }
        }
        false
    }

    /// Merges another hash into this one, field by field.
    pub fn merge(&mut self, other: &Self) {
        for (name, other_field) in &other.fields {
            match self.fields.get_mut(name) {
                Some(existing) => merge_field(existing, other_field),
                None => {
                    self.fields.insert(name.clone(), other_field.clone());
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

    /// Drops tombstoned fields removed before `cutoff`.
    pub fn gc(&mut self, cutoff: i64) {
        self.fields
            .retain(|_, f| !f.deleted || f.deleted_at.map(|d| d >= cutoff).unwrap_or(true));
    }
}

fn lww_wins(ts: Timestamp, replica_id: &ReplicaId, existing_ts: Timestamp, existing_replica: &ReplicaId) -> bool {
    match ts.cmp(&existing_ts) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => replica_id > existing_replica,
    }
}

fn merge_field(existing: &mut Field, other: &Field) {
    match (existing.is_counter(), other.is_counter()) {
        (true, true) => {
            // Summing two full accumulators, not a per-replica max like
            // `IntCounter::merge` — this merge is the state-based snapshot
            // fallback only, never the path `HINCRBY`/`HINCRBYFLOAT` take in
            // production (those replicate op-based through the Operation
            // Log, which already guarantees at-most-once apply). Calling
            // this twice on the same pair of snapshots double-counts; it is
            // not meant to be idempotent.
            let (FieldValue::Counter(a), FieldValue::Counter(b)) = (&existing.value, &other.value) else {
                unreachable!()
            };
            existing.value = FieldValue::Counter(a + b);
            if lww_wins(other.timestamp, &other.replica_id, existing.timestamp, &existing.replica_id) {
                existing.timestamp = other.timestamp;
                existing.replica_id = other.replica_id.clone();
            }
            existing.deleted = existing.deleted && other.deleted;
        }
        (true, false) => {
            // counter wins the type clash; keep existing value, absorb any
            // later metadata from the losing side's tombstone status.
        }
        (false, true) => {
            *existing = other.clone();
        }
        (false, false) => {
            if lww_wins(other.timestamp, &other.replica_id, existing.timestamp, &existing.replica_id) {
                *existing = other.clone();
            }
        }
    }
}
