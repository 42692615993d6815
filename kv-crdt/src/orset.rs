//! Observed-Remove Set (add-wins semantics).
//!
//! Each add creates a fresh [`ElementId`]. Remove moves the observed
//! element's IDs into the tombstone table rather than deleting the value
//! outright, so a concurrent add using a different ID still survives merge.

use kv_types::ElementId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// An Observed-Remove Set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrSet<T>
where
    T: Eq + std::hash::Hash + Clone,
{
    /// Map from element value to its currently-live IDs.
    elements: HashMap<T, HashSet<ElementId>>,
    /// IDs that have been observed-removed, with the time of removal (used
    /// by GC to drop tombstones older than the retention cutoff).
    tombstones: HashMap<ElementId, i64>,
}

impl<T> Default for OrSet<T>
where
    T: Eq + std::hash::Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrSet<T>
where
    T: Eq + std::hash::Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
            tombstones: HashMap::new(),
        }
    }

    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.elements.get(value).map(|ids| !ids.is_empty()).unwrap_or(false)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.values().filter(|ids| !ids.is_empty()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter().filter(|(_, ids)| !ids.is_empty()).map(|(v, _)| v)
    }

    /// Adds `value` tagged with a caller-supplied ID (fresh per add, even for
    /// a value already in the set — that is what makes concurrent
    /// add/remove add-wins).
    pub fn add(&mut self, value: T, id: ElementId) {
        if !self.tombstones.contains_key(&id) {
            self.elements.entry(value).or_default().insert(id);
        }
    }

    /// Removes `value`: every ID currently observed for it is tombstoned at
    /// `removed_at`. Returns the tombstoned IDs.
    pub fn remove(&mut self, value: &T, removed_at: i64) -> Vec<ElementId> {
        let removed: Vec<ElementId> = self
            .elements
            .get_mut(value)
            .map(|ids| ids.drain().collect())
            .unwrap_or_default();
        for id in &removed {
            self.tombstones.insert(id.clone(), removed_at);
        }
        removed
    }

    #[must_use]
    pub fn tombstones(&self) -> &HashMap<ElementId, i64> {
        &self.tombstones
    }

    /// Merges another OR-Set into this one.
    ///
    /// Unions elements by ID; any ID tombstoned on either side is dropped.
    /// Tombstones themselves merge by taking `max(deletedAt)`.
    pub fn merge(&mut self, other: &Self) {
        for (id, &deleted_at) in &other.tombstones {
            let entry = self.tombstones.entry(id.clone()).or_insert(deleted_at);
            if deleted_at > *entry {
                *entry = deleted_at;
            }
        }

        for (value, other_ids) in &other.elements {
            let entry = self.elements.entry(value.clone()).or_default();
            for id in other_ids {
                if !self.tombstones.contains_key(id) {
                    entry.insert(id.clone());
                }
            }
        }

        for ids in self.elements.values_mut() {
            ids.retain(|id| !self.tombstones.contains_key(id));
        }
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Drops tombstones whose removal time is older than `cutoff`.
    ///
    /// Safe only once no peer can still deliver an add using one of the
    /// dropped IDs — i.e. `cutoff` trails the operation log's retention
    /// window.
    pub fn gc(&mut self, cutoff: i64) {
        self.tombstones.retain(|_, &mut deleted_at| deleted_at >= cutoff);
    }
}
