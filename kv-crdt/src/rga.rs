//! Replicated Growable Array (RGA) backing the List CRDT value type.
//!
//! Each element records the ID of its left neighbor at insertion time
//! (`origin_left`, absent for an insert at the head). The visible order is
//! never stored directly — it is recomputed from the origin graph by a
//! single linearization pass: group elements by `origin_left`, sort siblings
//! by `(timestamp desc, replica_id desc)`, then DFS. That is what makes the
//! order deterministic and commutative regardless of the order operations
//! arrived in.

use kv_types::ElementId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Cell<T> {
    id: ElementId,
    origin_left: Option<ElementId>,
    value: T,
    deleted: bool,
    deleted_at: Option<i64>,
}

/// A Replicated Growable Array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rga<T> {
    cells: HashMap<ElementId, Cell<T>>,
}

impl<T: Clone> Rga<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { cells: HashMap::new() }
    }

    /// Builds the visible-and-tombstoned order by DFS over the origin graph.
    fn linearize(&self) -> Vec<ElementId> {
        let mut children: HashMap<Option<ElementId>, Vec<ElementId>> = HashMap::new();
        for cell in self.cells.values() {
            children.entry(cell.origin_left.clone()).or_default().push(cell.id.clone());
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| b.cmp(a));
        }

        let mut order = Vec::with_capacity(self.cells.len());
        let mut stack: Vec<Option<ElementId>> = vec![None];
        while let Some(current) = stack.pop() {
            if let Some(id) = &current {
                order.push(id.clone());
            }
            if let Some(kids) = children.get(&current) {
                for child in kids.iter().rev() {
                    stack.push(Some(child.clone()));
                }
            }
        }
        order
    }

    /// Visible (non-tombstoned) values in list order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.linearize()
            .into_iter()
            .filter_map(|id| self.cells.get(&id))
            .filter(|cell| !cell.deleted)
            .map(|cell| cell.value.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.values().filter(|c| !c.deleted).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element ID at a visible index, if any.
    #[must_use]
    pub fn id_at(&self, index: usize) -> Option<ElementId> {
        self.linearize()
            .into_iter()
            .filter(|id| !self.cells.get(id).map(|c| c.deleted).unwrap_or(true))
            .nth(index)
    }

    /// The ID to use as `origin_left` for an insert at visible `index`
    /// (`None` means "insert at the head").
    #[must_use]
    pub fn origin_for_index(&self, index: usize) -> Option<ElementId> {
        if index == 0 {
            return None;
        }
        self.id_at(index - 1)
    }

    /// Inserts `value` with a caller-minted `id`, anchored after `origin_left`.
    pub fn insert(&mut self, id: ElementId, origin_left: Option<ElementId>, value: T) {
        self.cells.insert(
            id.clone(),
            Cell {
                id,
                origin_left,
                value,
                deleted: false,
                deleted_at: None,
            },
        );
    }

    /// Tombstones the element with the given ID. No-op if unknown.
    pub fn delete_by_id(&mut self, id: &ElementId, deleted_at: i64) {
        if let Some(cell) = self.cells.get_mut(id) {
            cell.deleted = true;
            cell.deleted_at = Some(deleted_at);
        }
    }

    #[must_use]
    pub fn is_tombstoned(&self, id: &ElementId) -> bool {
        self.cells.get(id).map(|c| c.deleted).unwrap_or(false)
    }

    /// Merges another RGA into this one.
    ///
    /// Elements are unioned by ID. Delete-wins: if either side has the
    /// element tombstoned, the merged cell is tombstoned, with
    /// `deleted_at = max(deleted_ats)`.
    pub fn merge(&mut self, other: &Self) {
        for (id, other_cell) in &other.cells {
            match self.cells.get_mut(id) {
                Some(existing) => {
                    if other_cell.deleted {
                        existing.deleted = true;
                        existing.deleted_at = match (existing.deleted_at, other_cell.deleted_at) {
                            (Some(a), Some(b)) => Some(a.max(b)),
                            (a, b) => a.or(b),
                        };
                    }
                }
                None => {
                    self.cells.insert(id.clone(), other_cell.clone());
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

    /// Drops tombstoned cells deleted before `cutoff`. Safe once no peer can
    /// still deliver an insert anchored on one of the dropped IDs.
    pub fn gc(&mut self, cutoff: i64) {
        self.cells.retain(|_, cell| !cell.deleted || cell.deleted_at.map(|d| d >= cutoff).unwrap_or(true));
    }
}
