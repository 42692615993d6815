//! `LPUSH` / `RPUSH` / `LPOP` / `RPOP` / `LRANGE` / `LLEN` / `LINDEX` /
//! `LSET` / `LINSERT` / `LTRIM` / `LREM`.

use crate::error::{StoreError, StoreResult};
use crate::meta::MutationMeta;
use crate::store::Store;
use kv_crdt::{CrdtData, Rga};

/// Normalizes a possibly-negative Redis-style index against `len`.
fn normalize(index: i64, len: usize) -> Option<usize> {
    let idx = if index < 0 { index + len as i64 } else { index };
    if idx < 0 || idx as usize >= len {
        None
    } else {
        Some(idx as usize)
    }
}

impl Store {
    async fn list_mut<T>(&self, key: &str, ts_nanos: i64, f: impl FnOnce(&mut Rga<Vec<u8>>) -> T) -> StoreResult<T> {
        self.with_write(key, "list", || CrdtData::List(Rga::new()), ts_nanos, |data| {
            let CrdtData::List(list) = data else { unreachable!("checked kind above") };
            f(list)
        })
        .await
    }

    /// `LPUSH key v1 v2 ...`: each value is inserted at the head in turn, so
    /// the last argument ends up first, matching Redis.
    pub async fn lpush(&self, key: &str, values: Vec<Vec<u8>>, meta: MutationMeta) -> StoreResult<usize> {
        let mut len = 0;
        for value in values {
            let (ts, replica, seq) = self.origin_triple(meta.clone());
            let id = self.mint_element(ts, &replica, seq);
            len = self
                .list_mut(key, ts.as_nanos(), |list| {
                    list.insert(id, None, value);
                    list.len()
                })
                .await?;
        }
        Ok(len)
    }

    /// `RPUSH key v1 v2 ...`: each value is appended at the tail in turn.
    pub async fn rpush(&self, key: &str, values: Vec<Vec<u8>>, meta: MutationMeta) -> StoreResult<usize> {
        let mut len = 0;
        for value in values {
            let (ts, replica, seq) = self.origin_triple(meta.clone());
            let id = self.mint_element(ts, &replica, seq);
            len = self
                .list_mut(key, ts.as_nanos(), |list| {
                    let origin = list.origin_for_index(list.len());
                    list.insert(id, origin, value);
                    list.len()
                })
                .await?;
        }
        Ok(len)
    }

    async fn pop(&self, key: &str, from_head: bool, meta: MutationMeta) -> StoreResult<Option<Vec<u8>>> {
        let (ts, _, _) = self.origin_triple(meta);
        self.list_mut(key, ts.as_nanos(), |list| {
            let index = if from_head { 0 } else { list.len().checked_sub(1)? };
            let id = list.id_at(index)?;
            let value = list.to_vec().into_iter().nth(index)?;
            list.delete_by_id(&id, ts.as_nanos());
            Some(value)
        })
        .await
    }

    pub async fn lpop(&self, key: &str, meta: MutationMeta) -> StoreResult<Option<Vec<u8>>> {
        self.pop(key, true, meta).await
    }

    pub async fn rpop(&self, key: &str, meta: MutationMeta) -> StoreResult<Option<Vec<u8>>> {
        self.pop(key, false, meta).await
    }

    pub async fn llen(&self, key: &str) -> StoreResult<usize> {
        Ok(self.with_read(key, "list", |v| {
            let CrdtData::List(list) = &v.data else { unreachable!("checked kind above") };
            list.len()
        })
        .await?
        .unwrap_or(0))
    }

    /// `LRANGE key start stop`, inclusive, Redis-style negative indexing.
    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<Vec<u8>>> {
        let Some(values) = self
            .with_read(key, "list", |v| {
                let CrdtData::List(list) = &v.data else { unreachable!("checked kind above") };
                list.to_vec()
            })
            .await?
        else {
            return Ok(Vec::new());
        };
        let len = values.len() as i64;
        let start = start.max(if start < 0 { -len } else { 0 }).max(-len);
        let stop = stop.min(len - 1);
        let start_idx = if start < 0 { (start + len).max(0) } else { start };
        if len == 0 || start_idx > stop {
            return Ok(Vec::new());
        }
        let stop_idx = if stop < 0 { stop + len } else { stop }.min(len - 1);
        if start_idx > stop_idx {
            return Ok(Vec::new());
        }
        Ok(values[start_idx as usize..=stop_idx as usize].to_vec())
    }

    pub async fn lindex(&self, key: &str, index: i64) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .with_read(key, "list", |v| {
                let CrdtData::List(list) = &v.data else { unreachable!("checked kind above") };
                list.to_vec()
            })
            .await?
            .and_then(|values| normalize(index, values.len()).map(|i| values[i].clone())))
    }

    /// `LSET key index value`. Implemented as tombstone-the-old-cell plus
    /// insert-a-new-one anchored at the same position, since an RGA cell's
    /// value is append-only once minted.
    pub async fn lset(&self, key: &str, index: i64, value: Vec<u8>, meta: MutationMeta) -> StoreResult<()> {
        let (ts, replica, seq) = self.origin_triple(meta);
        let id = self.mint_element(ts, &replica, seq);
        let replaced = self
            .list_mut(key, ts.as_nanos(), |list| {
                let Some(idx) = normalize(index, list.len()) else { return false };
                let Some(old_id) = list.id_at(idx) else { return false };
                let origin = list.origin_for_index(idx);
                list.delete_by_id(&old_id, ts.as_nanos());
                list.insert(id, origin, value);
                true
            })
            .await?;
        if replaced {
            Ok(())
        } else {
            Err(StoreError::IndexOutOfRange)
        }
    }

    /// `LINSERT key BEFORE|AFTER pivot value`. Returns the new length, or
    /// `None` if `pivot` was not found.
    pub async fn linsert(&self, key: &str, before: bool, pivot: &[u8], value: Vec<u8>, meta: MutationMeta) -> StoreResult<Option<usize>> {
        let (ts, replica, seq) = self.origin_triple(meta);
        let id = self.mint_element(ts, &replica, seq);
        let pivot = pivot.to_vec();
        self.list_mut(key, ts.as_nanos(), move |list| {
            let values = list.to_vec();
            let pivot_idx = values.iter().position(|v| v == &pivot)?;
            let insert_idx = if before { pivot_idx } else { pivot_idx + 1 };
            let origin = list.origin_for_index(insert_idx);
            list.insert(id, origin, value);
            Some(list.len())
        })
        .await
    }

    /// `LTRIM key start stop`: keeps only the inclusive range, deleting
    /// everything else.
    pub async fn ltrim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()> {
        let now = kv_types::Timestamp::now().as_nanos();
        self.list_mut(key, now, |list| {
            let len = list.len();
            let keep: std::collections::HashSet<usize> = (0..len)
                .filter(|&i| {
                    let i = i as i64;
                    let len = len as i64;
                    let s = if start < 0 { (start + len).max(0) } else { start };
                    let e = if stop < 0 { stop + len } else { stop }.min(len - 1);
                    i >= s && i <= e
                })
                .collect();
            // Snapshot IDs before mutating so index math isn't disturbed by
            // earlier deletions in this same pass.
            let ids: Vec<_> = (0..len).filter_map(|i| list.id_at(i)).collect();
            for (idx, id) in ids.into_iter().enumerate() {
                if !keep.contains(&idx) {
                    list.delete_by_id(&id, now);
                }
            }
        })
        .await
    }

    /// `LREM key count value`: `count > 0` removes the first `count`
    /// occurrences from the head, `count < 0` from the tail, `0` removes
    /// every occurrence. Returns the number removed.
    pub async fn lrem(&self, key: &str, count: i64, value: &[u8], meta: MutationMeta) -> StoreResult<usize> {
        let (ts, _, _) = self.origin_triple(meta);
        let value = value.to_vec();
        self.list_mut(key, ts.as_nanos(), move |list| {
            let values = list.to_vec();
            // Snapshot (index, id) pairs before any deletion in this pass.
            let ids: Vec<_> = (0..values.len()).filter_map(|i| list.id_at(i)).collect();
            let mut matches: Vec<usize> =
                values.iter().enumerate().filter(|(_, v)| **v == value).map(|(i, _)| i).collect();
            if count < 0 {
                matches.reverse();
            }
            let limit = if count == 0 { matches.len() } else { (count.unsigned_abs() as usize).min(matches.len()) };
            let mut removed = 0;
            for &idx in matches.iter().take(limit) {
                list.delete_by_id(&ids[idx], ts.as_nanos());
                removed += 1;
            }
            removed
        })
        .await
    }
}
