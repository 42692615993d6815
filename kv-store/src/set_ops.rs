//! `SADD` / `SREM` / `SMEMBERS` / `SCARD` / `SISMEMBER`.

use crate::error::StoreResult;
use crate::meta::MutationMeta;
use crate::store::Store;
use kv_crdt::{CrdtData, OrSet};

impl Store {
    async fn set_mut<T>(&self, key: &str, ts_nanos: i64, f: impl FnOnce(&mut OrSet<Vec<u8>>) -> T) -> StoreResult<T> {
        self.with_write(key, "set", || CrdtData::Set(OrSet::new()), ts_nanos, |data| {
            let CrdtData::Set(set) = data else { unreachable!("checked kind above") };
            f(set)
        })
        .await
    }

    /// `SADD key m1 m2 ...`. Returns the number of members newly added
    /// (members already present are a no-op, add-wins semantics aside).
    pub async fn sadd(&self, key: &str, members: Vec<Vec<u8>>, meta: MutationMeta) -> StoreResult<usize> {
        let mut added = 0;
        for member in members {
            let (ts, replica, seq) = self.origin_triple(meta.clone());
            let id = self.mint_element(ts, &replica, seq);
            let was_new = self
                .set_mut(key, ts.as_nanos(), |set| {
                    let already = set.contains(&member);
                    set.add(member, id);
                    !already
                })
                .await?;
            if was_new {
                added += 1;
            }
        }
        Ok(added)
    }

    /// `SREM key m1 m2 ...`. Returns the number of members actually removed.
    pub async fn srem(&self, key: &str, members: Vec<Vec<u8>>, meta: MutationMeta) -> StoreResult<usize> {
        let mut removed = 0;
        for member in members {
            let (ts, _, _) = self.origin_triple(meta.clone());
            let did_remove = self
                .set_mut(key, ts.as_nanos(), |set| !set.remove(&member, ts.as_nanos()).is_empty())
                .await?;
            if did_remove {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn smembers(&self, key: &str) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self
            .with_read(key, "set", |v| {
                let CrdtData::Set(set) = &v.data else { unreachable!("checked kind above") };
                set.iter().cloned().collect()
            })
            .await?
            .unwrap_or_default())
    }

    pub async fn scard(&self, key: &str) -> StoreResult<usize> {
        Ok(self
            .with_read(key, "set", |v| {
                let CrdtData::Set(set) = &v.data else { unreachable!("checked kind above") };
                set.len()
            })
            .await?
            .unwrap_or(0))
    }

    pub async fn sismember(&self, key: &str, member: &[u8]) -> StoreResult<bool> {
        Ok(self
            .with_read(key, "set", |v| {
                let CrdtData::Set(set) = &v.data else { unreachable!("checked kind above") };
                set.contains(&member.to_vec())
            })
            .await?
            .unwrap_or(false))
    }
}
