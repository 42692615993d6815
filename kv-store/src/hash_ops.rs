//! `HSET` / `HGET` / `HDEL` / `HGETALL` / `HLEN` / `HINCRBY` / `HINCRBYFLOAT`.

use crate::error::StoreResult;
use crate::meta::MutationMeta;
use crate::store::Store;
use kv_crdt::{CrdtData, CrdtHash};

impl Store {
    async fn hash_mut<T>(&self, key: &str, ts_nanos: i64, f: impl FnOnce(&mut CrdtHash) -> T) -> StoreResult<T> {
        self.with_write(key, "hash", || CrdtData::Hash(CrdtHash::new()), ts_nanos, |data| {
            let CrdtData::Hash(hash) = data else { unreachable!("checked kind above") };
            f(hash)
        })
        .await
    }

    /// `HSET key field1 value1 field2 value2 ...`. Returns the number of
    /// fields that were newly created (an LWW overwrite of an existing
    /// field doesn't count).
    pub async fn hset(&self, key: &str, fields: Vec<(String, Vec<u8>)>, meta: MutationMeta) -> StoreResult<usize> {
        let mut created = 0;
        for (name, value) in fields {
            let (ts, replica, seq) = self.origin_triple(meta.clone());
            let id = self.mint_element(ts, &replica, seq);
            let is_new = self
                .hash_mut(key, ts.as_nanos(), |hash| {
                    let existed = hash.contains(&name);
                    hash.set_str(name, value, id, ts, replica);
                    !existed
                })
                .await?;
            if is_new {
                created += 1;
            }
        }
        Ok(created)
    }

    pub async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .with_read(key, "hash", |v| {
                let CrdtData::Hash(hash) = &v.data else { unreachable!("checked kind above") };
                hash.get(field)
            })
            .await?
            .flatten())
    }

    /// `HDEL key f1 f2 ...`. Returns the number of fields actually removed.
    pub async fn hdel(&self, key: &str, fields: Vec<String>, meta: MutationMeta) -> StoreResult<usize> {
        let mut removed = 0;
        for field in fields {
            let (ts, _, _) = self.origin_triple(meta.clone());
            let did = self.hash_mut(key, ts.as_nanos(), |hash| hash.remove(&field, ts.as_nanos())).await?;
            if did {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .with_read(key, "hash", |v| {
                let CrdtData::Hash(hash) = &v.data else { unreachable!("checked kind above") };
                hash.entries()
            })
            .await?
            .unwrap_or_default())
    }

    pub async fn hlen(&self, key: &str) -> StoreResult<usize> {
        Ok(self
            .with_read(key, "hash", |v| {
                let CrdtData::Hash(hash) = &v.data else { unreachable!("checked kind above") };
                hash.len()
            })
            .await?
            .unwrap_or(0))
    }

    pub async fn hincr_by(&self, key: &str, field: &str, delta: i64, meta: MutationMeta) -> StoreResult<i64> {
        let (ts, replica, seq) = self.origin_triple(meta);
        let id = self.mint_element(ts, &replica, seq);
        let field = field.to_string();
        let new_value = self
            .hash_mut(key, ts.as_nanos(), move |hash| hash.incr_by(field, delta as f64, id, ts, replica))
            .await?;
        Ok(new_value as i64)
    }

    pub async fn hincr_by_float(&self, key: &str, field: &str, delta: f64, meta: MutationMeta) -> StoreResult<f64> {
        let (ts, replica, seq) = self.origin_triple(meta);
        let id = self.mint_element(ts, &replica, seq);
        let field = field.to_string();
        self.hash_mut(key, ts.as_nanos(), move |hash| hash.incr_by(field, delta, id, ts, replica)).await
    }

    pub async fn hkeys(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .with_read(key, "hash", |v| {
                let CrdtData::Hash(hash) = &v.data else { unreachable!("checked kind above") };
                hash.keys()
            })
            .await?
            .unwrap_or_default())
    }

    pub async fn hvals(&self, key: &str) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self
            .with_read(key, "hash", |v| {
                let CrdtData::Hash(hash) = &v.data else { unreachable!("checked kind above") };
                hash.entries().into_iter().map(|(_, v)| v).collect()
            })
            .await?
            .unwrap_or_default())
    }

    pub async fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        Ok(self
            .with_read(key, "hash", |v| {
                let CrdtData::Hash(hash) = &v.data else { unreachable!("checked kind above") };
                hash.contains(field)
            })
            .await?
            .unwrap_or(false))
    }
}
