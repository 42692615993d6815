//! `ZADD` / `ZREM` / `ZSCORE` / `ZCARD` / `ZRANGE` / `ZRANGEBYSCORE` /
//! `ZRANK` / `ZINCRBY`.

use crate::error::StoreResult;
use crate::meta::MutationMeta;
use crate::store::Store;
use kv_crdt::{CrdtData, ZSet};

impl Store {
    async fn zset_mut<T>(&self, key: &str, ts_nanos: i64, f: impl FnOnce(&mut ZSet) -> T) -> StoreResult<T> {
        self.with_write(key, "zset", || CrdtData::ZSet(ZSet::new()), ts_nanos, |data| {
            let CrdtData::ZSet(zset) = data else { unreachable!("checked kind above") };
            f(zset)
        })
        .await
    }

    /// `ZADD key score member`. Returns whether the write took effect.
    pub async fn zadd(&self, key: &str, member: String, score: f64, meta: MutationMeta) -> StoreResult<bool> {
        let (ts, replica, _, vc) = self.origin_with_vc(meta).await;
        self.zset_mut(key, ts.as_nanos(), move |zset| zset.add(member, score, ts, replica, vc)).await
    }

    /// `ZINCRBY key delta member`. Returns the new effective score.
    pub async fn zincr_by(&self, key: &str, member: String, delta: f64, meta: MutationMeta) -> StoreResult<f64> {
        let (ts, replica, _, vc) = self.origin_with_vc(meta).await;
        self.zset_mut(key, ts.as_nanos(), move |zset| zset.incr_by(member, delta, ts, replica, vc)).await
    }

    /// `ZREM key member`. Returns whether the member was present.
    pub async fn zrem(&self, key: &str, member: &str, meta: MutationMeta) -> StoreResult<bool> {
        let (ts, _, _, vc) = self.origin_with_vc(meta).await;
        let member = member.to_string();
        self.zset_mut(key, ts.as_nanos(), move |zset| zset.remove(&member, vc)).await
    }

    pub async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        Ok(self
            .with_read(key, "zset", |v| {
                let CrdtData::ZSet(zset) = &v.data else { unreachable!("checked kind above") };
                zset.score(member)
            })
            .await?
            .flatten())
    }

    pub async fn zcard(&self, key: &str) -> StoreResult<usize> {
        Ok(self
            .with_read(key, "zset", |v| {
                let CrdtData::ZSet(zset) = &v.data else { unreachable!("checked kind above") };
                zset.len()
            })
            .await?
            .unwrap_or(0))
    }

    pub async fn zrank(&self, key: &str, member: &str) -> StoreResult<Option<usize>> {
        Ok(self
            .with_read(key, "zset", |v| {
                let CrdtData::ZSet(zset) = &v.data else { unreachable!("checked kind above") };
                zset.rank(member)
            })
            .await?
            .flatten())
    }

    /// `ZRANGE key start stop`: ascending-by-score members in the inclusive
    /// Redis-style index range.
    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<(String, f64)>> {
        let Some(all) = self
            .with_read(key, "zset", |v| {
                let CrdtData::ZSet(zset) = &v.data else { unreachable!("checked kind above") };
                zset.range_by_score()
            })
            .await?
        else {
            return Ok(Vec::new());
        };
        let len = all.len() as i64;
        if len == 0 {
            return Ok(Vec::new());
        }
        let s = if start < 0 { (start + len).max(0) } else { start };
        let e = if stop < 0 { stop + len } else { stop }.min(len - 1);
        if s > e || s >= len {
            return Ok(Vec::new());
        }
        Ok(all[s as usize..=(e as usize)].to_vec())
    }

    /// `ZRANGEBYSCORE key min max`: ascending-by-score members whose score
    /// falls within `[min, max]`.
    pub async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<Vec<(String, f64)>> {
        Ok(self
            .with_read(key, "zset", |v| {
                let CrdtData::ZSet(zset) = &v.data else { unreachable!("checked kind above") };
                zset.range_by_score().into_iter().filter(|(_, score)| *score >= min && *score <= max).collect()
            })
            .await?
            .unwrap_or_default())
    }
}
