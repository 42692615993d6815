//! `INCR` / `INCRBY` / `DECR` / `DECRBY` / `INCRBYFLOAT`.

use crate::error::StoreResult;
use crate::meta::MutationMeta;
use crate::store::Store;
use kv_crdt::{CrdtData, FloatCounter, IntCounter};

impl Store {
    pub async fn incr_by(&self, key: &str, delta: i64, meta: MutationMeta) -> StoreResult<i64> {
        let (ts, replica, _) = self.origin_triple(meta);
        self.with_write(key, "int", || CrdtData::Int(IntCounter::new()), ts.as_nanos(), |data| {
            let CrdtData::Int(counter) = data else { unreachable!("checked kind above") };
            counter.apply_delta(replica, delta);
            counter.value()
        })
        .await
    }

    pub async fn incr(&self, key: &str, meta: MutationMeta) -> StoreResult<i64> {
        self.incr_by(key, 1, meta).await
    }

    pub async fn decr_by(&self, key: &str, delta: i64, meta: MutationMeta) -> StoreResult<i64> {
        self.incr_by(key, -delta, meta).await
    }

    pub async fn decr(&self, key: &str, meta: MutationMeta) -> StoreResult<i64> {
        self.incr_by(key, -1, meta).await
    }

    pub async fn incr_by_float(&self, key: &str, delta: f64, meta: MutationMeta) -> StoreResult<f64> {
        let (ts, replica, _) = self.origin_triple(meta);
        self.with_write(key, "float", || CrdtData::Float(FloatCounter::new()), ts.as_nanos(), |data| {
            let CrdtData::Float(counter) = data else { unreachable!("checked kind above") };
            counter.apply_delta(replica, delta);
            counter.value()
        })
        .await
    }
}
