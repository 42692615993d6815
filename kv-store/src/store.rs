//! The keyed CRDT value map: the per-key write path, lazy TTL eviction, GC.

use crate::error::{StoreError, StoreResult};
use crate::meta::MutationMeta;
use kv_crdt::{CrdtData, CrdtValue, LwwRegister, VectorClock};
use tokio::sync::Mutex;
use kv_segment::{LogEntry, SegmentManager};
use kv_types::{ElementId, ReplicaId, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// `SET`'s existence precondition, checked before the LWW write is
/// attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    #[default]
    Always,
    OnlyIfAbsent,
    OnlyIfPresent,
}

/// In-memory map from key to [`CrdtValue`], backed by a [`SegmentManager`]
/// for durability.
///
/// A single `RwLock` guards the whole map: every mutator takes the write
/// lock, `get` and range reads take the read lock. Lazy TTL eviction during
/// `get` releases the read lock and reacquires the write lock before
/// re-checking expiration, avoiding a check-then-evict race against a
/// concurrent writer.
pub struct Store {
    replica_id: ReplicaId,
    segments: Arc<SegmentManager>,
    map: RwLock<HashMap<String, CrdtValue>>,
    local_seq: AtomicU64,
    /// This replica's view of causality for ZSet existence tracking
    /// (`added_vc` / `removed_vc`). Incremented on every local ZSet
    /// mutation; a replayed foreign op's own vector clock is used instead.
    zset_clock: Mutex<VectorClock>,
}

impl Store {
    /// Opens a store over an existing segment directory, replaying it to
    /// reconstruct the in-memory map.
    pub async fn open(replica_id: ReplicaId, segments: Arc<SegmentManager>) -> StoreResult<Self> {
        let mut map = HashMap::new();
        for entry in segments.recover().await? {
            match entry.kind {
                kv_segment::EntryKind::Delete => {
                    map.remove(&entry.key);
                }
                kv_segment::EntryKind::Set => {
                    let Some(bytes) = entry.value else { continue };
                    match CrdtValue::from_bytes(&bytes) {
                        Ok(value) => {
                            map.insert(entry.key, value);
                        }
                        Err(err) => {
                            tracing::warn!(key = %entry.key, %err, "dropping unparseable recovered value");
                        }
                    }
                }
            }
        }
        Ok(Self {
            zset_clock: Mutex::new(VectorClock::for_replica(replica_id.clone())),
            replica_id,
            segments,
            map: RwLock::new(map),
            local_seq: AtomicU64::new(0),
        })
    }

    /// Advances and returns this replica's ZSet causality clock. Foreign
    /// replays should use the clock carried in the operation instead of
    /// calling this.
    pub(crate) async fn next_zset_vc(&self, replica: &ReplicaId) -> VectorClock {
        let mut clock = self.zset_clock.lock().await;
        clock.inc(replica.clone());
        clock.copy()
    }

    /// Like [`Self::origin_triple`] but also resolves the ZSet causality
    /// clock to stamp: this replica's own advancing clock for a local
    /// command, or a clock reconstructed deterministically from the
    /// replayed operation's `(replica_id, seq)` otherwise.
    pub(crate) async fn origin_with_vc(&self, meta: MutationMeta) -> (Timestamp, ReplicaId, u64, VectorClock) {
        let is_replay = meta.element_seq.is_some();
        let (ts, replica, seq) = self.origin(meta);
        let vc = if is_replay {
            VectorClock::with_entry(replica.clone(), seq + 1)
        } else {
            self.next_zset_vc(&replica).await
        };
        (ts, replica, seq, vc)
    }

    pub fn replica_id(&self) -> &ReplicaId {
        &self.replica_id
    }

    /// Mints a fresh `(timestamp, replica_id, element_id)` triple for a
    /// locally originated mutation, or reuses the origin supplied by `meta`
    /// for a replayed one.
    fn origin(&self, meta: MutationMeta) -> (Timestamp, ReplicaId, u64) {
        let seq = meta.element_seq.unwrap_or_else(|| self.local_seq.fetch_add(1, Ordering::Relaxed));
        let (ts, replica) = meta.resolve(&self.replica_id);
        (ts, replica, seq)
    }

    async fn persist_set(&self, key: &str, value: &CrdtValue, ts: i64) -> StoreResult<()> {
        let bytes = value.to_bytes()?;
        self.segments.append(&LogEntry::set(ts, key, bytes, None)).await?;
        Ok(())
    }

    async fn persist_delete(&self, key: &str, ts: i64) -> StoreResult<()> {
        self.segments.append(&LogEntry::delete(ts, key)).await?;
        Ok(())
    }

    fn check_kind<'a>(
        existing: Option<&'a CrdtValue>,
        key: &str,
        requested: &'static str,
    ) -> StoreResult<Option<&'a CrdtValue>> {
        if let Some(v) = existing {
            if v.kind() != requested {
                return Err(StoreError::WrongType { key: key.to_string(), existing: v.kind(), requested });
            }
        }
        Ok(existing)
    }

    /// `SET key value [ttl] [KEEPTTL] [NX|XX]`. Creates a fresh LWW string
    /// register if the key is absent; otherwise defers to the register's
    /// own LWW guard. `condition` gates the write on the key's current
    /// existence before that LWW attempt is even made, so `NX`/`XX` reject a
    /// write up front rather than racing the register's own comparison.
    /// `keep_ttl` reuses the existing `expire_at` instead of the freshly
    /// computed one; it is meaningless on a brand new key. Returns whether
    /// the write took effect (always `true` for a brand new key that passes
    /// the existence check).
    pub async fn set(
        &self,
        key: impl Into<String>,
        value: Vec<u8>,
        ttl: Option<Duration>,
        keep_ttl: bool,
        condition: SetCondition,
        meta: MutationMeta,
    ) -> StoreResult<bool> {
        let key = key.into();
        let (ts, replica, seq) = self.origin(meta);
        let expire_at = ttl.map(|d| Timestamp::from_nanos(ts.as_nanos() + d.as_nanos() as i64));

        let mut map = self.map.write().await;
        let existing = Self::check_kind(map.get(&key), &key, "string")?;
        let condition_met = match condition {
            SetCondition::Always => true,
            SetCondition::OnlyIfAbsent => existing.is_none(),
            SetCondition::OnlyIfPresent => existing.is_some(),
        };
        if !condition_met {
            return Ok(false);
        }

        let wrote = match map.get_mut(&key) {
            Some(existing) => {
                let kept_expire_at = existing.expire_at;
                let CrdtData::Str(reg) = &mut existing.data else { unreachable!("checked above") };
                let wrote = reg.set(value, ts, replica, VectorClock::new());
                if wrote {
                    existing.expire_at = if keep_ttl { kept_expire_at } else { expire_at };
                }
                wrote
            }
            None => {
                let reg = LwwRegister::new(value, ts, replica, VectorClock::new());
                map.insert(key.clone(), CrdtValue::new(CrdtData::Str(reg), expire_at));
                true
            }
        };
        let _ = seq;
        let snapshot = wrote.then(|| map.get(&key).expect("just inserted").clone());
        drop(map);
        if let Some(snapshot) = snapshot {
            self.persist_set(&key, &snapshot, ts.as_nanos()).await?;
        }
        Ok(wrote)
    }

    /// `APPEND key value`. Concatenates onto the current string (creating a
    /// fresh one if absent) and returns the resulting length. Still backed
    /// by the LWW register underneath: the concatenation becomes a brand
    /// new write stamped with this origin, so a concurrent writer still
    /// resolves by vector clock/timestamp/replica rather than a byte-level
    /// merge — same trade-off `SET` already makes.
    pub async fn append(&self, key: &str, value: &[u8], meta: MutationMeta) -> StoreResult<usize> {
        let (ts, replica, _) = self.origin(meta);
        let mut map = self.map.write().await;
        Self::check_kind(map.get(key), key, "string")?;
        let new_len = match map.get_mut(key) {
            Some(existing) => {
                let CrdtData::Str(reg) = &mut existing.data else { unreachable!("checked above") };
                let mut data = reg.data().to_vec();
                data.extend_from_slice(value);
                let candidate_len = data.len();
                if reg.set(data, ts, replica, VectorClock::new()) {
                    candidate_len
                } else {
                    reg.data().len()
                }
            }
            None => {
                let data = value.to_vec();
                let len = data.len();
                let reg = LwwRegister::new(data, ts, replica, VectorClock::new());
                map.insert(key.to_string(), CrdtValue::new(CrdtData::Str(reg), None));
                len
            }
        };
        let snapshot = map.get(key).expect("just inserted or updated above").clone();
        drop(map);
        self.persist_set(key, &snapshot, ts.as_nanos()).await?;
        Ok(new_len)
    }

    /// `GET key`. Transparently evicts and returns `None` if the key's TTL
    /// has passed.
    pub async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        {
            let map = self.map.read().await;
            match map.get(key) {
                None => return Ok(None),
                Some(v) if !v.is_expired(Timestamp::now()) => {
                    let CrdtData::Str(reg) = &v.data else {
                        return Err(StoreError::WrongType { key: key.to_string(), existing: v.kind(), requested: "string" });
                    };
                    return Ok(Some(reg.data().to_vec()));
                }
                Some(_) => {}
            }
        }
        self.evict_if_expired(key).await?;
        Ok(None)
    }

    /// Re-checks expiration under the write lock before evicting, so a
    /// concurrent write that refreshed the TTL between the read-lock check
    /// and now isn't clobbered.
    async fn evict_if_expired(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.map.write().await;
        let now = Timestamp::now();
        if let Some(v) = map.get(key) {
            if v.is_expired(now) {
                map.remove(key);
                drop(map);
                self.persist_delete(key, now.as_nanos()).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of keys currently resident, including any not yet lazily
    /// evicted past their TTL.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn exists(&self, key: &str) -> bool {
        let map = self.map.read().await;
        map.get(key).map(|v| !v.is_expired(Timestamp::now())).unwrap_or(false)
    }

    /// `DEL key`. Returns whether the key was present.
    pub async fn del(&self, key: &str, meta: MutationMeta) -> StoreResult<bool> {
        let (ts, _, _) = self.origin(meta);
        let mut map = self.map.write().await;
        let existed = map.remove(key).is_some();
        drop(map);
        if existed {
            self.persist_delete(key, ts.as_nanos()).await?;
        }
        Ok(existed)
    }

    /// `GETDEL key`. Atomically reads and removes, returning the prior
    /// value if any.
    pub async fn get_del(&self, key: &str, meta: MutationMeta) -> StoreResult<Option<Vec<u8>>> {
        let (ts, _, _) = self.origin(meta);
        let mut map = self.map.write().await;
        let Some(existing) = map.get(key) else { return Ok(None) };
        if existing.is_expired(Timestamp::now()) {
            map.remove(key);
            return Ok(None);
        }
        let CrdtData::Str(reg) = &existing.data else {
            return Err(StoreError::WrongType { key: key.to_string(), existing: existing.kind(), requested: "string" });
        };
        let bytes = reg.data().to_vec();
        map.remove(key);
        drop(map);
        self.persist_delete(key, ts.as_nanos()).await?;
        Ok(Some(bytes))
    }

    /// `EXPIRE key seconds`. No-op (returns `false`) if the key is absent.
    pub async fn expire(&self, key: &str, ttl: Duration, meta: MutationMeta) -> StoreResult<bool> {
        self.expire_at(key, Timestamp::from_nanos(Timestamp::now().as_nanos() + ttl.as_nanos() as i64), meta).await
    }

    pub async fn pexpire(&self, key: &str, ttl: Duration, meta: MutationMeta) -> StoreResult<bool> {
        self.expire(key, ttl, meta).await
    }

    /// `EXPIREAT key timestamp`.
    pub async fn expire_at(&self, key: &str, at: Timestamp, meta: MutationMeta) -> StoreResult<bool> {
        let (ts, _, _) = self.origin(meta);
        let mut map = self.map.write().await;
        let Some(value) = map.get_mut(key) else { return Ok(false) };
        value.expire_at = Some(at);
        let snapshot = value.clone();
        drop(map);
        self.persist_set(key, &snapshot, ts.as_nanos()).await?;
        Ok(true)
    }

    /// `TTL key`: remaining seconds, `None` if absent, `Some(-1)`-equivalent
    /// (here: `None` inner) if present with no TTL.
    pub async fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        self.pttl(key).await
    }

    pub async fn pttl(&self, key: &str) -> Option<Option<Duration>> {
        let map = self.map.read().await;
        let value = map.get(key)?;
        if value.is_expired(Timestamp::now()) {
            return None;
        }
        Some(value.expire_at.map(|at| {
            let remaining = at.as_nanos() - Timestamp::now().as_nanos();
            Duration::from_nanos(remaining.max(0) as u64)
        }))
    }

    /// Runs GC across every key: drops tombstones older than `cutoff`
    /// (nanoseconds since the epoch) inside each CRDT value.
    pub async fn gc(&self, cutoff: i64) {
        let mut map = self.map.write().await;
        for value in map.values_mut() {
            value.gc(cutoff);
        }
    }

    pub(crate) async fn with_read<T>(&self, key: &str, requested: &'static str, f: impl FnOnce(&CrdtValue) -> T) -> StoreResult<Option<T>> {
        let map = self.map.read().await;
        let Some(value) = map.get(key) else { return Ok(None) };
        if value.is_expired(Timestamp::now()) {
            return Ok(None);
        }
        Self::check_kind(Some(value), key, requested)?;
        Ok(Some(f(value)))
    }

    pub(crate) async fn with_write<T>(
        &self,
        key: &str,
        requested: &'static str,
        default: impl FnOnce() -> CrdtData,
        ts: i64,
        f: impl FnOnce(&mut CrdtData) -> T,
    ) -> StoreResult<T> {
        let mut map = self.map.write().await;
        Self::check_kind(map.get(key), key, requested)?;
        let entry = map.entry(key.to_string()).or_insert_with(|| CrdtValue::new(default(), None));
        let result = f(&mut entry.data);
        let snapshot = entry.clone();
        drop(map);
        self.persist_set(key, &snapshot, ts).await?;
        Ok(result)
    }

    pub(crate) fn mint_element(&self, ts: Timestamp, replica: &ReplicaId, seq: u64) -> ElementId {
        ElementId::new(ts, replica.clone(), seq)
    }

    pub(crate) fn origin_triple(&self, meta: MutationMeta) -> (Timestamp, ReplicaId, u64) {
        self.origin(meta)
    }
}
