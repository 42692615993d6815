use kv_segment::{SegmentConfig, SegmentManager};
use kv_store::{MutationMeta, SetCondition, Store};
use kv_types::ReplicaId;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

async fn new_store(dir: &std::path::Path) -> Store {
    let segments = Arc::new(SegmentManager::open(dir, SegmentConfig::default()).await.unwrap());
    Store::open(ReplicaId::new("r1"), segments).await.unwrap()
}

#[tokio::test]
async fn set_and_get_roundtrip() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.set("k", b"v1".to_vec(), None, false, SetCondition::Always, MutationMeta::local()).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some(b"v1".to_vec()));
}

#[tokio::test]
async fn set_respects_lww_guard_against_older_remote_write() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.set("k", b"new".to_vec(), None, false, SetCondition::Always, MutationMeta::local()).await.unwrap();

    let older = kv_types::Timestamp::from_nanos(1);
    let wrote = store
        .set("k", b"stale".to_vec(), None, false, SetCondition::Always, MutationMeta::origin(older, ReplicaId::new("r2"), 0))
        .await
        .unwrap();
    assert!(!wrote);
    assert_eq!(store.get("k").await.unwrap(), Some(b"new".to_vec()));
}

#[tokio::test]
async fn wrongtype_on_mismatched_mutator() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.set("k", b"str".to_vec(), None, false, SetCondition::Always, MutationMeta::local()).await.unwrap();
    let err = store.lpush("k", vec![b"x".to_vec()], MutationMeta::local()).await.unwrap_err();
    assert!(matches!(err, kv_store::StoreError::WrongType { .. }));
}

#[tokio::test]
async fn ttl_expires_and_is_lazily_evicted() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.set("k", b"v".to_vec(), Some(Duration::from_nanos(1)), false, SetCondition::Always, MutationMeta::local()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(store.get("k").await.unwrap(), None);
    assert!(!store.exists("k").await);
}

#[tokio::test]
async fn list_push_pop_range() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.rpush("list", vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()], MutationMeta::local()).await.unwrap();
    assert_eq!(store.llen("list").await.unwrap(), 3);
    assert_eq!(store.lrange("list", 0, -1).await.unwrap(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

    let popped = store.lpop("list", MutationMeta::local()).await.unwrap();
    assert_eq!(popped, Some(b"a".to_vec()));
    assert_eq!(store.llen("list").await.unwrap(), 2);
}

#[tokio::test]
async fn list_lset_and_linsert() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.rpush("list", vec![b"a".to_vec(), b"b".to_vec()], MutationMeta::local()).await.unwrap();
    store.lset("list", 1, b"B".to_vec(), MutationMeta::local()).await.unwrap();
    assert_eq!(store.lindex("list", 1).await.unwrap(), Some(b"B".to_vec()));

    store.linsert("list", true, b"B", b"pre".to_vec(), MutationMeta::local()).await.unwrap();
    assert_eq!(store.lrange("list", 0, -1).await.unwrap(), vec![b"a".to_vec(), b"pre".to_vec(), b"B".to_vec()]);
}

#[tokio::test]
async fn set_add_remove_membership() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.sadd("s", vec![b"x".to_vec(), b"y".to_vec()], MutationMeta::local()).await.unwrap();
    assert!(store.sismember("s", b"x").await.unwrap());
    assert_eq!(store.scard("s").await.unwrap(), 2);

    store.srem("s", vec![b"x".to_vec()], MutationMeta::local()).await.unwrap();
    assert!(!store.sismember("s", b"x").await.unwrap());
    assert_eq!(store.scard("s").await.unwrap(), 1);
}

#[tokio::test]
async fn hash_set_get_incr() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.hset("h", vec![("f".to_string(), b"1".to_vec())], MutationMeta::local()).await.unwrap();
    assert_eq!(store.hget("h", "f").await.unwrap(), Some(b"1".to_vec()));

    let new_value = store.hincr_by("h", "counter", 5, MutationMeta::local()).await.unwrap();
    assert_eq!(new_value, 5);
    let new_value = store.hincr_by("h", "counter", 3, MutationMeta::local()).await.unwrap();
    assert_eq!(new_value, 8);

    assert_eq!(store.hlen("h").await.unwrap(), 2);
    store.hdel("h", vec!["f".to_string()], MutationMeta::local()).await.unwrap();
    assert_eq!(store.hlen("h").await.unwrap(), 1);
}

#[tokio::test]
async fn zset_add_score_range_and_rem() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.zadd("z", "alice".to_string(), 1.0, MutationMeta::local()).await.unwrap();
    store.zadd("z", "bob".to_string(), 2.0, MutationMeta::local()).await.unwrap();
    store.zadd("z", "carol".to_string(), 3.0, MutationMeta::local()).await.unwrap();

    assert_eq!(store.zscore("z", "bob").await.unwrap(), Some(2.0));
    assert_eq!(store.zcard("z").await.unwrap(), 3);
    assert_eq!(store.zrank("z", "carol").await.unwrap(), Some(2));

    let range = store.zrange("z", 0, -1).await.unwrap();
    assert_eq!(range, vec![("alice".to_string(), 1.0), ("bob".to_string(), 2.0), ("carol".to_string(), 3.0)]);

    store.zrem("z", "bob", MutationMeta::local()).await.unwrap();
    assert_eq!(store.zcard("z").await.unwrap(), 2);
    assert_eq!(store.zscore("z", "bob").await.unwrap(), None);
}

#[tokio::test]
async fn zincr_by_accumulates() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.zincr_by("z", "m".to_string(), 1.5, MutationMeta::local()).await.unwrap();
    let score = store.zincr_by("z", "m".to_string(), 2.5, MutationMeta::local()).await.unwrap();
    assert_eq!(score, 4.0);
}

#[tokio::test]
async fn counters_increment_and_decrement() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    assert_eq!(store.incr("c", MutationMeta::local()).await.unwrap(), 1);
    assert_eq!(store.incr_by("c", 9, MutationMeta::local()).await.unwrap(), 10);
    assert_eq!(store.decr("c", MutationMeta::local()).await.unwrap(), 9);
    assert_eq!(store.decr_by("c", 4, MutationMeta::local()).await.unwrap(), 5);
}

#[tokio::test]
async fn del_and_exists_and_getdel() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.set("k", b"v".to_vec(), None, false, SetCondition::Always, MutationMeta::local()).await.unwrap();
    assert!(store.exists("k").await);

    let got = store.get_del("k", MutationMeta::local()).await.unwrap();
    assert_eq!(got, Some(b"v".to_vec()));
    assert!(!store.exists("k").await);

    assert!(!store.del("missing", MutationMeta::local()).await.unwrap());
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = new_store(dir.path()).await;
        store.set("k", b"v".to_vec(), None, false, SetCondition::Always, MutationMeta::local()).await.unwrap();
        store.sadd("s", vec![b"m".to_vec()], MutationMeta::local()).await.unwrap();
    }

    let segments = Arc::new(SegmentManager::open(dir.path(), SegmentConfig::default()).await.unwrap());
    let reopened = Store::open(ReplicaId::new("r1"), segments).await.unwrap();
    assert_eq!(reopened.get("k").await.unwrap(), Some(b"v".to_vec()));
    assert!(reopened.sismember("s", b"m").await.unwrap());
}

#[tokio::test]
async fn foreign_replay_is_idempotent_element_id_wise() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    let origin_ts = kv_types::Timestamp::from_nanos(42);
    let origin_replica = ReplicaId::new("peer");

    store.sadd("s", vec![b"x".to_vec()], MutationMeta::origin(origin_ts, origin_replica.clone(), 7)).await.unwrap();
    // Replaying the identical operation a second time must not duplicate the
    // member or change cardinality — add-wins OR-Set dedup by element ID.
    store.sadd("s", vec![b"x".to_vec()], MutationMeta::origin(origin_ts, origin_replica, 7)).await.unwrap();
    assert_eq!(store.scard("s").await.unwrap(), 1);
}

#[tokio::test]
async fn set_nx_only_writes_a_missing_key() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    let wrote = store.set("k", b"first".to_vec(), None, false, SetCondition::OnlyIfAbsent, MutationMeta::local()).await.unwrap();
    assert!(wrote);

    let wrote = store.set("k", b"second".to_vec(), None, false, SetCondition::OnlyIfAbsent, MutationMeta::local()).await.unwrap();
    assert!(!wrote);
    assert_eq!(store.get("k").await.unwrap(), Some(b"first".to_vec()));
}

#[tokio::test]
async fn set_xx_only_writes_an_existing_key() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    let wrote = store.set("k", b"v".to_vec(), None, false, SetCondition::OnlyIfPresent, MutationMeta::local()).await.unwrap();
    assert!(!wrote);
    assert_eq!(store.get("k").await.unwrap(), None);

    store.set("k", b"v".to_vec(), None, false, SetCondition::Always, MutationMeta::local()).await.unwrap();
    let wrote = store.set("k", b"v2".to_vec(), None, false, SetCondition::OnlyIfPresent, MutationMeta::local()).await.unwrap();
    assert!(wrote);
    assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
}

#[tokio::test]
async fn set_keep_ttl_preserves_the_existing_expiry() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.set("k", b"v".to_vec(), Some(Duration::from_secs(60)), false, SetCondition::Always, MutationMeta::local()).await.unwrap();
    let ttl_before = store.ttl("k").await;

    store.set("k", b"v2".to_vec(), None, true, SetCondition::Always, MutationMeta::local()).await.unwrap();
    let ttl_after = store.ttl("k").await;

    assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
    assert!(matches!(ttl_before, Some(Some(_))));
    assert_eq!(ttl_after, ttl_before);
}

#[tokio::test]
async fn set_without_keep_ttl_clears_the_existing_expiry() {
    let dir = tempdir().unwrap();
    let store = new_store(dir.path()).await;
    store.set("k", b"v".to_vec(), Some(Duration::from_secs(60)), false, SetCondition::Always, MutationMeta::local()).await.unwrap();
    store.set("k", b"v2".to_vec(), None, false, SetCondition::Always, MutationMeta::local()).await.unwrap();
    assert_eq!(store.ttl("k").await, Some(None));
}
