use kv_types::ReplicaId;
use std::collections::HashSet;
use std::str::FromStr;

#[test]
fn from_str_and_display_roundtrip() {
    let id = ReplicaId::from_str("node-a").unwrap();
    assert_eq!(id.to_string(), "node-a");
}

#[test]
fn equal_ids_from_different_sources_are_equal() {
    let a = ReplicaId::new("node-a");
    let b: ReplicaId = "node-a".into();
    assert_eq!(a, b);
}

#[test]
fn ordering_is_lexicographic() {
    let a = ReplicaId::new("node-a");
    let b = ReplicaId::new("node-b");
    assert!(a < b);
}

#[test]
fn hash_consistent_with_eq() {
    let a = ReplicaId::new("node-a");
    let b = ReplicaId::new("node-a");
    let mut set = HashSet::new();
    set.insert(a);
    set.insert(b);
    assert_eq!(set.len(), 1);
}

#[test]
fn debug_contains_replica_id() {
    let id = ReplicaId::new("node-a");
    let debug = format!("{id:?}");
    assert!(debug.contains("ReplicaId"));
    assert!(debug.contains("node-a"));
}

#[test]
fn serialization_is_transparent() {
    let id = ReplicaId::new("node-a");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"node-a\"");
    let parsed: ReplicaId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, parsed);
}
