use kv_types::{ElementId, ReplicaId, Timestamp};
use std::str::FromStr;

fn id(ts: i64, replica: &str, seq: u64) -> ElementId {
    ElementId::new(Timestamp::from_nanos(ts), ReplicaId::new(replica), seq)
}

#[test]
fn display_matches_expected_format() {
    let e = id(100, "node-a", 3);
    assert_eq!(e.to_string(), "100-node-a-3");
}

#[test]
fn from_str_roundtrips_through_display() {
    let e = id(1700, "node-b", 9);
    let parsed = ElementId::from_str(&e.to_string()).unwrap();
    assert_eq!(e, parsed);
}

#[test]
fn from_str_rejects_malformed_input() {
    assert!(ElementId::from_str("garbage").is_err());
    assert!(ElementId::from_str("not-a-number-replica-5").is_err());
    assert!(ElementId::from_str("100-node-a-notanumber").is_err());
}

#[test]
fn ordering_by_timestamp_first() {
    let a = id(1, "node-z", 0);
    let b = id(2, "node-a", 0);
    assert!(a < b);
}

#[test]
fn ordering_by_replica_id_breaks_timestamp_tie() {
    let a = id(1, "node-a", 0);
    let b = id(1, "node-b", 0);
    assert!(a < b);
}

#[test]
fn ordering_by_seq_breaks_full_tie() {
    let a = id(1, "node-a", 0);
    let b = id(1, "node-a", 1);
    assert!(a < b);
}

#[test]
fn serialization_roundtrip() {
    let e = id(55, "node-a", 2);
    let json = serde_json::to_string(&e).unwrap();
    let parsed: ElementId = serde_json::from_str(&json).unwrap();
    assert_eq!(e, parsed);
}
