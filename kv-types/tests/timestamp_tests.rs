use kv_types::Timestamp;

#[test]
fn now_is_positive() {
    let ts = Timestamp::now();
    assert!(ts.as_nanos() > 0);
}

#[test]
fn from_nanos_roundtrip() {
    let ts = Timestamp::from_nanos(1_700_000_000_000_000_000);
    assert_eq!(ts.as_nanos(), 1_700_000_000_000_000_000);
}

#[test]
fn ordering_by_nanos() {
    let a = Timestamp::from_nanos(100);
    let b = Timestamp::from_nanos(200);
    assert!(a < b);
    assert!(b > a);
}

#[test]
fn equal_timestamps() {
    let a = Timestamp::from_nanos(100);
    let b = Timestamp::from_nanos(100);
    assert_eq!(a, b);
}

#[test]
fn default_is_now() {
    let before = Timestamp::now();
    let ts = Timestamp::default();
    assert!(ts >= before);
}

#[test]
fn display_prints_nanos() {
    let ts = Timestamp::from_nanos(42);
    assert_eq!(ts.to_string(), "42");
}

#[test]
fn serialization_roundtrip() {
    let ts = Timestamp::from_nanos(123_456);
    let json = serde_json::to_string(&ts).unwrap();
    let parsed: Timestamp = serde_json::from_str(&json).unwrap();
    assert_eq!(ts, parsed);
}

#[test]
fn hash_consistent_with_eq() {
    use std::collections::HashSet;
    let ts = Timestamp::from_nanos(7);
    let mut set = HashSet::new();
    set.insert(ts);
    set.insert(ts);
    assert_eq!(set.len(), 1);
}
