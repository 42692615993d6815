use kv_segment::{EntryKind, LogEntry, SegmentConfig, SegmentManager};
use std::time::Duration;
use tempfile::tempdir;

fn small_segments() -> SegmentConfig {
    SegmentConfig {
        max_segment_size: 64,
        compaction_threshold: 3,
        compaction_interval: Duration::from_secs(0),
    }
}

#[tokio::test]
async fn append_and_recover_roundtrip() {
    let dir = tempdir().unwrap();
    let manager = SegmentManager::open(dir.path(), SegmentConfig::default()).await.unwrap();

    manager.append(&LogEntry::set(1, "a", b"1".to_vec(), None)).await.unwrap();
    manager.append(&LogEntry::set(2, "b", b"2".to_vec(), None)).await.unwrap();
    manager.append(&LogEntry::delete(3, "a")).await.unwrap();

    let entries = manager.recover().await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].key, "a");
    assert_eq!(entries[2].kind, EntryKind::Delete);
}

#[tokio::test]
async fn recovery_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let manager = SegmentManager::open(dir.path(), SegmentConfig::default()).await.unwrap();
        manager.append(&LogEntry::set(1, "k", b"v".to_vec(), None)).await.unwrap();
    }

    let reopened = SegmentManager::open(dir.path(), SegmentConfig::default()).await.unwrap();
    let entries = reopened.recover().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "k");
}

#[tokio::test]
async fn rotates_to_a_new_segment_past_size_threshold() {
    let dir = tempdir().unwrap();
    let manager = SegmentManager::open(dir.path(), small_segments()).await.unwrap();

    for i in 0..20u32 {
        manager.append(&LogEntry::set(i as i64, format!("k{i}"), b"value-bytes".to_vec(), None)).await.unwrap();
    }

    let mut segment_files = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    segment_files.sort();
    assert!(segment_files.len() > 1, "expected rotation to produce multiple segment files");

    // All entries must still be recoverable across the rotated segments.
    let entries = manager.recover().await.unwrap();
    assert_eq!(entries.len(), 20);
}

#[tokio::test]
async fn corrupt_trailing_record_is_skipped_earlier_records_survive() {
    let dir = tempdir().unwrap();
    let manager = SegmentManager::open(dir.path(), SegmentConfig::default()).await.unwrap();
    manager.append(&LogEntry::set(1, "a", b"1".to_vec(), None)).await.unwrap();
    manager.append(&LogEntry::set(2, "b", b"2".to_vec(), None)).await.unwrap();

    // Simulate a crash mid-write: append a truncated JSON fragment directly.
    let segment_path = dir.path().join("segment-00000000000000000000.log");
    let mut contents = std::fs::read_to_string(&segment_path).unwrap();
    contents.push_str("{\"timestamp\":3,\"key\":\"c\"");
    std::fs::write(&segment_path, contents).unwrap();

    let entries = manager.recover().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, "a");
    assert_eq!(entries[1].key, "b");
}

#[tokio::test]
async fn non_utf8_trailing_bytes_are_skipped_earlier_records_survive() {
    let dir = tempdir().unwrap();
    let manager = SegmentManager::open(dir.path(), SegmentConfig::default()).await.unwrap();
    manager.append(&LogEntry::set(1, "a", b"1".to_vec(), None)).await.unwrap();
    manager.append(&LogEntry::set(2, "b", b"2".to_vec(), None)).await.unwrap();

    // Simulate a crash mid-write that left raw non-UTF-8 garbage (not just
    // an ASCII-truncated JSON line) as the trailing bytes of the segment.
    let segment_path = dir.path().join("segment-00000000000000000000.log");
    let mut bytes = std::fs::read(&segment_path).unwrap();
    bytes.extend_from_slice(&[b'{', 0xff, 0xfe, b'"']);
    std::fs::write(&segment_path, bytes).unwrap();

    let entries = manager.recover().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key, "a");
    assert_eq!(entries[1].key, "b");
}

#[tokio::test]
async fn compaction_drops_deletes_and_keeps_latest_per_key() {
    let dir = tempdir().unwrap();
    let manager = SegmentManager::open(dir.path(), small_segments()).await.unwrap();

    // Force several rotations so there are closed segments to compact.
    for i in 0..30u32 {
        manager.append(&LogEntry::set(i as i64, "shared", format!("v{i}").into_bytes(), None)).await.unwrap();
    }
    manager.append(&LogEntry::set(100, "survivor", b"alive".to_vec(), None)).await.unwrap();
    manager.append(&LogEntry::delete(101, "survivor")).await.unwrap();

    manager.compact().await.unwrap();

    let entries = manager.recover().await.unwrap();
    // "shared" keeps only its latest write; "survivor" was deleted and
    // compaction drops it entirely once it's the latest entry for that key.
    let shared: Vec<_> = entries.iter().filter(|e| e.key == "shared").collect();
    assert!(shared.iter().all(|e| e.kind == EntryKind::Set));
    assert!(shared.len() <= 30);

    let survivor_is_gone_or_deleted = entries
        .iter()
        .filter(|e| e.key == "survivor")
        .all(|e| e.kind == EntryKind::Delete);
    assert!(survivor_is_gone_or_deleted);
}

#[tokio::test]
async fn compaction_never_touches_the_current_segment() {
    let dir = tempdir().unwrap();
    let manager = SegmentManager::open(dir.path(), small_segments()).await.unwrap();
    manager.append(&LogEntry::set(1, "only", b"v".to_vec(), None)).await.unwrap();

    // Only the current segment exists — nothing to compact, and the call
    // must be a harmless no-op rather than an error.
    manager.compact().await.unwrap();
    let entries = manager.recover().await.unwrap();
    assert_eq!(entries.len(), 1);
}
