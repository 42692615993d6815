//! One-time migration of a legacy `<dataDir>/store.json` snapshot into
//! segment files, run before the Store opens its segment directory.
//!
//! The legacy format is a flat JSON object mapping key to the same
//! `CrdtValue` JSON encoding segments already use
//! (`{type, data, timestamp, replicaID, vectorClock, ttl?, expireAt?}`),
//! which is what a pre-segment single-snapshot store would have written.
//! The file is renamed to `store.json.migrated` on success so a restart
//! never replays it twice.

use kv_crdt::CrdtValue;
use kv_segment::{LogEntry, SegmentManager};
use kv_types::Timestamp;
use std::collections::HashMap;
use std::path::Path;

pub async fn migrate_legacy_store(data_dir: &Path, segments: &SegmentManager) -> anyhow::Result<()> {
    let legacy_path = data_dir.join("store.json");
    if !legacy_path.exists() {
        return Ok(());
    }

    tracing::info!(path = %legacy_path.display(), "migrating legacy store.json into segments");
    let text = tokio::fs::read_to_string(&legacy_path).await?;
    let snapshot: HashMap<String, CrdtValue> = serde_json::from_str(&text)?;

    // The legacy snapshot carries no append-order of its own; the segment
    // log only needs *a* timestamp to order these entries relative to
    // whatever gets appended next, not relative to each other.
    let migration_ts = Timestamp::now().as_nanos();
    for (key, value) in snapshot {
        let bytes = value.to_bytes()?;
        let entry = LogEntry::set(migration_ts, key, bytes, None);
        segments.append(&entry).await?;
    }

    let migrated_path = data_dir.join("store.json.migrated");
    tokio::fs::rename(&legacy_path, &migrated_path).await?;
    tracing::info!(path = %migrated_path.display(), "legacy store.json migrated, original renamed aside");
    Ok(())
}
