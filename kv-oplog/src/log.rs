//! The append-only, ordered record of applied operations.

use crate::error::{OpLogError, OpLogResult};
use kv_segment::{EntryKind, LogEntry, SegmentConfig, SegmentManager};
use kv_types::{Operation, OperationKind, Timestamp};
use std::path::Path;
use tokio::sync::RwLock;

fn entry_kind(kind: OperationKind) -> EntryKind {
    match kind {
        OperationKind::Set => EntryKind::Set,
        OperationKind::Delete => EntryKind::Delete,
    }
}

fn to_log_entry(op: &Operation) -> OpLogResult<LogEntry> {
    let value = serde_json::to_vec(op)?;
    Ok(LogEntry {
        timestamp: op.timestamp.as_nanos(),
        kind: entry_kind(op.kind),
        key: op.operation_id.to_string(),
        value: Some(value),
        metadata: Some(op.replica_id.to_string()),
    })
}

fn from_log_entry(entry: LogEntry) -> OpLogResult<Operation> {
    let bytes = entry.value.ok_or_else(|| OpLogError::MissingPayload { key: entry.key.clone() })?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Durable, ordered sequence of [`Operation`]s, keyed by logical append
/// offset. Built atop the same segment file format the Store uses, but
/// without the Store's "latest value per key" compaction policy — an
/// operation log must keep every op a peer might still need to pull, not
/// just the most recent one per key.
///
/// Reads are served from an in-memory, append-ordered cache rebuilt from
/// disk on open; writes go to both the cache and the segment files before
/// returning.
pub struct OperationLog {
    segments: SegmentManager,
    ops: RwLock<Vec<Operation>>,
}

impl OperationLog {
    /// Opens the log directory, replaying any existing segments to rebuild
    /// the in-memory append-ordered cache.
    pub async fn open(dir: impl AsRef<Path>, config: SegmentConfig) -> OpLogResult<Self> {
        let segments = SegmentManager::open(dir, config).await?;
        let mut ops = Vec::new();
        for entry in segments.recover().await? {
            let key = entry.key.clone();
            match from_log_entry(entry) {
                Ok(op) => ops.push(op),
                Err(err) => {
                    tracing::warn!(%key, %err, "dropping unparseable recovered operation");
                }
            }
        }
        ops.sort_by_key(|op| op.timestamp);
        Ok(Self { segments, ops: RwLock::new(ops) })
    }

    /// Appends one operation, assigning it the next logical offset (its
    /// position in append order). Durable once this returns.
    pub async fn append(&self, op: Operation) -> OpLogResult<()> {
        let entry = to_log_entry(&op)?;
        self.segments.append(&entry).await?;
        self.ops.write().await.push(op);
        Ok(())
    }

    /// Operations with `timestamp > since`, in ascending order.
    pub async fn operations_since(&self, since: Timestamp) -> Vec<Operation> {
        self.ops.read().await.iter().filter(|op| op.timestamp > since).cloned().collect()
    }

    /// The number of operations currently retained.
    pub async fn len(&self) -> usize {
        self.ops.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops operations older than `cutoff` from both the in-memory cache
    /// and the underlying segment files. Callers are responsible for
    /// picking a `cutoff` that respects `opLogRetention` — pruning too
    /// aggressively can strand a peer that has been offline longer than the
    /// retention window.
    pub async fn prune_older_than(&self, cutoff: Timestamp) -> OpLogResult<()> {
        self.segments.prune_older_than(cutoff.as_nanos()).await?;
        self.ops.write().await.retain(|op| op.timestamp >= cutoff);
        Ok(())
    }
}
