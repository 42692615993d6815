//! Segment directory management: rotation, compaction, crash recovery.

use crate::config::SegmentConfig;
use crate::entry::{EntryKind, LogEntry};
use crate::error::{SegmentError, SegmentResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("segment-{id:020}.log"))
}

/// Parses `segment-<id>.log` or `segment-<id>-compacted.log`, returning
/// `(id, is_compacted)`.
fn parse_segment_filename(name: &str) -> Option<(u64, bool)> {
    let rest = name.strip_prefix("segment-")?.strip_suffix(".log")?;
    match rest.strip_suffix("-compacted") {
        Some(id_str) => id_str.parse().ok().map(|id| (id, true)),
        None => rest.parse().ok().map(|id| (id, false)),
    }
}

async fn list_plain_segment_ids(dir: &Path) -> SegmentResult<Vec<u64>> {
    let mut ids = Vec::new();
    let mut rd = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if let Some((id, compacted)) = parse_segment_filename(name) {
                if !compacted {
                    ids.push(id);
                }
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// All segment files (plain and compacted), in replay order.
async fn list_all_segment_files(dir: &Path) -> SegmentResult<Vec<(u64, PathBuf)>> {
    let mut files = Vec::new();
    let mut rd = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if let Some((id, _)) = parse_segment_filename(name) {
                files.push((id, entry.path()));
            }
        }
    }
    files.sort_by_key(|(id, _)| *id);
    Ok(files)
}

struct CurrentSegment {
    id: u64,
    file: tokio::fs::File,
    size: u64,
}

struct ManagerState {
    current: CurrentSegment,
    last_compaction: Instant,
}

/// Owns a directory of append-only `segment-<id>.log` files: the single
/// writer for the current segment, rotation once it grows past
/// `max_segment_size`, and background compaction of closed segments.
pub struct SegmentManager {
    dir: PathBuf,
    config: SegmentConfig,
    state: Mutex<ManagerState>,
}

impl SegmentManager {
    /// Opens (creating if needed) a segment directory. Reopens the newest
    /// existing segment for append, or starts `segment-0.log` if empty.
    pub async fn open(dir: impl AsRef<Path>, config: SegmentConfig) -> SegmentResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let plain_ids = list_plain_segment_ids(&dir).await?;
        let current = match plain_ids.last().copied() {
            Some(id) => {
                let path = segment_path(&dir, id);
                let file = OpenOptions::new().append(true).open(&path).await?;
                let size = file.metadata().await?.len();
                CurrentSegment { id, file, size }
            }
            None => {
                let path = segment_path(&dir, 0);
                let file = OpenOptions::new().create(true).append(true).open(&path).await?;
                CurrentSegment { id: 0, file, size: 0 }
            }
        };

        Ok(Self {
            dir,
            config,
            state: Mutex::new(ManagerState { current, last_compaction: Instant::now() }),
        })
    }

    /// Appends one entry to the current segment, fsyncing before return.
    /// Rotates to a new segment if the size threshold is crossed, and
    /// opportunistically schedules compaction if it's due.
    pub async fn append(&self, entry: &LogEntry) -> SegmentResult<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let compaction_due = {
            let mut state = self.state.lock().await;
            state.current.file.write_all(&line).await?;
            state.current.file.sync_all().await?;
            state.current.size += line.len() as u64;

            if state.current.size >= self.config.max_segment_size {
                self.rotate_locked(&mut state).await?;
            }
            state.last_compaction.elapsed() >= self.config.compaction_interval
        };

        if compaction_due {
            let current_id = self.state.lock().await.current.id;
            let closed = list_plain_segment_ids(&self.dir).await?
                .into_iter()
                .filter(|&id| id != current_id)
                .count();
            if closed >= self.config.compaction_threshold {
                if let Err(err) = self.compact().await {
                    tracing::warn!(%err, "background compaction failed, retrying next interval");
                }
            }
            self.state.lock().await.last_compaction = Instant::now();
        }
        Ok(())
    }

    async fn rotate_locked(&self, state: &mut ManagerState) -> SegmentResult<()> {
        let next_id = state.current.id + 1;
        let path = segment_path(&self.dir, next_id);
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        tracing::info!(segment = next_id, "rotated to new segment");
        state.current = CurrentSegment { id: next_id, file, size: 0 };
        Ok(())
    }

    /// Replays every segment in ID order, returning the entries in
    /// application order. A truncated trailing record (partial write from
    /// a crash) is skipped with a warning; earlier records in the same
    /// segment are still returned.
    pub async fn recover(&self) -> SegmentResult<Vec<LogEntry>> {
        let files = list_all_segment_files(&self.dir).await?;
        let mut entries = Vec::new();
        for (id, path) in files {
            let bytes = tokio::fs::read(&path).await?;
            // A crash mid-write can leave non-UTF-8 bytes in the trailing
            // record, not just an ASCII truncation; `from_utf8_lossy`
            // mangles that record's bytes rather than failing recovery of
            // every earlier, intact record in the segment.
            let contents = String::from_utf8_lossy(&bytes);
            for line in contents.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => {
                        tracing::warn!(segment = id, %err, "skipping corrupt record during recovery");
                    }
                }
            }
        }
        Ok(entries)
    }

    /// Rewrites all closed segments (never the current one) into a single
    /// `segment-<maxID>-compacted.log`, keeping only each key's latest
    /// entry and dropping keys whose latest entry is a delete. The
    /// replacement is fsynced before any source segment is removed.
    pub async fn compact(&self) -> SegmentResult<()> {
        let current_id = self.state.lock().await.current.id;
        let closed_ids: Vec<u64> = list_plain_segment_ids(&self.dir)
            .await?
            .into_iter()
            .filter(|&id| id != current_id)
            .collect();
        if closed_ids.len() < 2 {
            return Ok(());
        }

        let mut latest: BTreeMap<String, LogEntry> = BTreeMap::new();
        for &id in &closed_ids {
            let path = segment_path(&self.dir, id);
            let bytes = tokio::fs::read(&path).await.map_err(SegmentError::Io)?;
            let contents = String::from_utf8_lossy(&bytes);
            for line in contents.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let Ok(entry) = serde_json::from_str::<LogEntry>(line) else {
                    continue;
                };
                latest
                    .entry(entry.key.clone())
                    .and_modify(|existing| {
                        if entry.timestamp >= existing.timestamp {
                            *existing = entry.clone();
                        }
                    })
                    .or_insert(entry);
            }
        }

        let survivors: Vec<&LogEntry> =
            latest.values().filter(|e| e.kind != EntryKind::Delete).collect();
        let max_id = *closed_ids.iter().max().expect("checked len >= 2 above");
        let compacted_path = self.dir.join(format!("segment-{max_id:020}-compacted.log"));

        let mut buf = Vec::new();
        for entry in &survivors {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }
        let mut file = tokio::fs::File::create(&compacted_path).await?;
        file.write_all(&buf).await?;
        file.sync_all().await?;
        drop(file);

        for &id in &closed_ids {
            let path = segment_path(&self.dir, id);
            if path != compacted_path {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(segment = id, %err, "failed to remove compacted-away segment");
                }
            }
        }
        tracing::info!(
            segments_merged = closed_ids.len(),
            survivors = survivors.len(),
            "compacted segments"
        );
        Ok(())
    }

    /// Rewrites all closed segments, dropping every entry older than
    /// `cutoff_ts`. Unlike [`Self::compact`], survivorship is decided purely
    /// by age, not by per-key latest-wins — callers that need every
    /// still-live entry kept (an operation log, say) use this instead.
    pub async fn prune_older_than(&self, cutoff_ts: i64) -> SegmentResult<()> {
        let current_id = self.state.lock().await.current.id;
        let closed_ids: Vec<u64> = list_plain_segment_ids(&self.dir)
            .await?
            .into_iter()
            .filter(|&id| id != current_id)
            .collect();
        if closed_ids.is_empty() {
            return Ok(());
        }

        let mut survivors = Vec::new();
        for &id in &closed_ids {
            let path = segment_path(&self.dir, id);
            let bytes = tokio::fs::read(&path).await.map_err(SegmentError::Io)?;
            let contents = String::from_utf8_lossy(&bytes);
            for line in contents.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let Ok(entry) = serde_json::from_str::<LogEntry>(line) else {
                    continue;
                };
                if entry.timestamp >= cutoff_ts {
                    survivors.push(entry);
                }
            }
        }

        let max_id = *closed_ids.iter().max().expect("checked non-empty above");
        let pruned_path = self.dir.join(format!("segment-{max_id:020}-compacted.log"));

        let mut buf = Vec::new();
        for entry in &survivors {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }
        let mut file = tokio::fs::File::create(&pruned_path).await?;
        file.write_all(&buf).await?;
        file.sync_all().await?;
        drop(file);

        for &id in &closed_ids {
            let path = segment_path(&self.dir, id);
            if path != pruned_path {
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(segment = id, %err, "failed to remove pruned-away segment");
                }
            }
        }
        tracing::info!(
            segments_merged = closed_ids.len(),
            survivors = survivors.len(),
            cutoff_ts,
            "pruned segments older than retention cutoff"
        );
        Ok(())
    }

    /// The directory this manager persists into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
