//! Tunables for segment rotation and compaction.

use std::time::Duration;

/// Configuration for a [`crate::SegmentManager`].
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Roll to a new segment once the current one reaches this size.
    pub max_segment_size: u64,
    /// Trigger compaction once at least this many closed segments exist.
    pub compaction_threshold: usize,
    /// Minimum time between compaction runs.
    pub compaction_interval: Duration,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_segment_size: 64 * 1024 * 1024,
            compaction_threshold: 10,
            compaction_interval: Duration::from_secs(5 * 60),
        }
    }
}
