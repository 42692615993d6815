//! Syncer configuration: who to talk to, and how often.

use kv_types::ReplicaId;
use std::time::Duration;

/// One peer this replica exchanges operations with.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub replica_id: ReplicaId,
    /// Base URL of the peer's replication HTTP API, e.g. `http://10.0.0.2:7600`.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub peers: Vec<PeerConfig>,
    pub tick_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { peers: Vec::new(), tick_interval: Duration::from_secs(1), request_timeout: Duration::from_secs(5) }
    }
}
