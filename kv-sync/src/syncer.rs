//! The periodic-tick replication loop: pull new operations from every peer,
//! then push this replica's new operations to every peer.
//!
//! No lock is ever held across an HTTP call. The per-peer pull watermark and
//! the single push watermark live behind their own short-lived `Mutex`
//! guards that are dropped before the corresponding `await`.

use crate::client::SyncClient;
use crate::config::SyncConfig;
use kv_oplog::OperationLog;
use kv_server::Server;
use kv_types::{ReplicaId, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

pub struct Syncer {
    config: SyncConfig,
    server: Arc<Server>,
    oplog: Arc<OperationLog>,
    client: SyncClient,
    last_pull: Mutex<HashMap<ReplicaId, Timestamp>>,
    last_sent: Mutex<Timestamp>,
}

impl Syncer {
    #[must_use]
    pub fn new(config: SyncConfig, server: Arc<Server>, oplog: Arc<OperationLog>) -> Self {
        let client = SyncClient::new(config.request_timeout);
        Self { config, server, oplog, client, last_pull: Mutex::new(HashMap::new()), last_sent: Mutex::new(Timestamp::from_nanos(i64::MIN)) }
    }

    /// Runs the tick loop until `stop` fires. Intended to be spawned as its
    /// own task alongside the Store's GC loop.
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// One pull pass over every peer followed by one push pass. Public so
    /// tests can drive a tick without waiting on the interval.
    pub async fn tick(&self) {
        self.pull_all().await;
        self.push_all().await;
    }

    async fn pull_all(&self) {
        for peer in &self.config.peers {
            let since = {
                let watermarks = self.last_pull.lock().await;
                watermarks.get(&peer.replica_id).copied().unwrap_or(Timestamp::from_nanos(i64::MIN))
            };

            let operations = match self.client.pull(peer, since).await {
                Ok(operations) => operations,
                Err(err) => {
                    tracing::warn!(peer = %peer.replica_id, error = %err, "pull failed, retrying next tick");
                    continue;
                }
            };

            let mut high_water = since;
            for op in operations {
                let ts = op.timestamp;
                if let Err(err) = self.server.handle_operation(op).await {
                    tracing::warn!(peer = %peer.replica_id, error = %err, "rejected pulled operation");
                }
                high_water = high_water.max(ts);
            }

            self.last_pull.lock().await.insert(peer.replica_id.clone(), high_water);
        }
    }

    async fn push_all(&self) {
        if self.config.peers.is_empty() {
            return;
        }

        let since = *self.last_sent.lock().await;
        let operations = self.oplog.operations_since(since).await;
        if operations.is_empty() {
            return;
        }
        let high_water = operations.iter().map(|op| op.timestamp).max().expect("checked non-empty above");

        let mut all_delivered = true;
        for peer in &self.config.peers {
            if let Err(err) = self.client.push(peer, operations.clone()).await {
                tracing::warn!(peer = %peer.replica_id, error = %err, "push failed, retrying next tick");
                all_delivered = false;
            }
        }

        // The push watermark is shared across every peer, so it only
        // advances once the whole batch has reached everyone; a lagging
        // peer keeps the batch in the retry window rather than losing it.
        if all_delivered {
            *self.last_sent.lock().await = high_water;
        }
    }
}
