//! The Syncer's outbound half: a thin `reqwest` wrapper around a peer's
//! replication HTTP API.

use crate::config::PeerConfig;
use crate::error::{SyncError, SyncResult};
use crate::wire::{ApplyRequest, OpsResponse};
use kv_types::{Operation, Timestamp};
use std::time::Duration;

pub struct SyncClient {
    http: reqwest::Client,
}

impl SyncClient {
    pub fn new(request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder().timeout(request_timeout).build().expect("reqwest client config is static and valid");
        Self { http }
    }

    /// `GET /ops?since=<nanos>` against one peer.
    pub async fn pull(&self, peer: &PeerConfig, since: Timestamp) -> SyncResult<Vec<Operation>> {
        let url = format!("{}/ops", peer.base_url.trim_end_matches('/'));
        let resp = self.http.get(url).query(&[("since", since.as_nanos())]).send().await?;
        if !resp.status().is_success() {
            return Err(SyncError::UnexpectedStatus { status: resp.status() });
        }
        let body: OpsResponse = resp.json().await?;
        Ok(body.operations)
    }

    /// `POST /apply` with a batch of locally produced operations. A no-op
    /// when `operations` is empty — no point round-tripping an empty batch
    /// every tick.
    pub async fn push(&self, peer: &PeerConfig, operations: Vec<Operation>) -> SyncResult<()> {
        if operations.is_empty() {
            return Ok(());
        }
        let url = format!("{}/apply", peer.base_url.trim_end_matches('/'));
        let resp = self.http.post(url).json(&ApplyRequest { operations }).send().await?;
        if !resp.status().is_success() {
            return Err(SyncError::UnexpectedStatus { status: resp.status() });
        }
        Ok(())
    }
}
