//! Wire shapes for the replication HTTP API (`GET /ops`, `POST /apply`).

use kv_types::Operation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    pub since: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpsResponse {
    pub operations: Vec<Operation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub operations: Vec<Operation>,
}
