//! The replication HTTP API a peer's Syncer pulls from and pushes to.
//!
//! Two routes, both operating on [`kv_types::Operation`] directly — no RESP
//! involved here, this is node-to-node, not client-to-node.

use crate::wire::{ApplyRequest, OpsResponse, SinceQuery};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kv_oplog::OperationLog;
use kv_server::Server;
use kv_types::Timestamp;
use std::sync::Arc;

#[derive(Clone)]
struct AppState {
    server: Arc<Server>,
    oplog: Arc<OperationLog>,
}

/// Builds the router peers send their pull/push traffic to.
pub fn router(server: Arc<Server>, oplog: Arc<OperationLog>) -> Router {
    let state = AppState { server, oplog };
    Router::new().route("/ops", get(get_ops)).route("/apply", post(post_apply)).with_state(state)
}

async fn get_ops(State(state): State<AppState>, Query(SinceQuery { since }): Query<SinceQuery>) -> Json<OpsResponse> {
    let operations = state.oplog.operations_since(Timestamp::from_nanos(since)).await;
    Json(OpsResponse { operations })
}

async fn post_apply(State(state): State<AppState>, Json(ApplyRequest { operations }): Json<ApplyRequest>) -> StatusCode {
    for op in operations {
        if let Err(err) = state.server.handle_operation(op).await {
            tracing::warn!(error = %err, "rejecting pushed operation");
            return StatusCode::BAD_REQUEST;
        }
    }
    StatusCode::OK
}
