//! Periodic-tick replication between replicas over plain HTTP: no gossip, no
//! consensus, just "pull what I'm missing, push what I've got" on a clock.

mod client;
mod config;
mod error;
mod http;
mod syncer;
mod wire;

pub use client::SyncClient;
pub use config::{PeerConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use http::router;
pub use syncer::Syncer;
