//! Durable, ordered operation log — the unit of outbound replication.
//!
//! Every applied mutation, local or foreign, is appended here as an
//! [`Operation`](kv_types::Operation) once the Store and Segment Manager have
//! recorded it. The Syncer's pull path reads forward from a per-peer
//! watermark (`GetOperations(since)`); `operationID` dedup on the receiving
//! side is the Syncer's job, not this crate's.

mod error;
mod log;

pub use error::{OpLogError, OpLogResult};
pub use log::OperationLog;

pub use kv_segment::SegmentConfig;
