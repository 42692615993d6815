//! Per-call origin override for mutators.

use kv_types::{ReplicaId, Timestamp};

/// Overrides the origin stamped onto a mutation.
///
/// Left as `None`/`None` for a locally originated command, which stamps the
/// store's own replica ID and the current wall clock. Replaying a foreign
/// [`Operation`](kv_types::Operation) through [`crate::Store::apply`]-style
/// callers supplies the op's own `timestamp`/`replica_id` here instead, so
/// the re-applied effect keeps its original origin rather than looking like
/// a fresh local write.
#[derive(Debug, Clone, Default)]
pub struct MutationMeta {
    pub timestamp: Option<Timestamp>,
    pub replica_id: Option<ReplicaId>,
    /// Sequence component for any [`kv_types::ElementId`] this mutation
    /// mints (list insert, set add, new hash field). Foreign replays supply
    /// the originating operation's own `OperationId::seq` here so every
    /// replica mints the identical element ID; a local command leaves this
    /// `None` and the store mints a fresh one from its local counter.
    pub element_seq: Option<u64>,
}

impl MutationMeta {
    #[must_use]
    pub fn local() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn origin(timestamp: Timestamp, replica_id: ReplicaId, element_seq: u64) -> Self {
        Self { timestamp: Some(timestamp), replica_id: Some(replica_id), element_seq: Some(element_seq) }
    }

    pub(crate) fn resolve(self, local_replica: &ReplicaId) -> (Timestamp, ReplicaId) {
        (self.timestamp.unwrap_or_else(Timestamp::now), self.replica_id.unwrap_or_else(|| local_replica.clone()))
    }
}
