//! Replica identity.
//!
//! A [`ReplicaId`] is a short string chosen once at process startup and
//! assumed globally unique across the cluster. It tags every operation this
//! replica produces, breaks ties in LWW comparisons, and seeds element IDs
//! in OR-Set adds and RGA inserts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A replica's self-chosen identity.
///
/// Backed by `Arc<str>` rather than `String` because vector clocks and
/// CRDT element IDs clone replica IDs constantly on the hot merge path.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaId(Arc<str>);

impl ReplicaId {
    /// Wraps an existing string as a replica ID.
    ///
    /// Does not validate uniqueness — that is an operational property the
    /// deployer is responsible for.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicaId({})", self.0)
    }
}

impl From<&str> for ReplicaId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ReplicaId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::str::FromStr for ReplicaId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}
