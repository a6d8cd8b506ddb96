//! Monotonic structure versioning.
//!
//! Two counters, one per mutation category (nodes, edges), bumped once per
//! completed structural operation while the write lock is still held. Readers
//! that construct an iterable under the read lock and release the lock before
//! traversing capture a [`VersionToken`] and re-validate it before continuing;
//! a mismatch means the structure moved underneath them and the traversal must
//! restart or abort.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct GraphVersion {
    nodes: AtomicU64,
    edges: AtomicU64,
}

impl GraphVersion {
    pub fn node_version(&self) -> u64 {
        self.nodes.load(Ordering::Acquire)
    }

    pub fn edge_version(&self) -> u64 {
        self.edges.load(Ordering::Acquire)
    }

    pub(crate) fn bump_nodes(&self) -> u64 {
        self.nodes.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn bump_edges(&self) -> u64 {
        self.edges.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn token(&self) -> VersionToken {
        VersionToken {
            nodes: self.node_version(),
            edges: self.edge_version(),
        }
    }
}

/// A snapshot of both version counters at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionToken {
    pub nodes: u64,
    pub edges: u64,
}

impl VersionToken {
    /// True while no structural mutation of either category has completed
    /// since the token was taken.
    pub fn is_current(&self, version: &GraphVersion) -> bool {
        *self == version.token()
    }
}
