//! Cluster-node facade: unique ID generation and local leadership.
//!
//! The real cluster plumbing lives outside this core; services only need two
//! of its answers. IDs are allocated with a large gap between consecutive
//! values so concurrent writers spread across the keyspace.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::time;

/// Gap between two consecutively generated IDs of the same service.
const ID_STRIDE: i64 = 1 << 10;

/// Entity families that draw from independent ID sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Friend-request IDs.
    FriendRequest,
}

const SERVICE_KIND_COUNT: usize = 1;

/// The slice of the cluster node this core talks to.
pub struct Node {
    leader: AtomicBool,
    next_ids: [AtomicI64; SERVICE_KIND_COUNT],
}

impl Node {
    /// A standalone node. A single process is its own leader.
    pub fn new() -> Self {
        // Seed each sequence from the clock so restarts do not reuse ranges.
        let seed = time::now_millis() << 20;
        Self {
            leader: AtomicBool::new(true),
            next_ids: [AtomicI64::new(seed)],
        }
    }

    /// Allocate the next ID for `kind`. Non-blocking.
    pub fn next_large_gap_id(&self, kind: ServiceKind) -> i64 {
        self.next_ids[kind as usize].fetch_add(ID_STRIDE, Ordering::Relaxed)
    }

    /// Whether this node currently leads the cluster. Leader-only background
    /// work checks this on every tick.
    pub fn is_local_node_leader(&self) -> bool {
        self.leader.load(Ordering::Relaxed)
    }

    /// Update the leadership flag (driven by the external cluster service).
    pub fn set_local_node_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::Relaxed);
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_gapped() {
        let node = Node::new();
        let first = node.next_large_gap_id(ServiceKind::FriendRequest);
        let second = node.next_large_gap_id(ServiceKind::FriendRequest);
        assert_eq!(second - first, ID_STRIDE);
    }

    #[test]
    fn test_leadership_flag() {
        let node = Node::new();
        assert!(node.is_local_node_leader());
        node.set_local_node_leader(false);
        assert!(!node.is_local_node_leader());
    }
}
