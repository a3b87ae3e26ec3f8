//! Replica placement
//!
//! Chooses which storage nodes receive a new file's replicas from a snapshot
//! of the nodes' current loads.

use crate::storage::NodeId;

/// Load of one node at the moment of sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLoad {
    pub node: NodeId,
    pub load_bytes: u64,
}

/// Trait for replica placement policies
pub trait PlacementPolicy: Send + Sync {
    /// Pick `replication_factor` nodes, in preference order
    fn select(&self, loads: &[NodeLoad], replication_factor: usize) -> Vec<NodeId>;

    /// Human-readable name of the policy
    fn name(&self) -> &'static str;
}

/// Least-loaded-first placement
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoaded;

impl PlacementPolicy for LeastLoaded {
    fn select(&self, loads: &[NodeLoad], replication_factor: usize) -> Vec<NodeId> {
        select_replicas(loads, replication_factor)
    }

    fn name(&self) -> &'static str {
        "least-loaded"
    }
}

/// Return the `replication_factor` least-loaded nodes, ascending by load.
///
/// Ties keep the order of `loads`. The caller guarantees
/// `replication_factor <= loads.len()`; `Config::validate` enforces it at
/// startup.
pub fn select_replicas(loads: &[NodeLoad], replication_factor: usize) -> Vec<NodeId> {
    let mut ranked = loads.to_vec();
    // sort_by_key is stable
    ranked.sort_by_key(|l| l.load_bytes);
    ranked
        .into_iter()
        .take(replication_factor)
        .map(|l| l.node)
        .collect()
}
