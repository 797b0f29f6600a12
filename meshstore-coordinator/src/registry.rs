//! Node registry: the coordinator's view of every storage node it has
//! ever heard from.

use meshstore_core::ids::NodeId;
use meshstore_core::node::{NodeDescriptor, NodeMetrics, NodeStatus};
use parking_lot::RwLock;
use std::collections::HashMap;

pub enum RegisterOutcome {
    Registered,
    AlreadyRegisteredSameEndpoint,
    Replaced,
}

/// Guarded by a single `RwLock`; this is not the hot-path lock (that's
/// the bandwidth/chunk-store pair on each node) so a coarse lock is fine
/// here — reads are brief and never contend with an outgoing RPC.
pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeId, NodeDescriptor>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Idempotent only if the re-registering node carries the same
    /// endpoint; otherwise the old entry is decommissioned and replaced.
    pub fn register(
        &self,
        node_id: NodeId,
        host: String,
        port: u16,
        capacity_bytes: u64,
        bandwidth_bps: u64,
    ) -> RegisterOutcome {
        let mut nodes = self.nodes.write();
        match nodes.get(&node_id) {
            Some(existing) if existing.same_endpoint(&host, port) => {
                RegisterOutcome::AlreadyRegisteredSameEndpoint
            }
            Some(_) => {
                nodes.insert(
                    node_id.clone(),
                    NodeDescriptor {
                        node_id,
                        host,
                        port,
                        capacity_bytes,
                        bandwidth_bps,
                        status: NodeStatus::Healthy,
                        last_heartbeat_at: chrono::Utc::now(),
                        metrics: NodeMetrics::default(),
                    },
                );
                RegisterOutcome::Replaced
            }
            None => {
                nodes.insert(
                    node_id.clone(),
                    NodeDescriptor {
                        node_id,
                        host,
                        port,
                        capacity_bytes,
                        bandwidth_bps,
                        status: NodeStatus::Healthy,
                        last_heartbeat_at: chrono::Utc::now(),
                        metrics: NodeMetrics::default(),
                    },
                );
                RegisterOutcome::Registered
            }
        }
    }

    pub fn record_heartbeat(&self, node_id: &NodeId, used_bytes: u64, chunks_stored: u64, at: chrono::DateTime<chrono::Utc>) -> bool {
        let mut nodes = self.nodes.write();
        let Some(node) = nodes.get_mut(node_id) else {
            return false;
        };
        node.last_heartbeat_at = at;
        node.metrics.bytes_stored = used_bytes;
        node.metrics.chunks_stored = chunks_stored;
        node.status = NodeStatus::Healthy;
        true
    }

    pub fn get(&self, node_id: &NodeId) -> Option<NodeDescriptor> {
        self.nodes.read().get(node_id).cloned()
    }

    pub fn set_status(&self, node_id: &NodeId, status: NodeStatus) {
        if let Some(node) = self.nodes.write().get_mut(node_id) {
            node.status = status;
        }
    }

    pub fn all(&self) -> Vec<NodeDescriptor> {
        self.nodes.read().values().cloned().collect()
    }

    pub fn healthy(&self) -> Vec<NodeDescriptor> {
        self.nodes
            .read()
            .values()
            .filter(|n| n.status == NodeStatus::Healthy)
            .cloned()
            .collect()
    }

    pub fn total_count(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn healthy_count(&self) -> usize {
        self.nodes
            .read()
            .values()
            .filter(|n| n.status == NodeStatus::Healthy)
            .count()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
