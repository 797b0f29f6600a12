//! Node descriptor and lifecycle status.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Registering,
    Healthy,
    Failed,
    Decommissioned,
}

/// Stable identity, endpoint, declared resources, and lifecycle status
/// of a storage node as known to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub node_id: NodeId,
    pub host: String,
    pub port: u16,
    pub capacity_bytes: u64,
    pub bandwidth_bps: u64,
    pub status: NodeStatus,
    pub last_heartbeat_at: chrono::DateTime<chrono::Utc>,
    pub metrics: NodeMetrics,
}

impl NodeDescriptor {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Idempotent re-registration check: the same node id re-registering
    /// is only a no-op if the endpoint matches.
    pub fn same_endpoint(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }
}

/// A read-only snapshot of a node's metrics, computed fresh rather than
/// accumulated across requests — the accumulation, where any happens,
/// lives in the node's chunk store and bandwidth accountant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub bytes_stored: u64,
    pub chunks_stored: u64,
    pub transfers_completed: u64,
    pub uptime_secs: u64,
}
