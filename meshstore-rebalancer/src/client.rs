//! Client traits the re-replication engine is built against.
//!
//! The engine never talks to the coordinator's replica index, placement
//! policy, or node connections directly — it is handed small trait
//! objects implementing these instead. This keeps the engine
//! unit-testable with fakes and avoids a dependency cycle back into the
//! coordinator crate that owns it.

use meshstore_core::chunk::ChunkKey;
use meshstore_core::ids::NodeId;
use std::collections::HashSet;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct UnderReplicatedChunk {
    pub key: ChunkKey,
    pub current_nodes: HashSet<NodeId>,
    pub target: u32,
}

/// Queries and mutates the coordinator's replica index.
#[async_trait::async_trait]
pub trait ReplicaIndexClient: Send + Sync {
    async fn under_replicated(&self, target_r: u32) -> Result<Vec<UnderReplicatedChunk>, BoxError>;
    async fn register_replica(&self, key: ChunkKey, node: NodeId) -> Result<(), BoxError>;
}

/// Chooses placement target candidates.
pub trait PlacementClient: Send + Sync {
    fn select(&self, k: usize, exclude: &HashSet<NodeId>) -> Vec<NodeId>;
}

/// Node load and addressing, used to prefer a lowest-utilisation source.
pub trait LoadClient: Send + Sync {
    fn utilisation(&self, node: &NodeId) -> u64;
    fn endpoint(&self, node: &NodeId) -> Option<String>;
}

/// Performs the actual chunk copy: pull from source, push to target,
/// verify checksum. The coordinator pulls bytes from the source node and
/// re-uploads them to the target; it never asks one storage node to talk
/// directly to another.
#[async_trait::async_trait]
pub trait TransferClient: Send + Sync {
    async fn copy_chunk(
        &self,
        key: &ChunkKey,
        source_addr: &str,
        target_addr: &str,
    ) -> Result<(), BoxError>;
}
