//! Adapters wiring this crate's concrete registry/replica-index/node-rpc
//! types into the narrow client traits `meshstore-rebalancer` is built
//! against, so the re-replication engine never depends on coordinator
//! internals directly.

use crate::node_client;
use crate::registry::NodeRegistry;
use crate::replica_index::ReplicaIndex;
use meshstore_core::chunk::ChunkKey;
use meshstore_core::ids::NodeId;
use meshstore_rebalancer::{BoxError, LoadClient, ReplicaIndexClient, TransferClient, UnderReplicatedChunk};
use std::sync::Arc;

pub struct ReplicaIndexAdapter(pub Arc<ReplicaIndex>);

#[async_trait::async_trait]
impl ReplicaIndexClient for ReplicaIndexAdapter {
    async fn under_replicated(&self, target_r: u32) -> Result<Vec<UnderReplicatedChunk>, BoxError> {
        Ok(self.0.under_replicated(target_r))
    }

    async fn register_replica(&self, key: ChunkKey, node: NodeId) -> Result<(), BoxError> {
        self.0.register(key, node, 0);
        Ok(())
    }
}

pub struct LoadAdapter(pub Arc<NodeRegistry>);

impl LoadClient for LoadAdapter {
    fn utilisation(&self, node: &NodeId) -> u64 {
        self.0
            .get(node)
            .map(|n| n.metrics.bytes_stored)
            .unwrap_or(u64::MAX)
    }

    fn endpoint(&self, node: &NodeId) -> Option<String> {
        self.0.get(node).map(|n| n.endpoint())
    }
}

/// Pulls the chunk from the source node and re-uploads it to the target.
pub struct TransferAdapter;

#[async_trait::async_trait]
impl TransferClient for TransferAdapter {
    async fn copy_chunk(
        &self,
        key: &ChunkKey,
        source_addr: &str,
        target_addr: &str,
    ) -> Result<(), BoxError> {
        let (data, checksum) = node_client::get_chunk(source_addr, key)
            .await
            .map_err(|e| -> BoxError { e.into() })?;

        let recomputed = meshstore_core::checksum::sha256_hex(&data);
        if recomputed != checksum {
            return Err(format!(
                "checksum mismatch pulling {key} from {source_addr}: header said {checksum}, bytes hash to {recomputed}"
            )
            .into());
        }

        node_client::put_chunk(target_addr, key, &data, &checksum)
            .await
            .map_err(|e| -> BoxError { e.into() })
    }
}
