//! Download coordinator: reads a file's chunks back by trying each
//! known replica in turn until one returns bytes that match the
//! manifest's recorded checksum.

use crate::error::{CoordinatorError, Result};
use crate::events::NodeEvent;
use crate::manifest_store::ManifestStore;
use crate::node_client;
use crate::registry::NodeRegistry;
use crate::replica_index::ReplicaIndex;
use bytes::Bytes;
use meshstore_core::checksum::sha256_hex;
use meshstore_core::chunk::ChunkKey;
use meshstore_core::ids::FileId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

pub struct DownloadCoordinator {
    pub manifests: Arc<ManifestStore>,
    pub replica_index: Arc<ReplicaIndex>,
    pub registry: Arc<NodeRegistry>,
    pub suspect_events: broadcast::Sender<NodeEvent>,
}

impl DownloadCoordinator {
    /// Yields `(index, bytes)` in order, trying each holder of a chunk
    /// until one returns verified bytes.
    pub async fn read_chunk(&self, file_id: &FileId, index: u32) -> Result<Bytes> {
        let manifest = self
            .manifests
            .get(file_id)
            .ok_or_else(|| CoordinatorError::FileNotFound(file_id.to_string()))?;
        let key = ChunkKey::new(file_id.clone(), index);
        let expected_checksum = manifest
            .chunk_checksums
            .get(index as usize)
            .cloned()
            .ok_or_else(|| CoordinatorError::ChunkUnavailable(key.to_string()))?;

        let mut holders: Vec<_> = self.replica_index.locations(&key).into_iter().collect();
        // Prefer least-loaded replica first.
        holders.sort_by_key(|n| {
            self.registry
                .get(n)
                .map(|d| d.metrics.bytes_stored)
                .unwrap_or(u64::MAX)
        });

        for node_id in holders {
            let Some(descriptor) = self.registry.get(&node_id) else {
                continue;
            };
            match node_client::get_chunk(&descriptor.endpoint(), &key).await {
                Ok((data, _wire_checksum)) => {
                    let actual = sha256_hex(&data);
                    if actual == expected_checksum {
                        return Ok(data);
                    }
                    warn!(key = %key, node = %node_id, "checksum mismatch on download; trying next replica");
                    self.replica_index.unregister(&key, &node_id);
                    let _ = self.suspect_events.send(NodeEvent::SuspectChunk(key.clone()));
                }
                Err(e) => {
                    warn!(key = %key, node = %node_id, error = %e, "get_chunk failed; trying next replica");
                }
            }
        }

        Err(CoordinatorError::ChunkUnavailable(key.to_string()))
    }
}
