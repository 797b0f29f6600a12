//! Upload coordinator: assigns file ids and chunk sizes, replicates
//! each chunk to `r` targets concurrently, and commits the file once
//! every chunk is durable.

use crate::error::{CoordinatorError, Result};
use crate::manifest_store::{ManifestStore, PendingUpload};
use crate::node_client;
use crate::placement::Placement;
use crate::registry::NodeRegistry;
use crate::replica_index::ReplicaIndex;
use bytes::Bytes;
use futures::future::join_all;
use meshstore_core::chunk::ChunkKey;
use meshstore_core::ids::{FileId, NodeId};
use meshstore_core::manifest::FileManifest;
use meshstore_core::{checksum::sha256_hex, choose_chunk_size, chunk_count};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const MAX_PUT_RETRIES_DEFAULT: u32 = 3;

pub struct UploadCoordinator {
    pub manifests: Arc<ManifestStore>,
    pub replica_index: Arc<ReplicaIndex>,
    pub placement: Arc<Placement>,
    pub registry: Arc<NodeRegistry>,
    pub max_put_retries: u32,
}

impl UploadCoordinator {
    /// Assigns a file id and picks the chunk size for a new upload.
    pub fn begin(&self, display_name: String, total_size: u64, replication: u32) -> Result<(FileId, u64)> {
        if replication == 0 {
            return Err(CoordinatorError::Core(
                meshstore_core::MeshError::InvalidReplicationFactor(replication as i64),
            ));
        }
        if total_size == 0 {
            return Err(CoordinatorError::Core(meshstore_core::MeshError::EmptyFile));
        }

        let file_id = FileId::generate();
        let chunk_size = choose_chunk_size(total_size);
        let count = chunk_count(total_size, chunk_size);

        self.manifests.begin(
            file_id.clone(),
            PendingUpload {
                display_name,
                total_size,
                chunk_size,
                chunk_count: count,
                replication_factor: replication,
                chunk_checksums: vec![None; count as usize],
            },
        );

        Ok((file_id, chunk_size))
    }

    /// Checksums the chunk, then replicates it to `r` targets with
    /// retry-then-replace, updating the replica index on each success.
    /// Each round's targets are put to concurrently, not one at a time,
    /// since they're independent writes to independent nodes.
    pub async fn put_chunk(
        &self,
        file_id: &FileId,
        index: u32,
        data: Bytes,
        replication: u32,
    ) -> Result<()> {
        let checksum = sha256_hex(&data);
        let key = ChunkKey::new(file_id.clone(), index);

        let mut tried: HashSet<NodeId> = HashSet::new();
        let mut succeeded: HashSet<NodeId> = HashSet::new();

        while succeeded.len() < replication as usize {
            let need = replication as usize - succeeded.len();
            let exclude: HashSet<NodeId> = tried.union(&succeeded).cloned().collect();
            let candidates = self.placement.select(need, &exclude, data.len() as u64);
            if candidates.is_empty() {
                break;
            }
            for target in &candidates {
                tried.insert(target.clone());
            }

            let attempts = candidates.into_iter().map(|target| {
                let data = data.clone();
                let checksum = checksum.clone();
                let key = key.clone();
                async move {
                    let Some(node) = self.registry.get(&target) else {
                        return None;
                    };
                    if self.try_put_with_retries(&node.endpoint(), &key, &data, &checksum).await {
                        Some(target)
                    } else {
                        None
                    }
                }
            });

            for target in join_all(attempts).await.into_iter().flatten() {
                self.replica_index.register(key.clone(), target.clone(), replication);
                succeeded.insert(target);
            }
        }

        if succeeded.len() < replication as usize {
            warn!(
                key = %key,
                achieved = succeeded.len(),
                target = replication,
                "insufficient replicas for chunk; scheduling written replicas for GC"
            );
            for node in &succeeded {
                self.replica_index.unregister(&key, node);
                if let Some(descriptor) = self.registry.get(node) {
                    let _ = node_client::delete_chunk(&descriptor.endpoint(), &key).await;
                }
            }
            return Err(CoordinatorError::InsufficientReplicas(key.to_string()));
        }

        self.manifests.mark_chunk_durable(file_id, index, checksum);
        Ok(())
    }

    async fn try_put_with_retries(&self, addr: &str, key: &ChunkKey, data: &[u8], checksum: &str) -> bool {
        for attempt in 1..=self.max_put_retries {
            match node_client::put_chunk(addr, key, data, checksum).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(key = %key, addr, attempt, error = %e, "put attempt failed");
                }
            }
        }
        false
    }

    /// Commit is only possible once every chunk is durable; the file
    /// is invisible to download before this.
    pub fn commit(&self, file_id: &FileId) -> Result<FileManifest> {
        match self.manifests.commit(file_id) {
            Some(manifest) => {
                info!(file_id = %file_id, chunks = manifest.chunk_count, "upload committed");
                Ok(manifest)
            }
            None => Err(CoordinatorError::InsufficientReplicas(file_id.to_string())),
        }
    }
}
