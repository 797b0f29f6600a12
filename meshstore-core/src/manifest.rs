//! File manifest — the coordinator's record of an uploaded file.

use crate::ids::FileId;
use serde::{Deserialize, Serialize};

/// A file's chunk layout, per-chunk checksums and replication factor.
/// Owned by the coordinator; made visible to download only once the
/// last chunk has been durably replicated to `replication_factor` nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileManifest {
    pub file_id: FileId,
    pub display_name: String,
    pub total_size: u64,
    pub chunk_count: u32,
    pub chunk_size: u64,
    pub replication_factor: u32,
    pub chunk_checksums: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl FileManifest {
    /// Size in bytes of the chunk at `index`, accounting for the short
    /// final chunk.
    pub fn chunk_size_at(&self, index: u32) -> u64 {
        if index + 1 == self.chunk_count {
            let full = self.chunk_size * (self.chunk_count.saturating_sub(1)) as u64;
            self.total_size.saturating_sub(full)
        } else {
            self.chunk_size
        }
    }
}
