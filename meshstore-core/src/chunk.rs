//! Chunk identity and stored-chunk representation.

use crate::ids::FileId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `(file_id, chunk_index)` — the key a chunk is addressed by everywhere
/// in the cluster: the chunk store, the replica index, and the wire
/// protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ChunkKey {
    pub file_id: FileId,
    pub index: u32,
}

impl ChunkKey {
    pub fn new(file_id: FileId, index: u32) -> Self {
        Self { file_id, index }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file_id, self.index)
    }
}

/// A chunk's bytes plus the checksum they were admitted under. This is
/// what a `ChunkStore` holds — never observable half-written.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub key: ChunkKey,
    pub data: Bytes,
    pub checksum: String,
}

impl StoredChunk {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
