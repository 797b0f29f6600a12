//! meshstore core types
//!
//! Shared, transport-agnostic types for the meshstore cluster:
//! - chunk identity and SHA-256 checksums
//! - file manifests
//! - node descriptors and lifecycle status
//! - the unified error type
//!
//! Nothing in this crate talks to a socket or a clock beyond
//! `chrono::Utc::now` for timestamps recorded in data structures.

pub mod checksum;
pub mod chunk;
pub mod error;
pub mod ids;
pub mod manifest;
pub mod node;

pub use checksum::{sha256_hex, verify_checksum};
pub use chunk::{ChunkKey, StoredChunk};
pub use error::{MeshError, Result};
pub use ids::{FileId, NodeId};
pub use manifest::FileManifest;
pub use node::{NodeDescriptor, NodeMetrics, NodeStatus};

/// Chunk size thresholds from the upload chunk-size table.
pub const SMALL_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10 MiB
pub const MEDIUM_FILE_THRESHOLD: u64 = 100 * 1024 * 1024; // 100 MiB

pub const SMALL_CHUNK_SIZE: u64 = 512 * 1024; // 512 KiB
pub const MEDIUM_CHUNK_SIZE: u64 = 2 * 1024 * 1024; // 2 MiB
pub const LARGE_CHUNK_SIZE: u64 = 10 * 1024 * 1024; // 10 MiB

/// Pick the chunk size for a file of the given total size.
pub fn choose_chunk_size(total_size: u64) -> u64 {
    if total_size < SMALL_FILE_THRESHOLD {
        SMALL_CHUNK_SIZE
    } else if total_size <= MEDIUM_FILE_THRESHOLD {
        MEDIUM_CHUNK_SIZE
    } else {
        LARGE_CHUNK_SIZE
    }
}

/// Number of chunks a file of `total_size` splits into at `chunk_size`.
pub fn chunk_count(total_size: u64, chunk_size: u64) -> u32 {
    if total_size == 0 {
        return 0;
    }
    ((total_size + chunk_size - 1) / chunk_size) as u32
}
