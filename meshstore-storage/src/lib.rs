//! meshstore chunk store
//!
//! Holds chunk bytes keyed by `(file_id, chunk_index)`, verifies
//! checksums on put/get, and tracks used bytes under a capacity bound.

pub mod backend;
pub mod memory;

pub use backend::{ChunkStore, DeleteOutcome, GetOutcome, PutOutcome, StorageStats};
pub use memory::MemoryChunkStore;
