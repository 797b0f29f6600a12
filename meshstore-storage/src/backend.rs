//! Chunk store trait shared by every storage backend.

use bytes::Bytes;
use meshstore_core::chunk::ChunkKey;

/// Result of a `put`. `AlreadyPresent` is an idempotent success when the
/// stored checksum matches; a checksum mismatch on an existing chunk is
/// `WrongChecksum`, a hard error, handled the same as a fresh write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    AlreadyPresent,
    WrongChecksum { expected: String, computed: String },
    OutOfCapacity { used: u64, capacity: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    Found(Bytes),
    Missing,
    CorruptOnRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
}

/// Per-node storage usage, derived read-only from the chunk map — never
/// an independently-accumulated counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageStats {
    pub chunk_count: u64,
    pub bytes_used: u64,
    pub capacity: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
}

impl StorageStats {
    pub fn bytes_available(&self) -> u64 {
        if self.capacity == 0 {
            u64::MAX
        } else {
            self.capacity.saturating_sub(self.bytes_used)
        }
    }

    pub fn usage_percent(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            (self.bytes_used as f64 / self.capacity as f64) * 100.0
        }
    }
}

/// Implementations must be atomic with respect to crashes: either the
/// chunk is present and checksum-valid, or absent — never half-written
/// and observable.
pub trait ChunkStore: Send + Sync {
    fn put(&self, key: ChunkKey, data: Bytes, expected_checksum: &str) -> PutOutcome;

    /// `verify_on_read` re-hashes stored bytes before returning them, so
    /// bit-rot is caught at read time rather than handed out silently.
    fn get(&self, key: &ChunkKey, verify_on_read: bool) -> GetOutcome;

    fn delete(&self, key: &ChunkKey) -> DeleteOutcome;

    fn list_chunks(&self) -> Vec<(ChunkKey, u64)>;

    fn stats(&self) -> StorageStats;
}
