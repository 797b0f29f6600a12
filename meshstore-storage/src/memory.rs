//! In-memory chunk store.
//!
//! Requires no persisted state; carries its own capacity bound and
//! checksum verification at both put and (optionally) get.

use crate::backend::{ChunkStore, DeleteOutcome, GetOutcome, PutOutcome, StorageStats};
use bytes::Bytes;
use meshstore_core::chunk::ChunkKey;
use meshstore_core::checksum::{sha256_hex, verify_checksum};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct Entry {
    data: Bytes,
    checksum: String,
}

/// In-memory, capacity-bounded chunk store.
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<ChunkKey, Entry>>,
    capacity: u64,
    bytes_used: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryChunkStore {
    /// `capacity == 0` means unlimited.
    pub fn new(capacity: u64) -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            capacity,
            bytes_used: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// Overwrites a stored chunk's bytes in place without touching its
    /// recorded checksum, so a later `get(.., verify_on_read: true)`
    /// finds the mismatch. Test-only: normal callers never have a way
    /// to mutate a chunk once written.
    #[cfg(test)]
    fn tamper(&self, key: &ChunkKey, data: Bytes) {
        let mut chunks = self.chunks.write();
        let entry = chunks.get_mut(key).expect("chunk must exist to tamper with it");
        entry.data = data;
    }
}

impl ChunkStore for MemoryChunkStore {
    fn put(&self, key: ChunkKey, data: Bytes, expected_checksum: &str) -> PutOutcome {
        // Checksum is always recomputed from the bytes actually written,
        // never trusted from the caller.
        let computed = sha256_hex(&data);

        let mut chunks = self.chunks.write();

        if let Some(existing) = chunks.get(&key) {
            return if existing.checksum.eq_ignore_ascii_case(expected_checksum) {
                PutOutcome::AlreadyPresent
            } else {
                PutOutcome::WrongChecksum {
                    expected: expected_checksum.to_string(),
                    computed: existing.checksum.clone(),
                }
            };
        }

        if !computed.eq_ignore_ascii_case(expected_checksum) {
            // Verification failure: bytes discarded, accounting untouched.
            return PutOutcome::WrongChecksum {
                expected: expected_checksum.to_string(),
                computed,
            };
        }

        let size = data.len() as u64;
        if self.capacity > 0 {
            let used = self.bytes_used.load(Ordering::SeqCst);
            if used + size > self.capacity {
                return PutOutcome::OutOfCapacity {
                    used,
                    capacity: self.capacity,
                };
            }
        }

        chunks.insert(
            key,
            Entry {
                data,
                checksum: computed,
            },
        );
        self.bytes_used.fetch_add(size, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::Relaxed);
        PutOutcome::Stored
    }

    fn get(&self, key: &ChunkKey, verify_on_read: bool) -> GetOutcome {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let chunks = self.chunks.read();
        match chunks.get(key) {
            None => GetOutcome::Missing,
            Some(entry) => {
                if verify_on_read && !verify_checksum(&entry.data, &entry.checksum) {
                    GetOutcome::CorruptOnRead
                } else {
                    GetOutcome::Found(entry.data.clone())
                }
            }
        }
    }

    fn delete(&self, key: &ChunkKey) -> DeleteOutcome {
        let mut chunks = self.chunks.write();
        match chunks.remove(key) {
            Some(entry) => {
                self.bytes_used
                    .fetch_sub(entry.data.len() as u64, Ordering::SeqCst);
                self.deletes.fetch_add(1, Ordering::Relaxed);
                DeleteOutcome::Deleted
            }
            None => DeleteOutcome::Missing,
        }
    }

    fn list_chunks(&self) -> Vec<(ChunkKey, u64)> {
        let chunks = self.chunks.read();
        chunks
            .iter()
            .map(|(k, v)| (k.clone(), v.data.len() as u64))
            .collect()
    }

    fn stats(&self) -> StorageStats {
        let chunks = self.chunks.read();
        StorageStats {
            chunk_count: chunks.len() as u64,
            bytes_used: self.bytes_used.load(Ordering::SeqCst),
            capacity: self.capacity,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshstore_core::ids::FileId;

    fn key(index: u32) -> ChunkKey {
        ChunkKey::new(FileId::generate(), index)
    }

    #[test]
    fn put_then_get_roundtrips() {
        let store = MemoryChunkStore::new(0);
        let k = key(0);
        let data = Bytes::from_static(b"hello world");
        let checksum = sha256_hex(&data);

        assert_eq!(store.put(k.clone(), data.clone(), &checksum), PutOutcome::Stored);
        assert_eq!(store.get(&k, true), GetOutcome::Found(data));
    }

    #[test]
    fn wrong_checksum_is_rejected_and_not_accounted() {
        let store = MemoryChunkStore::new(0);
        let k = key(0);
        let data = Bytes::from_static(b"hello world");

        let outcome = store.put(k.clone(), data, "0000");
        assert!(matches!(outcome, PutOutcome::WrongChecksum { .. }));
        assert_eq!(store.stats().bytes_used, 0);
        assert_eq!(store.get(&k, true), GetOutcome::Missing);
    }

    #[test]
    fn already_present_is_idempotent() {
        let store = MemoryChunkStore::new(0);
        let k = key(0);
        let data = Bytes::from_static(b"hello world");
        let checksum = sha256_hex(&data);

        assert_eq!(
            store.put(k.clone(), data.clone(), &checksum),
            PutOutcome::Stored
        );
        assert_eq!(
            store.put(k.clone(), data, &checksum),
            PutOutcome::AlreadyPresent
        );
        assert_eq!(store.stats().writes, 1);
    }

    #[test]
    fn capacity_is_enforced_and_rolls_back_to_zero() {
        let store = MemoryChunkStore::new(100);
        let k1 = key(0);
        let data1 = Bytes::from(vec![0u8; 60]);
        let c1 = sha256_hex(&data1);
        assert_eq!(store.put(k1.clone(), data1, &c1), PutOutcome::Stored);

        let k2 = key(1);
        let data2 = Bytes::from(vec![1u8; 60]);
        let c2 = sha256_hex(&data2);
        assert!(matches!(
            store.put(k2, data2, &c2),
            PutOutcome::OutOfCapacity { .. }
        ));
        assert_eq!(store.stats().bytes_used, 60);

        assert_eq!(store.delete(&k1), DeleteOutcome::Deleted);
        assert_eq!(store.stats().bytes_used, 0);
    }

    #[test]
    fn corrupt_on_read_detected_when_bytes_tampered() {
        let store = MemoryChunkStore::new(0);
        let k = key(0);
        let data = Bytes::from_static(b"abc");
        let checksum = sha256_hex(&data);
        assert_eq!(store.put(k.clone(), data, &checksum), PutOutcome::Stored);

        store.tamper(&k, Bytes::from_static(b"abd"));

        assert_eq!(store.get(&k, true), GetOutcome::CorruptOnRead);
        // Without verification the stale checksum is never rechecked.
        assert_eq!(store.get(&k, false), GetOutcome::Found(Bytes::from_static(b"abd")));
    }

    proptest::proptest! {
        #[test]
        fn p1_get_matches_sha256_or_reports_missing(data: Vec<u8>) {
            let store = MemoryChunkStore::new(0);
            let k = key(0);
            let bytes = Bytes::from(data);
            let checksum = sha256_hex(&bytes);

            store.put(k.clone(), bytes.clone(), &checksum);
            match store.get(&k, true) {
                GetOutcome::Found(found) => {
                    proptest::prop_assert_eq!(sha256_hex(&found), checksum);
                }
                GetOutcome::Missing | GetOutcome::CorruptOnRead => {
                    proptest::prop_assert!(false, "freshly stored chunk must be found");
                }
            }
        }
    }
}
