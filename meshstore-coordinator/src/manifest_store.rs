//! Holds file manifests: in-progress uploads and committed files.

use meshstore_core::ids::FileId;
use meshstore_core::manifest::FileManifest;
use parking_lot::Mutex;
use std::collections::HashMap;

pub struct PendingUpload {
    pub display_name: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub chunk_count: u32,
    pub replication_factor: u32,
    pub chunk_checksums: Vec<Option<String>>,
}

impl PendingUpload {
    pub fn is_complete(&self) -> bool {
        self.chunk_checksums.iter().all(|c| c.is_some())
    }

    /// Size of the chunk at `index`, accounting for a short final chunk
    /// (same rule as `FileManifest::chunk_size_at`, computed before the
    /// manifest exists).
    pub fn chunk_size_at(&self, index: u32) -> Option<u64> {
        if index >= self.chunk_count {
            return None;
        }
        if index + 1 == self.chunk_count {
            let full = self.chunk_size * (self.chunk_count.saturating_sub(1)) as u64;
            Some(self.total_size.saturating_sub(full))
        } else {
            Some(self.chunk_size)
        }
    }

    pub fn into_manifest(self, file_id: FileId) -> Option<FileManifest> {
        if !self.is_complete() {
            return None;
        }
        Some(FileManifest {
            file_id,
            display_name: self.display_name,
            total_size: self.total_size,
            chunk_count: self.chunk_count,
            chunk_size: self.chunk_size,
            replication_factor: self.replication_factor,
            chunk_checksums: self.chunk_checksums.into_iter().map(|c| c.unwrap()).collect(),
            created_at: chrono::Utc::now(),
        })
    }
}

#[derive(Default)]
pub struct ManifestStore {
    pending: Mutex<HashMap<FileId, PendingUpload>>,
    committed: Mutex<HashMap<FileId, FileManifest>>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, file_id: FileId, upload: PendingUpload) {
        self.pending.lock().insert(file_id, upload);
    }

    pub fn expected_chunk_size(&self, file_id: &FileId, index: u32) -> Option<u64> {
        self.pending.lock().get(file_id).and_then(|u| u.chunk_size_at(index))
    }

    /// The replication factor the upload actually requested, not the
    /// cluster-wide default — chunk writes must replicate to this many
    /// targets regardless of what the coordinator's default happens to
    /// be.
    pub fn replication_factor(&self, file_id: &FileId) -> Option<u32> {
        self.pending.lock().get(file_id).map(|u| u.replication_factor)
    }

    pub fn mark_chunk_durable(&self, file_id: &FileId, index: u32, checksum: String) -> bool {
        let mut pending = self.pending.lock();
        let Some(upload) = pending.get_mut(file_id) else {
            return false;
        };
        let Some(slot) = upload.chunk_checksums.get_mut(index as usize) else {
            return false;
        };
        *slot = Some(checksum);
        true
    }

    pub fn commit(&self, file_id: &FileId) -> Option<FileManifest> {
        let upload = self.pending.lock().remove(file_id)?;
        let manifest = upload.into_manifest(file_id.clone())?;
        self.committed.lock().insert(file_id.clone(), manifest.clone());
        Some(manifest)
    }

    pub fn get(&self, file_id: &FileId) -> Option<FileManifest> {
        self.committed.lock().get(file_id).cloned()
    }

    pub fn remove(&self, file_id: &FileId) -> Option<FileManifest> {
        self.committed.lock().remove(file_id)
    }

    pub fn list(&self) -> Vec<FileManifest> {
        self.committed.lock().values().cloned().collect()
    }

    pub fn file_count(&self) -> usize {
        self.committed.lock().len()
    }
}
