//! Replica index: the mapping from chunk identity to the set of nodes
//! believed to hold it, and its inverse. Both views live under one
//! mutex and are updated together so they never diverge. The mutex
//! guards bookkeeping only and is never held across an outgoing RPC.

use meshstore_core::chunk::ChunkKey;
use meshstore_core::ids::NodeId;
use meshstore_rebalancer::UnderReplicatedChunk;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Inner {
    by_chunk: HashMap<ChunkKey, HashSet<NodeId>>,
    by_node: HashMap<NodeId, HashSet<ChunkKey>>,
    /// Target replication factor per chunk's file, needed by `under_replicated`.
    target_r: HashMap<ChunkKey, u32>,
}

pub struct ReplicaIndex {
    inner: Mutex<Inner>,
}

impl ReplicaIndex {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// `target_r == 0` means the caller doesn't know the file's real
    /// replication factor (a repair registering a replacement replica,
    /// which only ever knows the chunk key and the node, not the
    /// original upload's `r`) and must not clobber whatever is already
    /// on record. Only an upload, which always has the true per-file
    /// `r` in hand, should ever pass a positive value here.
    pub fn register(&self, key: ChunkKey, node: NodeId, target_r: u32) {
        let mut inner = self.inner.lock();
        inner.by_chunk.entry(key.clone()).or_default().insert(node.clone());
        inner.by_node.entry(node).or_default().insert(key.clone());
        if target_r > 0 {
            inner.target_r.insert(key, target_r);
        }
    }

    pub fn unregister(&self, key: &ChunkKey, node: &NodeId) {
        let mut inner = self.inner.lock();
        if let Some(nodes) = inner.by_chunk.get_mut(key) {
            nodes.remove(node);
        }
        if let Some(chunks) = inner.by_node.get_mut(node) {
            chunks.remove(key);
        }
    }

    /// Unregisters every chunk held by `node`. Called when a node is
    /// declared FAILED so `under_replicated` immediately sees the
    /// shortfall instead of waiting on a stale entry to be noticed some
    /// other way.
    pub fn remove_node(&self, node: &NodeId) -> Vec<ChunkKey> {
        let mut inner = self.inner.lock();
        let Some(chunks) = inner.by_node.remove(node) else {
            return Vec::new();
        };
        for key in &chunks {
            if let Some(nodes) = inner.by_chunk.get_mut(key) {
                nodes.remove(node);
            }
        }
        chunks.into_iter().collect()
    }

    pub fn locations(&self, key: &ChunkKey) -> HashSet<NodeId> {
        self.inner
            .lock()
            .by_chunk
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn chunks_on(&self, node: &NodeId) -> HashSet<ChunkKey> {
        self.inner.lock().by_node.get(node).cloned().unwrap_or_default()
    }

    pub fn remove_file(&self, file_chunks: &[ChunkKey]) {
        let mut inner = self.inner.lock();
        for key in file_chunks {
            if let Some(nodes) = inner.by_chunk.remove(key) {
                for node in nodes {
                    if let Some(chunks) = inner.by_node.get_mut(&node) {
                        chunks.remove(key);
                    }
                }
            }
            inner.target_r.remove(key);
        }
    }

    pub fn under_replicated(&self, default_target_r: u32) -> Vec<UnderReplicatedChunk> {
        let inner = self.inner.lock();
        inner
            .target_r
            .iter()
            .filter_map(|(key, &target)| {
                let current = inner.by_chunk.get(key).cloned().unwrap_or_default();
                let target = if target == 0 { default_target_r } else { target };
                if (current.len() as u32) < target {
                    Some(UnderReplicatedChunk {
                        key: key.clone(),
                        current_nodes: current,
                        target,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn under_replicated_count(&self, default_target_r: u32) -> usize {
        self.under_replicated(default_target_r).len()
    }

    /// Reconciles what a node reports holding (typically its first
    /// heartbeat after a restart) against what the index currently
    /// believes. The index is the source of truth, not the node's
    /// report: a reported chunk the index doesn't currently count this
    /// node as a holder of is never re-registered here, since the
    /// re-replication engine may already have satisfied that chunk's
    /// replication elsewhere while the node was down. Such chunks come
    /// back as `unclaimed`, for the caller to track for grace-period
    /// garbage collection. Chunks the index still believes this node
    /// holds but that the node no longer reports are evicted
    /// immediately and returned as `missing`, so `under_replicated`
    /// sees the shortfall on the very next check.
    pub fn reconcile(&self, node: &NodeId, reported: &HashSet<ChunkKey>) -> ReconcileOutcome {
        let mut inner = self.inner.lock();
        let previously_held = inner.by_node.get(node).cloned().unwrap_or_default();

        let missing: Vec<ChunkKey> = previously_held.difference(reported).cloned().collect();
        for key in &missing {
            if let Some(nodes) = inner.by_chunk.get_mut(key) {
                nodes.remove(node);
            }
        }
        if let Some(chunks) = inner.by_node.get_mut(node) {
            for key in &missing {
                chunks.remove(key);
            }
        }

        let unclaimed: Vec<ChunkKey> = reported
            .iter()
            .filter(|key| !inner.by_chunk.get(*key).is_some_and(|holders| holders.contains(node)))
            .cloned()
            .collect();

        ReconcileOutcome { missing, unclaimed }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Chunks the index believed `node` held that it no longer reports;
    /// already evicted from the index by the time this is returned.
    pub missing: Vec<ChunkKey>,
    /// Chunks `node` reports holding that the index doesn't currently
    /// count it as a holder of; left untouched in the index, for the
    /// caller to track toward grace-period garbage collection.
    pub unclaimed: Vec<ChunkKey>,
}

impl Default for ReplicaIndex {
    fn default() -> Self {
        Self::new()
    }
}
