//! Grace-period garbage collection for chunks a node reports holding
//! that the replica index does not currently count it as a holder of.
//!
//! This arises when a node that was declared FAILED (and evicted from
//! the replica index) later recovers: its first heartbeat after
//! restart reports whatever chunks are still sitting on its local
//! disk, but the index has already moved on — re-replication may have
//! satisfied those chunks' replication elsewhere while the node was
//! down. Rather than blindly trusting the node's report and
//! re-registering it as a holder, these chunks are tracked here from
//! the moment they're first seen unclaimed; once `grace_period` has
//! elapsed without the index ever claiming them back (e.g. via a
//! repair targeting this node), they're deleted from the node.

use meshstore_core::chunk::ChunkKey;
use meshstore_core::ids::NodeId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

pub struct UnclaimedChunks {
    first_seen: Mutex<HashMap<(NodeId, ChunkKey), chrono::DateTime<chrono::Utc>>>,
}

impl UnclaimedChunks {
    pub fn new() -> Self {
        Self {
            first_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Records the first time `node` was observed reporting `key`
    /// without the replica index counting it as a holder. Repeated
    /// calls for the same pair don't reset the clock.
    pub fn observe(&self, node: NodeId, key: ChunkKey, now: chrono::DateTime<chrono::Utc>) {
        self.first_seen.lock().entry((node, key)).or_insert(now);
    }

    /// Drops tracking for a pair that's no longer unclaimed — either
    /// the index claimed it back, or it was already swept.
    pub fn clear(&self, node: &NodeId, key: &ChunkKey) {
        self.first_seen.lock().remove(&(node.clone(), key.clone()));
    }

    /// Returns every `(node, key)` pair whose grace period has elapsed,
    /// removing them from tracking. The caller is responsible for
    /// actually deleting the chunk from the node.
    pub fn sweep_expired(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        grace_period: Duration,
    ) -> Vec<(NodeId, ChunkKey)> {
        let grace = chrono::Duration::from_std(grace_period).unwrap_or(chrono::Duration::seconds(300));
        let mut tracked = self.first_seen.lock();
        let expired: Vec<(NodeId, ChunkKey)> = tracked
            .iter()
            .filter(|(_, &seen)| now - seen > grace)
            .map(|(pair, _)| pair.clone())
            .collect();
        for pair in &expired {
            tracked.remove(pair);
        }
        expired
    }

    pub fn tracked_count(&self) -> usize {
        self.first_seen.lock().len()
    }
}

impl Default for UnclaimedChunks {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodically sweeps `UnclaimedChunks` and deletes whatever has aged
/// past its grace period from the node that reported it, the same
/// tick-loop-plus-watch-shutdown shape `HeartbeatMonitor` and the
/// re-replication engine's sweep loop use.
pub struct GcSweeper {
    pub unclaimed: std::sync::Arc<UnclaimedChunks>,
    pub registry: std::sync::Arc<crate::registry::NodeRegistry>,
    pub sweep_interval: Duration,
    pub grace_period: Duration,
}

impl GcSweeper {
    pub fn spawn(
        self: std::sync::Arc<Self>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let expired = self.unclaimed.sweep_expired(chrono::Utc::now(), self.grace_period);
                        for (node, key) in expired {
                            let Some(descriptor) = self.registry.get(&node) else { continue };
                            match crate::node_client::delete_chunk(&descriptor.endpoint(), &key).await {
                                Ok(()) => tracing::info!(
                                    node_id = %node, key = %key,
                                    "garbage collected unclaimed chunk after grace period"
                                ),
                                Err(e) => tracing::warn!(
                                    node_id = %node, key = %key, error = %e,
                                    "failed to garbage collect unclaimed chunk"
                                ),
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            tracing::info!("gc sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}
