//! Placement policy: choose target nodes for new replicas, maximising
//! diversity and/or free space.

use crate::config::PlacementStrategy;
use crate::registry::NodeRegistry;
use meshstore_core::ids::NodeId;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;

pub struct Placement {
    registry: Arc<NodeRegistry>,
    strategy: PlacementStrategy,
}

impl Placement {
    pub fn new(registry: Arc<NodeRegistry>, strategy: PlacementStrategy) -> Self {
        Self { registry, strategy }
    }

    /// Candidates: HEALTHY, not in `exclude`, with at least `min_free_bytes`
    /// free. Returns fewer than `k` if that's all that qualifies — the
    /// caller decides whether that's `InsufficientCapacity`.
    pub fn select(&self, k: usize, exclude: &HashSet<NodeId>, min_free_bytes: u64) -> Vec<NodeId> {
        let mut candidates: Vec<_> = self
            .registry
            .healthy()
            .into_iter()
            .filter(|n| !exclude.contains(&n.node_id))
            .filter(|n| {
                let free = n.capacity_bytes.saturating_sub(n.metrics.bytes_stored);
                n.capacity_bytes == 0 || free >= min_free_bytes
            })
            .collect();

        match self.strategy {
            PlacementStrategy::LeastLoaded => {
                candidates.sort_by_key(|n| std::cmp::Reverse(free_bytes(n)));
            }
            PlacementStrategy::Diverse => {
                // Sort by free-bytes descending, then interleave by a
                // secondary hash key so replicas of adjacent chunks don't
                // cluster onto the same handful of roomiest nodes.
                candidates.sort_by_key(|n| {
                    (
                        std::cmp::Reverse(free_bytes(n)),
                        hash_key(n.node_id.as_str()),
                    )
                });
            }
            PlacementStrategy::Random => {
                candidates.shuffle(&mut rand::thread_rng());
            }
        }

        candidates.into_iter().take(k).map(|n| n.node_id).collect()
    }
}

fn free_bytes(n: &meshstore_core::node::NodeDescriptor) -> u64 {
    if n.capacity_bytes == 0 {
        u64::MAX
    } else {
        n.capacity_bytes.saturating_sub(n.metrics.bytes_stored)
    }
}

fn hash_key(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Adapter so `meshstore-rebalancer` can select repair targets without
/// depending on this crate's concrete types.
impl meshstore_rebalancer::PlacementClient for Placement {
    fn select(&self, k: usize, exclude: &HashSet<NodeId>) -> Vec<NodeId> {
        Placement::select(self, k, exclude, 0)
    }
}
