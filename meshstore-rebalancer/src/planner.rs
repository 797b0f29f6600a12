//! Turns detected issues into concrete copy tasks: pick a healthy source
//! and a placement target for each missing replica.

use crate::client::{LoadClient, PlacementClient};
use crate::detector::{Issue, Severity};
use meshstore_core::chunk::ChunkKey;
use meshstore_core::ids::NodeId;

#[derive(Debug, Clone)]
pub struct RepairTask {
    pub key: ChunkKey,
    pub source: NodeId,
    pub source_addr: String,
    pub target: NodeId,
    pub target_addr: String,
    pub severity: Severity,
}

pub struct Planner;

impl Planner {
    /// Builds one task per missing replica. Issues whose surviving node
    /// set is empty (nothing to copy from) or whose addresses cannot be
    /// resolved are dropped — they stay under-replicated and are picked
    /// up again by the next sweep once a node re-registers.
    pub fn plan(
        issues: &[Issue],
        load: &dyn LoadClient,
        placement: &dyn PlacementClient,
    ) -> Vec<RepairTask> {
        let mut tasks = Vec::new();

        for issue in issues {
            let chunk = &issue.chunk;
            let missing = chunk.target.saturating_sub(chunk.current_nodes.len() as u32);
            if missing == 0 {
                continue;
            }

            let Some(source) = chunk
                .current_nodes
                .iter()
                .min_by_key(|n| load.utilisation(n))
                .cloned()
            else {
                continue;
            };
            let Some(source_addr) = load.endpoint(&source) else {
                continue;
            };

            let targets = placement.select(missing as usize, &chunk.current_nodes);
            for target in targets {
                let Some(target_addr) = load.endpoint(&target) else {
                    continue;
                };
                tasks.push(RepairTask {
                    key: chunk.key.clone(),
                    source: source.clone(),
                    source_addr: source_addr.clone(),
                    target,
                    target_addr,
                    severity: issue.severity,
                });
            }
        }

        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshstore_core::ids::FileId;
    use std::collections::HashMap;
    use std::collections::HashSet;

    struct FakeLoad(HashMap<NodeId, (u64, String)>);
    impl LoadClient for FakeLoad {
        fn utilisation(&self, node: &NodeId) -> u64 {
            self.0.get(node).map(|(u, _)| *u).unwrap_or(u64::MAX)
        }
        fn endpoint(&self, node: &NodeId) -> Option<String> {
            self.0.get(node).map(|(_, a)| a.clone())
        }
    }

    struct FakePlacement(Vec<NodeId>);
    impl PlacementClient for FakePlacement {
        fn select(&self, k: usize, exclude: &HashSet<NodeId>) -> Vec<NodeId> {
            self.0
                .iter()
                .filter(|n| !exclude.contains(n))
                .take(k)
                .cloned()
                .collect()
        }
    }

    #[test]
    fn plans_one_task_per_missing_replica() {
        let file = FileId::generate();
        let mut current = HashSet::new();
        current.insert(NodeId::new("a"));
        let issue = Issue {
            chunk: crate::client::UnderReplicatedChunk {
                key: ChunkKey::new(file, 0),
                current_nodes: current,
                target: 3,
            },
            severity: Severity::Degraded,
        };

        let placement = FakePlacement(vec![NodeId::new("b"), NodeId::new("c")]);

        let mut load_map = HashMap::new();
        load_map.insert(NodeId::new("a"), (10, "10.0.0.1:9000".to_string()));
        load_map.insert(NodeId::new("b"), (5, "10.0.0.2:9000".to_string()));
        load_map.insert(NodeId::new("c"), (5, "10.0.0.3:9000".to_string()));
        let load = FakeLoad(load_map);

        let tasks = Planner::plan(&[issue], &load, &placement);
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.source == NodeId::new("a")));
    }

    #[test]
    fn fully_replicated_chunk_yields_no_task() {
        let file = FileId::generate();
        let mut current = HashSet::new();
        current.insert(NodeId::new("a"));
        current.insert(NodeId::new("b"));
        current.insert(NodeId::new("c"));
        let issue = Issue {
            chunk: crate::client::UnderReplicatedChunk {
                key: ChunkKey::new(file, 0),
                current_nodes: current,
                target: 3,
            },
            severity: Severity::Degraded,
        };
        let load = FakeLoad(HashMap::new());
        let placement = FakePlacement(vec![]);
        assert!(Planner::plan(&[issue], &load, &placement).is_empty());
    }
}
