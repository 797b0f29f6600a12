//! Scans the replica index for chunks below target replication.

use crate::client::{BoxError, ReplicaIndexClient, UnderReplicatedChunk};

/// Ranks an [`UnderReplicatedChunk`] so a sweep repairs the most exposed
/// chunks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// At least one replica survives; missing is appended to the weakest.
    Degraded,
    /// Zero known replicas — the chunk is unrecoverable without this copy.
    Critical,
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub chunk: UnderReplicatedChunk,
    pub severity: Severity,
}

pub struct Detector;

impl Detector {
    pub async fn scan(
        replica_client: &dyn ReplicaIndexClient,
        target_r: u32,
    ) -> Result<Vec<Issue>, BoxError> {
        let chunks = replica_client.under_replicated(target_r).await?;
        let mut issues: Vec<Issue> = chunks
            .into_iter()
            .map(|chunk| {
                let severity = if chunk.current_nodes.is_empty() {
                    Severity::Critical
                } else {
                    Severity::Degraded
                };
                Issue { chunk, severity }
            })
            .collect();
        issues.sort_by(|a, b| b.severity.cmp(&a.severity));
        Ok(issues)
    }
}
