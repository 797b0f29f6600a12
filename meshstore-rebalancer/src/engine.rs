//! Ties detector, planner and executor into the running re-replication
//! engine: a periodic sweep, plus two ways to trigger one early — a node
//! failure callback and an explicit admin request.

use crate::client::{LoadClient, PlacementClient, ReplicaIndexClient, TransferClient};
use crate::config::RebalancerConfig;
use crate::detector::Detector;
use crate::executor::{Executor, TaskOutcome};
use crate::planner::Planner;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct ReplicationEngine {
    config: RebalancerConfig,
    replica: Arc<dyn ReplicaIndexClient>,
    placement: Arc<dyn PlacementClient>,
    load: Arc<dyn LoadClient>,
    transfer: Arc<dyn TransferClient>,
    executor: Executor,
}

impl ReplicationEngine {
    pub fn new(
        config: RebalancerConfig,
        replica: Arc<dyn ReplicaIndexClient>,
        placement: Arc<dyn PlacementClient>,
        load: Arc<dyn LoadClient>,
        transfer: Arc<dyn TransferClient>,
    ) -> Self {
        let executor = Executor::new(config.clone());
        Self {
            config,
            replica,
            placement,
            load,
            transfer,
            executor,
        }
    }

    /// Runs one detect -> plan -> execute pass, returning the per-chunk
    /// outcomes. Used by the sweep loop, the failure callback and the
    /// explicit admin trigger alike — they differ only in when they call
    /// this, never in what it does.
    pub async fn run_once(&self) -> Vec<TaskOutcome> {
        let issues = match Detector::scan(self.replica.as_ref(), self.config.replication_factor).await {
            Ok(issues) => issues,
            Err(e) => {
                warn!(error = %e, "replica index scan failed; skipping this sweep");
                return Vec::new();
            }
        };
        if issues.is_empty() {
            return Vec::new();
        }
        info!(count = issues.len(), "under-replicated chunks detected");

        let tasks = Planner::plan(&issues, self.load.as_ref(), self.placement.as_ref());
        if tasks.is_empty() {
            warn!("issues detected but no repair tasks could be planned (no reachable source or target)");
            return Vec::new();
        }

        self.executor
            .execute_all(tasks, self.transfer.clone(), self.replica.clone())
            .await
    }

    /// Spawns the periodic sweep loop. `shutdown` stops it; `trigger`
    /// lets callers (the heartbeat monitor on node failure, or an admin
    /// RPC) wake it up immediately instead of waiting for the interval.
    pub fn spawn(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> (tokio::task::JoinHandle<()>, tokio::sync::mpsc::Sender<()>) {
        let (trigger_tx, mut trigger_rx) = tokio::sync::mpsc::channel::<()>(1);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        info!("periodic re-replication sweep starting");
                        self.run_once().await;
                    }
                    Some(()) = trigger_rx.recv() => {
                        info!("triggered re-replication sweep starting");
                        self.run_once().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("re-replication engine shutting down");
                            break;
                        }
                    }
                }
            }
        });
        (handle, trigger_tx)
    }
}
