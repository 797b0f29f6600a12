//! Runs repair tasks with bounded concurrency and per-chunk retry/backoff.
//! Each task moves PENDING -> IN_FLIGHT -> {DONE, FAILED}, retrying with
//! exponential backoff before settling on FAILED.

use crate::client::{ReplicaIndexClient, TransferClient};
use crate::config::RebalancerConfig;
use crate::planner::RepairTask;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: RepairTask,
    pub result: TaskResult,
    pub attempts: u32,
}

pub struct Executor {
    semaphore: Arc<Semaphore>,
    config: RebalancerConfig,
}

impl Executor {
    pub fn new(config: RebalancerConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_parallel)),
            config,
        }
    }

    pub async fn execute_all(
        &self,
        tasks: Vec<RepairTask>,
        transfer: Arc<dyn TransferClient>,
        replica: Arc<dyn ReplicaIndexClient>,
    ) -> Vec<TaskOutcome> {
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let semaphore = self.semaphore.clone();
            let transfer = transfer.clone();
            let replica = replica.clone();
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                Self::run_one(task, transfer, replica, &config).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "repair task panicked"),
            }
        }
        outcomes
    }

    async fn run_one(
        task: RepairTask,
        transfer: Arc<dyn TransferClient>,
        replica: Arc<dyn ReplicaIndexClient>,
        config: &RebalancerConfig,
    ) -> TaskOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = transfer
                .copy_chunk(&task.key, &task.source_addr, &task.target_addr)
                .await;

            match outcome {
                Ok(()) => {
                    if let Err(e) = replica
                        .register_replica(task.key.clone(), task.target.clone())
                        .await
                    {
                        warn!(key = %task.key, error = %e, "repair succeeded but replica index update failed");
                    }
                    info!(key = %task.key, target = %task.target, attempt, "chunk re-replicated");
                    return TaskOutcome {
                        task,
                        result: TaskResult::Done,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!(key = %task.key, target = %task.target, attempt, error = %e, "repair attempt failed");
                    if attempt >= config.max_attempts {
                        warn!(key = %task.key, "chunk remains degraded until next sweep");
                        return TaskOutcome {
                            task,
                            result: TaskResult::Failed,
                            attempts: attempt,
                        };
                    }
                    let backoff = config
                        .backoff_base
                        .saturating_mul(1 << (attempt - 1))
                        .min(config.backoff_cap);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
