//! Re-replication engine configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RebalancerConfig {
    /// Target replication factor chunks are repaired up to.
    pub replication_factor: u32,

    /// How often the periodic sweep runs, absent a failure trigger.
    pub sweep_interval: Duration,

    /// At most this many chunks are repaired concurrently
    /// (token-bucket style semaphore, not a queue-per-node).
    pub max_parallel: usize,

    /// Attempts per chunk before it is left degraded until next sweep.
    pub max_attempts: u32,

    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RebalancerConfig {
    fn default() -> Self {
        Self {
            replication_factor: 3,
            sweep_interval: Duration::from_secs(60),
            max_parallel: 4,
            max_attempts: 3,
            backoff_base: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(300),
        }
    }
}
