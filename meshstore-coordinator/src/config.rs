//! Coordinator configuration: daemon-wide tunables parsed from CLI
//! flags or environment variables.

use clap::{Parser, ValueEnum};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlacementStrategy {
    Diverse,
    LeastLoaded,
    Random,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "meshstore-coordinator")]
#[command(about = "meshstore cluster coordinator daemon")]
#[command(version)]
pub struct CoordinatorConfig {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, default_value_t = 7000)]
    pub port: u16,

    /// Heartbeat-monitor tick interval, seconds.
    #[arg(long, default_value_t = 1)]
    pub tick_interval_secs: u64,

    /// A node is declared FAILED after this many seconds without a
    /// heartbeat.
    #[arg(long, default_value_t = 30)]
    pub failure_timeout_secs: u64,

    /// Default replication factor for uploads that don't specify one.
    #[arg(long, default_value_t = 3)]
    pub replication_factor: u32,

    #[arg(long, value_enum, default_value_t = PlacementStrategy::Diverse)]
    pub placement_strategy: PlacementStrategy,

    /// Re-replication periodic sweep interval, seconds.
    #[arg(long, default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Concurrent re-replication tasks.
    #[arg(long, default_value_t = 4)]
    pub max_rereplication_parallel: usize,

    /// Per-target put retries before a replacement target is chosen.
    #[arg(long, default_value_t = 3)]
    pub max_put_retries: u32,

    /// How often to sweep for unclaimed chunks past their grace period.
    #[arg(long, default_value_t = 30)]
    pub gc_sweep_interval_secs: u64,

    /// How long a chunk a node reports but the replica index doesn't
    /// claim is left alone before it's deleted from that node.
    #[arg(long, default_value_t = 300)]
    pub gc_grace_period_secs: u64,

    #[arg(long)]
    pub verbose: bool,
}

impl CoordinatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn failure_timeout(&self) -> Duration {
        Duration::from_secs(self.failure_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn gc_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.gc_sweep_interval_secs)
    }

    pub fn gc_grace_period(&self) -> Duration {
        Duration::from_secs(self.gc_grace_period_secs)
    }
}
