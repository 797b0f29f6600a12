//! Storage node operator-facing configuration.

use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "meshstore-node")]
#[command(about = "meshstore storage node daemon")]
#[command(version)]
pub struct NodeConfig {
    /// Stable identifier this node registers under.
    #[arg(long, env = "MESHSTORE_NODE_ID")]
    pub node_id: String,

    /// Address this node listens for coordinator RPCs on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, default_value_t = 7100)]
    pub port: u16,

    /// Declared storage capacity in bytes. 0 means unlimited.
    #[arg(long, default_value_t = 10 * 1024 * 1024 * 1024)]
    pub capacity_bytes: u64,

    /// Declared link bandwidth in bits/second.
    #[arg(long, default_value_t = 1_000_000_000)]
    pub bandwidth_bps: u64,

    #[arg(long)]
    pub coordinator_host: String,

    #[arg(long)]
    pub coordinator_port: u16,

    /// Heartbeat emission interval, seconds.
    #[arg(long, default_value_t = 3)]
    pub heartbeat_interval_secs: u64,

    /// Re-verify checksums on every read, not just on write.
    #[arg(long, default_value_t = true)]
    pub verify_on_read: bool,

    #[arg(long)]
    pub verbose: bool,
}

impl NodeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn coordinator_addr(&self) -> String {
        format!("{}:{}", self.coordinator_host, self.coordinator_port)
    }
}
