//! Periodic heartbeat emission.
//!
//! Missed emissions are not retried; the receiver infers liveness from
//! timing, so a single failed send is logged and the loop simply waits
//! for the next tick rather than retrying inline.

use crate::bandwidth::BandwidthAccountant;
use meshstore_protocol::frame::{read_frame, write_frame};
use meshstore_protocol::messages::{HeartbeatRequest, HeldChunkRef};
use meshstore_protocol::MessageKind;
use meshstore_storage::ChunkStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

pub struct HeartbeatSender {
    pub node_id: String,
    pub coordinator_addr: String,
    pub store: Arc<dyn ChunkStore>,
    pub bandwidth: Arc<BandwidthAccountant>,
    pub interval: Duration,
}

impl HeartbeatSender {
    /// Spawn the heartbeat loop as a background task, returning its
    /// handle so the caller can abort it on shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.send_once().await {
                    warn!(node_id = %self.node_id, error = %e, "heartbeat send failed, will retry next tick");
                }
            }
        })
    }

    async fn send_once(&self) -> anyhow::Result<()> {
        let chunks: Vec<HeldChunkRef> = self
            .store
            .list_chunks()
            .into_iter()
            .map(|(key, _size)| HeldChunkRef {
                file_id: key.file_id,
                index: key.index,
            })
            .collect();

        let stats = self.store.stats();
        let req = HeartbeatRequest {
            node_id: self.node_id.as_str().into(),
            used_bytes: stats.bytes_used,
            utilisation: self.bandwidth.network_utilisation(),
            chunks,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        };

        let mut stream = TcpStream::connect(&self.coordinator_addr).await?;
        write_frame(&mut stream, MessageKind::HEARTBEAT, &req).await?;
        let reply = read_frame(&mut stream).await?;
        debug!(node_id = %self.node_id, kind = %reply.kind, "heartbeat acked");
        Ok(())
    }
}
