//! Internal event bus: the heartbeat monitor publishes, the
//! re-replication engine subscribes. Breaks the cyclic ownership a
//! direct callback from monitor into rebalancer would otherwise create.

use meshstore_core::chunk::ChunkKey;
use meshstore_core::ids::NodeId;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum NodeEvent {
    Failed(NodeId),
    Recovered(NodeId),
    /// A download observed a checksum mismatch on one replica. Not a
    /// node failure — the node stays HEALTHY, only this chunk's
    /// replica on it is evicted.
    SuspectChunk(ChunkKey),
}

pub const EVENT_BUS_CAPACITY: usize = 256;

pub fn channel() -> (broadcast::Sender<NodeEvent>, broadcast::Receiver<NodeEvent>) {
    broadcast::channel(EVENT_BUS_CAPACITY)
}
