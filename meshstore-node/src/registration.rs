//! Node -> coordinator registration.

use anyhow::{anyhow, Context};
use meshstore_protocol::frame::{read_frame, write_frame};
use meshstore_protocol::messages::RegisterRequest;
use meshstore_protocol::MessageKind;
use tokio::net::TcpStream;
use tracing::info;

pub async fn register(
    coordinator_addr: &str,
    node_id: &str,
    host: &str,
    port: u16,
    capacity: u64,
    bandwidth: u64,
) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect(coordinator_addr)
        .await
        .with_context(|| format!("connecting to coordinator at {coordinator_addr}"))?;

    write_frame(
        &mut stream,
        MessageKind::REGISTER,
        &RegisterRequest {
            node_id: node_id.into(),
            host: host.to_string(),
            port,
            capacity,
            bandwidth,
        },
    )
    .await?;

    let reply = read_frame(&mut stream).await?;
    if reply.kind == MessageKind::OK {
        info!(node_id, coordinator = coordinator_addr, "registered with coordinator");
        Ok(())
    } else {
        let err: meshstore_protocol::messages::ErrReply =
            meshstore_protocol::frame::parse_payload(&reply)?;
        Err(anyhow!("registration rejected: {}", err.message))
    }
}
