//! Storage node server.
//!
//! Exposes `PutChunk`, `GetChunk`, `Ping`, and `DeleteChunk` over the
//! framed TCP protocol. One task per accepted connection; requests on a
//! single connection are handled sequentially (a client/coordinator that
//! wants concurrency opens multiple connections).

use crate::bandwidth::BandwidthAccountant;
use crate::transfer::throttle;
use meshstore_core::chunk::ChunkKey;
use meshstore_protocol::frame::{parse_payload, read_body, read_frame, write_body, write_frame};
use meshstore_protocol::messages::{
    ChunkReplyHeader, DeleteChunkRequest, ErrReply, GetChunkRequest, OkReply, PutChunkHeader,
};
use meshstore_protocol::MessageKind;
use meshstore_storage::{ChunkStore, DeleteOutcome, GetOutcome, PutOutcome};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub struct NodeServer {
    pub node_id: String,
    pub store: Arc<dyn ChunkStore>,
    pub bandwidth: Arc<BandwidthAccountant>,
    pub verify_on_read: bool,
}

impl NodeServer {
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    debug!(peer = %peer, error = %e, "connection closed");
                }
            });
        }
    }

    async fn handle_connection<S>(&self, mut stream: S) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let frame = match read_frame(&mut stream).await {
                Ok(f) => f,
                Err(meshstore_protocol::FrameError::Closed) => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            if frame.kind == MessageKind::PUT_CHUNK {
                self.handle_put(&mut stream, &frame).await?;
            } else if frame.kind == MessageKind::GET_CHUNK {
                self.handle_get(&mut stream, &frame).await?;
            } else if frame.kind == MessageKind::DELETE_CHUNK {
                self.handle_delete(&mut stream, &frame).await?;
            } else if frame.kind == MessageKind::PING {
                write_frame(&mut stream, MessageKind::OK, &OkReply::default()).await?;
            } else {
                write_err(&mut stream, format!("unsupported message kind {}", frame.kind)).await?;
            }
        }
    }

    async fn handle_put<S>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let header: PutChunkHeader = parse_payload(frame)?;
        let body = read_body(stream, header.size).await?;

        let (reservation, granted) = self.bandwidth.reserve(header.size * 8);
        let start = Instant::now();
        throttle(header.size, granted, std::time::Duration::ZERO).await;
        self.bandwidth.release(reservation);

        let key = ChunkKey::new(header.file_id.clone(), header.index);
        match self.store.put(key.clone(), body, &header.checksum) {
            PutOutcome::Stored | PutOutcome::AlreadyPresent => {
                debug!(node = %self.node_id, key = %key, elapsed_ms = start.elapsed().as_millis(), "chunk stored");
                write_frame(stream, MessageKind::OK, &OkReply::default()).await?;
            }
            PutOutcome::WrongChecksum { expected, computed } => {
                warn!(node = %self.node_id, key = %key, expected, computed, "checksum mismatch on put");
                write_err(stream, format!("checksum mismatch for {key}")).await?;
            }
            PutOutcome::OutOfCapacity { used, capacity } => {
                warn!(node = %self.node_id, key = %key, used, capacity, "out of capacity");
                write_err(stream, format!("out of capacity: {used}/{capacity}")).await?;
            }
        }
        Ok(())
    }

    async fn handle_get<S>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let req: GetChunkRequest = parse_payload(frame)?;
        let key = ChunkKey::new(req.file_id.clone(), req.index);

        match self.store.get(&key, self.verify_on_read) {
            GetOutcome::Found(data) => {
                let (reservation, granted) = self.bandwidth.reserve((data.len() as u64) * 8);
                throttle(data.len() as u64, granted, std::time::Duration::ZERO).await;
                self.bandwidth.release(reservation);

                let checksum = meshstore_core::checksum::sha256_hex(&data);
                write_frame(
                    stream,
                    MessageKind::CHUNK_REPLY,
                    &ChunkReplyHeader {
                        size: data.len() as u64,
                        checksum,
                    },
                )
                .await?;
                write_body(stream, &data).await?;
            }
            GetOutcome::Missing => {
                write_err(stream, format!("chunk not found: {key}")).await?;
            }
            GetOutcome::CorruptOnRead => {
                warn!(node = %self.node_id, key = %key, "corrupt chunk detected on read");
                write_err(stream, format!("corrupt on read: {key}")).await?;
            }
        }
        Ok(())
    }

    async fn handle_delete<S>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let req: DeleteChunkRequest = parse_payload(frame)?;
        let key = ChunkKey::new(req.file_id, req.index);
        match self.store.delete(&key) {
            DeleteOutcome::Deleted => {
                info!(node = %self.node_id, key = %key, "chunk deleted");
            }
            DeleteOutcome::Missing => {
                debug!(node = %self.node_id, key = %key, "delete of missing chunk is a no-op");
            }
        }
        write_frame(stream, MessageKind::OK, &OkReply::default()).await?;
        Ok(())
    }
}

async fn write_err<S: AsyncWrite + Unpin>(stream: &mut S, message: String) -> anyhow::Result<()> {
    write_frame(stream, MessageKind::ERR, &ErrReply { message }).await?;
    Ok(())
}
