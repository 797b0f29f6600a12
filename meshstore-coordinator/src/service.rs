//! Coordinator service: the RPC dispatcher tying registry, replica
//! index, upload/download coordinators and the re-replication trigger
//! together. One task per accepted connection, requests on a
//! connection handled sequentially — same scheduling model as the
//! storage node server.

use crate::download::DownloadCoordinator;
use crate::gc::UnclaimedChunks;
use crate::monitor::HeartbeatMonitor;
use crate::registry::{NodeRegistry, RegisterOutcome};
use crate::replica_index::ReplicaIndex;
use crate::upload::UploadCoordinator;
use meshstore_core::chunk::ChunkKey;
use meshstore_protocol::frame::{parse_payload, read_body, read_frame, write_body, write_frame};
use meshstore_protocol::messages::*;
use meshstore_protocol::MessageKind;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct CoordinatorService {
    pub registry: Arc<NodeRegistry>,
    pub replica_index: Arc<ReplicaIndex>,
    pub monitor: Arc<HeartbeatMonitor>,
    pub upload: Arc<UploadCoordinator>,
    pub download: Arc<DownloadCoordinator>,
    pub gc: Arc<UnclaimedChunks>,
    pub default_replication: u32,
    pub rereplication_trigger: mpsc::Sender<()>,
}

impl CoordinatorService {
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let service = self.clone();
            tokio::spawn(async move {
                if let Err(e) = service.handle_connection(stream).await {
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

            let kind = frame.kind;
            if kind == MessageKind::REGISTER {
                self.handle_register(&mut stream, &frame).await?;
            } else if kind == MessageKind::HEARTBEAT {
                self.handle_heartbeat(&mut stream, &frame).await?;
            } else if kind == MessageKind::UPLOAD_BEGIN {
                self.handle_upload_begin(&mut stream, &frame).await?;
            } else if kind == MessageKind::UPLOAD_CHUNK {
                self.handle_upload_chunk(&mut stream, &frame).await?;
            } else if kind == MessageKind::UPLOAD_COMMIT {
                self.handle_upload_commit(&mut stream, &frame).await?;
            } else if kind == MessageKind::DOWNLOAD {
                self.handle_download(&mut stream, &frame).await?;
            } else if kind == MessageKind::STATUS {
                self.handle_status(&mut stream).await?;
            } else if kind == MessageKind::DELETE_FILE {
                self.handle_delete_file(&mut stream, &frame).await?;
            } else if kind == MessageKind::LIST_FILES {
                self.handle_list_files(&mut stream).await?;
            } else if kind == MessageKind::TRIGGER_REREPLICATION {
                self.handle_trigger_rereplication(&mut stream).await?;
            } else {
                write_err(&mut stream, format!("unsupported message kind {kind}")).await?;
            }
        }
    }

    async fn handle_register<S: AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()> {
        let req: RegisterRequest = parse_payload(frame)?;
        let outcome = self.registry.register(
            req.node_id.clone(),
            req.host,
            req.port,
            req.capacity,
            req.bandwidth,
        );
        self.monitor.state.on_register(req.node_id.clone(), chrono::Utc::now());
        match outcome {
            RegisterOutcome::Registered => info!(node_id = %req.node_id, "node registered"),
            RegisterOutcome::AlreadyRegisteredSameEndpoint => {
                debug!(node_id = %req.node_id, "idempotent re-registration")
            }
            RegisterOutcome::Replaced => {
                warn!(node_id = %req.node_id, "node re-registered with a different endpoint; old entry decommissioned")
            }
        }
        write_frame(stream, MessageKind::OK, &OkReply::default()).await?;
        Ok(())
    }

    async fn handle_heartbeat<S: AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()> {
        let req: HeartbeatRequest = parse_payload(frame)?;
        let now = chrono::Utc::now();
        let known = self
            .registry
            .record_heartbeat(&req.node_id, req.used_bytes, req.chunks.len() as u64, now);
        if !known {
            write_err(stream, format!("unknown node: {}", req.node_id)).await?;
            return Ok(());
        }
        self.monitor.record_heartbeat(&req.node_id, now);

        let reported: HashSet<ChunkKey> = req
            .chunks
            .iter()
            .map(|c| ChunkKey::new(c.file_id.clone(), c.index))
            .collect();
        let outcome = self.replica_index.reconcile(&req.node_id, &reported);
        if !outcome.missing.is_empty() {
            warn!(
                node_id = %req.node_id,
                missing = outcome.missing.len(),
                "node no longer reports chunks the replica index expected it to hold; scheduling re-replication"
            );
            let _ = self.rereplication_trigger.try_send(());
        }
        let unclaimed: HashSet<&ChunkKey> = outcome.unclaimed.iter().collect();
        for key in &reported {
            if unclaimed.contains(key) {
                self.gc.observe(req.node_id.clone(), key.clone(), now);
            } else {
                self.gc.clear(&req.node_id, key);
            }
        }

        debug!(node_id = %req.node_id, used_bytes = req.used_bytes, "heartbeat received");
        write_frame(stream, MessageKind::OK, &OkReply::default()).await?;
        Ok(())
    }

    async fn handle_upload_begin<S: AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()> {
        let req: UploadBeginRequest = parse_payload(frame)?;
        let replication = if req.replication == 0 {
            self.default_replication
        } else {
            req.replication
        };
        match self.upload.begin(req.display_name, req.total_size, replication) {
            Ok((file_id, chunk_size)) => {
                write_frame(
                    stream,
                    MessageKind::VALUE_REPLY,
                    &UploadBeginReply { file_id, chunk_size },
                )
                .await?;
            }
            Err(e) => write_err(stream, e.to_string()).await?,
        }
        Ok(())
    }

    async fn handle_upload_chunk<S>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let header: UploadChunkHeader = parse_payload(frame)?;
        // The UploadChunk payload carries no explicit size — the
        // coordinator already knows it from the chunk-size table applied
        // at UploadBegin, same way it knows where the short final chunk
        // falls.
        let Some(size) = self.upload.manifests.expected_chunk_size(&header.file_id, header.index) else {
            write_err(stream, format!("unknown upload or chunk index: {}", header.file_id)).await?;
            return Ok(());
        };
        let Some(replication) = self.upload.manifests.replication_factor(&header.file_id) else {
            write_err(stream, format!("unknown upload or chunk index: {}", header.file_id)).await?;
            return Ok(());
        };
        let body = read_body(stream, size).await?;

        match self
            .upload
            .put_chunk(&header.file_id, header.index, body, replication)
            .await
        {
            Ok(()) => write_frame(stream, MessageKind::OK, &OkReply::default()).await?,
            Err(e) => write_err(stream, e.to_string()).await?,
        }
        Ok(())
    }

    async fn handle_upload_commit<S: AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()> {
        let req: UploadCommitRequest = parse_payload(frame)?;
        match self.upload.commit(&req.file_id) {
            Ok(_manifest) => write_frame(stream, MessageKind::OK, &OkReply::default()).await?,
            Err(e) => write_err(stream, e.to_string()).await?,
        }
        Ok(())
    }

    async fn handle_download<S>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let req: DownloadRequest = parse_payload(frame)?;
        let Some(manifest) = self.download.manifests.get(&req.file_id) else {
            write_err(stream, format!("file not found: {}", req.file_id)).await?;
            return Ok(());
        };

        for index in 0..manifest.chunk_count {
            match self.download.read_chunk(&req.file_id, index).await {
                Ok(data) => {
                    let checksum = meshstore_core::checksum::sha256_hex(&data);
                    write_frame(
                        stream,
                        MessageKind::CHUNK_REPLY,
                        &DownloadChunkHeader {
                            index,
                            size: data.len() as u64,
                            checksum,
                        },
                    )
                    .await?;
                    write_body(stream, &data).await?;
                }
                Err(e) => {
                    write_err(stream, e.to_string()).await?;
                    return Ok(());
                }
            }
        }
        write_frame(stream, MessageKind::OK, &OkReply::default()).await?;
        Ok(())
    }

    async fn handle_status<S: AsyncWrite + Unpin>(&self, stream: &mut S) -> anyhow::Result<()> {
        let nodes = self.registry.all();
        let total_bytes: u64 = nodes.iter().map(|n| n.capacity_bytes).sum();
        let used_bytes: u64 = nodes.iter().map(|n| n.metrics.bytes_stored).sum();

        let reply = StatusReply {
            total_nodes: self.registry.total_count() as u64,
            healthy_nodes: self.registry.healthy_count() as u64,
            total_bytes,
            used_bytes,
            file_count: self.upload.manifests.file_count() as u64,
            under_replicated_count: self.replica_index.under_replicated_count(self.default_replication) as u64,
        };
        write_frame(stream, MessageKind::VALUE_REPLY, &reply).await?;
        Ok(())
    }

    async fn handle_delete_file<S: AsyncWrite + Unpin>(
        &self,
        stream: &mut S,
        frame: &meshstore_protocol::RawFrame,
    ) -> anyhow::Result<()> {
        let req: DeleteFileRequest = parse_payload(frame)?;
        let Some(manifest) = self.upload.manifests.remove(&req.file_id) else {
            write_err(stream, format!("file not found: {}", req.file_id)).await?;
            return Ok(());
        };

        let keys: Vec<ChunkKey> = (0..manifest.chunk_count)
            .map(|i| ChunkKey::new(req.file_id.clone(), i))
            .collect();

        for key in &keys {
            let holders = self.replica_index.locations(key);
            for node_id in holders {
                if let Some(node) = self.registry.get(&node_id) {
                    let _ = crate::node_client::delete_chunk(&node.endpoint(), key).await;
                }
            }
        }
        self.replica_index.remove_file(&keys);

        info!(file_id = %req.file_id, "file deleted");
        write_frame(stream, MessageKind::OK, &OkReply::default()).await?;
        Ok(())
    }

    async fn handle_list_files<S: AsyncWrite + Unpin>(&self, stream: &mut S) -> anyhow::Result<()> {
        let files = self
            .upload
            .manifests
            .list()
            .into_iter()
            .map(|m| FileSummary {
                file_id: m.file_id,
                display_name: m.display_name,
                total_size: m.total_size,
                chunk_count: m.chunk_count,
                replication_factor: m.replication_factor,
                created_at: m.created_at,
            })
            .collect();
        write_frame(stream, MessageKind::VALUE_REPLY, &ListFilesReply { files }).await?;
        Ok(())
    }

    async fn handle_trigger_rereplication<S: AsyncWrite + Unpin>(&self, stream: &mut S) -> anyhow::Result<()> {
        let triggered = self.replica_index.under_replicated_count(self.default_replication) as u64;
        let _ = self.rereplication_trigger.try_send(());
        write_frame(
            stream,
            MessageKind::VALUE_REPLY,
            &TriggerRereplicationReply { triggered_chunks: triggered },
        )
        .await?;
        Ok(())
    }
}

async fn write_err<S: AsyncWrite + Unpin>(stream: &mut S, message: String) -> anyhow::Result<()> {
    write_frame(stream, MessageKind::ERR, &ErrReply { message }).await?;
    Ok(())
}
