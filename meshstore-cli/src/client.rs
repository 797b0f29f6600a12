//! Thin client for talking to a meshstore coordinator over the framed
//! wire protocol.

use anyhow::{anyhow, bail, Result};
use meshstore_core::ids::FileId;
use meshstore_protocol::frame::{parse_payload, read_body, read_frame, write_body, write_frame};
use meshstore_protocol::messages::*;
use meshstore_protocol::MessageKind;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub struct CoordinatorClient {
    addr: String,
}

impl CoordinatorClient {
    pub fn new(addr: String) -> Self {
        Self { addr }
    }

    async fn connect(&self) -> Result<TcpStream> {
        TcpStream::connect(&self.addr)
            .await
            .map_err(|e| anyhow!("could not reach coordinator at {}: {e}", self.addr))
    }

    pub async fn upload(&self, path: &Path, display_name: String, replication: u32) -> Result<FileId> {
        let mut file = File::open(path).await?;
        let total_size = file.metadata().await?.len();
        if total_size == 0 {
            bail!("refusing to upload an empty file");
        }

        let mut stream = self.connect().await?;
        write_frame(
            &mut stream,
            MessageKind::UPLOAD_BEGIN,
            &UploadBeginRequest {
                display_name,
                total_size,
                replication,
            },
        )
        .await?;
        let reply = read_frame(&mut stream).await?;
        expect_not_err(&reply)?;
        let begin: UploadBeginReply = parse_payload(&reply)?;

        let chunk_count = meshstore_core::chunk_count(total_size, begin.chunk_size);
        let mut buf = vec![0u8; begin.chunk_size as usize];

        for index in 0..chunk_count {
            let this_size = if index + 1 == chunk_count {
                total_size - begin.chunk_size * (chunk_count.saturating_sub(1)) as u64
            } else {
                begin.chunk_size
            };
            let slice = &mut buf[..this_size as usize];
            file.read_exact(slice).await?;

            write_frame(
                &mut stream,
                MessageKind::UPLOAD_CHUNK,
                &UploadChunkHeader {
                    file_id: begin.file_id.clone(),
                    index,
                },
            )
            .await?;
            write_body(&mut stream, slice).await?;

            let reply = read_frame(&mut stream).await?;
            expect_not_err(&reply)?;
        }

        write_frame(
            &mut stream,
            MessageKind::UPLOAD_COMMIT,
            &UploadCommitRequest {
                file_id: begin.file_id.clone(),
            },
        )
        .await?;
        let reply = read_frame(&mut stream).await?;
        expect_not_err(&reply)?;

        Ok(begin.file_id)
    }

    pub async fn download(&self, file_id: FileId, out_path: &Path) -> Result<u64> {
        let mut stream = self.connect().await?;
        write_frame(&mut stream, MessageKind::DOWNLOAD, &DownloadRequest { file_id }).await?;

        let mut out = File::create(out_path).await?;
        let mut total = 0u64;
        loop {
            let reply = read_frame(&mut stream).await?;
            if reply.kind == MessageKind::OK {
                break;
            }
            if reply.kind == MessageKind::ERR {
                let err: ErrReply = parse_payload(&reply)?;
                bail!(err.message);
            }
            let header: DownloadChunkHeader = parse_payload(&reply)?;
            let body = read_body(&mut stream, header.size).await?;
            let checksum = meshstore_core::checksum::sha256_hex(&body);
            if checksum != header.checksum {
                bail!("downloaded chunk {} failed checksum verification", header.index);
            }
            out.write_all(&body).await?;
            total += body.len() as u64;
        }
        Ok(total)
    }

    pub async fn list_files(&self) -> Result<Vec<FileSummary>> {
        let mut stream = self.connect().await?;
        write_frame(&mut stream, MessageKind::LIST_FILES, &ListFilesRequest {}).await?;
        let reply = read_frame(&mut stream).await?;
        expect_not_err(&reply)?;
        let list: ListFilesReply = parse_payload(&reply)?;
        Ok(list.files)
    }

    pub async fn delete_file(&self, file_id: FileId) -> Result<()> {
        let mut stream = self.connect().await?;
        write_frame(&mut stream, MessageKind::DELETE_FILE, &DeleteFileRequest { file_id }).await?;
        let reply = read_frame(&mut stream).await?;
        expect_not_err(&reply)
    }

    pub async fn status(&self) -> Result<StatusReply> {
        let mut stream = self.connect().await?;
        write_frame(&mut stream, MessageKind::STATUS, &StatusRequest {}).await?;
        let reply = read_frame(&mut stream).await?;
        expect_not_err(&reply)?;
        Ok(parse_payload(&reply)?)
    }

    pub async fn trigger_rereplication(&self) -> Result<u64> {
        let mut stream = self.connect().await?;
        write_frame(
            &mut stream,
            MessageKind::TRIGGER_REREPLICATION,
            &TriggerRereplicationRequest {},
        )
        .await?;
        let reply = read_frame(&mut stream).await?;
        expect_not_err(&reply)?;
        let body: TriggerRereplicationReply = parse_payload(&reply)?;
        Ok(body.triggered_chunks)
    }
}

fn expect_not_err(reply: &meshstore_protocol::RawFrame) -> Result<()> {
    if reply.kind == MessageKind::ERR {
        let err: ErrReply = parse_payload(reply)?;
        bail!(err.message);
    }
    Ok(())
}
