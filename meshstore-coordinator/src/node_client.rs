//! Outgoing RPCs from the coordinator to storage nodes
//! (`PutChunk`/`GetChunk`/`DeleteChunk`/`Ping`), over the same framed
//! wire protocol the node server speaks.

use bytes::Bytes;
use meshstore_core::chunk::ChunkKey;
use meshstore_protocol::frame::{parse_payload, read_body, read_frame, write_body, write_frame};
use meshstore_protocol::messages::{
    ChunkReplyHeader, DeleteChunkRequest, ErrReply, GetChunkRequest, PingRequest, PutChunkHeader,
};
use meshstore_protocol::MessageKind;
use tokio::net::TcpStream;

pub type NodeClientResult<T> = Result<T, String>;

pub async fn put_chunk(
    addr: &str,
    key: &ChunkKey,
    data: &[u8],
    checksum: &str,
) -> NodeClientResult<()> {
    let mut stream = TcpStream::connect(addr).await.map_err(|e| e.to_string())?;
    write_frame(
        &mut stream,
        MessageKind::PUT_CHUNK,
        &PutChunkHeader {
            file_id: key.file_id.clone(),
            index: key.index,
            size: data.len() as u64,
            checksum: checksum.to_string(),
        },
    )
    .await
    .map_err(|e| e.to_string())?;
    write_body(&mut stream, data).await.map_err(|e| e.to_string())?;

    let reply = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
    expect_ok(&reply)
}

pub async fn get_chunk(addr: &str, key: &ChunkKey) -> NodeClientResult<(Bytes, String)> {
    let mut stream = TcpStream::connect(addr).await.map_err(|e| e.to_string())?;
    write_frame(
        &mut stream,
        MessageKind::GET_CHUNK,
        &GetChunkRequest {
            file_id: key.file_id.clone(),
            index: key.index,
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let reply = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
    if reply.kind == MessageKind::ERR {
        let err: ErrReply = parse_payload(&reply).map_err(|e| e.to_string())?;
        return Err(err.message);
    }
    let header: ChunkReplyHeader = parse_payload(&reply).map_err(|e| e.to_string())?;
    let body = read_body(&mut stream, header.size).await.map_err(|e| e.to_string())?;
    Ok((body, header.checksum))
}

pub async fn delete_chunk(addr: &str, key: &ChunkKey) -> NodeClientResult<()> {
    let mut stream = TcpStream::connect(addr).await.map_err(|e| e.to_string())?;
    write_frame(
        &mut stream,
        MessageKind::DELETE_CHUNK,
        &DeleteChunkRequest {
            file_id: key.file_id.clone(),
            index: key.index,
        },
    )
    .await
    .map_err(|e| e.to_string())?;
    let reply = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
    expect_ok(&reply)
}

pub async fn ping(addr: &str) -> NodeClientResult<()> {
    let mut stream = TcpStream::connect(addr).await.map_err(|e| e.to_string())?;
    write_frame(&mut stream, MessageKind::PING, &PingRequest {})
        .await
        .map_err(|e| e.to_string())?;
    let reply = read_frame(&mut stream).await.map_err(|e| e.to_string())?;
    expect_ok(&reply)
}

fn expect_ok(reply: &meshstore_protocol::RawFrame) -> NodeClientResult<()> {
    if reply.kind == MessageKind::OK {
        Ok(())
    } else {
        let err: ErrReply = parse_payload(reply).unwrap_or(ErrReply {
            message: "unexpected reply kind".to_string(),
        });
        Err(err.message)
    }
}
