//! Length-prefixed framed messages over TCP.
//!
//! Frame layout: 4-byte big-endian length, 1-byte message kind, JSON
//! payload. The length covers the kind byte plus the JSON payload only
//! — bulk payloads (chunk bytes) are not part of the length-prefixed
//! frame and are read/written separately by the caller once it knows,
//! from the JSON header, how many raw bytes follow.

use crate::kind::MessageKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected before allocating a buffer for
/// them — a malformed or hostile peer should not make us allocate
/// gigabytes from a forged length prefix.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed")]
    Closed,

    #[error("frame too large: {0} bytes (max {MAX_FRAME_LEN})")]
    TooLarge(u32),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// A decoded frame header: the message kind and its JSON payload, still
/// unparsed into a concrete type.
pub struct RawFrame {
    pub kind: MessageKind,
    pub payload: serde_json::Value,
}

/// Write one frame: `kind` followed by `payload` serialized as JSON.
pub async fn write_frame<W, P>(writer: &mut W, kind: MessageKind, payload: &P) -> Result<()>
where
    W: AsyncWrite + Unpin,
    P: Serialize,
{
    let json = serde_json::to_vec(payload)?;
    let len = 1 + json.len() as u32;
    writer.write_u32(len).await?;
    writer.write_u8(kind.0).await?;
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame header. Returns `Err(FrameError::Closed)` if the peer
/// closed the connection cleanly before sending a length prefix.
pub async fn read_frame<R>(reader: &mut R) -> Result<RawFrame>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::Closed)
        }
        Err(e) => return Err(e.into()),
    };

    if len == 0 {
        return Err(FrameError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "zero-length frame",
        )));
    }
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let kind = MessageKind(reader.read_u8().await?);
    let mut json_buf = vec![0u8; (len - 1) as usize];
    reader.read_exact(&mut json_buf).await?;
    let payload = serde_json::from_slice(&json_buf)?;

    Ok(RawFrame { kind, payload })
}

/// Parse a `RawFrame`'s payload into a concrete type.
pub fn parse_payload<P: DeserializeOwned>(frame: &RawFrame) -> Result<P> {
    Ok(serde_json::from_value(frame.payload.clone())?)
}

/// Read exactly `size` bytes of bulk body that follow a frame whose JSON
/// header declared that size (e.g. `PutChunk`, `UploadChunk`).
pub async fn read_body<R>(reader: &mut R, size: u64) -> Result<bytes::Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; size as usize];
    reader.read_exact(&mut buf).await?;
    Ok(bytes::Bytes::from(buf))
}

pub async fn write_body<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}
