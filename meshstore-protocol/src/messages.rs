//! JSON payload types for every message kind the wire protocol defines.

use meshstore_core::ids::{FileId, NodeId};
use serde::{Deserialize, Serialize};

// ===== Generic replies =====

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OkReply {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrReply {
    pub message: String,
}

// ===== 0x01 Register =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub node_id: NodeId,
    pub host: String,
    pub port: u16,
    pub capacity: u64,
    pub bandwidth: u64,
}

// ===== 0x02 Heartbeat =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeldChunkRef {
    pub file_id: FileId,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: NodeId,
    pub used_bytes: u64,
    pub utilisation: u64,
    pub chunks: Vec<HeldChunkRef>,
    /// Millisecond timestamp the node stamped this heartbeat with. Used
    /// by the FAILED -> HEALTHY tie-break: a heartbeat only wins if its
    /// timestamp is newer than what is already recorded.
    pub timestamp_ms: i64,
}

// ===== 0x10 PutChunk (header; raw bytes follow) =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutChunkHeader {
    pub file_id: FileId,
    pub index: u32,
    pub size: u64,
    pub checksum: String,
}

// ===== 0x11 GetChunk =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChunkRequest {
    pub file_id: FileId,
    pub index: u32,
}

/// Companion header sent ahead of the raw bytes on a `0x83` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReplyHeader {
    pub size: u64,
    pub checksum: String,
}

// ===== 0x12 Ping =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRequest {}

// ===== 0x13 DeleteChunk =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteChunkRequest {
    pub file_id: FileId,
    pub index: u32,
}

// ===== 0x20 UploadBegin =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBeginRequest {
    pub display_name: String,
    pub total_size: u64,
    pub replication: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBeginReply {
    pub file_id: FileId,
    pub chunk_size: u64,
}

// ===== 0x21 UploadChunk (header; raw bytes follow) =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadChunkHeader {
    pub file_id: FileId,
    pub index: u32,
}

// ===== 0x22 UploadCommit =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadCommitRequest {
    pub file_id: FileId,
}

// ===== 0x30 Download =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub file_id: FileId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadChunkHeader {
    pub index: u32,
    pub size: u64,
    pub checksum: String,
}

// ===== 0x31 DeleteFile =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteFileRequest {
    pub file_id: FileId,
}

// ===== 0x32 ListFiles =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFilesRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_id: FileId,
    pub display_name: String,
    pub total_size: u64,
    pub chunk_count: u32,
    pub replication_factor: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFilesReply {
    pub files: Vec<FileSummary>,
}

// ===== 0x40 Status =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReply {
    pub total_nodes: u64,
    pub healthy_nodes: u64,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub file_count: u64,
    pub under_replicated_count: u64,
}

// ===== 0x41 TriggerRereplication =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRereplicationRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRereplicationReply {
    pub triggered_chunks: u64,
}
