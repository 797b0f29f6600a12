//! Unified error type for meshstore
//!
//! This is a behavioural taxonomy, not a type hierarchy: each variant
//! corresponds to one failure category — validation, capacity,
//! integrity, transport, or liveness.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MeshError>;

#[derive(Error, Debug)]
pub enum MeshError {
    // ===== Validation =====
    #[error("invalid file id: {0}")]
    InvalidFileId(String),

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("empty file upload rejected")]
    EmptyFile,

    #[error("replication factor must be >= 1, got {0}")]
    InvalidReplicationFactor(i64),

    // ===== Capacity =====
    #[error("node out of capacity: used {used} + incoming {incoming} > capacity {capacity}")]
    OutOfCapacity {
        used: u64,
        incoming: u64,
        capacity: u64,
    },

    #[error("insufficient replicas for chunk {0}: could not place on enough healthy nodes")]
    InsufficientReplicas(String),

    #[error("insufficient placement candidates: need {need}, have {have}")]
    InsufficientCapacity { need: usize, have: usize },

    // ===== Integrity =====
    #[error("checksum mismatch for chunk {key}: expected {expected}, computed {computed}")]
    WrongChecksum {
        key: String,
        expected: String,
        computed: String,
    },

    #[error("chunk corrupted on read: {0}")]
    CorruptOnRead(String),

    // ===== Storage-level results that are not hard errors =====
    #[error("chunk not found: {0}")]
    Missing(String),

    #[error("chunk already present with a different checksum: {0}")]
    AlreadyPresentMismatch(String),

    // ===== Transport =====
    #[error("connection to {peer} failed: {reason}")]
    ConnectionFailed { peer: String, reason: String },

    #[error("rpc to {peer} timed out after {timeout_secs}s")]
    Timeout { peer: String, timeout_secs: u64 },

    #[error("malformed frame: {0}")]
    Protocol(String),

    // ===== Liveness =====
    #[error("node {0} is not healthy")]
    NodeUnhealthy(String),

    #[error("chunk unavailable: all replicas failed for {0}")]
    ChunkUnavailable(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("duplicate node registration with different endpoint: {0}")]
    DuplicateRegistration(String),

    // ===== I/O =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MeshError {
    /// True for errors that are validation failures at the boundary and
    /// must never be logged as a failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MeshError::InvalidFileId(_)
                | MeshError::InvalidNodeId(_)
                | MeshError::EmptyFile
                | MeshError::InvalidReplicationFactor(_)
        )
    }
}
