//! Coordinator-local error type, composed into `anyhow::Result` at the
//! `main.rs` edge.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Core(#[from] meshstore_core::MeshError),

    #[error("duplicate node registration with different endpoint: {0}")]
    DuplicateRegistration(String),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("insufficient placement candidates: need {need}, have {have}")]
    InsufficientCapacity { need: usize, have: usize },

    #[error("insufficient replicas for chunk {0}")]
    InsufficientReplicas(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("chunk unavailable: all replicas failed for {0}")]
    ChunkUnavailable(String),

    #[error("frame error: {0}")]
    Frame(#[from] meshstore_protocol::frame::FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
