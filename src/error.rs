//! Error types for bkindex

use crate::model::{Fingerprint, NodeId};
use thiserror::Error;

/// Result type alias for bkindex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bkindex operations
#[derive(Error, Debug)]
pub enum Error {
    /// The attach point gained a child since the path was resolved
    #[error("Stale path: node {parent} already has a child at label {label}")]
    StaleVisit { parent: NodeId, label: u32 },

    #[error("Duplicate value {value} (already indexed at node {node})")]
    DuplicateValue { value: Fingerprint, node: NodeId },

    #[error("Invalid label {label}: expected {expected}")]
    InvalidLabel { label: u32, expected: u32 },

    #[error("Malformed path: {0}")]
    MalformedPath(String),

    #[error("Value {value} does not fit in {width} bits")]
    ValueOutOfRange { value: Fingerprint, width: u16 },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid index file: {0}")]
    InvalidFile(String),

    #[error("Index file {} is locked by another handle", .0.display())]
    Locked(std::path::PathBuf),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether re-resolving and resubmitting may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StaleVisit { .. })
    }
}
