//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("invalid chunk index: {0}")]
    InvalidChunkIndex(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
