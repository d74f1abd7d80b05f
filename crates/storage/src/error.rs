//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("chunk {index} exceeds maximum size of {limit} bytes")]
    ChunkTooLarge { index: u32, limit: u64 },

    #[error("transfer interrupted: {0}")]
    Transfer(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// True when the failure came from the local disk rather than a remote backend.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::InvalidPath(_) | Self::ChunkTooLarge { .. } | Self::Transfer(_)
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
