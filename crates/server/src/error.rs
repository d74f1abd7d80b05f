//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use stash_metadata::MetadataError;
use stash_storage::StorageError;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("chunk {index} exceeds maximum size of {limit} bytes")]
    ChunkTooLarge { index: u32, limit: u64 },

    #[error("upload exceeds maximum size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("transfer interrupted: {0}")]
    Transfer(String),

    #[error("no staged chunks for {0}")]
    NoStagedChunks(String),

    #[error("chunk {index} has not been uploaded")]
    MissingChunk { index: u32 },

    #[error("integrity mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::ChunkTooLarge { .. } => "chunk_too_large",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Transfer(_) => "transfer_error",
            Self::NoStagedChunks(_) => "no_staged_chunks",
            Self::MissingChunk { .. } => "missing_chunk",
            Self::IntegrityMismatch { .. } => "integrity_mismatch",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
            Self::Metadata(MetadataError::NotFound(_)) => "not_found",
            Self::Metadata(_) => "metadata_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ChunkTooLarge { .. } | Self::PayloadTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Transfer(_) => StatusCode::BAD_REQUEST,
            Self::NoStagedChunks(_) => StatusCode::NOT_FOUND,
            Self::MissingChunk { .. } => StatusCode::CONFLICT,
            Self::IntegrityMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // Local disk failures are ours; anything else came from the backend.
            Self::Storage(e) if e.is_local() => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(_) => StatusCode::BAD_GATEWAY,
            Self::Metadata(MetadataError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(key) => Self::NotFound(key),
            StorageError::ChunkTooLarge { index, limit } => Self::ChunkTooLarge { index, limit },
            StorageError::Transfer(msg) => Self::Transfer(msg),
            other => Self::Storage(other),
        }
    }
}

impl From<stash_core::Error> for ApiError {
    fn from(e: stash_core::Error) -> Self {
        match e {
            stash_core::Error::DigestMismatch { expected, actual } => {
                Self::IntegrityMismatch { expected, actual }
            }
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
