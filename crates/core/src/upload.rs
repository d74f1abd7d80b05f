//! Chunked upload request and response types.

use crate::digest::ContentDigest;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Request to merge staged chunks into a committed file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Original file name. Its extension names the object and picks the MIME type.
    pub file_name: String,
    /// Number of chunks the client staged, indices `0..chunk_total`.
    pub chunk_total: u32,
    /// Media type code; defaults to video for chunked uploads.
    #[serde(default)]
    pub file_type: Option<String>,
    /// Size the client believes the file has. Advisory only.
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

impl MergeRequest {
    /// Validate request fields that do not depend on server state.
    pub fn validate(&self) -> crate::Result<()> {
        crate::media::validate_file_name(&self.file_name)?;
        if self.chunk_total == 0 {
            return Err(crate::Error::InvalidChunkIndex(
                "chunk_total must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Answer to a whole-file or per-chunk existence check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

/// Acknowledgement of a received chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkReceipt {
    pub digest: ContentDigest,
    pub index: u32,
    /// Bytes staged for this chunk.
    pub size: u64,
}

/// A time-limited URL for downloading a committed file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreviewUrlResponse {
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}
