//! HTTP request handlers.

pub mod admin;
pub mod media;
pub mod uploads;

pub use admin::*;
pub use media::*;
pub use uploads::*;

use crate::error::{ApiError, ApiResult};
use stash_core::ContentDigest;

/// Parse a digest path segment. Upper-case hex is accepted.
pub(crate) fn parse_digest(s: &str) -> ApiResult<ContentDigest> {
    ContentDigest::from_hex(s).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Parse a chunk index path segment.
pub(crate) fn parse_index(s: &str) -> ApiResult<u32> {
    s.parse::<u32>()
        .map_err(|_| ApiError::BadRequest(format!("invalid chunk index: {s}")))
}
