//! Core domain types for the stash media ingestion service.
//!
//! This crate defines the data model shared by the storage, metadata and
//! server crates:
//! - Content digests and incremental hashing
//! - Object naming and MIME detection for committed media
//! - Chunked upload request/response types
//! - Staging sweep statistics
//! - Configuration

pub mod config;
pub mod digest;
pub mod error;
pub mod media;
pub mod sweep;
pub mod upload;

pub use digest::{ContentDigest, DigestHasher};
pub use error::{Error, Result};
pub use media::MediaRecord;
pub use sweep::{StagingStats, SweepStats, SweepTrigger};
pub use upload::{ChunkReceipt, ExistsResponse, MergeRequest, PreviewUrlResponse};

/// Maximum size of one staged chunk: 32 MiB
pub const MAX_CHUNK_SIZE: u64 = 32 * 1024 * 1024;

/// Maximum size of a single-request upload: 64 MiB
pub const MAX_DIRECT_UPLOAD_SIZE: u64 = 64 * 1024 * 1024;
