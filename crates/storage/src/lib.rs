//! Object storage and chunk staging for stash.
//!
//! This crate provides:
//! - The `ObjectStore` capability used for committed media, with local
//!   filesystem and S3-compatible backends
//! - The `ChunkStore` staging area that holds partial uploads until merge,
//!   and the sweep that reclaims abandoned ones

pub mod backends;
pub mod error;
pub mod staging;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use staging::ChunkStore;
pub use traits::{ByteStream, ObjectMeta, ObjectStore, StreamingUpload};

use stash_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
    }
}
