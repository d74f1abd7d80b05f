//! Media catalog repository.

use crate::error::MetadataResult;
use crate::models::MediaRecordRow;
use async_trait::async_trait;

/// Repository for committed media records.
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    /// Get a record by digest.
    async fn get_record(&self, id: &str) -> MetadataResult<Option<MediaRecordRow>>;

    /// Check whether a record exists for a digest.
    async fn record_exists(&self, id: &str) -> MetadataResult<bool>;

    /// Insert a record, or update the mutable fields of an existing one.
    ///
    /// On conflict only `filename`, `byte_size`, `storage_path`, `url`,
    /// `mime_type`, `remark` and `updated_at` change. Runs as a single
    /// transaction and returns the row as stored.
    async fn upsert_record(&self, row: &MediaRecordRow) -> MetadataResult<MediaRecordRow>;
}
