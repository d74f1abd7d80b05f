//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

/// Object content delivered piecewise.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Durable object storage for committed media.
///
/// Keys are `/`-separated relative paths such as `2024/03/07/<digest>.mp4`.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Whether `key` names a stored object.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Size and type of `key`, without its content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Read the whole object into memory.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Read the object piecewise.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Store `data` under `key`, replacing any previous object.
    ///
    /// Readers see either the old object or the new one, never a prefix.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Start a streaming upload. Nothing is visible under `key` until `finish`.
    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
    ) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Remove `key`. A missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Keys starting with `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Produce a URL granting read access to `key` for `ttl`.
    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String>;

    /// Short backend label reported by the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Startup connectivity check. Backends with nothing to check keep the default.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// What `head` reports about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    pub size: u64,
    pub last_modified: Option<time::OffsetDateTime>,
    pub content_type: Option<String>,
}

/// An object being written piece by piece, used by merge.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Append `data` to the pending object.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Publish the object and return its length.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Drop everything written so far. Nothing becomes visible.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
