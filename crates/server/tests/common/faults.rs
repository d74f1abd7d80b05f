//! Backends that fail on demand, wrapping real ones.

use async_trait::async_trait;
use bytes::Bytes;
use stash_metadata::models::{MediaRecordRow, SweepRunRow};
use stash_metadata::repos::{CatalogRepo, SweepRepo};
use stash_metadata::{MetadataError, MetadataResult, MetadataStore};
use stash_storage::{ByteStream, ObjectMeta, ObjectStore, StorageError, StorageResult, StreamingUpload};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn backend_down() -> StorageError {
    StorageError::S3(Box::new(std::io::Error::other("backend unavailable")))
}

/// Object store whose streaming writes fail while `failing` is set.
#[allow(dead_code)]
pub struct FlakyObjectStore {
    inner: Arc<dyn ObjectStore>,
    failing: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl FlakyObjectStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

struct FlakyUpload {
    inner: Box<dyn StreamingUpload>,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl StreamingUpload for FlakyUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(backend_down());
        }
        self.inner.write(data).await
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        self.inner.finish().await
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.inner.abort().await
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(key).await
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(backend_down());
        }
        self.inner.put(key, data, content_type).await
    }

    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
    ) -> StorageResult<Box<dyn StreamingUpload>> {
        let inner = self.inner.put_stream(key, content_type).await?;
        Ok(Box::new(FlakyUpload {
            inner,
            failing: self.failing.clone(),
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.inner.signed_url(key, ttl).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Metadata store whose record upserts fail while `failing` is set.
#[allow(dead_code)]
pub struct FlakyMetadataStore {
    inner: Arc<dyn MetadataStore>,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl FlakyMetadataStore {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: AtomicBool::new(true),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogRepo for FlakyMetadataStore {
    async fn get_record(&self, id: &str) -> MetadataResult<Option<MediaRecordRow>> {
        self.inner.get_record(id).await
    }

    async fn record_exists(&self, id: &str) -> MetadataResult<bool> {
        self.inner.record_exists(id).await
    }

    async fn upsert_record(&self, row: &MediaRecordRow) -> MetadataResult<MediaRecordRow> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MetadataError::Io(std::io::Error::other("database is locked")));
        }
        self.inner.upsert_record(row).await
    }
}

#[async_trait]
impl SweepRepo for FlakyMetadataStore {
    async fn record_sweep_run(&self, run: &SweepRunRow) -> MetadataResult<()> {
        self.inner.record_sweep_run(run).await
    }

    async fn recent_sweep_runs(&self, limit: u32) -> MetadataResult<Vec<SweepRunRow>> {
        self.inner.recent_sweep_runs(limit).await
    }
}

#[async_trait]
impl MetadataStore for FlakyMetadataStore {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}
