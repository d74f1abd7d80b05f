//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use stash_core::config::{AppConfig, MetadataConfig, StagingConfig, StorageConfig};
use stash_metadata::{MetadataStore, SqliteStore};
use stash_server::{AppState, create_router};
use stash_storage::{ChunkStore, FilesystemBackend, ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub storage_path: PathBuf,
    pub staging_path: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::with_backends(modifier, |storage| storage, |metadata| metadata).await
    }

    /// Create a test server whose storage and metadata are wrapped before use.
    pub async fn with_backends<F, S, M>(modifier: F, wrap_storage: S, wrap_metadata: M) -> Self
    where
        F: FnOnce(&mut AppConfig),
        S: FnOnce(Arc<dyn ObjectStore>) -> Arc<dyn ObjectStore>,
        M: FnOnce(Arc<dyn MetadataStore>) -> Arc<dyn MetadataStore>,
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let staging_path = temp_dir.path().join("staging");
        let db_path = temp_dir.path().join("metadata.db");

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: storage_path.clone(),
        };
        config.staging = StagingConfig {
            root: staging_path.clone(),
        };
        config.metadata = MetadataConfig::Sqlite { path: db_path.clone() };
        modifier(&mut config);

        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );
        let chunk_store = ChunkStore::new(&staging_path, config.server.max_chunk_size)
            .await
            .expect("Failed to create chunk store");

        stash_server::metrics::register_metrics();

        let state = AppState::new(
            config,
            wrap_storage(storage),
            wrap_metadata(metadata),
            chunk_store,
        );
        let router = create_router(state.clone());

        Self {
            router,
            state,
            storage_path,
            staging_path,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Send a request and decode the JSON response body.
    pub async fn request(&self, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Body::empty()).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body_bytes).unwrap_or(Value::Null))
    }

    /// PUT one chunk and assert it was accepted.
    pub async fn put_chunk(&self, digest: &str, index: u32, data: &[u8]) -> Value {
        let (status, body) = self
            .request(
                "PUT",
                &format!("/v1/uploads/{digest}/chunks/{index}"),
                Body::from(data.to_vec()),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "chunk {index} rejected: {body}");
        body
    }

    /// Merge staged chunks with only the required fields.
    pub async fn merge(&self, digest: &str, file_name: &str, chunk_total: u32) -> (StatusCode, Value) {
        self.post_json(
            &format!("/v1/uploads/{digest}/merge"),
            &serde_json::json!({ "file_name": file_name, "chunk_total": chunk_total }),
        )
        .await
    }

    /// Number of objects in the filesystem store.
    pub async fn object_count(&self) -> usize {
        self.state.storage.list("").await.unwrap().len()
    }
}
