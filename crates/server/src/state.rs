//! Application state shared across handlers.

use stash_core::config::AppConfig;
use stash_metadata::MetadataStore;
use stash_storage::{ChunkStore, ObjectStore};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Durable object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Catalog and sweep history.
    pub metadata: Arc<dyn MetadataStore>,
    /// Local chunk staging area.
    pub chunk_store: Arc<ChunkStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Configuration problems are logged here; the binary validates and
    /// refuses to start before this point.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        chunk_store: ChunkStore,
    ) -> Self {
        if let Err(error) = config.validate() {
            tracing::warn!(%error, "Configuration warning");
        }
        if chunk_store.max_chunk_size() != config.server.max_chunk_size {
            tracing::warn!(
                staging_limit = chunk_store.max_chunk_size(),
                configured_limit = config.server.max_chunk_size,
                "Chunk store limit differs from server.max_chunk_size"
            );
        }

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            chunk_store: Arc::new(chunk_store),
        }
    }
}
