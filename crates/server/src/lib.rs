//! HTTP ingestion server for stash.
//!
//! This crate provides the upload control plane:
//! - Whole-file and per-chunk existence checks
//! - Chunk receipt into local staging
//! - Merge with digest verification and catalog commit
//! - Direct upload and signed preview URLs
//! - Staging reclamation (scheduled and manual)

pub mod error;
pub mod handlers;
pub mod ingest;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod sweeper;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
