//! Administrative endpoints.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::sweeper::run_sweep;
use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use stash_core::{StagingStats, SweepStats, SweepTrigger};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage_backend: &'static str,
    pub staging_root_exists: bool,
}

/// GET /v1/health - Health check.
///
/// Checks metadata connectivity and that the staging root is readable.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.metadata.health_check().await?;
    let staging = state.chunk_store.statistics().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage_backend: state.storage.backend_name(),
        staging_root_exists: staging.root_exists,
    }))
}

/// GET /v1/admin/staging/stats - Staged session count and size.
pub async fn staging_stats(State(state): State<AppState>) -> ApiResult<Json<StagingStats>> {
    let stats = state.chunk_store.statistics().await?;
    Ok(Json(stats))
}

/// POST /v1/admin/staging/cleanup - Run a sweep now.
pub async fn trigger_cleanup(State(state): State<AppState>) -> ApiResult<Json<SweepStats>> {
    let stats = run_sweep(&state, SweepTrigger::Manual).await?;
    Ok(Json(stats))
}

/// Sweep run response.
#[derive(Debug, Serialize)]
pub struct SweepRunResponse {
    pub run_id: String,
    pub trigger: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: time::OffsetDateTime,
    pub dry_run: bool,
    pub stats: SweepStats,
}

/// Query parameters for listing sweep runs.
#[derive(Debug, Deserialize)]
pub struct ListSweepsParams {
    /// Maximum number of runs to return (default: 20, max: 100).
    pub limit: Option<u32>,
}

/// GET /v1/admin/staging/sweeps - Recent sweep runs, newest first.
pub async fn list_sweeps(
    State(state): State<AppState>,
    Query(params): Query<ListSweepsParams>,
) -> ApiResult<Json<Vec<SweepRunResponse>>> {
    let limit = params.limit.unwrap_or(20).min(100);
    let runs = state.metadata.recent_sweep_runs(limit).await?;

    let responses = runs
        .into_iter()
        .map(|run| {
            let stats = run
                .stats()
                .map_err(|e| ApiError::Internal(format!("failed to parse sweep stats: {e}")))?;
            Ok(SweepRunResponse {
                run_id: run.run_id.to_string(),
                trigger: run.trigger,
                started_at: run.started_at,
                finished_at: run.finished_at,
                dry_run: run.dry_run,
                stats,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(responses))
}
