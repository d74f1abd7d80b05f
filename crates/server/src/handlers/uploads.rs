//! Chunked upload endpoints.

use crate::error::ApiResult;
use crate::handlers::{parse_digest, parse_index};
use crate::ingest;
use crate::metrics::{CHUNK_BYTES_RECEIVED, CHUNK_RECEIVE_DURATION, CHUNKS_RECEIVED};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use stash_core::{ChunkReceipt, ExistsResponse, MediaRecord, MergeRequest};
use std::time::Instant;

/// GET /v1/media/{digest}/exists - Whole-file dedup check.
pub async fn check_media_exists(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> ApiResult<Json<ExistsResponse>> {
    let digest = parse_digest(&digest)?;
    let exists = ingest::media_exists(&state, &digest).await?;
    Ok(Json(ExistsResponse { exists }))
}

/// GET /v1/uploads/{digest}/chunks/{index} - Resume check for one chunk.
pub async fn check_chunk(
    State(state): State<AppState>,
    Path((digest, index)): Path<(String, String)>,
) -> ApiResult<Json<ExistsResponse>> {
    let digest = parse_digest(&digest)?;
    let index = parse_index(&index)?;
    let exists = state.chunk_store.has_chunk(&digest, index).await?;
    Ok(Json(ExistsResponse { exists }))
}

/// PUT /v1/uploads/{digest}/chunks/{index} - Stage one chunk.
///
/// The raw body is streamed to disk. Sending the same chunk again replaces it.
pub async fn upload_chunk(
    State(state): State<AppState>,
    Path((digest, index)): Path<(String, String)>,
    body: Body,
) -> ApiResult<Json<ChunkReceipt>> {
    let start_time = Instant::now();
    let digest = parse_digest(&digest)?;
    let index = parse_index(&index)?;

    let size = state
        .chunk_store
        .write_chunk(&digest, index, body.into_data_stream())
        .await?;

    CHUNKS_RECEIVED.inc();
    CHUNK_BYTES_RECEIVED.inc_by(size);
    CHUNK_RECEIVE_DURATION.observe(start_time.elapsed().as_secs_f64());

    tracing::debug!(digest = %digest, index, bytes = size, "Chunk received");

    Ok(Json(ChunkReceipt {
        digest,
        index,
        size,
    }))
}

/// POST /v1/uploads/{digest}/merge - Assemble staged chunks and commit.
pub async fn merge_upload(
    State(state): State<AppState>,
    Path(digest): Path<String>,
    Json(req): Json<MergeRequest>,
) -> ApiResult<Json<MediaRecord>> {
    let digest = parse_digest(&digest)?;
    let record = ingest::merge_chunks(&state, digest, &req).await?;
    Ok(Json(record))
}
