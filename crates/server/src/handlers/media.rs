//! Committed media endpoints.

use crate::error::{ApiError, ApiResult};
use crate::handlers::parse_digest;
use crate::ingest::{self, DirectUpload};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use bytes::BytesMut;
use futures::StreamExt;
use serde::Deserialize;
use stash_core::{MediaRecord, PreviewUrlResponse};
use std::time::Duration;
use time::OffsetDateTime;

/// Query parameters for a direct upload.
#[derive(Debug, Deserialize)]
pub struct DirectUploadParams {
    pub file_name: String,
    pub file_type: Option<String>,
    pub tags: Option<String>,
    pub remark: Option<String>,
}

/// POST /v1/media - Store a small file sent as the raw request body.
pub async fn upload_media(
    State(state): State<AppState>,
    Query(params): Query<DirectUploadParams>,
    body: Body,
) -> ApiResult<Json<MediaRecord>> {
    let limit = state.config.server.max_direct_upload_size;

    let mut buf = BytesMut::new();
    let mut stream = body.into_data_stream();
    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| ApiError::Transfer(e.to_string()))?;
        if (buf.len() + frame.len()) as u64 > limit {
            return Err(ApiError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&frame);
    }

    let meta = DirectUpload {
        file_name: params.file_name,
        file_type: params.file_type,
        tags: params.tags,
        remark: params.remark,
    };
    let record = ingest::store_direct(&state, &meta, buf.freeze()).await?;
    Ok(Json(record))
}

/// GET /v1/media/{digest} - Read a catalog record.
pub async fn get_media(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> ApiResult<Json<MediaRecord>> {
    let digest = parse_digest(&digest)?;
    let row = state
        .metadata
        .get_record(&digest.to_hex())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("media {digest}")))?;
    Ok(Json(row.into_record()?))
}

#[derive(Debug, Deserialize)]
pub struct PreviewUrlParams {
    pub ttl_secs: Option<u64>,
}

/// Longest preview URL lifetime a client may ask for (7 days).
const MAX_PREVIEW_TTL_SECS: u64 = 7 * 24 * 3600;

/// GET /v1/media/{digest}/url - Time-limited download URL.
pub async fn get_preview_url(
    State(state): State<AppState>,
    Path(digest): Path<String>,
    Query(params): Query<PreviewUrlParams>,
) -> ApiResult<Json<PreviewUrlResponse>> {
    let digest = parse_digest(&digest)?;
    let ttl = match params.ttl_secs {
        Some(0) => return Err(ApiError::BadRequest("ttl_secs must be positive".to_string())),
        Some(secs) if secs > MAX_PREVIEW_TTL_SECS => {
            return Err(ApiError::BadRequest(format!(
                "ttl_secs must be at most {MAX_PREVIEW_TTL_SECS}"
            )));
        }
        Some(secs) => Duration::from_secs(secs),
        None => state.config.server.preview_url_ttl(),
    };

    let row = state
        .metadata
        .get_record(&digest.to_hex())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("media {digest}")))?;

    let url = state.storage.signed_url(&row.storage_path, ttl).await?;
    let expires_at = OffsetDateTime::now_utc() + ttl;

    Ok(Json(PreviewUrlResponse { url, expires_at }))
}
