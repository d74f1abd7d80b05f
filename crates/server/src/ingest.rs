//! Merge-and-commit and direct upload.
//!
//! Both paths end the same way: bytes land in the object store under a
//! date-and-digest key, then a single catalog upsert makes them visible.
//! A record is only ever written after its object is fully stored.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    DIRECT_UPLOADS, MERGE_DURATION, MERGES_COMMITTED, record_dedup_hit, record_merge_failure,
};
use crate::state::AppState;
use bytes::Bytes;
use futures::StreamExt;
use stash_core::media::{
    AUDIT_APPROVED, FILE_TYPE_IMAGE, FILE_TYPE_VIDEO, STATUS_ACTIVE, mime_for_filename,
    object_path, validate_file_name,
};
use stash_core::{ContentDigest, DigestHasher, MediaRecord, MergeRequest};
use stash_metadata::models::MediaRecordRow;
use stash_storage::{ChunkStore, StorageError, StreamingUpload};
use std::time::Instant;
use time::OffsetDateTime;
use tracing::instrument;

/// Metadata for a single-request upload.
#[derive(Debug, Clone)]
pub struct DirectUpload {
    pub file_name: String,
    pub file_type: Option<String>,
    pub tags: Option<String>,
    pub remark: Option<String>,
}

/// What the catalog already knows about a digest.
enum Existing {
    None,
    /// Record and object are both present.
    Committed(MediaRecordRow),
    /// Record present but its object is gone; the next store repairs it.
    ObjectMissing(MediaRecordRow),
}

async fn lookup_existing(state: &AppState, digest: &ContentDigest) -> ApiResult<Existing> {
    let Some(row) = state.metadata.get_record(&digest.to_hex()).await? else {
        return Ok(Existing::None);
    };
    if state.storage.exists(&row.storage_path).await? {
        Ok(Existing::Committed(row))
    } else {
        tracing::warn!(
            digest = %digest,
            storage_path = %row.storage_path,
            "Catalog record exists but its object is missing, re-storing"
        );
        Ok(Existing::ObjectMissing(row))
    }
}

/// Whether a catalog record exists for `digest`.
pub async fn media_exists(state: &AppState, digest: &ContentDigest) -> ApiResult<bool> {
    let exists = state.metadata.record_exists(&digest.to_hex()).await?;
    if exists {
        record_dedup_hit("exists_check");
    }
    Ok(exists)
}

/// Assemble the staged chunks for `digest` and commit the result.
///
/// Chunks are read in ascending index order and streamed through the hasher
/// and the object store in one pass. The upload is aborted unless the
/// assembled digest matches `digest`. Staged chunks are removed only after
/// the catalog commit succeeds, except on an integrity mismatch where the
/// session is discarded.
#[instrument(skip(state, req), fields(digest = %digest, chunk_total = req.chunk_total))]
pub async fn merge_chunks(
    state: &AppState,
    digest: ContentDigest,
    req: &MergeRequest,
) -> ApiResult<MediaRecord> {
    let start_time = Instant::now();
    req.validate()?;

    let reuse_path = match lookup_existing(state, &digest).await? {
        Existing::Committed(row) => {
            record_dedup_hit("merge");
            discard_session(&state.chunk_store, &digest).await;
            let record = refresh_existing(state, row, &req.file_name, req.remark.clone()).await?;
            tracing::info!(digest = %digest, "Merge answered from existing record");
            return Ok(record);
        }
        Existing::ObjectMissing(row) => Some(row.storage_path),
        Existing::None => None,
    };

    if !state.chunk_store.session_exists(&digest).await? {
        record_merge_failure("no_staged_chunks");
        return Err(ApiError::NoStagedChunks(digest.to_hex()));
    }
    if let Some(index) = state
        .chunk_store
        .first_missing(&digest, req.chunk_total)
        .await?
    {
        record_merge_failure("missing_chunk");
        tracing::info!(digest = %digest, index, "Merge requested with a chunk missing");
        return Err(ApiError::MissingChunk { index });
    }

    let now = OffsetDateTime::now_utc();
    let storage_path =
        reuse_path.unwrap_or_else(|| object_path(now.date(), &digest, &req.file_name));
    let content_type = mime_for_filename(&req.file_name);

    let mut upload = state
        .storage
        .put_stream(&storage_path, &content_type)
        .await
        .inspect_err(|_| record_merge_failure("storage"))?;

    let (actual, total_bytes) =
        match assemble(&state.chunk_store, &digest, req.chunk_total, &mut upload).await {
            Ok(result) => result,
            Err(e) => {
                abort_upload(upload, &storage_path).await;
                return Err(match e {
                    AssembleError::Missing(index) => {
                        record_merge_failure("missing_chunk");
                        ApiError::MissingChunk { index }
                    }
                    AssembleError::Staging(e) => {
                        record_merge_failure("staging");
                        e.into()
                    }
                    AssembleError::Storage(e) => {
                        record_merge_failure("storage");
                        e.into()
                    }
                });
            }
        };

    if actual != digest {
        record_merge_failure("integrity");
        abort_upload(upload, &storage_path).await;
        tracing::warn!(
            expected = %digest,
            actual = %actual,
            bytes = total_bytes,
            "Merged content does not match its digest, discarding session"
        );
        discard_session(&state.chunk_store, &digest).await;
        return Err(ApiError::IntegrityMismatch {
            expected: digest.to_hex(),
            actual: actual.to_hex(),
        });
    }

    upload
        .finish()
        .await
        .inspect_err(|_| record_merge_failure("storage"))?;

    if let Some(declared) = req.file_size
        && declared != total_bytes
    {
        tracing::warn!(
            digest = %digest,
            declared,
            actual = total_bytes,
            "Declared file size differs from merged size"
        );
    }

    let row = new_row(
        state,
        &digest,
        &req.file_name,
        req.file_type.as_deref().unwrap_or(FILE_TYPE_VIDEO),
        req.tags.clone(),
        req.remark.clone(),
        storage_path,
        content_type,
        total_bytes,
        now,
    )?;
    let record = commit_record(state, &row)
        .await
        .inspect_err(|_| record_merge_failure("catalog"))?;

    discard_session(&state.chunk_store, &digest).await;

    MERGES_COMMITTED.inc();
    MERGE_DURATION.observe(start_time.elapsed().as_secs_f64());
    tracing::info!(
        digest = %digest,
        bytes = total_bytes,
        storage_path = %record.storage_path,
        "Merge committed"
    );

    Ok(record)
}

/// Store a small file sent in one request.
///
/// Content already in the catalog is not stored again; only its file name
/// and remark are refreshed.
#[instrument(skip(state, meta, data), fields(file_name = %meta.file_name, bytes = data.len()))]
pub async fn store_direct(
    state: &AppState,
    meta: &DirectUpload,
    data: Bytes,
) -> ApiResult<MediaRecord> {
    validate_file_name(&meta.file_name)?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("upload body is empty".to_string()));
    }

    let digest = ContentDigest::compute(&data);
    let reuse_path = match lookup_existing(state, &digest).await? {
        Existing::Committed(row) => {
            record_dedup_hit("direct_upload");
            return refresh_existing(state, row, &meta.file_name, meta.remark.clone()).await;
        }
        Existing::ObjectMissing(row) => Some(row.storage_path),
        Existing::None => None,
    };

    let now = OffsetDateTime::now_utc();
    let storage_path =
        reuse_path.unwrap_or_else(|| object_path(now.date(), &digest, &meta.file_name));
    let content_type = mime_for_filename(&meta.file_name);
    let byte_size = data.len() as u64;

    state.storage.put(&storage_path, data, &content_type).await?;

    let row = new_row(
        state,
        &digest,
        &meta.file_name,
        meta.file_type.as_deref().unwrap_or(FILE_TYPE_IMAGE),
        meta.tags.clone(),
        meta.remark.clone(),
        storage_path,
        content_type,
        byte_size,
        now,
    )?;
    let record = commit_record(state, &row).await?;

    DIRECT_UPLOADS.inc();
    tracing::info!(digest = %digest, bytes = byte_size, "Direct upload committed");
    Ok(record)
}

enum AssembleError {
    /// The chunk vanished or emptied after the completeness check.
    Missing(u32),
    Staging(StorageError),
    Storage(StorageError),
}

/// Stream chunks `0..chunk_total` into `upload`, hashing as they pass.
async fn assemble(
    chunk_store: &ChunkStore,
    digest: &ContentDigest,
    chunk_total: u32,
    upload: &mut Box<dyn StreamingUpload>,
) -> Result<(ContentDigest, u64), AssembleError> {
    let mut hasher = DigestHasher::new();
    let mut total_bytes: u64 = 0;

    for index in 0..chunk_total {
        let mut chunk = match chunk_store.open_chunk(digest, index).await {
            Ok(chunk) => chunk,
            Err(StorageError::NotFound(_)) => return Err(AssembleError::Missing(index)),
            Err(e) => return Err(AssembleError::Staging(e)),
        };
        let mut chunk_bytes: u64 = 0;
        while let Some(data) = chunk.next().await {
            let data = data.map_err(AssembleError::Staging)?;
            hasher.update(&data);
            chunk_bytes += data.len() as u64;
            upload.write(data).await.map_err(AssembleError::Storage)?;
        }
        // Truncated to nothing after the completeness check.
        if chunk_bytes == 0 {
            return Err(AssembleError::Missing(index));
        }
        total_bytes += chunk_bytes;
    }

    Ok((hasher.finalize(), total_bytes))
}

async fn abort_upload(upload: Box<dyn StreamingUpload>, storage_path: &str) {
    if let Err(e) = upload.abort().await {
        tracing::warn!(storage_path, error = %e, "Failed to abort object upload");
    }
}

async fn discard_session(chunk_store: &ChunkStore, digest: &ContentDigest) {
    match chunk_store.remove_session(digest).await {
        Ok(true) => tracing::debug!(digest = %digest, "Staged chunks removed"),
        Ok(false) => {}
        Err(e) => tracing::warn!(
            digest = %digest,
            error = %e,
            "Failed to remove staged chunks, leaving them for the sweeper"
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn new_row(
    state: &AppState,
    digest: &ContentDigest,
    file_name: &str,
    file_type: &str,
    tags: Option<String>,
    remark: Option<String>,
    storage_path: String,
    mime_type: String,
    byte_size: u64,
    now: OffsetDateTime,
) -> ApiResult<MediaRecordRow> {
    let byte_size = i64::try_from(byte_size)
        .map_err(|_| ApiError::BadRequest(format!("file size {byte_size} is too large")))?;
    Ok(MediaRecordRow {
        id: digest.to_hex(),
        owner_id: state.config.tenant.owner_id,
        owner_name: state.config.tenant.owner_name.clone(),
        filename: file_name.to_string(),
        file_type: file_type.to_string(),
        mime_type,
        tags,
        bucket: state.config.catalog_bucket().to_string(),
        url: state.config.catalog.url_for(&storage_path),
        storage_path,
        byte_size,
        status: STATUS_ACTIVE.to_string(),
        audit_status: AUDIT_APPROVED.to_string(),
        remark,
        created_at: now,
        updated_at: now,
    })
}

/// Re-commit an existing record under a new file name.
async fn refresh_existing(
    state: &AppState,
    mut row: MediaRecordRow,
    file_name: &str,
    remark: Option<String>,
) -> ApiResult<MediaRecord> {
    row.filename = file_name.to_string();
    if remark.is_some() {
        row.remark = remark;
    }
    row.updated_at = OffsetDateTime::now_utc();
    commit_record(state, &row).await
}

/// The catalog commit: one atomic upsert keyed by digest.
async fn commit_record(state: &AppState, row: &MediaRecordRow) -> ApiResult<MediaRecord> {
    let stored = state.metadata.upsert_record(row).await?;
    Ok(stored.into_record()?)
}
