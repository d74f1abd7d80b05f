//! Database models mapping to the metadata schema.

use crate::error::{MetadataError, MetadataResult};
use sqlx::FromRow;
use stash_core::{ContentDigest, MediaRecord, SweepStats, SweepTrigger};
use time::OffsetDateTime;
use uuid::Uuid;

/// A committed media file. `id` is the lowercase hex content digest.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct MediaRecordRow {
    pub id: String,
    pub owner_id: i64,
    pub owner_name: String,
    pub filename: String,
    pub file_type: String,
    pub mime_type: String,
    pub tags: Option<String>,
    pub bucket: String,
    pub storage_path: String,
    pub url: String,
    pub byte_size: i64,
    pub status: String,
    pub audit_status: String,
    pub remark: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl MediaRecordRow {
    /// Convert into the client-facing record.
    pub fn into_record(self) -> MetadataResult<MediaRecord> {
        let id = ContentDigest::from_hex(&self.id)
            .map_err(|e| MetadataError::CorruptRow(format!("media_files.id {}: {e}", self.id)))?;
        let byte_size = u64::try_from(self.byte_size).map_err(|_| {
            MetadataError::CorruptRow(format!("media_files.byte_size {}", self.byte_size))
        })?;
        Ok(MediaRecord {
            id,
            owner_id: self.owner_id,
            owner_name: self.owner_name,
            filename: self.filename,
            file_type: self.file_type,
            mime_type: self.mime_type,
            tags: self.tags,
            bucket: self.bucket,
            storage_path: self.storage_path,
            url: self.url,
            byte_size,
            status: self.status,
            audit_status: self.audit_status,
            remark: self.remark,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// One completed reclamation sweep.
#[derive(Debug, Clone, FromRow)]
pub struct SweepRunRow {
    pub run_id: Uuid,
    /// `scheduled` or `manual`.
    pub trigger: String,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub dry_run: bool,
    pub stats_json: String,
}

impl SweepRunRow {
    pub fn new(
        trigger: SweepTrigger,
        started_at: OffsetDateTime,
        finished_at: OffsetDateTime,
        dry_run: bool,
        stats: &SweepStats,
    ) -> MetadataResult<Self> {
        Ok(Self {
            run_id: Uuid::new_v4(),
            trigger: trigger.as_str().to_string(),
            started_at,
            finished_at,
            dry_run,
            stats_json: serde_json::to_string(stats)?,
        })
    }

    pub fn stats(&self) -> MetadataResult<SweepStats> {
        Ok(serde_json::from_str(&self.stats_json)?)
    }
}
