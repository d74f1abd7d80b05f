//! Metadata store trait and SQLite implementation.

use crate::error::MetadataResult;
use crate::repos::{CatalogRepo, SweepRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: CatalogRepo + SweepRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        // One connection serializes writers, so concurrent upserts of the same
        // digest apply one after the other.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        tracing::debug!(path = %path.display(), "opened sqlite metadata store");

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;

    #[async_trait]
    impl CatalogRepo for SqliteStore {
        async fn get_record(&self, id: &str) -> MetadataResult<Option<MediaRecordRow>> {
            let row = sqlx::query_as::<_, MediaRecordRow>("SELECT * FROM media_files WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn record_exists(&self, id: &str) -> MetadataResult<bool> {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM media_files WHERE id = ?)")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(exists)
        }

        async fn upsert_record(&self, row: &MediaRecordRow) -> MetadataResult<MediaRecordRow> {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r#"
                INSERT INTO media_files (
                    id, owner_id, owner_name, filename, file_type, mime_type, tags, bucket,
                    storage_path, url, byte_size, status, audit_status, remark, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    filename = excluded.filename,
                    byte_size = excluded.byte_size,
                    storage_path = excluded.storage_path,
                    url = excluded.url,
                    mime_type = excluded.mime_type,
                    remark = excluded.remark,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&row.id)
            .bind(row.owner_id)
            .bind(&row.owner_name)
            .bind(&row.filename)
            .bind(&row.file_type)
            .bind(&row.mime_type)
            .bind(&row.tags)
            .bind(&row.bucket)
            .bind(&row.storage_path)
            .bind(&row.url)
            .bind(row.byte_size)
            .bind(&row.status)
            .bind(&row.audit_status)
            .bind(&row.remark)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(&mut *tx)
            .await?;

            let stored =
                sqlx::query_as::<_, MediaRecordRow>("SELECT * FROM media_files WHERE id = ?")
                    .bind(&row.id)
                    .fetch_one(&mut *tx)
                    .await?;

            tx.commit().await?;
            Ok(stored)
        }
    }

    #[async_trait]
    impl SweepRepo for SqliteStore {
        async fn record_sweep_run(&self, run: &SweepRunRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO sweep_runs (run_id, trigger, started_at, finished_at, dry_run, stats_json)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(run.run_id)
            .bind(&run.trigger)
            .bind(run.started_at)
            .bind(run.finished_at)
            .bind(run.dry_run)
            .bind(&run.stats_json)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn recent_sweep_runs(&self, limit: u32) -> MetadataResult<Vec<SweepRunRow>> {
            let rows = sqlx::query_as::<_, SweepRunRow>(
                "SELECT * FROM sweep_runs ORDER BY started_at DESC, rowid DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS media_files (
    id TEXT PRIMARY KEY,
    owner_id INTEGER NOT NULL,
    owner_name TEXT NOT NULL,
    filename TEXT NOT NULL,
    file_type TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    tags TEXT,
    bucket TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    url TEXT NOT NULL,
    byte_size INTEGER NOT NULL,
    status TEXT NOT NULL,
    audit_status TEXT NOT NULL,
    remark TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_media_files_owner ON media_files(owner_id);

CREATE TABLE IF NOT EXISTS sweep_runs (
    run_id BLOB PRIMARY KEY,
    trigger TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    dry_run INTEGER NOT NULL DEFAULT 0,
    stats_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sweep_runs_started ON sweep_runs(started_at);
"#;
