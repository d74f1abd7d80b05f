//! Service configuration, loaded by the binary and passed to every layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use time::Time;
use time::macros::format_description;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum size of a single staged chunk in bytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,
    /// Maximum body size for single-request uploads.
    #[serde(default = "default_max_direct_upload_size")]
    pub max_direct_upload_size: u64,
    /// Serve Prometheus text at `/metrics`.
    /// Restrict access to this endpoint at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Default lifetime of signed preview URLs.
    #[serde(default = "default_preview_url_ttl_secs")]
    pub preview_url_ttl_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_chunk_size() -> u64 {
    crate::MAX_CHUNK_SIZE
}

fn default_max_direct_upload_size() -> u64 {
    crate::MAX_DIRECT_UPLOAD_SIZE
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_preview_url_ttl_secs() -> u64 {
    3600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_chunk_size: default_max_chunk_size(),
            max_direct_upload_size: default_max_direct_upload_size(),
            metrics_enabled: default_metrics_enabled(),
            preview_url_ttl_secs: default_preview_url_ttl_secs(),
        }
    }
}

impl ServerConfig {
    /// Default preview URL lifetime.
    pub fn preview_url_ttl(&self) -> Duration {
        Duration::from_secs(self.preview_url_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_size == 0 {
            return Err("server.max_chunk_size must be greater than 0".to_string());
        }
        if self.max_chunk_size > usize::MAX as u64 || self.max_direct_upload_size > usize::MAX as u64
        {
            return Err("server upload limits exceed addressable memory".to_string());
        }
        if self.preview_url_ttl_secs == 0 {
            return Err("server.preview_url_ttl_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Object store backend for committed media.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Objects as files under `path`.
    Filesystem {
        /// Directory holding committed objects.
        path: PathBuf,
    },
    /// An S3 bucket, optionally under a key prefix.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Custom endpoint for S3-compatible services.
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the default credential chain if not set.
        /// Leave unset to use the ambient AWS credential chain.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the default credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Reject half-specified credentials.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a non-empty bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }

    /// Bucket name recorded in catalog rows when none is configured explicitly.
    pub fn bucket_name(&self) -> &str {
        match self {
            StorageConfig::S3 { bucket, .. } => bucket,
            StorageConfig::Filesystem { .. } => "local",
        }
    }
}

/// Chunk staging area configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Root directory holding one subdirectory per in-progress upload.
    #[serde(default = "default_staging_root")]
    pub root: PathBuf,
}

fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join("stash-chunks")
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root: default_staging_root(),
        }
    }
}

/// Where the media catalog lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

/// Reclamation sweeper configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Run the sweep automatically once a day.
    #[serde(default = "default_schedule_enabled")]
    pub schedule_enabled: bool,
    /// Time of day (UTC, `HH:MM`) for the scheduled sweep.
    #[serde(default = "default_run_at")]
    pub run_at: String,
    /// Sessions untouched for longer than this are reclaimed.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Report what would be deleted without deleting it.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_run_at() -> String {
    "02:00".to_string()
}

fn default_stale_after_secs() -> u64 {
    86400 // 24 hours
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            schedule_enabled: default_schedule_enabled(),
            run_at: default_run_at(),
            stale_after_secs: default_stale_after_secs(),
            dry_run: false,
        }
    }
}

impl SweeperConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Parse `run_at` into a time of day.
    pub fn run_at_time(&self) -> crate::Result<Time> {
        Time::parse(&self.run_at, format_description!("[hour]:[minute]"))
            .map_err(|e| crate::Error::InvalidSchedule(format!("{}: {e}", self.run_at)))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.run_at_time().map_err(|e| format!("sweeper.run_at: {e}"))?;
        if self.stale_after_secs == 0 {
            return Err("sweeper.stale_after_secs must be greater than 0".to_string());
        }
        if self.stale_after_secs > i64::MAX as u64 {
            return Err(format!(
                "sweeper.stale_after_secs {} exceeds maximum value {}",
                self.stale_after_secs,
                i64::MAX
            ));
        }
        Ok(())
    }
}

/// The fixed tenant that owns every record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(default = "default_owner_id")]
    pub owner_id: i64,
    #[serde(default = "default_owner_name")]
    pub owner_name: String,
}

fn default_owner_id() -> i64 {
    1232141425
}

fn default_owner_name() -> String {
    "default".to_string()
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            owner_id: default_owner_id(),
            owner_name: default_owner_name(),
        }
    }
}

/// Catalog presentation settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Bucket name stored on records. Defaults to the storage bucket.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Base URL prefixed to the storage path to build a record's public URL.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl CatalogConfig {
    /// Public URL for an object key.
    pub fn url_for(&self, storage_path: &str) -> String {
        match self.public_base_url.as_deref() {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), storage_path),
            None => storage_path.to_string(),
        }
    }
}

/// Everything `stashd` reads at startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub tenant: TenantConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Defaults with the scheduled sweep switched off.
    ///
    /// **For testing only.** The scheduled sweep is disabled so tests drive it explicitly.
    pub fn for_testing() -> Self {
        Self {
            sweeper: SweeperConfig {
                schedule_enabled: false,
                ..SweeperConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.sweeper.validate()?;
        Ok(())
    }

    /// Bucket name stored on catalog records.
    pub fn catalog_bucket(&self) -> &str {
        self.catalog
            .bucket
            .as_deref()
            .unwrap_or_else(|| self.storage.bucket_name())
    }
}
