//! Local staging area for chunked uploads.
//!
//! Each in-progress upload owns one directory named by the whole-file digest.
//! Chunks are plain files named by their decimal index:
//!
//! ```text
//! <root>/<digest>/0
//! <root>/<digest>/1
//! <root>/<digest>/.2.<uuid>.part   (receipt in progress)
//! ```
//!
//! The directory mtime is the session's "last touched" time. Every completed
//! receipt renames a file into the directory, which refreshes it, so the sweeper
//! never reclaims a session that is still receiving chunks.

use crate::error::{StorageError, StorageResult};
use crate::traits::ByteStream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use stash_core::{ContentDigest, StagingStats, SweepStats};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;
use uuid::Uuid;

/// Read buffer used when streaming chunks back out (1 MiB).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Digest-partitioned chunk staging on local disk.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
    max_chunk_size: u64,
}

impl ChunkStore {
    /// Open a staging area, creating the root directory if needed.
    pub async fn new(root: impl AsRef<Path>, max_chunk_size: u64) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            max_chunk_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_chunk_size(&self) -> u64 {
        self.max_chunk_size
    }

    /// Directory holding the chunks of one upload.
    pub fn session_dir(&self, digest: &ContentDigest) -> PathBuf {
        self.root.join(digest.to_hex())
    }

    fn chunk_path(&self, digest: &ContentDigest, index: u32) -> PathBuf {
        self.session_dir(digest).join(index.to_string())
    }

    /// Whether any staging state exists for `digest`.
    pub async fn session_exists(&self, digest: &ContentDigest) -> StorageResult<bool> {
        match fs::symlink_metadata(self.session_dir(digest)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether chunk `index` is staged with at least one byte.
    ///
    /// An empty file means a receipt that never delivered data, so the client
    /// should send the chunk again.
    pub async fn has_chunk(&self, digest: &ContentDigest, index: u32) -> StorageResult<bool> {
        match fs::symlink_metadata(self.chunk_path(digest, index)).await {
            Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Stage chunk `index`, replacing any previous copy.
    ///
    /// The body is streamed into a temp file and renamed into place, so a failed
    /// receipt never leaves a truncated chunk under its final name. Returns the
    /// number of bytes staged.
    #[instrument(skip(self, body), fields(digest = %digest))]
    pub async fn write_chunk<S, E>(
        &self,
        digest: &ContentDigest,
        index: u32,
        body: S,
    ) -> StorageResult<u64>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display,
    {
        let dir = self.session_dir(digest);
        fs::create_dir_all(&dir).await?;

        let temp_path = dir.join(format!(".{index}.{}.part", Uuid::new_v4()));
        let result = self.stream_to_file(&temp_path, index, body).await;
        let written = match result {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, self.chunk_path(digest, index)).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(index, bytes = written, "Chunk staged");
        Ok(written)
    }

    async fn stream_to_file<S, E>(&self, path: &Path, index: u32, body: S) -> StorageResult<u64>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Display,
    {
        let mut file = fs::File::create(path).await?;
        let mut written: u64 = 0;
        let mut body = std::pin::pin!(body);

        while let Some(frame) = body.next().await {
            let data = frame.map_err(|e| StorageError::Transfer(e.to_string()))?;
            written += data.len() as u64;
            if written > self.max_chunk_size {
                return Err(StorageError::ChunkTooLarge {
                    index,
                    limit: self.max_chunk_size,
                });
            }
            file.write_all(&data).await?;
        }

        file.sync_all().await?;
        Ok(written)
    }

    /// Stream the bytes of a staged chunk.
    pub async fn open_chunk(&self, digest: &ContentDigest, index: u32) -> StorageResult<ByteStream> {
        let path = self.chunk_path(digest, index);
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(format!("{digest}/{index}"))
            } else {
                StorageError::Io(e)
            }
        })?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };
        Ok(Box::pin(stream))
    }

    /// Lowest index in `0..total` with no staged bytes, if any.
    ///
    /// An empty chunk file counts as missing, the same rule as [`Self::has_chunk`].
    pub async fn first_missing(
        &self,
        digest: &ContentDigest,
        total: u32,
    ) -> StorageResult<Option<u32>> {
        for index in 0..total {
            match fs::symlink_metadata(self.chunk_path(digest, index)).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => {}
                Ok(_) => return Ok(Some(index)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Some(index)),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Delete all staging state for `digest`. Returns whether anything was removed.
    #[instrument(skip(self), fields(digest = %digest))]
    pub async fn remove_session(&self, digest: &ContentDigest) -> StorageResult<bool> {
        match fs::remove_dir_all(self.session_dir(digest)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Count staged sessions and their total size.
    pub async fn statistics(&self) -> StorageResult<StagingStats> {
        let mut stats = StagingStats {
            staging_root: self.root.clone(),
            root_exists: false,
            staged_directory_count: 0,
            total_staged_bytes: 0,
        };

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(e.into()),
        };
        stats.root_exists = true;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            stats.staged_directory_count += 1;
            stats.total_staged_bytes += dir_size(&entry.path()).await?;
        }

        Ok(stats)
    }

    /// Reclaim session directories untouched for longer than `threshold`.
    ///
    /// Only top-level directories are considered and only their own mtime counts.
    /// A failure on one directory is logged and counted; the sweep carries on.
    /// With `dry_run`, eligible directories are counted but kept.
    pub async fn sweep(&self, threshold: Duration, dry_run: bool) -> StorageResult<SweepStats> {
        let mut stats = SweepStats::default();

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(root = %self.root.display(), "Staging root missing, nothing to sweep");
                return Ok(stats);
            }
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(root = %self.root.display(), error = %e, "Failed to read staging entry");
                    stats.errors += 1;
                    break;
                }
            };
            let path = entry.path();
            let meta = match fs::symlink_metadata(&path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to stat staging entry");
                    stats.errors += 1;
                    continue;
                }
            };
            if !meta.is_dir() {
                continue;
            }
            stats.directories_scanned += 1;

            let modified = match meta.modified() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Staging directory has no mtime");
                    stats.errors += 1;
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= threshold {
                stats.directories_active += 1;
                continue;
            }

            match reclaim_dir(&path, dry_run).await {
                Ok(bytes) => {
                    stats.directories_deleted += 1;
                    stats.bytes_reclaimed += bytes;
                    tracing::info!(
                        path = %path.display(),
                        bytes,
                        age_secs = age.as_secs(),
                        dry_run,
                        "Reclaimed stale staging directory"
                    );
                }
                Err((bytes, e)) => {
                    stats.errors += 1;
                    tracing::warn!(
                        path = %path.display(),
                        bytes,
                        last_modified = %OffsetDateTime::from(modified),
                        error = %e,
                        "Failed to reclaim staging directory"
                    );
                }
            }
        }

        Ok(stats)
    }
}

/// Size a directory and delete it. On failure, reports the size measured so far.
async fn reclaim_dir(path: &Path, dry_run: bool) -> Result<u64, (u64, std::io::Error)> {
    let measured = dir_size(path).await;
    remove_measured(path, measured, dry_run).await
}

/// Delete `path` whatever its size measurement returned. An unsized directory counts as 0 bytes.
async fn remove_measured(
    path: &Path,
    measured: std::io::Result<u64>,
    dry_run: bool,
) -> Result<u64, (u64, std::io::Error)> {
    let bytes = match measured {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to size staging directory");
            0
        }
    };
    if !dry_run {
        fs::remove_dir_all(path).await.map_err(|e| (bytes, e))?;
    }
    Ok(bytes)
}

/// Total size of regular files under `path`. Symlinks are not followed.
async fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    let mut stack = vec![path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                match entry.metadata().await {
                    Ok(meta) => total += meta.len(),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
    }
    Ok(total)
}
