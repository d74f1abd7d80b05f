//! Sweep history repository.

use crate::error::MetadataResult;
use crate::models::SweepRunRow;
use async_trait::async_trait;

#[async_trait]
pub trait SweepRepo: Send + Sync {
    /// Record a finished sweep.
    async fn record_sweep_run(&self, run: &SweepRunRow) -> MetadataResult<()>;

    /// Most recent sweeps, newest first.
    async fn recent_sweep_runs(&self, limit: u32) -> MetadataResult<Vec<SweepRunRow>>;
}
