//! Reclamation of abandoned staging sessions.
//!
//! The daily scheduler and the admin trigger both go through [`run_sweep`].

use crate::error::ApiResult;
use crate::metrics::{
    SWEEP_BYTES_RECLAIMED, SWEEP_DIRECTORIES_DELETED, SWEEP_DURATION, SWEEP_ERRORS, SWEEP_RUNS,
};
use crate::state::AppState;
use stash_core::{SweepStats, SweepTrigger};
use stash_metadata::models::SweepRunRow;
use std::time::{Duration, Instant};
use time::{OffsetDateTime, Time};
use tokio::task::JoinHandle;

/// Sweep stale staging directories once and record the run.
pub async fn run_sweep(state: &AppState, trigger: SweepTrigger) -> ApiResult<SweepStats> {
    let sweeper = &state.config.sweeper;
    let threshold = sweeper.stale_after();
    let started_at = OffsetDateTime::now_utc();
    let timer = Instant::now();

    tracing::info!(
        trigger = %trigger,
        staging_root = %state.chunk_store.root().display(),
        stale_after_secs = sweeper.stale_after_secs,
        dry_run = sweeper.dry_run,
        "Staging sweep started"
    );

    let stats = state.chunk_store.sweep(threshold, sweeper.dry_run).await?;

    SWEEP_RUNS.with_label_values(&[trigger.as_str()]).inc();
    SWEEP_DURATION
        .with_label_values(&[trigger.as_str()])
        .observe(timer.elapsed().as_secs_f64());
    if !sweeper.dry_run {
        SWEEP_DIRECTORIES_DELETED.inc_by(stats.directories_deleted);
        SWEEP_BYTES_RECLAIMED.inc_by(stats.bytes_reclaimed);
    }
    SWEEP_ERRORS.inc_by(stats.errors);

    tracing::info!(
        trigger = %trigger,
        scanned = stats.directories_scanned,
        deleted = stats.directories_deleted,
        active = stats.directories_active,
        errors = stats.errors,
        bytes_reclaimed = stats.bytes_reclaimed,
        mib_reclaimed = %format!("{:.2}", stats.mib_reclaimed()),
        "Staging sweep finished"
    );

    let finished_at = OffsetDateTime::now_utc();
    match SweepRunRow::new(trigger, started_at, finished_at, sweeper.dry_run, &stats) {
        Ok(run) => {
            if let Err(e) = state.metadata.record_sweep_run(&run).await {
                tracing::warn!(error = %e, "Failed to record sweep run");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to serialize sweep stats"),
    }

    Ok(stats)
}

/// Time from `now` until the next daily occurrence of `run_at`.
///
/// A `run_at` equal to the current time schedules the following day.
pub fn next_run_delay(now: OffsetDateTime, run_at: Time) -> Duration {
    let today = now.replace_time(run_at);
    let next = if today > now {
        today
    } else {
        today + time::Duration::days(1)
    };
    Duration::try_from(next - now).unwrap_or(Duration::ZERO)
}

/// Spawn the daily sweep loop, or return `None` when scheduling is disabled.
pub fn spawn_scheduler(state: AppState) -> stash_core::Result<Option<JoinHandle<()>>> {
    if !state.config.sweeper.schedule_enabled {
        tracing::info!("Scheduled staging sweep disabled");
        return Ok(None);
    }
    let run_at = state.config.sweeper.run_at_time()?;

    let handle = tokio::spawn(async move {
        loop {
            let delay = next_run_delay(OffsetDateTime::now_utc(), run_at);
            tracing::info!(
                run_at = %state.config.sweeper.run_at,
                in_secs = delay.as_secs(),
                "Next staging sweep scheduled"
            );
            tokio::time::sleep(delay).await;

            if let Err(e) = run_sweep(&state, SweepTrigger::Scheduled).await {
                tracing::error!(error = %e, "Scheduled staging sweep failed");
            }
        }
    });
    Ok(Some(handle))
}
