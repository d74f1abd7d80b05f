//! Prometheus metrics for the stash server.
//!
//! Covers chunk receipt, merges, dedup hits and staging reclamation. Metrics
//! carry no digests or file names, only aggregate counts and timings.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Chunk receipt
pub static CHUNKS_RECEIVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_chunks_received_total",
        "Total number of chunks staged",
    )
    .expect("metric creation failed")
});

pub static CHUNK_BYTES_RECEIVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_chunk_bytes_received_total",
        "Total bytes staged across all chunks",
    )
    .expect("metric creation failed")
});

pub static CHUNK_RECEIVE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "stash_chunk_receive_duration_seconds",
            "Time taken to stage a single chunk",
        )
        .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .expect("metric creation failed")
});

// Merge
pub static MERGES_COMMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_merges_committed_total",
        "Total number of merges committed to the catalog",
    )
    .expect("metric creation failed")
});

pub static MERGE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "stash_merge_duration_seconds",
            "Time taken to assemble, store and commit a merged file",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
    )
    .expect("metric creation failed")
});

pub static MERGE_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("stash_merge_failures_total", "Total merge failures by kind"),
        &["kind"],
    )
    .expect("metric creation failed")
});

// Dedup
pub static DEDUP_HITS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stash_dedup_hits_total",
            "Total requests answered from an existing catalog record",
        ),
        &["source"],
    )
    .expect("metric creation failed")
});

pub static DIRECT_UPLOADS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_direct_uploads_total",
        "Total number of single-request uploads stored",
    )
    .expect("metric creation failed")
});

// Sweeper
pub static SWEEP_RUNS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("stash_sweep_runs_total", "Total staging sweeps by trigger"),
        &["trigger"],
    )
    .expect("metric creation failed")
});

pub static SWEEP_DIRECTORIES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_sweep_directories_deleted_total",
        "Total stale staging directories reclaimed",
    )
    .expect("metric creation failed")
});

pub static SWEEP_BYTES_RECLAIMED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_sweep_bytes_reclaimed_total",
        "Total bytes reclaimed from staging",
    )
    .expect("metric creation failed")
});

pub static SWEEP_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_sweep_errors_total",
        "Total staging directories that could not be reclaimed",
    )
    .expect("metric creation failed")
});

pub static SWEEP_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new("stash_sweep_duration_seconds", "Staging sweep duration")
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["trigger"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests and embedded routers may call it freely.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(CHUNKS_RECEIVED.clone()),
            Box::new(CHUNK_BYTES_RECEIVED.clone()),
            Box::new(CHUNK_RECEIVE_DURATION.clone()),
            Box::new(MERGES_COMMITTED.clone()),
            Box::new(MERGE_DURATION.clone()),
            Box::new(MERGE_FAILURES.clone()),
            Box::new(DEDUP_HITS.clone()),
            Box::new(DIRECT_UPLOADS.clone()),
            Box::new(SWEEP_RUNS.clone()),
            Box::new(SWEEP_DIRECTORIES_DELETED.clone()),
            Box::new(SWEEP_BYTES_RECLAIMED.clone()),
            Box::new(SWEEP_ERRORS.clone()),
            Box::new(SWEEP_DURATION.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a failed merge by kind.
pub fn record_merge_failure(kind: &str) {
    MERGE_FAILURES.with_label_values(&[kind]).inc();
}

/// Record a request answered from an existing record.
pub fn record_dedup_hit(source: &str) {
    DEDUP_HITS.with_label_values(&[source]).inc();
}
