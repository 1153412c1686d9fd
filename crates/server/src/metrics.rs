//! Prometheus metrics for the Music Spot server.
//!
//! Covers the upload, streaming, deletion and reconciliation paths. Metrics carry no
//! song, asset or user identifiers.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it. Restrict it
//! at the network level, or turn it off with `server.metrics_enabled = false`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Upload metrics
pub static UPLOADS_COMMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "musicspot_uploads_committed_total",
        "Total number of uploads that produced a song",
    )
    .expect("metric creation failed")
});

pub static UPLOADS_REJECTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "musicspot_uploads_rejected_total",
            "Total uploads rejected by validation, by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static UPLOAD_WRITE_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "musicspot_upload_write_failures_total",
        "Total uploads that failed while writing asset segments",
    )
    .expect("metric creation failed")
});

pub static UPLOADS_ORPHANED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "musicspot_uploads_orphaned_total",
        "Total uploads whose asset was written but whose song record was not",
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "musicspot_bytes_uploaded_total",
        "Total audio bytes written to the chunk store",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "musicspot_upload_duration_seconds",
            "Time taken to write an asset and create its song",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .expect("metric creation failed")
});

// Streaming metrics
pub static STREAMS_OPENED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "musicspot_streams_opened_total",
        "Total number of asset streams opened",
    )
    .expect("metric creation failed")
});

pub static BYTES_STREAMED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "musicspot_bytes_streamed_total",
        "Total audio bytes sent to clients",
    )
    .expect("metric creation failed")
});

pub static STREAM_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "musicspot_stream_errors_total",
        "Total streams aborted by a segment read failure",
    )
    .expect("metric creation failed")
});

// Deletion metrics
pub static SONGS_DELETED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "musicspot_songs_deleted_total",
            "Total songs deleted, by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

// Reconciliation metrics
pub static ORPHANS_FOUND: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "musicspot_orphans_found",
            "Findings of the most recent reconciliation pass, by kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static ORPHANS_PURGED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "musicspot_orphans_purged_total",
        "Total orphaned or incomplete assets removed by reconciliation",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests can build several routers in one process.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(UPLOADS_COMMITTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOADS_REJECTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_WRITE_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOADS_ORPHANED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STREAMS_OPENED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_STREAMED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STREAM_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SONGS_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ORPHANS_FOUND.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ORPHANS_PURGED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus text exposition.
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

/// Record a validation rejection under a stable reason label.
pub fn record_upload_rejected(error: &musicspot_core::ValidationError) {
    use musicspot_core::ValidationError;

    let reason = match error {
        ValidationError::FileRequired => "file_required",
        ValidationError::UnsupportedFileType => "unsupported_file_type",
        ValidationError::FileTooLarge { .. } => "file_too_large",
        ValidationError::TitleAndArtistRequired => "title_and_artist_required",
        ValidationError::InvalidYear => "invalid_year",
    };
    UPLOADS_REJECTED.with_label_values(&[reason]).inc();
}
