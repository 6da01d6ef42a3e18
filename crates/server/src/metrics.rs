//! Prometheus metrics for the picstash server.
//!
//! Counters cover the ingestion and deletion pipelines, including the
//! consistency events (compensating deletes and orphaned files) that
//! operators need to reconcile disk and database.
//!
//! The `/metrics` endpoint is unauthenticated; restrict it at the network
//! level when the server is publicly reachable.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static IMAGES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "picstash_images_uploaded_total",
        "Total number of images stored successfully",
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "picstash_bytes_uploaded_total",
        "Total bytes of successfully stored images",
    )
    .expect("metric creation failed")
});

pub static IMAGES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "picstash_images_deleted_total",
        "Total number of images deleted",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_REJECTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "picstash_upload_rejections_total",
            "Uploads rejected by validation, by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static COMPENSATING_DELETES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "picstash_compensating_deletes_total",
        "Files removed after a failed metadata insert",
    )
    .expect("metric creation failed")
});

pub static ORPHANED_FILES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "picstash_orphaned_files_total",
        "Files left on disk without a metadata record",
    )
    .expect("metric creation failed")
});

pub static REQUEST_TIMEOUTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "picstash_request_timeouts_total",
        "Requests aborted by the request timeout",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
/// This allows safe use in integration tests or when embedding multiple routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(IMAGES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(IMAGES_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_REJECTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COMPENSATING_DELETES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ORPHANED_FILES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(REQUEST_TIMEOUTS.clone()))
            .expect("metric registration failed");
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

/// Helper to record validation rejections by reason.
pub fn record_upload_rejection(reason: &str) {
    UPLOAD_REJECTIONS.with_label_values(&[reason]).inc();
}
