//! Prometheus metrics for the bimgate server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus
//! scraping and MUST be network-restricted to authorized scraper IPs at
//! the infrastructure level. It can be disabled entirely with
//! `server.metrics_enabled = false`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static UPDATE_REQUESTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bimgate_update_requests_total",
        "Total number of authorized update requests",
    )
    .expect("metric creation failed")
});

pub static ARCHIVES_STREAMED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bimgate_archives_streamed_total",
        "Total number of update archives streamed to completion",
    )
    .expect("metric creation failed")
});

pub static ARCHIVE_ENTRIES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bimgate_archive_entries_total",
        "Total number of archive entries written",
    )
    .expect("metric creation failed")
});

pub static ARCHIVE_ENTRY_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "bimgate_archive_entry_failures_total",
        "Total number of archive entries skipped or abandoned after a transfer failure",
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(UPDATE_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ARCHIVES_STREAMED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ARCHIVE_ENTRIES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ARCHIVE_ENTRY_FAILURES.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response();
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            encoder.format_type().to_string(),
        )],
        buffer,
    )
        .into_response()
}
