//! # Metrics
//!
//! Prometheus metrics for the reconciler.
//!
//! ## Metrics Exposed
//!
//! - `azurekv_operations_total` - Engine operations by operation
//! - `azurekv_operation_errors_total` - Failed engine operations by operation and error kind
//! - `azurekv_operation_duration_seconds` - Duration of engine operations
//! - `azurekv_versions_minted_total` - New secret versions minted (create or rotation)
//! - `azurekv_metadata_updates_total` - Updates that only changed metadata
//! - `azurekv_provider_requests_total` - Collaborator requests by provider and request
//! - `azurekv_provider_request_duration_seconds` - Duration of collaborator requests
//! - `azurekv_provider_request_errors_total` - Failed collaborator requests by provider

use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("azurekv_operations_total", "Total number of engine operations"),
        &["operation"],
    )
    .expect("Failed to create OPERATIONS_TOTAL metric - this should never happen")
});

static OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "azurekv_operation_errors_total",
            "Total number of failed engine operations",
        ),
        &["operation", "kind"],
    )
    .expect("Failed to create OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "azurekv_operation_duration_seconds",
            "Duration of engine operations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create OPERATION_DURATION metric - this should never happen")
});

static VERSIONS_MINTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "azurekv_versions_minted_total",
        "Total number of secret versions minted",
    )
    .expect("Failed to create VERSIONS_MINTED_TOTAL metric - this should never happen")
});

static METADATA_UPDATES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "azurekv_metadata_updates_total",
        "Total number of updates that only changed secret metadata",
    )
    .expect("Failed to create METADATA_UPDATES_TOTAL metric - this should never happen")
});

static PROVIDER_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "azurekv_provider_requests_total",
            "Total number of collaborator requests by provider",
        ),
        &["provider", "request"],
    )
    .expect("Failed to create PROVIDER_REQUESTS_TOTAL metric - this should never happen")
});

static PROVIDER_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "azurekv_provider_request_duration_seconds",
            "Duration of collaborator requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_REQUEST_DURATION metric - this should never happen")
});

static PROVIDER_REQUEST_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "azurekv_provider_request_errors_total",
            "Total number of failed collaborator requests by provider",
        ),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_REQUEST_ERRORS_TOTAL metric - this should never happen")
});

/// Register every metric with the crate registry
///
/// Safe to call more than once; already registered collectors are skipped.
///
/// # Errors
/// Returns an error if a collector cannot be registered for another reason
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(OPERATIONS_TOTAL.clone()),
        Box::new(OPERATION_ERRORS_TOTAL.clone()),
        Box::new(OPERATION_DURATION.clone()),
        Box::new(VERSIONS_MINTED_TOTAL.clone()),
        Box::new(METADATA_UPDATES_TOTAL.clone()),
        Box::new(PROVIDER_REQUESTS_TOTAL.clone()),
        Box::new(PROVIDER_REQUEST_DURATION.clone()),
        Box::new(PROVIDER_REQUEST_ERRORS_TOTAL.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Record a completed engine operation
pub fn record_operation(operation: &str, duration: f64) {
    OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_operation_errors(operation: &str, kind: &str) {
    OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation, kind])
        .inc();
}

pub fn increment_versions_minted() {
    VERSIONS_MINTED_TOTAL.inc();
}

pub fn increment_metadata_updates() {
    METADATA_UPDATES_TOTAL.inc();
}

/// Record one collaborator request (a single HTTP call, or one page)
pub fn record_provider_request(provider: &str, request: &str, duration: f64) {
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[provider, request])
        .inc();
    PROVIDER_REQUEST_DURATION
        .with_label_values(&[provider])
        .observe(duration);
}

pub fn increment_provider_request_errors(provider: &str) {
    PROVIDER_REQUEST_ERRORS_TOTAL
        .with_label_values(&[provider])
        .inc();
}

/// Render the registry in the Prometheus text exposition format
///
/// # Errors
/// Returns an error if encoding fails
pub fn gather_metrics() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
