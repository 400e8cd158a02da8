// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the node labeler.
//!
//! All metrics use the namespace prefix `node_labeler_`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Track reconciliation passes and their outcomes
//! - **Label Operation Metrics** - Track individual kubectl set/remove/read calls
//! - **Retry Metrics** - Track how often kubectl invocations are retried
//!
//! # Example
//!
//! ```rust,no_run
//! use node_labeler::metrics::{gather_metrics, record_reconciliation_success};
//!
//! record_reconciliation_success(std::time::Duration::from_secs(1));
//! println!("{}", gather_metrics().unwrap());
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all node labeler metrics
const METRICS_NAMESPACE: &str = "node_labeler";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via the `/metrics`
/// endpoint of `node-labeler watch`.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliation passes by outcome
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliation passes by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation passes in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliation passes in seconds",
    )
    .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 180.0, 600.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Number of user labels currently recorded as applied
pub static APPLIED_LABELS: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_applied_labels"),
        "Number of user-configured labels currently applied to the node",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Label Operation Metrics
// ============================================================================

/// Total number of label operations by kind and outcome
///
/// Labels:
/// - `operation`: `set-label`, `remove-label`, or `read-labels`
/// - `status`: `success` or `error`
pub static LABEL_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_label_operations_total"),
        "Total number of kubectl label operations by operation and status",
    );
    let counter = CounterVec::new(opts, &["operation", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Retry Metrics
// ============================================================================

/// Total number of retried kubectl invocations by operation
pub static COMMAND_RETRIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_command_retries_total"),
        "Total number of failed kubectl attempts that were retried",
    );
    let counter = CounterVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Recording Helpers
// ============================================================================

/// Record a successful reconciliation pass
pub fn record_reconciliation_success(duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&["success"]).inc();
    RECONCILIATION_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record a failed reconciliation pass
pub fn record_reconciliation_error(duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&["error"]).inc();
    RECONCILIATION_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record the outcome of a single label operation
pub fn record_label_operation(operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    LABEL_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

/// Record one retried kubectl attempt
pub fn record_command_retry(operation: &str) {
    COMMAND_RETRIES_TOTAL.with_label_values(&[operation]).inc();
}

/// Record how many user labels are currently applied
#[allow(clippy::cast_precision_loss)]
pub fn record_applied_labels(count: usize) {
    APPLIED_LABELS.set(count as f64);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
