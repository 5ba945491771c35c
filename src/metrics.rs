// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the shadow service operator.
//!
//! Every series is prefixed with `shadow_megaease_com_` and lives in a private
//! registry served by [`crate::http`] on `/metrics`.
//!
//! | Series | Type | Labels |
//! |--------|------|--------|
//! | `passes_total` | counter | `status` |
//! | `pass_duration_seconds` | histogram | |
//! | `resources_created_total` | counter | `resource_type` |
//! | `resources_updated_total` | counter | `resource_type` |
//! | `resources_deleted_total` | counter | `resource_type` |
//! | `errors_total` | counter | `resource_type`, `error_type` |
//! | `shadow_services_active` | gauge | |
//! | `canary_services` | gauge | |
//!
//! ```rust,no_run
//! use shadow_operator::metrics::record_pass;
//!
//! record_pass(std::time::Duration::from_secs(1), false);
//! ```

use prometheus::core::Collector;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

const PREFIX: &str = "shadow_megaease_com";

/// Pass durations range from an idle cluster (milliseconds) to a cold start
/// against a large cluster (minutes).
const PASS_DURATION_BUCKETS: &[f64] = &[0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Registry backing the `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn registered<C: Collector + Clone + 'static>(collector: C) -> C {
    METRICS_REGISTRY
        .register(Box::new(collector.clone()))
        .expect("metric names are unique");
    collector
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{PREFIX}_{name}"), help);
    registered(CounterVec::new(opts, labels).expect("valid counter definition"))
}

fn gauge(name: &str, help: &str) -> Gauge {
    registered(Gauge::new(format!("{PREFIX}_{name}"), help).expect("valid gauge definition"))
}

/// Reconciliation passes by `status` (`completed` or `cancelled`).
pub static PASSES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "passes_total",
        "Reconciliation passes by outcome",
        &["status"],
    )
});

pub static PASS_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{PREFIX}_pass_duration_seconds"),
        "Wall-clock time of one reconciliation pass",
    )
    .buckets(PASS_DURATION_BUCKETS.to_vec());
    registered(Histogram::with_opts(opts).expect("valid histogram definition"))
});

/// Shadow objects created, by `resource_type` (`Deployment`, `ConfigMap`, ...).
pub static RESOURCES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "resources_created_total",
        "Shadow objects created by kind",
        &["resource_type"],
    )
});

/// Shadow objects rewritten because they drifted from their source.
pub static RESOURCES_UPDATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "resources_updated_total",
        "Shadow objects updated by kind",
        &["resource_type"],
    )
});

/// Shadow objects removed by garbage collection.
pub static RESOURCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "resources_deleted_total",
        "Shadow objects deleted by kind",
        &["resource_type"],
    )
});

/// Per-item failures. `error_type` comes from `ShadowError::category`.
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "errors_total",
        "Per-item failures by kind and category",
        &["resource_type", "error_type"],
    )
});

pub static SHADOW_SERVICES_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "shadow_services_active",
        "ShadowService objects seen by the last pass",
    )
});

pub static CANARY_SERVICES: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "canary_services",
        "Services routed by the shadow ServiceCanary",
    )
});

pub fn record_pass(duration: Duration, cancelled: bool) {
    let status = if cancelled { "cancelled" } else { "completed" };
    PASSES_TOTAL.with_label_values(&[status]).inc();
    PASS_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_resource_created(resource_type: &str) {
    RESOURCES_CREATED_TOTAL.with_label_values(&[resource_type]).inc();
}

pub fn record_resource_updated(resource_type: &str) {
    RESOURCES_UPDATED_TOTAL.with_label_values(&[resource_type]).inc();
}

pub fn record_resource_deleted(resource_type: &str) {
    RESOURCES_DELETED_TOTAL.with_label_values(&[resource_type]).inc();
}

pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[resource_type, error_type]).inc();
}

#[allow(clippy::cast_precision_loss)]
pub fn set_shadow_services_active(count: usize) {
    SHADOW_SERVICES_ACTIVE.set(count as f64);
}

#[allow(clippy::cast_precision_loss)]
pub fn set_canary_services(count: usize) {
    CANARY_SERVICES.set(count as f64);
}

/// Encode every registered series in the Prometheus text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails or produces invalid UTF-8.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let mut out = Vec::new();
    TextEncoder::new().encode(&METRICS_REGISTRY.gather(), &mut out)?;
    String::from_utf8(out).map_err(|e| prometheus::Error::Msg(format!("metrics are not UTF-8: {e}")))
}
