//! Prometheus metrics for payout-service.
//!
//! HTTP counters go through the `metrics` facade and are rendered by the
//! installed Prometheus recorder; domain counters live in the default
//! `prometheus` registry. `/metrics` serves both.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Invoices created by payment method type.
pub static INVOICES_CREATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "payouts_invoices_created_total",
        "Total number of invoices created",
        &["payment_method_type"]
    )
    .expect("Failed to register invoices_created_total")
});

/// Invoiced amount in cents, fee included.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "payouts_invoice_amount_total",
        "Total invoiced amount in minor units",
        &["currency"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Processor API calls by operation and outcome.
pub static PROCESSOR_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "payouts_processor_requests_total",
        "Total number of payment processor requests",
        &["operation", "outcome"]
    )
    .expect("Failed to register processor_requests_total")
});

/// Webhook deliveries by event type and outcome.
pub static WEBHOOK_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "payouts_webhook_events_total",
        "Total number of payout webhook events",
        &["event_type", "outcome"] // applied, ignored, out_of_order, rejected, failed
    )
    .expect("Failed to register webhook_events_total")
});

/// Notification jobs by kind and outcome.
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "payouts_notifications_total",
        "Total number of notification jobs",
        &["kind", "outcome"]
    )
    .expect("Failed to register notifications_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "payouts_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "payouts_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Install the Prometheus recorder for the `metrics` facade. Safe to call more than once.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
    }

    Lazy::force(&INVOICES_CREATED_TOTAL);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
    Lazy::force(&PROCESSOR_REQUESTS_TOTAL);
    Lazy::force(&WEBHOOK_EVENTS_TOTAL);
    Lazy::force(&NOTIFICATIONS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Render all metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        output.push_str(&String::from_utf8_lossy(&buffer));
    }

    output
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

pub fn record_webhook_event(event_type: &str, outcome: &str) {
    WEBHOOK_EVENTS_TOTAL
        .with_label_values(&[event_type, outcome])
        .inc();
}

pub fn record_notification(kind: &str, outcome: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[kind, outcome]).inc();
}
