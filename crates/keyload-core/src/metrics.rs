//! Central metrics registry and metric definitions
//!
//! Prometheus metrics for the load-test engine. Metrics are registered lazily
//! on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

// ===== Operation Metrics =====

/// Store operations issued by workers, by kind, outcome, and timeline phase
pub static OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "keyload_operations_total",
        "Total number of store operations issued by load-test workers",
        &["kind", "outcome", "phase"]
    )
    .expect("Failed to register operations counter")
});

/// Number of workers currently inside their run loop
pub static ACTIVE_WORKERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "keyload_active_workers",
        "Number of load-test workers currently running"
    )
    .expect("Failed to register active workers gauge")
});

// ===== Exception Recorder Metrics =====

/// Exceptions persisted to the error log store
pub static EXCEPTIONS_RECORDED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "keyload_exceptions_recorded_total",
        "Total number of exceptions persisted to the error log"
    )
    .expect("Failed to register exceptions recorded counter")
});

/// Exceptions dropped after exhausting persistence attempts
pub static RECORDER_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "keyload_recorder_failures_total",
        "Total number of exceptions that could not be persisted"
    )
    .expect("Failed to register recorder failures counter")
});

// ===== Cleanup Metrics =====

/// Rows removed by post-run cleanup, by table
pub static CLEANUP_DELETED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "keyload_cleanup_deleted_total",
        "Total number of rows deleted by cleanup",
        &["table"]
    )
    .expect("Failed to register cleanup counter")
});

/// Forces registration of every metric so a scrape sees zeroed series.
pub fn init() {
    Lazy::force(&OPERATIONS_TOTAL);
    Lazy::force(&ACTIVE_WORKERS);
    Lazy::force(&EXCEPTIONS_RECORDED);
    Lazy::force(&RECORDER_FAILURES);
    Lazy::force(&CLEANUP_DELETED);
}

/// Renders the default registry in the Prometheus text format.
pub fn export_prometheus() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", err);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_export() {
        init();
        OPERATIONS_TOTAL
            .with_label_values(&["insert", "success", "steady_state"])
            .inc();

        let output = export_prometheus();
        assert!(output.contains("keyload_operations_total"));
        assert!(output.contains("keyload_recorder_failures_total"));
    }
}
