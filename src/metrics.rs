//! Metrics collection for batch runs
//!
//! Provides Prometheus-compatible metrics for monitoring run outcomes,
//! item throughput and concurrency.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    /// Counter for completed runs
    static ref BATCH_RUNS: IntCounterVec = register_int_counter_vec!(
        "pbatch_runs_total",
        "Total number of batch runs",
        &["policy", "status"]
    ).unwrap();

    /// Histogram for run duration, join included
    static ref RUN_DURATION: HistogramVec = register_histogram_vec!(
        "pbatch_run_duration_seconds",
        "Batch run duration in seconds",
        &["policy"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0]
    ).unwrap();

    /// Counter for processed items
    static ref ITEMS: IntCounterVec = register_int_counter_vec!(
        "pbatch_items_total",
        "Total number of processed items",
        &["outcome"]
    ).unwrap();

    /// Gauge for tasks currently holding a limiter slot
    static ref IN_FLIGHT: IntGauge = register_int_gauge!(
        "pbatch_in_flight_tasks",
        "Number of item tasks currently running"
    ).unwrap();
}

/// Metrics recorder for one run
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector {
    policy: &'static str,
}

impl MetricsCollector {
    /// Create a recorder labelled with the run's policy
    pub fn new(policy: &'static str) -> Self {
        Self { policy }
    }

    /// Record an item task starting
    pub fn record_task_start(&self) {
        IN_FLIGHT.inc();
    }

    /// Record an item task ending with `outcome` (`succeeded`, `failed`, `panicked`)
    pub fn record_task_end(&self, outcome: &str) {
        IN_FLIGHT.dec();
        ITEMS.with_label_values(&[outcome]).inc();
    }

    /// Record the end of the run
    pub fn record_run(&self, status: &str, duration: f64) {
        BATCH_RUNS.with_label_values(&[self.policy, status]).inc();
        RUN_DURATION.with_label_values(&[self.policy]).observe(duration);
    }
}

/// Timer for measuring run duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    #[inline]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in seconds
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Export metrics in Prometheus text format
pub fn export_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e).into())
}
