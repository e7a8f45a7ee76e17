//! Prometheus metrics for the render worker.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "reel_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "reel_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reel_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "reel_jobs_in_flight";
    pub const JOB_DURATION_SECONDS: &str = "reel_job_duration_seconds";
    pub const ENCODE_DURATION_SECONDS: &str = "reel_encode_duration_seconds";
    pub const TRANSITIONS_APPLIED_TOTAL: &str = "reel_transitions_applied_total";
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn install_exporter(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
    gauge!(names::JOBS_IN_FLIGHT).increment(1.0);
}

pub fn record_job_completed(duration_secs: f64, transitions: usize) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    counter!(names::TRANSITIONS_APPLIED_TOTAL).increment(transitions as u64);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
    gauge!(names::JOBS_IN_FLIGHT).decrement(1.0);
}

pub fn record_job_failed(kind: &'static str, duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
    gauge!(names::JOBS_IN_FLIGHT).decrement(1.0);
}

pub fn record_encode(duration_secs: f64) {
    histogram!(names::ENCODE_DURATION_SECONDS).record(duration_secs);
}
