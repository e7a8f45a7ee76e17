//! Structured job logging.
//!
//! Every render logs its lifecycle through a [`JobLogger`] so job lines
//! share the same fields (`job_id`, `operation`) and can be filtered together.

use std::path::Path;
use std::time::Duration;

use tracing::{error, info, warn, Span};
use reel_models::JobId;

/// Operation name attached to render log lines.
pub const COMPOSE_OPERATION: &str = "compose";

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a logger for `job_id` running `operation`.
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Logger for a composition render.
    pub fn compose(job_id: &JobId) -> Self {
        Self::new(job_id, COMPOSE_OPERATION)
    }

    pub fn log_start(&self, title: &str, scenes: usize, estimated_secs: u32) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            title,
            scenes,
            estimated_secs,
            "Job started"
        );
    }

    /// Log a progress milestone.
    pub fn log_progress(&self, progress: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            progress,
            "Job progress: {}", message
        );
    }

    /// Log every non-fatal issue collected while building.
    pub fn log_warnings(&self, warnings: &[String]) {
        for warning in warnings {
            warn!(
                job_id = %self.job_id,
                operation = %self.operation,
                "Job warning: {}", warning
            );
        }
    }

    pub fn log_error(&self, kind: &str, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            kind,
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, output: &Path, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            output = %output.display(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_logger() {
        let job_id = JobId::from_string("job-7");
        let logger = JobLogger::compose(&job_id);

        assert_eq!(logger.job_id(), "job-7");
        assert_eq!(logger.operation(), "compose");
    }
}
