//! Polled job progress record.
//!
//! This is the value written to the progress cache on every milestone and
//! read back by clients polling for status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobStatus};

/// Cached progress snapshot for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobProgress {
    /// Job identifier
    pub job_id: JobId,
    /// Current status
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable description of the current step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error message if the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the record was last updated
    pub updated_at: DateTime<Utc>,
    /// Sequence number for event ordering (monotonically increasing)
    #[serde(default)]
    pub event_seq: u64,
}

impl JobProgress {
    /// Create a pending record at 0 %.
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            progress: 0,
            message: None,
            error: None,
            updated_at: Utc::now(),
            event_seq: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `progress` while processing.
    ///
    /// Progress never decreases and stays below 100 until [`complete`]
    /// is called. Returns `false` when nothing changed.
    ///
    /// [`complete`]: JobProgress::complete
    pub fn advance(&mut self, progress: u8, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let progress = progress.min(99).max(self.progress);
        let message = message.into();
        if self.status == JobStatus::Processing
            && progress == self.progress
            && self.message.as_deref() == Some(message.as_str())
        {
            return false;
        }
        self.status = JobStatus::Processing;
        self.progress = progress;
        self.message = Some(message);
        self.touch();
        true
    }

    /// Mark the job as completed at 100 %.
    pub fn complete(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.message = Some(message.into());
        self.error = None;
        self.touch();
        true
    }

    /// Mark the job as failed, keeping the progress reached so far.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.touch();
        true
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.event_seq += 1;
    }
}
