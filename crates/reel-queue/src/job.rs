//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use reel_models::{CompositionRequest, JobId};

/// Job to render one composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeJob {
    /// Unique job ID
    pub job_id: JobId,
    /// The composition to render
    pub request: CompositionRequest,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl ComposeJob {
    /// Create a job with a fresh ID.
    pub fn new(request: CompositionRequest) -> Self {
        Self {
            job_id: JobId::new(),
            request,
            created_at: Utc::now(),
        }
    }

    /// Use an ID assigned by the caller (usually the ledger row ID).
    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("compose:{}", self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompositionRequest {
        serde_json::from_value(serde_json::json!({
            "title": "Queued",
            "scenes": [{ "id": "a", "media": { "type": "image", "file_id": "img" } }]
        }))
        .unwrap()
    }

    #[test]
    fn compose_job_serde_roundtrip() {
        let job = ComposeJob::new(request()).with_job_id(JobId::from_string("job-42"));

        let json = serde_json::to_string(&job).expect("serialize ComposeJob");
        assert!(json.contains("\"job_id\":\"job-42\""));

        let decoded: ComposeJob = serde_json::from_str(&json).expect("deserialize ComposeJob");
        assert_eq!(decoded, job);
    }

    #[test]
    fn idempotency_key_uses_job_id() {
        let job = ComposeJob::new(request()).with_job_id(JobId::from_string("abc"));
        assert_eq!(job.idempotency_key(), "compose:abc");
    }
}
