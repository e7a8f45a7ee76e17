//! Durable job ledger contract.
//!
//! The ledger owns the long-lived job record; the progress cache only holds
//! short-lived status for polling clients. The worker writes the ledger at
//! hand-off and once more when the render settles.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use reel_models::{Job, JobId};

use crate::error::{WorkerError, WorkerResult};

#[async_trait]
pub trait JobLedger: Send + Sync {
    /// Record that a worker picked the job up.
    async fn mark_processing(&self, job_id: &JobId) -> WorkerResult<()>;

    /// Record a successful render and where its output lives.
    async fn mark_completed(&self, job_id: &JobId, output: &Path) -> WorkerResult<()>;

    /// Record a failed render with its error message.
    async fn mark_failed(&self, job_id: &JobId, error: &str) -> WorkerResult<()>;
}

/// Ledger kept in process memory.
///
/// Unknown job IDs get a fresh record on first write. Updates to terminal
/// records are ignored.
#[derive(Debug, Default)]
pub struct InMemoryJobLedger {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl InMemoryJobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending job.
    pub fn register(&self, job_id: JobId) -> WorkerResult<()> {
        self.update(&job_id, |_| true)
    }

    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.lock().ok()?.get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(&self, job_id: &JobId, apply: impl FnOnce(&mut Job) -> bool) -> WorkerResult<()> {
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| WorkerError::ledger_failed("ledger lock poisoned"))?;
        let job = jobs
            .entry(job_id.clone())
            .or_insert_with(|| Job::new(job_id.clone()));
        if !apply(job) {
            debug!(job_id = %job_id, status = %job.status, "Ignored update to settled job");
        }
        Ok(())
    }
}

#[async_trait]
impl JobLedger for InMemoryJobLedger {
    async fn mark_processing(&self, job_id: &JobId) -> WorkerResult<()> {
        self.update(job_id, |job| job.start())
    }

    async fn mark_completed(&self, job_id: &JobId, output: &Path) -> WorkerResult<()> {
        self.update(job_id, |job| job.complete(output))
    }

    async fn mark_failed(&self, job_id: &JobId, error: &str) -> WorkerResult<()> {
        self.update(job_id, |job| job.fail(error))
    }
}
