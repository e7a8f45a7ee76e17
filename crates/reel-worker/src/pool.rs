//! Bounded worker pool.
//!
//! A fixed number of workers share one bounded channel. Each worker owns a
//! job from hand-off until its render settles; when the channel is full,
//! [`WorkerPool::submit`] waits, which pushes back on the queue consumer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use reel_queue::ComposeJob;

use crate::error::{WorkerError, WorkerResult};
use crate::ledger::JobLedger;
use crate::orchestrator::RenderOrchestrator;

/// Renders one job and records the outcome in the ledger.
pub struct JobRunner {
    orchestrator: Arc<RenderOrchestrator>,
    ledger: Arc<dyn JobLedger>,
}

impl JobRunner {
    pub fn new(orchestrator: Arc<RenderOrchestrator>, ledger: Arc<dyn JobLedger>) -> Self {
        Self { orchestrator, ledger }
    }

    /// Run `job` to completion. Ledger write failures are logged; the
    /// render outcome is what gets returned.
    pub async fn run(&self, job: ComposeJob) -> WorkerResult<PathBuf> {
        let job_id = job.job_id().clone();

        if let Err(e) = self.ledger.mark_processing(&job_id).await {
            warn!(job_id = %job_id, error = %e, "Failed to mark job processing");
        }

        match self.orchestrator.compose(&job.request, &job_id).await {
            Ok(output) => {
                if let Err(e) = self.ledger.mark_completed(&job_id, &output).await {
                    error!(job_id = %job_id, error = %e, "Failed to mark job completed");
                }
                Ok(output)
            }
            Err(e) => {
                if let Err(ledger_err) = self.ledger.mark_failed(&job_id, &e.to_string()).await {
                    error!(job_id = %job_id, error = %ledger_err, "Failed to mark job failed");
                }
                Err(e.into())
            }
        }
    }
}

/// Fixed-size pool of render workers.
pub struct WorkerPool {
    sender: mpsc::Sender<ComposeJob>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers fed by a channel holding up to `capacity` jobs.
    pub fn new(size: usize, capacity: usize, runner: Arc<JobRunner>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let runner = Arc::clone(&runner);
                tokio::spawn(worker_loop(worker, receiver, runner))
            })
            .collect();

        Self { sender, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Hand `job` to the pool, waiting while the channel is full.
    pub async fn submit(&self, job: ComposeJob) -> WorkerResult<()> {
        self.sender.send(job).await.map_err(|_| WorkerError::PoolClosed)
    }

    /// Stop accepting jobs and wait up to `timeout` for queued and running
    /// jobs to settle. Returns `false` when the timeout elapsed first.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        let Self { sender, workers } = self;
        drop(sender);

        let join_all = async {
            for worker in workers {
                if let Err(e) = worker.await {
                    error!(error = %e, "Worker task panicked");
                }
            }
        };

        match tokio::time::timeout(timeout, join_all).await {
            Ok(()) => {
                info!("Worker pool drained");
                true
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Worker pool did not drain in time");
                false
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<ComposeJob>>>,
    runner: Arc<JobRunner>,
) {
    debug!(worker, "Worker started");
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let job_id = job.job_id().clone();
        match runner.run(job).await {
            Ok(output) => debug!(worker, job_id = %job_id, output = %output.display(), "Job done"),
            Err(e) => debug!(worker, job_id = %job_id, error = %e, "Job failed"),
        }
    }
    debug!(worker, "Worker stopped");
}
