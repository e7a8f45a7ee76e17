//! Job executor.
//!
//! Pulls jobs from the Redis stream and hands them to the worker pool.
//! Messages are acknowledged on hand-off; a job that fails is reported
//! through its progress record and the ledger, never retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reel_queue::{ComposeJob, JobQueue};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::pool::{JobRunner, WorkerPool};

/// How long one stream read blocks waiting for jobs.
const CONSUME_BLOCK_MS: u64 = 1000;

/// Backoff after a failed read.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Where the executor reads jobs from.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn init(&self) -> WorkerResult<()>;

    /// Read up to `count` jobs, waiting up to `block_ms` for new ones.
    async fn next_jobs(
        &self,
        consumer: &str,
        block_ms: u64,
        count: usize,
    ) -> WorkerResult<Vec<(String, ComposeJob)>>;

    async fn ack(&self, message_id: &str) -> WorkerResult<()>;
}

#[async_trait]
impl JobSource for JobQueue {
    async fn init(&self) -> WorkerResult<()> {
        Ok(JobQueue::init(self).await?)
    }

    async fn next_jobs(
        &self,
        consumer: &str,
        block_ms: u64,
        count: usize,
    ) -> WorkerResult<Vec<(String, ComposeJob)>> {
        Ok(JobQueue::consume(self, consumer, block_ms, count).await?)
    }

    async fn ack(&self, message_id: &str) -> WorkerResult<()> {
        Ok(JobQueue::ack(self, message_id).await?)
    }
}

/// Job executor that feeds queued jobs to the worker pool.
pub struct JobExecutor {
    config: WorkerConfig,
    source: Arc<dyn JobSource>,
    pool: WorkerPool,
    consumer_name: String,
}

impl JobExecutor {
    /// Create an executor and spawn its worker pool.
    pub fn new(config: WorkerConfig, source: impl JobSource + 'static, runner: Arc<JobRunner>) -> Self {
        let pool = WorkerPool::new(config.max_concurrent_jobs, config.queue_capacity, runner);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            source: Arc::new(source),
            pool,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Consume jobs until `shutdown` resolves, then drain the pool.
    ///
    /// Shutdown is checked between reads. A job already read is always
    /// handed to the pool and acknowledged before the loop stops.
    pub async fn run<F>(self, shutdown: F) -> WorkerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(
            consumer = %self.consumer_name,
            workers = self.pool.size(),
            capacity = self.config.queue_capacity,
            "Starting job executor"
        );

        self.source.init().await?;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let signal = tokio::spawn(async move {
            shutdown.await;
            let _ = stop_tx.send(true);
        });

        while !*stop_rx.borrow() {
            if let Err(e) = self.consume_jobs().await {
                error!(error = %e, "Error consuming jobs");
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    _ = stop_rx.changed() => {}
                }
            }
        }
        info!("Shutdown signal received, stopping executor");
        signal.abort();

        info!("Waiting for in-flight jobs to complete...");
        let drained = self.pool.shutdown(self.config.shutdown_timeout).await;
        info!(drained, "Job executor stopped");
        Ok(())
    }

    /// Read one job and hand it to the pool.
    ///
    /// Hand-off waits while the pool channel is full, so at most one job
    /// sits outside the pool at a time.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let jobs = self
            .source
            .next_jobs(&self.consumer_name, CONSUME_BLOCK_MS, 1)
            .await?;

        for (message_id, job) in jobs {
            let job_id = job.job_id().clone();
            self.pool.submit(job).await?;
            debug!(job_id = %job_id, message_id = %message_id, "Handed job to pool");

            if let Err(e) = self.source.ack(&message_id).await {
                warn!(job_id = %job_id, message_id = %message_id, error = %e, "Failed to ack job");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use reel_media::{Encoder, FfmpegCommand, MediaResult, ProgressCallback};
    use reel_models::{JobId, JobStatus};

    use crate::ledger::InMemoryJobLedger;
    use crate::orchestrator::tests::{request, Fixture};

    #[derive(Default)]
    struct MemorySource {
        pending: Mutex<VecDeque<(String, ComposeJob)>>,
        acked: Mutex<Vec<String>>,
    }

    impl MemorySource {
        fn remaining(&self) -> usize {
            self.pending.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl JobSource for Arc<MemorySource> {
        async fn init(&self) -> WorkerResult<()> {
            Ok(())
        }

        async fn next_jobs(
            &self,
            _consumer: &str,
            _block_ms: u64,
            count: usize,
        ) -> WorkerResult<Vec<(String, ComposeJob)>> {
            let jobs: Vec<_> = {
                let mut pending = self.pending.lock().unwrap();
                let n = count.min(pending.len());
                pending.drain(..n).collect()
            };
            if jobs.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            Ok(jobs)
        }

        async fn ack(&self, message_id: &str) -> WorkerResult<()> {
            self.acked.lock().unwrap().push(message_id.to_string());
            Ok(())
        }
    }

    /// Encoder that holds every render until the gate opens.
    struct GatedEncoder {
        gate: watch::Receiver<bool>,
    }

    #[async_trait]
    impl Encoder for GatedEncoder {
        async fn encode(&self, cmd: &FfmpegCommand, _on_progress: ProgressCallback) -> MediaResult<()> {
            let mut gate = self.gate.clone();
            let _ = gate.wait_for(|open| *open).await;
            tokio::fs::write(cmd.output(), b"rendered").await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_finishes_pending_hand_off() {
        let fixture = Fixture::new().await;
        let (gate_tx, gate_rx) = watch::channel(false);
        let orchestrator = Arc::new(fixture.orchestrator(Arc::new(GatedEncoder { gate: gate_rx })));
        let ledger = Arc::new(InMemoryJobLedger::new());
        let runner = Arc::new(JobRunner::new(orchestrator, ledger.clone()));

        let source = Arc::new(MemorySource::default());
        for id in ["1", "2", "3"] {
            let job = ComposeJob::new(request("img")).with_job_id(JobId::from_string(id));
            source.pending.lock().unwrap().push_back((id.to_string(), job));
        }

        // One busy worker and a one-slot channel: the third job waits in
        // hand-off when shutdown arrives.
        let config = WorkerConfig {
            max_concurrent_jobs: 1,
            queue_capacity: 1,
            ..WorkerConfig::default()
        };
        let executor = JobExecutor::new(config, Arc::clone(&source), runner);

        let watcher = Arc::clone(&source);
        let shutdown = async move {
            while watcher.remaining() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = gate_tx.send(true);
            });
        };

        executor.run(shutdown).await.unwrap();

        assert_eq!(*source.acked.lock().unwrap(), vec!["1", "2", "3"]);
        for id in ["1", "2", "3"] {
            let job = ledger.get(&JobId::from_string(id)).unwrap();
            assert_eq!(job.status, JobStatus::Completed);
        }
    }
}
