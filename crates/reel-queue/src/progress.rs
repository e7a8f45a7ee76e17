//! Job progress cache.
//!
//! Each job owns one record keyed by its ID, overwritten on every milestone
//! (last write wins) and expired after a TTL. The cache is write-only from
//! the worker's point of view; clients poll it for status.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use reel_models::{JobId, JobProgress};

use crate::error::QueueResult;

/// Default progress record lifetime (1 hour).
pub const PROGRESS_TTL_SECS: u64 = 3600;

/// Cache key for a job's progress record.
pub fn progress_key(job_id: &JobId) -> String {
    format!("job:{}", job_id)
}

/// Storage for job progress records.
#[async_trait]
pub trait ProgressCache: Send + Sync {
    /// Store `progress`, replacing any previous record for the job.
    async fn put(&self, progress: &JobProgress) -> QueueResult<()>;

    /// Read the current record, if it exists and has not expired.
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobProgress>>;
}

/// Progress cache backed by Redis string keys with a TTL.
pub struct RedisProgressCache {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisProgressCache {
    pub fn new(redis_url: &str, ttl_secs: u64) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, ttl_secs })
    }
}

#[async_trait]
impl ProgressCache for RedisProgressCache {
    async fn put(&self, progress: &JobProgress) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = progress_key(&progress.job_id);
        let payload = serde_json::to_string(progress)?;

        conn.set_ex::<_, _, ()>(&key, payload, self.ttl_secs).await?;
        debug!(key = %key, progress = progress.progress, status = ?progress.status, "Stored progress");
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobProgress>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(progress_key(job_id)).await?;
        Ok(payload.map(|p| serde_json::from_str(&p)).transpose()?)
    }
}

/// In-process progress cache for local runs and tests.
///
/// Keeps every write per job so callers can inspect the full sequence.
#[derive(Default)]
pub struct MemoryProgressCache {
    ttl: Option<Duration>,
    entries: StdMutex<HashMap<String, (JobProgress, Instant)>>,
    history: StdMutex<HashMap<String, Vec<JobProgress>>>,
}

impl MemoryProgressCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Every record written for `job_id`, oldest first.
    pub fn history(&self, job_id: &JobId) -> Vec<JobProgress> {
        self.history
            .lock()
            .map(|h| h.get(job_id.as_str()).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressCache for MemoryProgressCache {
    async fn put(&self, progress: &JobProgress) -> QueueResult<()> {
        let key = progress.job_id.as_str().to_string();
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.clone(), (progress.clone(), Instant::now()));
        }
        if let Ok(mut history) = self.history.lock() {
            history.entry(key).or_default().push(progress.clone());
        }
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobProgress>> {
        let Ok(mut entries) = self.entries.lock() else {
            return Ok(None);
        };
        let expired = match (entries.get(job_id.as_str()), self.ttl) {
            (Some((_, written)), Some(ttl)) => written.elapsed() >= ttl,
            _ => false,
        };
        if expired {
            entries.remove(job_id.as_str());
            return Ok(None);
        }
        Ok(entries.get(job_id.as_str()).map(|(p, _)| p.clone()))
    }
}

/// Publishes one job's progress to a [`ProgressCache`].
///
/// Holds the authoritative record so published progress never decreases and
/// terminal records are never overwritten. Publication failures are logged,
/// not returned.
#[derive(Clone)]
pub struct ProgressReporter {
    cache: Arc<dyn ProgressCache>,
    record: Arc<Mutex<JobProgress>>,
}

impl ProgressReporter {
    pub fn new(cache: Arc<dyn ProgressCache>, job_id: JobId) -> Self {
        Self {
            cache,
            record: Arc::new(Mutex::new(JobProgress::new(job_id))),
        }
    }

    /// Publish the initial pending record.
    pub async fn queued(&self) {
        let record = self.record.lock().await;
        self.publish(&record).await;
    }

    /// Advance to `progress` percent. Values at or above 100 are held at 99.
    pub async fn advance(&self, progress: u8, message: impl Into<String>) {
        let mut record = self.record.lock().await;
        if record.advance(progress, message) {
            self.publish(&record).await;
        }
    }

    /// Mark the job completed at 100 %.
    pub async fn complete(&self, message: impl Into<String>) {
        let mut record = self.record.lock().await;
        if record.complete(message) {
            self.publish(&record).await;
        }
    }

    /// Mark the job failed, keeping the last reached percentage.
    pub async fn fail(&self, error: impl Into<String>) {
        let mut record = self.record.lock().await;
        if record.fail(error) {
            self.publish(&record).await;
        }
    }

    /// Current record.
    pub async fn snapshot(&self) -> JobProgress {
        self.record.lock().await.clone()
    }

    async fn publish(&self, record: &JobProgress) {
        if let Err(e) = self.cache.put(record).await {
            warn!(
                job_id = %record.job_id,
                progress = record.progress,
                error = %e,
                "Failed to publish progress"
            );
        }
    }
}
