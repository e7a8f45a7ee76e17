//! Redis queue and progress cache integration tests.

use std::sync::Arc;

use reel_models::{CompositionRequest, JobId, JobStatus};
use reel_queue::{
    ComposeJob, JobQueue, ProgressCache, ProgressReporter, QueueError, RedisProgressCache,
};

fn request() -> CompositionRequest {
    serde_json::from_value(serde_json::json!({
        "title": "Integration",
        "scenes": [{ "id": "a", "media": { "type": "image", "file_id": "img" } }]
    }))
    .expect("valid request")
}

fn redis_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Test job enqueue and consume cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_consume() {
    dotenvy::dotenv().ok();

    let queue = JobQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let job = ComposeJob::new(request());
    let job_id = job.job_id.clone();

    let message_id = queue.enqueue(&job).await.expect("Failed to enqueue");
    println!("Enqueued job {} with message ID {}", job_id, message_id);

    let duplicate = queue.enqueue(&job).await;
    assert!(matches!(duplicate, Err(QueueError::DuplicateJob(_))));

    let jobs = queue
        .consume("test-consumer", 1000, 1)
        .await
        .expect("Failed to consume");

    assert_eq!(jobs.len(), 1);
    let (msg_id, consumed) = &jobs[0];
    assert_eq!(consumed.job_id, job_id);

    queue.ack(msg_id).await.expect("Failed to ack");
}

/// Test progress records round-trip through Redis.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_progress_cache_roundtrip() {
    let cache = Arc::new(RedisProgressCache::new(&redis_url(), 60).expect("Failed to create cache"));
    let job_id = JobId::new();
    let reporter = ProgressReporter::new(cache.clone(), job_id.clone());

    reporter.advance(40, "Compiling scenes").await;
    let stored = cache.get(&job_id).await.expect("get").expect("record exists");
    assert_eq!(stored.progress, 40);
    assert_eq!(stored.status, JobStatus::Processing);

    reporter.fail("boom").await;
    let stored = cache.get(&job_id).await.expect("get").expect("record exists");
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.progress, 40);
}
