//! Redis Streams job queue and job progress cache.
//!
//! This crate provides:
//! - Job enqueueing and consumption via Redis Streams
//! - A TTL-bounded progress cache keyed by job ID
//! - A per-job progress reporter that keeps published progress monotonic

pub mod error;
pub mod job;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::ComposeJob;
pub use progress::{
    progress_key, MemoryProgressCache, ProgressCache, ProgressReporter, RedisProgressCache,
    PROGRESS_TTL_SECS,
};
pub use queue::{JobQueue, QueueConfig};
