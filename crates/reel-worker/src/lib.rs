//! Composition render worker.
//!
//! This crate provides:
//! - Render orchestration with milestone progress reporting
//! - A bounded worker pool and the Redis stream executor feeding it
//! - The job ledger contract
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pool;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobSource};
pub use ledger::{InMemoryJobLedger, JobLedger};
pub use logging::JobLogger;
pub use orchestrator::{RenderOrchestrator, RenderState};
pub use pool::{JobRunner, WorkerPool};
