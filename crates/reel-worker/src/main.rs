//! Composition render worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::check_ffmpeg;
use reel_queue::{JobQueue, RedisProgressCache};
use reel_worker::{metrics, InMemoryJobLedger, JobExecutor, JobRunner, RenderOrchestrator, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reel_worker=info".parse()?)
        .add_directive("reel_media=info".parse()?)
        .add_directive("reel_queue=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting reel-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        metrics::install_exporter(addr)?;
        info!(%addr, "Prometheus exporter listening");
    }

    match check_ffmpeg() {
        Ok(path) => info!(path = %path.display(), "Found ffmpeg"),
        Err(e) => warn!(error = %e, "ffmpeg unavailable, renders will fail"),
    }

    let queue = JobQueue::from_env().context("Failed to create job queue")?;
    let cache = RedisProgressCache::new(&queue.config().redis_url, config.progress_ttl_secs)
        .context("Failed to create progress cache")?;

    let orchestrator = Arc::new(RenderOrchestrator::from_config(&config, Arc::new(cache)));
    info!(
        uploads = %config.upload_dir.display(),
        outputs = %orchestrator.output_dir().display(),
        "Render orchestrator ready"
    );
    let ledger = Arc::new(InMemoryJobLedger::new());
    let runner = Arc::new(JobRunner::new(orchestrator, ledger));
    let executor = JobExecutor::new(config, queue, runner);

    executor
        .run(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await
        .context("Executor error")?;

    info!("Worker shutdown complete");
    Ok(())
}
