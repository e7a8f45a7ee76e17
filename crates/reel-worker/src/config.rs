//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use reel_media::DEFAULT_FONT;
use reel_queue::PROGRESS_TTL_SECS;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of pool workers, i.e. maximum concurrent renders
    pub max_concurrent_jobs: usize,
    /// Jobs that may wait in the pool channel before hand-off blocks
    pub queue_capacity: usize,
    /// Encoder timeout; the encoder process is killed when exceeded
    pub encode_timeout: Option<Duration>,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Directory holding uploaded media (`<file_id>.<ext>`)
    pub upload_dir: PathBuf,
    /// Directory receiving finished renders
    pub output_dir: PathBuf,
    /// Lifetime of progress records in seconds
    pub progress_ttl_secs: u64,
    /// Font family or font file for text overlays
    pub font: String,
    /// Prometheus listener address; metrics are not exported when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            queue_capacity: 8,
            encode_timeout: None,
            shutdown_timeout: Duration::from_secs(30),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            progress_ttl_secs: PROGRESS_TTL_SECS,
            font: DEFAULT_FONT.to_string(),
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            queue_capacity: std::env::var("WORKER_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.queue_capacity),
            encode_timeout: std::env::var("WORKER_ENCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            progress_ttl_secs: std::env::var("PROGRESS_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.progress_ttl_secs),
            font: std::env::var("COMPOSE_FONT").unwrap_or(defaults.font),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.progress_ttl_secs, 3600);
        assert_eq!(config.font, "Sans");
        assert!(config.encode_timeout.is_none());
        assert!(config.metrics_addr.is_none());
    }
}
