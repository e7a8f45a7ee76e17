//! Render orchestration.
//!
//! Drives one composition from request to published file: validation, asset
//! resolution, graph building and encoding, with progress published at fixed
//! milestones along the way.
//!
//! | Stage                          | Progress |
//! |--------------------------------|----------|
//! | validation + asset resolution  | 0–10     |
//! | scene compilation              | 10–50    |
//! | transitions                    | 50–70    |
//! | audio and background layers    | 70–90    |
//! | encoding                       | 90–99    |
//! | published                      | 100      |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn, Instrument};

use reel_media::{
    discard_partial, partial_path, publish_output, resolve_assets, validate, BuildPhase,
    CompositionBuilder, Encoder, FfmpegCommand, FfmpegProgress, FfmpegRunner, FfprobeProber,
    LocalMediaStore, MediaProber, MediaResult, MediaStore, ProgressCallback,
};
use reel_models::utils::format_timestamp;
use reel_models::{estimate_processing_time, CompositionRequest, JobId};
use reel_queue::{ProgressCache, ProgressReporter};

use crate::config::WorkerConfig;
use crate::logging::JobLogger;
use crate::metrics;

/// Progress once the request is validated and its media resolved.
const RESOLVED_PROGRESS: u8 = 10;
/// Progress reserved for scene compilation.
const SCENE_PROGRESS_SPAN: usize = 40;
const TRANSITIONS_PROGRESS: u8 = 70;
const AUDIO_PROGRESS: u8 = 90;
/// Encoder progress is mapped onto `ENCODE_PROGRESS..=99`.
const ENCODE_PROGRESS: u8 = 90;

/// Lifecycle of one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RenderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderState::Succeeded | RenderState::Failed)
    }

    /// Move to `next` if the transition is allowed.
    ///
    /// Allowed: `Queued -> Running`, `Running -> Succeeded | Failed`.
    pub fn advance(&mut self, next: RenderState) -> bool {
        let allowed = matches!(
            (*self, next),
            (RenderState::Queued, RenderState::Running)
                | (RenderState::Running, RenderState::Succeeded)
                | (RenderState::Running, RenderState::Failed)
        );
        if allowed {
            *self = next;
        }
        allowed
    }
}

/// Output of a successful render.
struct Rendered {
    output: PathBuf,
    transitions_applied: usize,
}

/// Runs compositions end to end.
pub struct RenderOrchestrator {
    store: Arc<dyn MediaStore>,
    prober: Arc<dyn MediaProber>,
    encoder: Arc<dyn Encoder>,
    cache: Arc<dyn ProgressCache>,
    builder: CompositionBuilder,
    output_dir: PathBuf,
}

impl RenderOrchestrator {
    pub fn new(
        store: Arc<dyn MediaStore>,
        prober: Arc<dyn MediaProber>,
        encoder: Arc<dyn Encoder>,
        cache: Arc<dyn ProgressCache>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            prober,
            encoder,
            cache,
            builder: CompositionBuilder::new(),
            output_dir: output_dir.into(),
        }
    }

    /// Orchestrator over the local upload directory, ffprobe and ffmpeg.
    pub fn from_config(config: &WorkerConfig, cache: Arc<dyn ProgressCache>) -> Self {
        let runner = match config.encode_timeout {
            Some(timeout) => FfmpegRunner::new().with_timeout(timeout.as_secs()),
            None => FfmpegRunner::new(),
        };
        Self::new(
            Arc::new(LocalMediaStore::new(&config.upload_dir)),
            Arc::new(FfprobeProber),
            Arc::new(runner),
            cache,
            &config.output_dir,
        )
        .with_builder(CompositionBuilder::new().with_font(&config.font))
    }

    pub fn with_builder(mut self, builder: CompositionBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render `request` as job `job_id` and return the published output path.
    ///
    /// The job's progress record ends either completed at 100 or failed at
    /// the last milestone reached, with the error text attached.
    pub async fn compose(&self, request: &CompositionRequest, job_id: &JobId) -> MediaResult<PathBuf> {
        let logger = JobLogger::compose(job_id);
        let span = logger.create_span();
        self.compose_inner(request, job_id, &logger)
            .instrument(span)
            .await
    }

    async fn compose_inner(
        &self,
        request: &CompositionRequest,
        job_id: &JobId,
        logger: &JobLogger,
    ) -> MediaResult<PathBuf> {
        let reporter = ProgressReporter::new(Arc::clone(&self.cache), job_id.clone());
        let mut state = RenderState::Queued;
        reporter.queued().await;

        state.advance(RenderState::Running);
        logger.log_start(
            &request.title,
            request.scenes.len(),
            estimate_processing_time(request),
        );
        metrics::record_job_started();
        let started = Instant::now();

        let result = self.render(request, job_id, &reporter, logger).await;
        let elapsed = started.elapsed();

        match result {
            Ok(rendered) => {
                reporter.complete("Composition complete").await;
                state.advance(RenderState::Succeeded);
                metrics::record_job_completed(elapsed.as_secs_f64(), rendered.transitions_applied);
                logger.log_completion(&rendered.output, elapsed);
                debug!(state = ?state, "Render settled");
                Ok(rendered.output)
            }
            Err(e) => {
                reporter.fail(e.to_string()).await;
                state.advance(RenderState::Failed);
                metrics::record_job_failed(e.kind(), elapsed.as_secs_f64());
                logger.log_error(e.kind(), &e.to_string());
                debug!(state = ?state, "Render settled");
                Err(e)
            }
        }
    }

    async fn render(
        &self,
        request: &CompositionRequest,
        job_id: &JobId,
        reporter: &ProgressReporter,
        logger: &JobLogger,
    ) -> MediaResult<Rendered> {
        reporter.advance(0, "Validating request").await;
        validate(request)?;

        let (assets, mut warnings) =
            resolve_assets(request, self.store.as_ref(), self.prober.as_ref()).await?;
        milestone(reporter, logger, RESOLVED_PROGRESS, "Media resolved").await;

        // The build is synchronous; milestones it reached are published
        // afterwards, including on failure.
        let mut phases = Vec::new();
        let built = self
            .builder
            .build_with_phases(request, &assets, |phase| phases.push(phase));
        for phase in phases {
            let (progress, message) = phase_milestone(phase);
            milestone(reporter, logger, progress, &message).await;
        }
        let plan = built?;
        debug!(
            duration = %format_timestamp(plan.duration),
            inputs = plan.graph.inputs().len(),
            transitions = plan.transitions_applied,
            "Plan built"
        );

        warnings.extend(plan.warnings.iter().cloned());
        logger.log_warnings(&warnings);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self
            .output_dir
            .join(output_file_name(job_id, request.output.format.extension()));
        let partial = partial_path(&output);
        let cmd = plan.to_command(&partial);

        let encode_started = Instant::now();
        if let Err(e) = self.encode(&cmd, plan.duration, reporter).await {
            discard_partial(&partial).await;
            return Err(e);
        }
        metrics::record_encode(encode_started.elapsed().as_secs_f64());

        if let Err(e) = publish_output(&partial, &output).await {
            discard_partial(&partial).await;
            return Err(e);
        }

        Ok(Rendered {
            output,
            transitions_applied: plan.transitions_applied,
        })
    }

    /// Run the encoder, forwarding its progress into the job record.
    async fn encode(
        &self,
        cmd: &FfmpegCommand,
        total_secs: f64,
        reporter: &ProgressReporter,
    ) -> MediaResult<()> {
        let (tx, mut rx) = watch::channel(ENCODE_PROGRESS);

        let forwarder = {
            let reporter = reporter.clone();
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let progress = *rx.borrow_and_update();
                    reporter.advance(progress, "Encoding").await;
                }
            })
        };

        let on_progress: ProgressCallback = Box::new(move |p: FfmpegProgress| {
            let progress = encode_progress(p.fraction(total_secs));
            tx.send_if_modified(|current| {
                if progress > *current {
                    *current = progress;
                    true
                } else {
                    false
                }
            });
        });

        let result = self.encoder.encode(cmd, on_progress).await;

        // Ends once the encoder has dropped the callback.
        if let Err(e) = forwarder.await {
            warn!(error = %e, "Progress forwarder stopped abnormally");
        }
        result
    }
}

async fn milestone(reporter: &ProgressReporter, logger: &JobLogger, progress: u8, message: &str) {
    logger.log_progress(progress, message);
    reporter.advance(progress, message).await;
}

/// Progress and message published for a build phase.
fn phase_milestone(phase: BuildPhase) -> (u8, String) {
    match phase {
        BuildPhase::SceneCompiled { index, total } => {
            let done = SCENE_PROGRESS_SPAN * (index + 1) / total.max(1);
            (
                RESOLVED_PROGRESS + done as u8,
                format!("Compiled scene {}/{}", index + 1, total),
            )
        }
        BuildPhase::TransitionsResolved => (TRANSITIONS_PROGRESS, "Transitions resolved".to_string()),
        BuildPhase::AudioMixed => (AUDIO_PROGRESS, "Audio mixed".to_string()),
        BuildPhase::Finalized => (AUDIO_PROGRESS, "Graph finalized".to_string()),
    }
}

/// Map an encode fraction onto 90..=99.
fn encode_progress(fraction: f64) -> u8 {
    let step = (fraction.clamp(0.0, 1.0) * 9.0).floor() as u8;
    ENCODE_PROGRESS + step
}

/// `video_job_{job_id}_{timestamp}.{ext}`
fn output_file_name(job_id: &JobId, extension: &str) -> String {
    format!(
        "video_job_{}_{}.{}",
        job_id,
        Utc::now().format("%Y%m%d_%H%M%S"),
        extension
    )
}
