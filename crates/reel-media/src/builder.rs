//! Composition graph builder.
//!
//! Turns a validated request plus its resolved assets into one operation
//! graph and the encoder parameters around it. The build is a pure
//! transform: it never touches disk or spawns processes, and the same
//! request with the same assets always yields the same plan.

use std::collections::BTreeMap;
use std::path::Path;

use reel_models::encoding::{ffmpeg_video_codec, DEFAULT_VIDEO_CODEC};
use reel_models::{CompositionRequest, EncodingConfig, OutputFormat, ValidationError};
use tracing::{debug, info, warn};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::graph::{fmt_num, NodeId, OperationGraph, StreamKind};
use crate::mixer::{join_scene_audio, mix_scene, mix_timeline};
use crate::scene::{CompiledScene, SceneCompiler};
use crate::store::ResolvedAssets;
use crate::transition::{join_video, resolve_boundaries};
use crate::watermark::{apply_watermark, WatermarkConfig};

/// Font used for text overlays when none is configured.
pub const DEFAULT_FONT: &str = "Sans";

/// Build milestones reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Scene `index` (zero-based) of `total` compiled
    SceneCompiled { index: usize, total: usize },
    /// Boundaries resolved and video joined
    TransitionsResolved,
    /// Scene audio joined and timeline layers mixed
    AudioMixed,
    /// Graph rendered and encoder parameters fixed
    Finalized,
}

/// A fully compiled composition, ready to hand to the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionPlan {
    pub graph: OperationGraph,
    pub video_out: NodeId,
    pub audio_out: NodeId,
    /// Total timeline duration in seconds
    pub duration: f64,
    pub encoding: EncodingConfig,
    pub format: OutputFormat,
    pub frame_rate: u32,
    /// Container metadata tags
    pub metadata: BTreeMap<String, String>,
    /// Rendered `-filter_complex` text
    pub filter_graph: String,
    /// Number of cross-effects in the timeline
    pub transitions_applied: usize,
    /// Non-fatal issues found while building
    pub warnings: Vec<String>,
}

impl CompositionPlan {
    /// Encoder invocation writing this plan to `output`.
    pub fn to_command(&self, output: impl AsRef<Path>) -> FfmpegCommand {
        let cmd = self
            .graph
            .inputs()
            .iter()
            .fold(FfmpegCommand::new(output), |cmd, input| {
                cmd.input(&input.path, input.options.iter().cloned())
            });

        let mut cmd = cmd
            .filter_complex(self.filter_graph.clone())
            .map(self.graph.label(self.video_out))
            .map(self.graph.label(self.audio_out))
            .output_args(self.encoding.to_ffmpeg_args())
            .frame_rate(self.frame_rate);

        for (key, value) in &self.metadata {
            cmd = cmd.metadata(key, value);
        }
        if self.format.supports_faststart() {
            cmd = cmd.faststart();
        }
        cmd.format(self.format.extension())
    }
}

/// Validate `request`, mapping failures onto [`MediaError`].
pub fn validate(request: &CompositionRequest) -> MediaResult<()> {
    request.validate_request().map_err(|e| match e {
        ValidationError::InvalidTrim { scene_id, start, end } => MediaError::invalid_trim(
            scene_id,
            format!(
                "end_time {} must be greater than start_time {}",
                fmt_num(end),
                fmt_num(start)
            ),
        ),
        other => MediaError::Validation(other),
    })
}

/// Builds [`CompositionPlan`]s.
#[derive(Debug, Clone)]
pub struct CompositionBuilder {
    font: String,
    watermark: WatermarkConfig,
}

impl Default for CompositionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionBuilder {
    pub fn new() -> Self {
        Self {
            font: DEFAULT_FONT.to_string(),
            watermark: WatermarkConfig::default(),
        }
    }

    /// Font family name or font file path for text overlays.
    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = font.into();
        self
    }

    pub fn with_watermark_config(mut self, config: WatermarkConfig) -> Self {
        self.watermark = config;
        self
    }

    /// Build the plan for `request`.
    pub fn build(&self, request: &CompositionRequest, assets: &ResolvedAssets) -> MediaResult<CompositionPlan> {
        self.build_with_phases(request, assets, |_| {})
    }

    /// Build the plan, calling `on_phase` as each milestone is reached.
    pub fn build_with_phases<F>(
        &self,
        request: &CompositionRequest,
        assets: &ResolvedAssets,
        mut on_phase: F,
    ) -> MediaResult<CompositionPlan>
    where
        F: FnMut(BuildPhase),
    {
        validate(request)?;

        let settings = &request.settings;
        let mut graph = OperationGraph::new();
        let mut warnings = Vec::new();

        // Scenes
        let compiler = SceneCompiler::new(settings, &self.font);
        let total = request.scenes.len();
        let mut compiled: Vec<CompiledScene> = Vec::with_capacity(total);
        for (index, scene) in request.scenes.iter().enumerate() {
            compiled.push(compiler.compile(&mut graph, scene, assets)?);
            on_phase(BuildPhase::SceneCompiled { index, total });
        }

        // Transitions
        let boundaries = resolve_boundaries(&compiled, &request.transitions, &mut warnings);
        let transitions_applied = boundaries.iter().filter(|b| b.is_cross()).count();
        let (mut video, mut duration) = join_video(&mut graph, &compiled, &boundaries)
            .ok_or_else(|| MediaError::internal("composition has no scenes"))?;
        on_phase(BuildPhase::TransitionsResolved);

        // Scene audio, joined along the same boundaries
        let scene_audio: Vec<NodeId> = request
            .scenes
            .iter()
            .zip(&compiled)
            .map(|(scene, c)| mix_scene(&mut graph, scene, c, assets, &mut warnings))
            .collect();
        let mut audio = join_scene_audio(&mut graph, &scene_audio, &boundaries)
            .ok_or_else(|| MediaError::internal("composition has no scene audio"))?;

        if let Some(cap) = settings.duration {
            if cap < duration {
                debug!(cap, duration, "Capping timeline duration");
                let cap_str = fmt_num(cap);
                video = graph.add_node(
                    StreamKind::Video,
                    vec![video.into()],
                    [format!("trim=duration={}", cap_str), "setpts=PTS-STARTPTS".to_string()],
                );
                audio = graph.add_node(
                    StreamKind::Audio,
                    vec![audio.into()],
                    [format!("atrim=duration={}", cap_str), "asetpts=PTS-STARTPTS".to_string()],
                );
                duration = cap;
            }
        }

        audio = mix_timeline(&mut graph, audio, request, assets, duration, &mut warnings);
        on_phase(BuildPhase::AudioMixed);

        // Watermark
        if let Some(file_id) = &request.watermark {
            match assets.get(file_id) {
                Some(asset) => {
                    let input = graph.add_input(&asset.path, Vec::<String>::new());
                    video = apply_watermark(&mut graph, video, input, settings.width, &self.watermark);
                }
                None => {
                    warn!(file_id = %file_id, "Watermark not resolved, skipping");
                    warnings.push(format!("watermark {} skipped: file not resolved", file_id));
                }
            }
        }

        // Encoding
        let codec = match ffmpeg_video_codec(&request.output.codec) {
            Some(codec) => codec,
            None => {
                warn!(codec = %request.output.codec, fallback = DEFAULT_VIDEO_CODEC, "Unsupported codec");
                warnings.push(format!(
                    "codec {} not supported, using {}",
                    request.output.codec, DEFAULT_VIDEO_CODEC
                ));
                DEFAULT_VIDEO_CODEC
            }
        };
        let encoding = EncodingConfig::for_tier(settings.quality).with_codec(codec);

        let filter_graph = graph.render(&[video, audio])?;
        on_phase(BuildPhase::Finalized);

        info!(
            scenes = total,
            transitions = transitions_applied,
            duration,
            nodes = graph.len(),
            inputs = graph.inputs().len(),
            warnings = warnings.len(),
            "Composition graph built"
        );

        Ok(CompositionPlan {
            graph,
            video_out: video,
            audio_out: audio,
            duration,
            encoding,
            format: request.output.format,
            frame_rate: settings.fps,
            metadata: container_metadata(request),
            filter_graph,
            transitions_applied,
            warnings,
        })
    }
}

/// Title plus the request's output metadata, as container tags.
fn container_metadata(request: &CompositionRequest) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert("title".to_string(), request.title.clone());

    if let Some(metadata) = &request.output.metadata {
        for (key, value) in metadata {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => continue,
                other => other.to_string(),
            };
            tags.insert(key.clone(), value);
        }
    }
    tags
}
