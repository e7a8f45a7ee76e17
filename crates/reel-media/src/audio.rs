//! Per-scene base audio.
//!
//! Every scene yields exactly one audio stream: the primary media's own
//! track when it has one, otherwise generated silence of the same length.
//! Downstream mixing therefore never has to special-case a scene without
//! audio.

use std::path::Path;

use reel_models::MediaType;

use crate::graph::{fmt_num, InputId, NodeId, OperationGraph, Pad, StreamKind};
use crate::scene::SourceWindow;
use crate::store::ResolvedAsset;

/// Output sample rate for every audio stream in the graph.
pub const SAMPLE_RATE: u32 = 48_000;

/// Extensions assumed to carry audio when a probe result is unavailable.
pub const AUDIO_CARRYING_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "m4v", "mkv", "webm", "avi", "mp3", "wav", "aac", "m4a", "flac", "ogg",
];

/// Where a scene's base audio comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneAudioSource {
    /// The primary media's own audio track
    NativeAudio { input: InputId },
    /// Generated stereo silence
    SynthesizedSilence { duration: f64 },
}

impl SceneAudioSource {
    /// Decide the base audio for a scene. Total: always yields a source.
    pub fn resolve(kind: MediaType, asset: &ResolvedAsset, input: InputId, duration: f64) -> Self {
        if carries_audio(kind, asset) {
            SceneAudioSource::NativeAudio { input }
        } else {
            SceneAudioSource::SynthesizedSilence { duration }
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, SceneAudioSource::NativeAudio { .. })
    }
}

/// Whether the primary media is expected to have an audio track.
pub fn carries_audio(kind: MediaType, asset: &ResolvedAsset) -> bool {
    if kind == MediaType::Image {
        return false;
    }
    match &asset.info {
        Some(info) => info.has_audio,
        None => has_audio_extension(&asset.path),
    }
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_CARRYING_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `aformat` filter normalising sample format, rate and layout.
pub fn audio_format_filter() -> String {
    format!(
        "aformat=sample_fmts=fltp:sample_rates={}:channel_layouts=stereo",
        SAMPLE_RATE
    )
}

/// `atempo` steps whose product is `speed`, each within 0.5..=2.0.
pub fn atempo_chain(speed: f64) -> Vec<String> {
    let mut steps = Vec::new();
    if !(speed.is_finite() && speed > 0.0) {
        return steps;
    }

    let mut remaining = speed;
    while remaining > 2.0 {
        steps.push("atempo=2".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        steps.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    if (remaining - 1.0).abs() > 1e-9 {
        steps.push(format!("atempo={}", fmt_num(remaining)));
    }
    steps
}

/// Add the base audio node for a scene.
///
/// Native audio is trimmed to the same window as the video, retimed by the
/// same speed and padded or cut to exactly `duration`. Silence is generated
/// at exactly `duration`.
pub fn synthesize(
    graph: &mut OperationGraph,
    source: SceneAudioSource,
    window: &SourceWindow,
    speed: f64,
    duration: f64,
) -> NodeId {
    match source {
        SceneAudioSource::NativeAudio { input } => {
            let mut filters = Vec::new();

            let mut trim = format!("atrim=start={}", fmt_num(window.start));
            if let Some(end) = window.end {
                trim.push_str(&format!(":end={}", fmt_num(end)));
            }
            filters.push(trim);
            filters.push("asetpts=PTS-STARTPTS".to_string());
            filters.extend(atempo_chain(speed));
            filters.push(format!("aresample={}", SAMPLE_RATE));
            filters.push(audio_format_filter());
            filters.push(format!("apad=whole_dur={}", fmt_num(duration)));
            filters.push(format!("atrim=duration={}", fmt_num(duration)));

            graph.add_node(
                StreamKind::Audio,
                vec![Pad::Input(input, StreamKind::Audio)],
                filters,
            )
        }
        SceneAudioSource::SynthesizedSilence { duration } => graph.add_node(
            StreamKind::Audio,
            vec![],
            [
                format!("anullsrc=r={}:cl=stereo", SAMPLE_RATE),
                format!("atrim=duration={}", fmt_num(duration)),
                audio_format_filter(),
            ],
        ),
    }
}
