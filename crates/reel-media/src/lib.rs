#![deny(unreachable_patterns)]
//! Composition graph builder and FFmpeg CLI wrapper.
//!
//! This crate provides:
//! - Media store lookup and ffprobe-based probing
//! - Scene compilation into an operation graph of filter nodes
//! - Transition resolution and audio mixing across the timeline
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`

pub mod audio;
pub mod builder;
pub mod command;
pub mod error;
pub mod fs_utils;
pub mod graph;
pub mod mixer;
pub mod position;
pub mod probe;
pub mod progress;
pub mod scene;
pub mod store;
pub mod transition;
pub mod watermark;

pub use audio::SceneAudioSource;
pub use builder::{validate, BuildPhase, CompositionBuilder, CompositionPlan, DEFAULT_FONT};
pub use command::{check_ffmpeg, check_ffprobe, Encoder, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{discard_partial, move_file, partial_path, publish_output};
pub use graph::{NodeId, OperationGraph, Pad, StreamKind};
pub use position::resolve_position;
pub use probe::{probe_media, FfprobeProber, MediaInfo, MediaProber};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use scene::{CompiledScene, SceneCompiler, SceneStage, SourceWindow};
pub use store::{resolve_assets, LocalMediaStore, MediaStore, ResolvedAsset, ResolvedAssets};
pub use transition::{resolve_boundaries, Boundary};
pub use watermark::{apply_watermark, WatermarkConfig};
