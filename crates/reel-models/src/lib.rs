//! Shared data models for the Reel composition engine.
//!
//! This crate provides Serde-serializable types for:
//! - Composition requests (scenes, overlays, transitions, audio)
//! - Request validation
//! - Jobs and the polled progress record
//! - Encoding configuration and quality tiers

pub mod encoding;
pub mod job;
pub mod job_status;
pub mod request;
pub mod utils;
pub mod validation;

// Re-export common types
pub use encoding::{EncodingConfig, QualityTier};
pub use job::{Job, JobId, JobStatus};
pub use job_status::JobProgress;
pub use request::{
    Audio, AudioTrack, BackgroundMusic, CompositionRequest, Coordinate, GlobalAudio, Media,
    MediaEffects, MediaType, OutputFormat, OutputSettings, PanDirection, Position, Scene,
    TextOverlay, Transition, TransitionKind, VideoSettings,
};
pub use utils::estimate_processing_time;
pub use validation::{ValidationError, ValidationResult};
