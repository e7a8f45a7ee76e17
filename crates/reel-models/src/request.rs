//! Composition request model.
//!
//! A request describes an ordered list of scenes, each built from one primary
//! media source plus optional overlays and audio, together with the
//! transitions between them and the audio layered over the whole timeline.

use std::collections::{BTreeMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::encoding::QualityTier;
use crate::utils::{validate_hex_color, validate_rotation, validate_trim};

/// Default still-image scene duration in seconds.
pub const DEFAULT_IMAGE_DURATION_SECS: f64 = 5.0;

/// Maximum number of scenes in one composition.
pub const MAX_SCENES: usize = 50;

/// A declarative, multi-scene composition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct CompositionRequest {
    /// Composition title
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// Target frame settings
    #[serde(default)]
    #[validate(nested)]
    pub settings: VideoSettings,

    /// Ordered scenes
    #[validate(length(min = 1, max = 50), nested)]
    pub scenes: Vec<Scene>,

    /// Declared transitions between adjacent scenes
    #[serde(default)]
    #[validate(nested)]
    pub transitions: Vec<Transition>,

    /// Audio applied across the whole timeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub global_audio: Option<GlobalAudio>,

    /// Extra timeline audio tracks, summed with everything else
    #[serde(default)]
    #[validate(nested)]
    pub audio_tracks: Vec<AudioTrack>,

    /// Watermark image file ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,

    /// Output container and codec
    #[serde(default)]
    pub output: OutputSettings,
}

impl CompositionRequest {
    /// Background music, if any.
    pub fn background_music(&self) -> Option<&BackgroundMusic> {
        self.global_audio
            .as_ref()
            .and_then(|g| g.background_music.as_ref())
    }

    /// Every file ID the request references, deduplicated in first-seen order.
    pub fn referenced_file_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        let candidates = self
            .scenes
            .iter()
            .flat_map(|scene| {
                std::iter::once(scene.media.file_id.as_str())
                    .chain(scene.audio.as_ref().map(|a| a.file_id.as_str()))
                    .chain(scene.voiceover.as_ref().map(|a| a.file_id.as_str()))
            })
            .chain(self.background_music().map(|m| m.music_id.as_str()))
            .chain(self.audio_tracks.iter().map(|t| t.file_id.as_str()))
            .chain(self.watermark.as_deref());

        for id in candidates {
            if seen.insert(id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Look up a scene by ID.
    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }
}

/// Target frame settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct VideoSettings {
    /// Width in pixels
    #[serde(default = "default_width")]
    #[validate(range(min = 480, max = 7680))]
    pub width: u32,

    /// Height in pixels
    #[serde(default = "default_height")]
    #[validate(range(min = 360, max = 4320))]
    pub height: u32,

    /// Frames per second
    #[serde(default = "default_fps")]
    #[validate(range(min = 15, max = 60))]
    pub fps: u32,

    /// Optional cap on the total timeline duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1.0))]
    pub duration: Option<f64>,

    /// Quality tier
    #[serde(default)]
    pub quality: QualityTier,
}

fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_fps() -> u32 {
    30
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            duration: None,
            quality: QualityTier::default(),
        }
    }
}

/// One timeline segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[validate(schema(function = "validate_scene_trim"))]
pub struct Scene {
    /// Unique scene identifier
    #[validate(length(min = 1, max = 100))]
    pub id: String,

    /// Explicit scene duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.1))]
    pub duration: Option<f64>,

    /// Primary media
    #[validate(nested)]
    pub media: Media,

    /// Scene-specific audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub audio: Option<Audio>,

    /// Voiceover layered on the scene
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub voiceover: Option<Audio>,

    /// Text overlays
    #[serde(default)]
    #[validate(nested)]
    pub text_overlays: Vec<TextOverlay>,
}

fn validate_scene_trim(scene: &Scene) -> Result<(), validator::ValidationError> {
    validate_trim(scene.media.start_time, scene.media.end_time)
}

/// Primary media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media reference with optional trims and effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Media {
    /// Media type
    #[serde(rename = "type")]
    pub kind: MediaType,

    /// Uploaded file ID
    #[validate(length(min = 1))]
    pub file_id: String,

    /// Trim start in seconds (video/audio sources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub start_time: Option<f64>,

    /// Trim end in seconds (video/audio sources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub end_time: Option<f64>,

    /// Visual effects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub effects: Option<MediaEffects>,
}

/// Direction of a pan across a zoomed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PanDirection {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

/// Visual effects, each independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct MediaEffects {
    /// Zoom factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.1, max = 10.0))]
    pub zoom: Option<f64>,

    /// Pan direction across a zoomed frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan: Option<PanDirection>,

    /// Rotation in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_rotation"))]
    pub rotation: Option<f64>,

    /// Playback speed multiplier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.1, max = 10.0))]
    pub speed: Option<f64>,

    /// Brightness multiplier (1.0 = unchanged)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub brightness: Option<f64>,
}

/// One axis of an overlay position.
///
/// Either a pixel value or a string, which is a named anchor
/// (`center`, `left`, `right`, `top`, `bottom`) or a numeric literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Coordinate {
    Pixels(f64),
    Named(String),
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Coordinate::Pixels(value)
    }
}

impl From<&str> for Coordinate {
    fn from(value: &str) -> Self {
        Coordinate::Named(value.to_string())
    }
}

/// Overlay position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Position {
    pub x: Coordinate,
    pub y: Coordinate,
}

impl Position {
    pub fn new(x: impl Into<Coordinate>, y: impl Into<Coordinate>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }
}

/// Text drawn over a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct TextOverlay {
    /// Text content
    #[validate(length(min = 1, max = 500))]
    pub text: String,

    /// Text position
    pub position: Position,

    /// Font size in pixels
    #[serde(default = "default_font_size")]
    #[validate(range(min = 8, max = 200))]
    pub font_size: u32,

    /// Text color (#RRGGBB)
    #[serde(default = "default_text_color")]
    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,

    /// Box color behind the text (#RRGGBB)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_hex_color"))]
    pub background_color: Option<String>,

    /// Outline color (#RRGGBB)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_hex_color"))]
    pub stroke_color: Option<String>,

    /// Start time within the scene in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub start_time: Option<f64>,

    /// Visible duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.1))]
    pub duration: Option<f64>,

    /// Animation name (accepted, not rendered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
}

fn default_font_size() -> u32 {
    24
}
fn default_text_color() -> String {
    "#FFFFFF".to_string()
}

/// Scene audio or voiceover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Audio {
    /// Uploaded audio file ID
    #[validate(length(min = 1))]
    pub file_id: String,

    /// Volume multiplier
    #[serde(default = "default_volume")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub volume: f64,

    /// Fade in duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub fade_in: Option<f64>,

    /// Fade out duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub fade_out: Option<f64>,

    /// Offset within the scene in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub start_time: Option<f64>,

    /// Play at most this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.1))]
    pub duration: Option<f64>,

    /// Repeat the file to fill the available time
    #[serde(rename = "loop", default)]
    pub looped: bool,
}

impl Audio {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            volume: default_volume(),
            fade_in: None,
            fade_out: None,
            start_time: None,
            duration: None,
            looped: false,
        }
    }
}

fn default_volume() -> f64 {
    1.0
}

/// Extra audio track placed on the composed timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct AudioTrack {
    /// Uploaded audio file ID
    #[validate(length(min = 1))]
    pub file_id: String,

    /// Volume multiplier
    #[serde(default = "default_volume")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub volume: f64,

    /// Fade in duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub fade_in: Option<f64>,

    /// Fade out duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub fade_out: Option<f64>,

    /// Timeline offset in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub start_time: Option<f64>,

    /// Play at most this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.1))]
    pub duration: Option<f64>,

    /// Repeat the file to fill the available time
    #[serde(rename = "loop", default)]
    pub looped: bool,
}

/// Declared transition type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fade,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    Dissolve,
    Wipe,
    /// Any unrecognized type; rendered as a fade.
    #[serde(other)]
    Unknown,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Fade => "fade",
            TransitionKind::SlideLeft => "slide_left",
            TransitionKind::SlideRight => "slide_right",
            TransitionKind::SlideUp => "slide_up",
            TransitionKind::SlideDown => "slide_down",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::Wipe => "wipe",
            TransitionKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-effect between two adjacent scenes, identified by scene ID pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Transition {
    /// Outgoing scene ID
    pub from_scene: String,

    /// Incoming scene ID
    pub to_scene: String,

    /// Transition type
    #[serde(rename = "type")]
    pub kind: TransitionKind,

    /// Overlap in seconds
    #[serde(default = "default_transition_duration")]
    #[validate(range(min = 0.1, max = 5.0))]
    pub duration: f64,

    /// Easing name (accepted, not rendered)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<String>,
}

fn default_transition_duration() -> f64 {
    0.5
}

impl Transition {
    pub fn new(
        from_scene: impl Into<String>,
        to_scene: impl Into<String>,
        kind: TransitionKind,
        duration: f64,
    ) -> Self {
        Self {
            from_scene: from_scene.into(),
            to_scene: to_scene.into(),
            kind,
            duration,
            easing: None,
        }
    }
}

/// Background music settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct BackgroundMusic {
    /// Uploaded music file ID
    #[serde(alias = "music_ID")]
    #[validate(length(min = 1))]
    pub music_id: String,

    /// Volume multiplier
    #[serde(default = "default_music_volume")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub volume: f64,

    /// Loop the track across the whole timeline
    #[serde(rename = "loop", default = "default_true")]
    pub looped: bool,

    /// Fade in duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub fade_in: Option<f64>,

    /// Fade out duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub fade_out: Option<f64>,
}

fn default_music_volume() -> f64 {
    0.3
}
fn default_true() -> bool {
    true
}

/// Timeline-wide audio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GlobalAudio {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub background_music: Option<BackgroundMusic>,
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Avi,
    Mov,
}

impl OutputFormat {
    /// File extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Avi => "avi",
            OutputFormat::Mov => "mov",
        }
    }

    /// Whether the container supports moving the index to the front.
    pub fn supports_faststart(&self) -> bool {
        matches!(self, OutputFormat::Mp4 | OutputFormat::Mov)
    }
}

/// Output container, codec and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default = "default_codec")]
    pub codec: String,

    /// Container metadata tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

fn default_codec() -> String {
    "h264".to_string()
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            codec: default_codec(),
            metadata: None,
        }
    }
}
