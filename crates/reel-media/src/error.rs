//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use reel_models::ValidationError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while compiling or rendering a composition.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Media file not found: {0}")]
    MediaNotFound(String),

    #[error("Malformed position: {0}")]
    MalformedPosition(String),

    #[error("Invalid trim on scene {scene_id}: {reason}")]
    InvalidTrim { scene_id: String, reason: String },

    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    #[error("Invalid operation graph: {0}")]
    Graph(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("{}", ffmpeg_failure_message(.message, .stderr.as_deref()))]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Encoding timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn ffmpeg_failure_message(message: &str, stderr: Option<&str>) -> String {
    match stderr.map(str::trim).filter(|s| !s.is_empty()) {
        Some(stderr) => format!("FFmpeg failed: {}: {}", message, stderr),
        None => format!("FFmpeg failed: {}", message),
    }
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a missing media error for a file ID.
    pub fn media_not_found(file_id: impl Into<String>) -> Self {
        Self::MediaNotFound(file_id.into())
    }

    /// Create an invalid trim error.
    pub fn invalid_trim(scene_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTrim {
            scene_id: scene_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an operation graph error.
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::Validation(_) => "validation",
            MediaError::MediaNotFound(_) => "media_not_found",
            MediaError::MalformedPosition(_) => "malformed_position",
            MediaError::InvalidTrim { .. } => "invalid_trim",
            MediaError::InvalidMedia(_) => "invalid_media",
            MediaError::Graph(_) => "graph",
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => "tool_missing",
            MediaError::FfmpegFailed { .. } | MediaError::Timeout(_) => "encoder",
            MediaError::FfprobeFailed { .. } => "probe",
            MediaError::FileNotFound(_) | MediaError::Io(_) => "io",
            MediaError::JsonParse(_) | MediaError::Internal(_) => "internal",
        }
    }
}
