//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Output audio sample rate
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Output pixel format
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Output quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    Medium,
    #[default]
    High,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        }
    }

    /// Constant Rate Factor for this tier.
    pub fn crf(&self) -> u8 {
        match self {
            QualityTier::Low => 28,
            QualityTier::Medium => 23,
            QualityTier::High => 18,
        }
    }

    /// x264/x265 preset for this tier.
    pub fn preset(&self) -> &'static str {
        match self {
            QualityTier::Low => "veryfast",
            QualityTier::Medium => "medium",
            QualityTier::High => "slow",
        }
    }

    /// Peak video bitrate in kbit/s.
    pub fn max_bitrate_kbps(&self) -> u32 {
        match self {
            QualityTier::Low => 1000,
            QualityTier::Medium => 2500,
            QualityTier::High => 5000,
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a requested codec name to an FFmpeg encoder.
///
/// Returns `None` for unsupported codecs; callers fall back to
/// [`DEFAULT_VIDEO_CODEC`].
pub fn ffmpeg_video_codec(codec: &str) -> Option<&'static str> {
    match codec.to_ascii_lowercase().as_str() {
        "h264" | "libx264" | "avc" => Some("libx264"),
        "h265" | "hevc" | "libx265" => Some("libx265"),
        _ => None,
    }
}

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "libx265")
    pub codec: String,

    /// Encoding preset (e.g., "veryfast", "medium", "slow")
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    pub crf: u8,

    /// Peak bitrate in kbit/s
    pub max_bitrate_kbps: u32,

    /// Audio codec
    pub audio_codec: String,

    /// Audio bitrate
    pub audio_bitrate: String,

    /// Audio sample rate
    pub audio_sample_rate: u32,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::for_tier(QualityTier::default())
    }
}

impl EncodingConfig {
    /// Create the configuration for a quality tier with the default codec.
    pub fn for_tier(tier: QualityTier) -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: tier.preset().to_string(),
            crf: tier.crf(),
            max_bitrate_kbps: tier.max_bitrate_kbps(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            audio_sample_rate: AUDIO_SAMPLE_RATE,
            extra_args: Vec::new(),
        }
    }

    /// Returns a new config with the given FFmpeg encoder.
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Rate-control buffer size in kbit/s (twice the peak bitrate).
    pub fn buffer_size_kbps(&self) -> u32 {
        self.max_bitrate_kbps * 2
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-maxrate".to_string(),
            format!("{}k", self.max_bitrate_kbps),
            "-bufsize".to_string(),
            format!("{}k", self.buffer_size_kbps()),
            "-pix_fmt".to_string(),
            PIXEL_FORMAT.to_string(),
        ];

        args.extend_from_slice(&[
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-ar".to_string(),
            self.audio_sample_rate.to_string(),
        ]);

        args.extend(self.extra_args.clone());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.crf, 18);
        assert_eq!(config.preset, "slow");
    }

    #[test]
    fn test_tier_table() {
        let medium = EncodingConfig::for_tier(QualityTier::Medium);
        assert_eq!((medium.crf, medium.preset.as_str()), (23, "medium"));
        assert_eq!(medium.buffer_size_kbps(), 5000);

        let low = EncodingConfig::for_tier(QualityTier::Low);
        assert_eq!((low.crf, low.preset.as_str(), low.max_bitrate_kbps), (28, "veryfast", 1000));
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = EncodingConfig::for_tier(QualityTier::High).to_ffmpeg_args();
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-crf 18"));
        assert!(joined.contains("-maxrate 5000k"));
        assert!(joined.contains("-bufsize 10000k"));
        assert!(joined.contains("-c:a aac -b:a 192k -ar 48000"));
    }

    #[test]
    fn test_codec_mapping() {
        assert_eq!(ffmpeg_video_codec("h264"), Some("libx264"));
        assert_eq!(ffmpeg_video_codec("HEVC"), Some("libx265"));
        assert_eq!(ffmpeg_video_codec("h265"), Some("libx265"));
        assert_eq!(ffmpeg_video_codec("vp9"), None);
    }
}
