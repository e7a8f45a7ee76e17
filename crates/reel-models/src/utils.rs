//! Shared helpers for request validation and job estimation.

use std::borrow::Cow;

use crate::encoding::QualityTier;
use crate::request::CompositionRequest;

/// Check a `#RRGGBB` color string.
pub fn validate_hex_color(value: &str) -> Result<(), validator::ValidationError> {
    let digits = value.strip_prefix('#').unwrap_or("");
    if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("hex_color");
        err.message = Some(Cow::Owned(format!(
            "'{}' is not a #RRGGBB color",
            value
        )));
        Err(err)
    }
}

/// Check a rotation angle in degrees (-360 to 360).
pub fn validate_rotation(value: f64) -> Result<(), validator::ValidationError> {
    if (-360.0..=360.0).contains(&value) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("range");
        err.message = Some(Cow::Borrowed("rotation must be between -360 and 360 degrees"));
        Err(err)
    }
}

/// Check that a trim window is non-empty when both bounds are given.
pub fn validate_trim(start: Option<f64>, end: Option<f64>) -> Result<(), validator::ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end <= start => {
            let mut err = validator::ValidationError::new("invalid_trim");
            err.message = Some(Cow::Owned(format!(
                "end_time ({}) must be greater than start_time ({})",
                end, start
            )));
            Err(err)
        }
        _ => Ok(()),
    }
}

/// Rough processing time estimate in seconds, used for client-side ETAs.
pub fn estimate_processing_time(request: &CompositionRequest) -> u32 {
    let mut seconds = 30.0;

    seconds += 15.0 * request.scenes.len() as f64;
    seconds += 5.0 * request.transitions.len() as f64;

    for scene in &request.scenes {
        seconds += 3.0 * scene.text_overlays.len() as f64;
        if scene.voiceover.is_some() {
            seconds += 5.0;
        }
    }

    if request.background_music().is_some() {
        seconds += 10.0;
    }

    let multiplier = match request.settings.quality {
        QualityTier::Low => 0.7,
        QualityTier::Medium => 1.0,
        QualityTier::High => 1.5,
    };

    (seconds * multiplier).round() as u32
}

/// Format seconds as `HH:MM:SS.mmm`.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(quality: &str) -> CompositionRequest {
        serde_json::from_value(serde_json::json!({
            "title": "estimate",
            "settings": { "quality": quality },
            "scenes": [
                {
                    "id": "a",
                    "media": { "type": "image", "file_id": "img" },
                    "text_overlays": [
                        { "text": "one", "position": { "x": 0, "y": 0 } },
                        { "text": "two", "position": { "x": 0, "y": 0 } }
                    ],
                    "voiceover": { "file_id": "vo" }
                },
                { "id": "b", "media": { "type": "video", "file_id": "vid" } }
            ],
            "transitions": [
                { "from_scene": "a", "to_scene": "b", "type": "fade" }
            ],
            "global_audio": { "background_music": { "music_id": "bgm" } }
        }))
        .unwrap()
    }

    #[test]
    fn test_hex_color() {
        assert!(validate_hex_color("#FFAA00").is_ok());
        assert!(validate_hex_color("#ffaa0z").is_err());
        assert!(validate_hex_color("FFAA00").is_err());
        assert!(validate_hex_color("#FFF").is_err());
    }

    #[test]
    fn test_trim_window() {
        assert!(validate_trim(Some(1.0), Some(2.0)).is_ok());
        assert!(validate_trim(Some(2.0), Some(2.0)).is_err());
        assert!(validate_trim(None, Some(2.0)).is_ok());
    }

    #[test]
    fn test_rotation_range() {
        assert!(validate_rotation(-90.0).is_ok());
        assert!(validate_rotation(361.0).is_err());
    }

    #[test]
    fn test_estimate_processing_time() {
        // 30 + 2*15 + 5 + 2*3 + 5 + 10 = 86
        assert_eq!(estimate_processing_time(&request("medium")), 86);
        assert_eq!(estimate_processing_time(&request("high")), 129);
        assert_eq!(estimate_processing_time(&request("low")), 60);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(3725.5), "01:02:05.500");
    }
}
