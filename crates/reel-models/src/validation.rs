//! Request-level validation.
//!
//! Field constraints are declared with `validator` derives on the request
//! types. Cross-field invariants that the derives cannot express (unique
//! scene IDs, transition references) are checked here.

use std::collections::HashSet;

use thiserror::Error;
use validator::Validate;

use crate::request::CompositionRequest;

/// Validation failures, raised before any compilation starts.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid request: {0}")]
    Fields(#[from] validator::ValidationErrors),

    #[error("duplicate scene id: {0}")]
    DuplicateSceneId(String),

    #[error("transition references unknown scene: {0}")]
    UnknownTransitionScene(String),

    #[error("invalid trim on scene {scene_id}: end_time {end} must be greater than start_time {start}")]
    InvalidTrim { scene_id: String, start: f64, end: f64 },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

impl CompositionRequest {
    /// Validate field constraints and cross-field invariants.
    pub fn validate_request(&self) -> ValidationResult<()> {
        // Trim windows get a dedicated error so callers can report the scene.
        for scene in &self.scenes {
            if let (Some(start), Some(end)) = (scene.media.start_time, scene.media.end_time) {
                if end <= start {
                    return Err(ValidationError::InvalidTrim {
                        scene_id: scene.id.clone(),
                        start,
                        end,
                    });
                }
            }
        }

        self.validate()?;

        let mut ids = HashSet::with_capacity(self.scenes.len());
        for scene in &self.scenes {
            if !ids.insert(scene.id.as_str()) {
                return Err(ValidationError::DuplicateSceneId(scene.id.clone()));
            }
        }

        for transition in &self.transitions {
            for id in [&transition.from_scene, &transition.to_scene] {
                if !ids.contains(id.as_str()) {
                    return Err(ValidationError::UnknownTransitionScene(id.clone()));
                }
            }
        }

        Ok(())
    }
}
