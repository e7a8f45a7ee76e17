//! Overlay position resolution.

use reel_models::{Coordinate, Position};

use crate::error::{MediaError, MediaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }

    /// Named anchor as a fraction of the frame dimension.
    fn anchor(self, name: &str) -> Option<f64> {
        match (self, name) {
            (_, "center") => Some(0.5),
            (Axis::X, "left") | (Axis::Y, "top") => Some(0.0),
            (Axis::X, "right") | (Axis::Y, "bottom") => Some(1.0),
            _ => None,
        }
    }
}

/// Resolve an overlay position to pixel coordinates on a `width` x `height` frame.
///
/// Anchors are case-insensitive: `center` is half the dimension, `left`/`top`
/// are 0 and `right`/`bottom` are the full dimension. Numbers, including
/// numeric strings, pass through unchanged.
pub fn resolve_position(position: &Position, width: u32, height: u32) -> MediaResult<(f64, f64)> {
    let x = resolve_axis(&position.x, Axis::X, width)?;
    let y = resolve_axis(&position.y, Axis::Y, height)?;
    Ok((x, y))
}

fn resolve_axis(coordinate: &Coordinate, axis: Axis, dimension: u32) -> MediaResult<f64> {
    match coordinate {
        Coordinate::Pixels(value) if value.is_finite() => Ok(*value),
        Coordinate::Pixels(value) => Err(MediaError::MalformedPosition(format!(
            "{} = {} is not a finite number",
            axis.name(),
            value
        ))),
        Coordinate::Named(raw) => {
            let name = raw.trim().to_ascii_lowercase();
            if let Some(fraction) = axis.anchor(&name) {
                return Ok(dimension as f64 * fraction);
            }
            name.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    MediaError::MalformedPosition(format!(
                        "unrecognized {} anchor '{}'",
                        axis.name(),
                        raw
                    ))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(x: impl Into<Coordinate>, y: impl Into<Coordinate>, w: u32, h: u32) -> MediaResult<(f64, f64)> {
        resolve_position(&Position::new(x, y), w, h)
    }

    #[test]
    fn test_named_anchors_for_any_size() {
        for (w, h) in [(1920, 1080), (1280, 720), (481, 361), (7680, 4320)] {
            assert_eq!(resolve("left", "top", w, h).unwrap(), (0.0, 0.0));
            assert_eq!(
                resolve("center", "center", w, h).unwrap(),
                (w as f64 / 2.0, h as f64 / 2.0)
            );
            assert_eq!(resolve("right", "bottom", w, h).unwrap(), (w as f64, h as f64));
        }
    }

    #[test]
    fn test_anchors_are_case_insensitive() {
        assert_eq!(resolve("Center", "BOTTOM", 100, 50).unwrap(), (50.0, 50.0));
    }

    #[test]
    fn test_numeric_values_pass_through() {
        assert_eq!(resolve(120.0, 40.5, 1920, 1080).unwrap(), (120.0, 40.5));
        assert_eq!(resolve("75", " 12.5 ", 1920, 1080).unwrap(), (75.0, 12.5));
    }

    #[test]
    fn test_malformed_positions() {
        assert!(matches!(
            resolve("middle", "top", 1920, 1080),
            Err(MediaError::MalformedPosition(_))
        ));
        // Vertical anchors are not valid on the x axis and vice versa
        assert!(resolve("top", 0.0, 1920, 1080).is_err());
        assert!(resolve(0.0, "left", 1920, 1080).is_err());
        assert!(resolve("NaN", 0.0, 1920, 1080).is_err());
    }
}
