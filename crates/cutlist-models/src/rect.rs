use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A rectangle expressed in percentages (0 to 100) of the output canvas.
///
/// Used to cover burned-in subtitles of the source with a blurred patch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[validate(schema(function = "validate_within_canvas"))]
pub struct BlurRegion {
    /// X coordinate of the top-left corner (0 = left, 100 = right)
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub x: f64,
    /// Y coordinate of the top-left corner (0 = top, 100 = bottom)
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub y: f64,
    /// Width of the rectangle (0 to 100)
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub width: f64,
    /// Height of the rectangle (0 to 100)
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub height: f64,
    /// Whether the region is applied at all
    #[serde(default)]
    pub enabled: bool,
}

impl BlurRegion {
    /// Create an enabled region.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            enabled: true,
        }
    }
}

/// Slack for percentages that were computed client-side in floating point.
const CANVAS_EPSILON: f64 = 1e-6;

/// An enabled box must end inside the canvas on both axes.
fn validate_within_canvas(region: &BlurRegion) -> Result<(), ValidationError> {
    if !region.enabled {
        return Ok(());
    }
    if region.x + region.width > 100.0 + CANVAS_EPSILON || region.y + region.height > 100.0 + CANVAS_EPSILON {
        return Err(ValidationError::new("outside_canvas"));
    }
    Ok(())
}
