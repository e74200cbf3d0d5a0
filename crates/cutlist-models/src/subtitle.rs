//! Subtitle cues and burn-in styling.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Default subtitle font family.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";
/// Default font size in pixels.
pub const DEFAULT_FONT_SIZE: f64 = 48.0;
/// Default fill colour.
pub const DEFAULT_PRIMARY_COLOR: &str = "#FFFFFF";
/// Default outline colour.
pub const DEFAULT_OUTLINE_COLOR: &str = "#000000";
/// Default outline width in pixels.
pub const DEFAULT_OUTLINE_WIDTH: f64 = 2.5;
/// Default bottom margin, percent of canvas height.
pub const DEFAULT_VERTICAL_MARGIN: f64 = 8.0;
/// Default horizontal alignment.
pub const DEFAULT_HORIZONTAL_ALIGN: &str = "center";

/// One subtitle cue in SRT timing notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleCue {
    /// Start time (`HH:MM:SS,mmm`)
    #[serde(default = "zero_srt_time")]
    pub start_time: String,
    /// End time (`HH:MM:SS,mmm`)
    #[serde(default = "zero_srt_time")]
    pub end_time: String,
    /// Cue text; may contain line breaks
    #[serde(default)]
    pub text: String,
}

fn zero_srt_time() -> String {
    "00:00:00,000".to_string()
}

impl SubtitleCue {
    pub fn new(start_time: impl Into<String>, end_time: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
            text: text.into(),
        }
    }
}

/// Visual style applied to every burned-in cue.
///
/// Any field omitted from the payload falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SubtitleStyle {
    pub font_family: String,
    /// Font size in pixels
    #[validate(range(exclusive_min = 0.0))]
    pub font_size: f64,
    /// Fill colour (`#RRGGBB`)
    #[validate(custom(function = "validate_hex_color"))]
    pub primary_color: String,
    /// Outline colour (`#RRGGBB`)
    #[validate(custom(function = "validate_hex_color"))]
    pub outline_color: String,
    /// Outline width in pixels
    #[validate(range(min = 0.0))]
    pub outline_width: f64,
    /// Distance from the bottom edge, percent of canvas height
    #[validate(range(min = 0.0, max = 100.0))]
    pub vertical_margin: f64,
    /// "left", "center" or "right"
    pub horizontal_align: String,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            outline_color: DEFAULT_OUTLINE_COLOR.to_string(),
            outline_width: DEFAULT_OUTLINE_WIDTH,
            vertical_margin: DEFAULT_VERTICAL_MARGIN,
            horizontal_align: DEFAULT_HORIZONTAL_ALIGN.to_string(),
        }
    }
}

/// Check that a colour is written as `#RRGGBB`.
pub fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    if is_hex_color(value) {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color"))
    }
}

/// Whether `value` is a `#RRGGBB` colour.
pub fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}
