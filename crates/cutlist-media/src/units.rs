//! Gain and geometry conversions.

use cutlist_models::BlurRegion;

/// Convert decibels to a linear amplitude factor: `10^(db/20)`.
pub fn db_to_linear_gain(db: f64) -> f64 {
    if db == 0.0 {
        return 1.0;
    }
    10f64.powf(db / 20.0)
}

/// Format a linear gain the way `volume=` expects it (six decimals).
pub fn format_gain(gain: f64) -> String {
    format!("{:.6}", gain)
}

/// A rectangle in output-canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Whether the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Map a percentage box onto a canvas, truncating to whole pixels.
///
/// The result is clipped to the canvas so `crop` never has to shift it.
pub fn percent_box_to_pixels(region: &BlurRegion, canvas_width: u32, canvas_height: u32) -> PixelRect {
    let w = f64::from(canvas_width);
    let h = f64::from(canvas_height);
    let x = ((region.x * w / 100.0) as u32).min(canvas_width);
    let y = ((region.y * h / 100.0) as u32).min(canvas_height);
    PixelRect {
        x,
        y,
        width: ((region.width * w / 100.0) as u32).min(canvas_width - x),
        height: ((region.height * h / 100.0) as u32).min(canvas_height - y),
    }
}

/// Convert a timeline offset in seconds to whole milliseconds for `adelay`.
pub fn seconds_to_delay_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}
