//! Render request (the edit decision list) and its entities.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::rect::BlurRegion;
use crate::response::InputCounts;
use crate::subtitle::{SubtitleCue, SubtitleStyle};

/// Prefix accepted for inline overlay images.
pub const OVERLAY_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A render request: one source video plus the edits to apply to it.
///
/// Built per call and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct RenderRequest {
    /// File id of the source video
    #[serde(alias = "videoFileId")]
    #[validate(length(min = 1))]
    pub video_file_id: String,

    /// Timeline segments, in playback order. Empty means the whole source.
    #[serde(default, alias = "videoSegments")]
    #[validate(nested)]
    pub video_segments: Vec<VideoSegment>,

    /// Subtitle cues to burn in
    #[serde(default)]
    pub subtitles: Vec<SubtitleCue>,

    /// Extra audio clips mixed over the timeline
    #[serde(default, alias = "audioFiles")]
    #[validate(nested)]
    pub audio_files: Vec<AudioClip>,

    #[serde(default, alias = "subtitleStyle")]
    #[validate(nested)]
    pub subtitle_style: Option<SubtitleStyle>,

    /// Region blurred to hide subtitles already burned into the source
    #[serde(default, alias = "hardsubCoverBox", alias = "blurRegion")]
    #[validate(nested)]
    pub hardsub_cover_box: Option<BlurRegion>,

    /// Gain applied to the final mix, in decibels
    #[serde(default, alias = "masterVolumeDb")]
    #[validate(custom(function = "validate_finite"))]
    pub master_volume_db: f64,

    /// Full-canvas overlay image as a `data:image/png;base64,` URL
    #[serde(default, alias = "videoFrameUrl")]
    pub video_frame_url: Option<String>,

    /// Output file name; defaults to `rendered_{project}_{timestamp}.mp4`
    #[serde(default, alias = "outputFilename")]
    pub output_filename: Option<String>,
}

impl RenderRequest {
    /// Create a request for a source video with no edits.
    pub fn new(video_file_id: impl Into<String>) -> Self {
        Self {
            video_file_id: video_file_id.into(),
            video_segments: Vec::new(),
            subtitles: Vec::new(),
            audio_files: Vec::new(),
            subtitle_style: None,
            hardsub_cover_box: None,
            master_volume_db: 0.0,
            video_frame_url: None,
            output_filename: None,
        }
    }

    /// Counts reported back in the render response.
    pub fn input_counts(&self) -> InputCounts {
        InputCounts {
            segments: self.video_segments.len(),
            audio_tracks: self.audio_files.len(),
            subtitles: self.subtitles.len(),
        }
    }

    /// Blur region, if one is present and enabled.
    pub fn active_blur_region(&self) -> Option<&BlurRegion> {
        self.hardsub_cover_box.as_ref().filter(|b| b.enabled)
    }

    /// Base64 payload of the overlay image, if the data URL is a PNG.
    pub fn overlay_base64(&self) -> Option<&str> {
        self.video_frame_url
            .as_deref()
            .and_then(|url| url.strip_prefix(OVERLAY_DATA_URL_PREFIX))
    }
}

/// A trimmed, optionally speed-changed span of the source video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_segment_bounds"))]
pub struct VideoSegment {
    /// Start in the source, seconds
    #[serde(alias = "sourceStart")]
    #[validate(range(min = 0.0))]
    pub source_start_time: f64,
    /// End in the source, seconds (exclusive)
    #[serde(alias = "sourceEnd")]
    pub source_end_time: f64,
    /// Speed multiplier (2.0 = twice as fast)
    #[serde(default = "default_playback_rate")]
    #[validate(range(exclusive_min = 0.0))]
    pub playback_rate: f64,
}

fn default_playback_rate() -> f64 {
    1.0
}

impl VideoSegment {
    pub fn new(source_start_time: f64, source_end_time: f64, playback_rate: f64) -> Self {
        Self {
            source_start_time,
            source_end_time,
            playback_rate,
        }
    }
}

fn validate_segment_bounds(segment: &VideoSegment) -> Result<(), ValidationError> {
    let values = [
        segment.source_start_time,
        segment.source_end_time,
        segment.playback_rate,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::new("non_finite"));
    }
    if segment.source_start_time >= segment.source_end_time {
        return Err(ValidationError::new("start_not_before_end"));
    }
    Ok(())
}

/// An audio file placed on the global timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_clip_numbers"))]
pub struct AudioClip {
    /// File id of the audio bytes
    #[validate(length(min = 1))]
    pub id: String,
    /// Timeline position, seconds
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub start_time: f64,
    /// Clip gain in decibels
    #[serde(default)]
    pub volume_db: Option<f64>,
    /// Editor track index; informational only
    #[serde(default)]
    pub track: Option<u32>,
}

impl AudioClip {
    pub fn new(id: impl Into<String>, start_time: f64) -> Self {
        Self {
            id: id.into(),
            start_time,
            volume_db: None,
            track: None,
        }
    }

    pub fn with_volume_db(mut self, volume_db: f64) -> Self {
        self.volume_db = Some(volume_db);
        self
    }
}

fn validate_clip_numbers(clip: &AudioClip) -> Result<(), ValidationError> {
    if !clip.start_time.is_finite() || clip.volume_db.is_some_and(|db| !db.is_finite()) {
        return Err(ValidationError::new("non_finite"));
    }
    Ok(())
}

fn validate_finite(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("non_finite"))
    }
}
