//! Render result returned to API callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome status of a render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    Ok,
    Error,
}

/// Structured render result. Every render call produces one of these,
/// including engine failures and timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderResponse {
    pub status: RenderStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Output size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Probed output duration; omitted when the probe fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub segment_count: usize,
    pub audio_track_count: usize,
    pub subtitle_count: usize,
    /// Audit log of the engine invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    /// Engine command line, reported on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Input counts echoed back in every response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputCounts {
    pub segments: usize,
    pub audio_tracks: usize,
    pub subtitles: usize,
}

impl RenderResponse {
    /// Create an error response carrying only a message and the input counts.
    pub fn error(message: impl Into<String>, counts: InputCounts) -> Self {
        Self {
            status: RenderStatus::Error,
            message: message.into(),
            output_filename: None,
            output_path: None,
            file_size: None,
            duration_seconds: None,
            segment_count: counts.segments,
            audio_track_count: counts.audio_tracks,
            subtitle_count: counts.subtitles,
            log_file: None,
            command: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RenderStatus::Ok
    }
}
