//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::graph::GraphError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while compiling or running a render.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("FFprobe not found: {0}")]
    FfprobeNotFound(String),

    #[error("FFmpeg failed (exit code {}): {stderr_tail}", exit_code_label(.exit_code))]
    FfmpegFailed {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("FFmpeg exited successfully but produced no output file")]
    NoOutput(PathBuf),

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Invalid filter graph: {0}")]
    InvalidGraph(#[from] GraphError),

    #[error("Invalid overlay image: {0}")]
    InvalidOverlay(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Render timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}
