//! Shared data models for the Cutlist render backend.
//!
//! This crate provides Serde-serializable types for:
//! - Render requests (segments, audio clips, subtitles, blur region)
//! - Render responses
//! - Encoding configuration
//! - SRT / ASS timestamp conversion

pub mod encoding;
pub mod rect;
pub mod render;
pub mod response;
pub mod subtitle;
pub mod timestamp;

// Re-export common types
pub use encoding::EncodingConfig;
pub use rect::BlurRegion;
pub use render::{AudioClip, RenderRequest, VideoSegment, OVERLAY_DATA_URL_PREFIX};
pub use response::{InputCounts, RenderResponse, RenderStatus};
pub use subtitle::{SubtitleCue, SubtitleStyle};
