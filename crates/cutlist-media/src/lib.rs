//! EDL to FFmpeg filter-graph compiler and render runner.
//!
//! This crate provides:
//! - Unit conversions (decibels, percentage boxes, delays)
//! - Audio tempo decomposition for `atempo`
//! - ASS subtitle compilation for burn-in
//! - A label-checked filter graph and the graph builder
//! - Command assembly, timed execution and audit logging
//! - The render pipeline that ties them together

pub mod audit;
pub mod builder;
pub mod command;
pub mod config;
pub mod error;
pub mod graph;
pub mod probe;
pub mod render;
pub mod subtitles;
pub mod tempo;
pub mod units;

pub use audit::AuditLog;
pub use builder::{build_graph, CompiledGraph, GraphPlan, AUDIO_OUTPUT, VIDEO_OUTPUT};
pub use command::{
    assemble_render_command, check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, ProcessOutcome,
    RenderInputFiles,
};
pub use config::RenderConfig;
pub use error::{MediaError, MediaResult};
pub use graph::{FilterGraph, FilterNode, GraphError, Pad, StreamKind};
pub use probe::{probe_media, MediaInfo};
pub use render::{MediaBlob, RenderInputs, RenderReport, RenderState, Renderer};
pub use subtitles::compile_ass;
pub use tempo::decompose_tempo;
pub use units::db_to_linear_gain;
