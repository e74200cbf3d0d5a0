//! Render configuration.

use std::path::PathBuf;
use std::time::Duration;

use cutlist_models::EncodingConfig;

/// Reference canvas width; percentage geometry is computed against it.
pub const DEFAULT_CANVAS_WIDTH: u32 = 1920;
/// Reference canvas height.
pub const DEFAULT_CANVAS_HEIGHT: u32 = 1080;
/// Output frame rate.
pub const DEFAULT_FRAME_RATE: u32 = 30;
/// Wall-clock limit for one engine invocation (3 hours).
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 3 * 60 * 60;

/// Settings injected into the graph builder and the executor.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Root for per-project output directories
    pub data_root: PathBuf,
    /// FFmpeg binary name or path
    pub ffmpeg_binary: String,
    /// FFprobe binary name or path
    pub ffprobe_binary: String,
    /// Engine timeout
    pub timeout: Duration,
    /// Parent of per-call temp directories (system temp dir when unset)
    pub temp_root: Option<PathBuf>,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub frame_rate: u32,
    pub encoding: EncodingConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            ffmpeg_binary: "ffmpeg".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
            timeout: Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS),
            temp_root: None,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            frame_rate: DEFAULT_FRAME_RATE,
            encoding: EncodingConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_root: std::env::var("DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_root),
            ffmpeg_binary: std::env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_binary),
            ffprobe_binary: std::env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_binary),
            timeout: std::env::var("RENDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            temp_root: std::env::var("RENDER_TEMP_DIR").ok().map(PathBuf::from),
            canvas_width: env_u32("RENDER_CANVAS_WIDTH").unwrap_or(defaults.canvas_width),
            canvas_height: env_u32("RENDER_CANVAS_HEIGHT").unwrap_or(defaults.canvas_height),
            frame_rate: env_u32("RENDER_FPS").unwrap_or(defaults.frame_rate),
            encoding: encoding_with_overrides(
                defaults.encoding,
                std::env::var("RENDER_CRF").ok().as_deref(),
                std::env::var("RENDER_PRESET").ok().as_deref(),
            ),
        }
    }

    /// Set the engine timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the output data root.
    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    /// Directory receiving rendered files and audit logs for a project.
    pub fn output_dir(&self, project_id: &str) -> PathBuf {
        self.data_root.join(project_id).join("rendered")
    }
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v| *v > 0)
}

/// Apply `RENDER_CRF` / `RENDER_PRESET` style overrides; unparsable values are ignored.
fn encoding_with_overrides(encoding: EncodingConfig, crf: Option<&str>, preset: Option<&str>) -> EncodingConfig {
    let encoding = match crf.and_then(|s| s.trim().parse::<u8>().ok()).filter(|c| *c <= 51) {
        Some(crf) => encoding.with_crf(crf),
        None => encoding,
    };
    match preset.map(str::trim).filter(|p| !p.is_empty()) {
        Some(preset) => encoding.with_preset(preset),
        None => encoding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!((config.canvas_width, config.canvas_height), (1920, 1080));
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.timeout, Duration::from_secs(10_800));
    }

    #[test]
    fn test_encoding_overrides() {
        let encoding = encoding_with_overrides(EncodingConfig::default(), Some("18"), Some(" slow "));
        assert_eq!(encoding.crf, 18);
        assert_eq!(encoding.preset, "slow");

        let encoding = encoding_with_overrides(EncodingConfig::default(), Some("99"), Some(""));
        assert_eq!(encoding, EncodingConfig::default());

        let encoding = encoding_with_overrides(EncodingConfig::default(), Some("high"), None);
        assert_eq!(encoding.crf, 23);
    }

    #[test]
    fn test_output_dir_is_per_project() {
        let config = RenderConfig::default().with_data_root("/srv/data");
        assert_eq!(
            config.output_dir("proj-1"),
            PathBuf::from("/srv/data/proj-1/rendered")
        );
    }
}
