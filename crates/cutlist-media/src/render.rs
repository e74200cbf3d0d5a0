//! Render pipeline: stage inputs, build the graph, run FFmpeg, interpret.
//!
//! Every call owns a private temp directory that is removed when the call
//! returns, whatever the outcome. The audit log and the rendered file are
//! the only artifacts written outside it.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use cutlist_models::{InputCounts, RenderRequest, RenderResponse, RenderStatus};

use crate::audit::{create_unique_file, AuditLog};
use crate::builder::{build_graph, GraphPlan};
use crate::command::{assemble_render_command, check_ffmpeg, check_ffprobe, FfmpegRunner, ProcessOutcome, RenderInputFiles};
use crate::config::RenderConfig;
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;
use crate::subtitles::{compile_ass, write_ass, SUBTITLE_FILE_NAME};

/// Number of trailing stderr lines quoted in a failure message.
const STDERR_TAIL_LINES: usize = 10;

/// Raw bytes of one input file plus the name it was uploaded under.
#[derive(Debug, Clone)]
pub struct MediaBlob {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl MediaBlob {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// `.ext` of the uploaded name, or empty when it has none.
    fn extension_suffix(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default()
    }
}

/// Everything needed for one render call.
#[derive(Debug, Clone)]
pub struct RenderInputs {
    pub project_id: String,
    pub request: RenderRequest,
    pub source: MediaBlob,
    /// One blob per `request.audio_files` entry, same order
    pub clips: Vec<MediaBlob>,
}

/// Lifecycle of a render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Preparing,
    Invoking,
    Succeeded,
    Failed,
    TimedOut,
    /// Engine pre-check failed; nothing was staged
    Rejected,
}

impl RenderState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RenderState::Preparing | RenderState::Invoking)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderState::Preparing => "preparing",
            RenderState::Invoking => "invoking",
            RenderState::Succeeded => "succeeded",
            RenderState::Failed => "failed",
            RenderState::TimedOut => "timed_out",
            RenderState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state plus the response handed back to the caller.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub state: RenderState,
    pub response: RenderResponse,
}

/// Compiles and executes render requests.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Run a render. Every outcome, including failures, is a response.
    pub async fn render(&self, inputs: RenderInputs) -> RenderResponse {
        self.render_with_report(inputs).await.response
    }

    /// Run a render and also report the final lifecycle state.
    pub async fn render_with_report(&self, inputs: RenderInputs) -> RenderReport {
        let started = Instant::now();
        let counts = inputs.request.input_counts();
        let project_id = inputs.project_id.clone();

        transition(&project_id, RenderState::Preparing);

        if let Err(e) = check_ffmpeg(&self.config.ffmpeg_binary) {
            warn!(project_id = %project_id, "Rejecting render: {}", e);
            transition(&project_id, RenderState::Rejected);
            return RenderReport {
                state: RenderState::Rejected,
                response: RenderResponse::error(e.to_string(), counts),
            };
        }

        let report = match self.execute(inputs, counts).await {
            Ok(report) => report,
            Err(e) => {
                warn!(project_id = %project_id, "Render failed before completion: {}", e);
                RenderReport {
                    state: RenderState::Failed,
                    response: RenderResponse::error(e.to_string(), counts),
                }
            }
        };

        transition(&project_id, report.state);
        info!(
            project_id = %project_id,
            state = %report.state,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Render finished"
        );
        report
    }

    async fn execute(&self, inputs: RenderInputs, counts: InputCounts) -> MediaResult<RenderReport> {
        let RenderInputs {
            project_id,
            request,
            source,
            clips,
        } = inputs;

        if clips.len() != request.audio_files.len() {
            return Err(MediaError::internal(format!(
                "expected {} audio inputs, got {}",
                request.audio_files.len(),
                clips.len()
            )));
        }

        let workdir = self.create_workdir()?;
        let dir = workdir.path();
        debug!(project_id = %project_id, workdir = %dir.display(), "Staging render inputs");

        let source_path = dir.join(format!("source{}", source.extension_suffix()));
        tokio::fs::write(&source_path, &source.bytes).await?;

        let mut clip_paths = Vec::with_capacity(clips.len());
        for (i, clip) in clips.iter().enumerate() {
            let path = dir.join(format!("audio_{}{}", i, clip.extension_suffix()));
            tokio::fs::write(&path, &clip.bytes).await?;
            clip_paths.push(path);
        }

        let overlay_path = match request.overlay_base64() {
            Some(payload) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(payload.trim())
                    .map_err(|e| MediaError::InvalidOverlay(e.to_string()))?;
                let path = dir.join("overlay.png");
                tokio::fs::write(&path, bytes).await?;
                Some(path)
            }
            None => None,
        };

        let subtitle_path = if request.subtitles.is_empty() {
            None
        } else {
            let doc = compile_ass(
                &request.subtitles,
                request.subtitle_style.as_ref(),
                self.config.canvas_width,
                self.config.canvas_height,
            );
            let path = dir.join(SUBTITLE_FILE_NAME);
            write_ass(&path, &doc).await?;
            Some(path)
        };

        let source_has_audio = self.source_has_audio(&source_path).await;

        let plan = GraphPlan::from_request(&request, subtitle_path.as_deref(), source_has_audio);
        let compiled = build_graph(&plan, &self.config)?;

        let now = Utc::now();
        let output_dir = self.config.output_dir(&project_id);
        tokio::fs::create_dir_all(&output_dir).await?;
        let output_path = match requested_output_filename(request.output_filename.as_deref()) {
            Some(name) => output_dir.join(name),
            None => {
                let (path, _) = create_unique_file(&output_dir, &default_output_filename(&project_id, now)).await?;
                path
            }
        };
        let output_filename = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let files = RenderInputFiles {
            source: &source_path,
            clips: &clip_paths,
            overlay: overlay_path.as_deref(),
        };
        let cmd = assemble_render_command(
            &self.config.ffmpeg_binary,
            &files,
            &compiled,
            &self.config.encoding,
            &output_path,
        )?;
        let command_line = cmd.command_line();

        let log = AuditLog::create(&output_dir, &project_id, &output_path, &command_line, now).await?;

        transition(&project_id, RenderState::Invoking);
        let timeout_secs = self.config.timeout.as_secs();
        let result = match FfmpegRunner::new(self.config.timeout).run(&cmd).await {
            Ok(outcome) => {
                if let Err(e) = log.record_outcome(&outcome, timeout_secs).await {
                    warn!(project_id = %project_id, "Failed to append to audit log: {}", e);
                }
                check_outcome(&outcome, &output_path, timeout_secs).await
            }
            Err(e) => {
                if let Err(log_err) = log.record_error(&e).await {
                    warn!(project_id = %project_id, "Failed to append to audit log: {}", log_err);
                }
                Err(e)
            }
        };

        let mut response = RenderResponse::error(String::new(), counts);
        response.log_file = Some(log.path().display().to_string());

        let state = match result {
            Ok(size) => {
                response.status = RenderStatus::Ok;
                response.message = "Video rendered successfully".to_string();
                response.output_filename = Some(output_filename);
                response.output_path = Some(output_path.display().to_string());
                response.file_size = Some(size);
                response.duration_seconds = self.output_duration(&output_path).await;
                RenderState::Succeeded
            }
            Err(e) => {
                warn!(project_id = %project_id, "{}", e);
                remove_if_empty(&output_path).await;
                response.message = e.to_string();
                response.command = Some(command_line);
                match e {
                    MediaError::Timeout(_) => RenderState::TimedOut,
                    _ => RenderState::Failed,
                }
            }
        };

        // Inputs are removed here, before the response leaves.
        drop(workdir);

        Ok(RenderReport { state, response })
    }

    fn create_workdir(&self) -> MediaResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("render-");
        let dir = match &self.config.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    /// Best-effort; a source is assumed to carry audio unless a probe says otherwise.
    async fn source_has_audio(&self, path: &Path) -> bool {
        if check_ffprobe(&self.config.ffprobe_binary).is_err() {
            return true;
        }
        match probe_media(&self.config.ffprobe_binary, path).await {
            Ok(info) => info.has_audio,
            Err(e) => {
                debug!("Source probe failed, assuming audio is present: {}", e);
                true
            }
        }
    }

    /// Best-effort; any failure leaves the duration unset.
    async fn output_duration(&self, path: &Path) -> Option<f64> {
        check_ffprobe(&self.config.ffprobe_binary).ok()?;
        match probe_media(&self.config.ffprobe_binary, path).await {
            Ok(info) => info.duration,
            Err(e) => {
                debug!("Output duration probe failed: {}", e);
                None
            }
        }
    }
}

/// Map an engine outcome onto the output size or the error it represents.
async fn check_outcome(outcome: &ProcessOutcome, output: &Path, timeout_secs: u64) -> MediaResult<u64> {
    match outcome {
        ProcessOutcome::TimedOut { .. } => Err(MediaError::Timeout(timeout_secs)),
        _ if outcome.is_success() => match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(meta.len()),
            _ => Err(MediaError::NoOutput(output.to_path_buf())),
        },
        ProcessOutcome::Completed { exit_code, stderr, .. } => Err(MediaError::FfmpegFailed {
            exit_code: *exit_code,
            stderr_tail: stderr_tail(stderr, STDERR_TAIL_LINES),
        }),
    }
}

/// Drop a reserved or truncated output that never received data.
async fn remove_if_empty(path: &Path) {
    if let Ok(meta) = tokio::fs::metadata(path).await {
        if meta.len() == 0 {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!("Could not remove empty output {}: {}", path.display(), e);
            }
        }
    }
}

fn transition(project_id: &str, state: RenderState) {
    info!(project_id = %project_id, state = %state, "Render state changed");
}

/// Final path component of a caller-supplied output name, if it has one.
pub fn requested_output_filename(requested: Option<&str>) -> Option<String> {
    requested
        .map(str::trim)
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// `rendered_{project}_{timestamp}.mp4`
pub fn default_output_filename(project_id: &str, at: DateTime<Utc>) -> String {
    format!("rendered_{}_{}.mp4", project_id, at.format("%Y%m%d_%H%M%S"))
}

/// Last `n` non-empty lines of the engine's stderr.
pub fn stderr_tail(stderr: &str, n: usize) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
