//! FFmpeg command assembly and execution.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use cutlist_models::EncodingConfig;

use crate::builder::{CompiledGraph, VIDEO_OUTPUT};
use crate::error::{MediaError, MediaResult};
use crate::graph::GraphError;

/// How long to wait for the output readers after killing a timed-out child.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Builder for a multi-input FFmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// FFmpeg binary name or path
    binary: String,
    /// Input files in `-i` order
    inputs: Vec<PathBuf>,
    /// Output file path
    output: PathBuf,
    /// Arguments between the inputs and the output
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(binary: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.into(),
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add an input file.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add output arguments.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or graph label to the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(2 + self.inputs.len() * 2 + self.output_args.len() + 1);

        if self.overwrite {
            args.push("-y".to_string());
        }

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// The full command line as it would be typed in a shell.
    pub fn command_line(&self) -> String {
        std::iter::once(self.binary.clone())
            .chain(self.build_args())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Files feeding one render, in input order.
#[derive(Debug, Clone)]
pub struct RenderInputFiles<'a> {
    pub source: &'a Path,
    pub clips: &'a [PathBuf],
    pub overlay: Option<&'a Path>,
}

/// Assemble the render command for a compiled graph.
pub fn assemble_render_command(
    binary: &str,
    files: &RenderInputFiles<'_>,
    compiled: &CompiledGraph,
    encoding: &EncodingConfig,
    output: &Path,
) -> Result<FfmpegCommand, GraphError> {
    let mut cmd = FfmpegCommand::new(binary, output).input(files.source);
    for clip in files.clips {
        cmd = cmd.input(clip);
    }
    if let Some(overlay) = files.overlay {
        cmd = cmd.input(overlay);
    }

    let filter = compiled.filter_arg()?;
    cmd = match compiled {
        CompiledGraph::Simple { .. } => cmd.video_filter(filter),
        CompiledGraph::Complex { audio_output, .. } => {
            let cmd = cmd.filter_complex(filter).map(format!("[{}]", VIDEO_OUTPUT));
            match audio_output {
                Some(label) => cmd.map(format!("[{}]", label)),
                None => cmd.map("0:a?"),
            }
        }
    };

    Ok(cmd.output_args(encoding.to_ffmpeg_args()))
}

/// What happened to an engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited on its own.
    Completed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The process was killed after exceeding the timeout.
    TimedOut { stdout: String, stderr: String },
}

impl ProcessOutcome {
    pub fn stdout(&self) -> &str {
        match self {
            ProcessOutcome::Completed { stdout, .. } | ProcessOutcome::TimedOut { stdout, .. } => stdout,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            ProcessOutcome::Completed { stderr, .. } | ProcessOutcome::TimedOut { stderr, .. } => stderr,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ProcessOutcome::Completed {
                exit_code: Some(0),
                ..
            }
        )
    }
}

/// Runner for FFmpeg commands with a wall-clock timeout.
pub struct FfmpegRunner {
    timeout: Duration,
}

impl FfmpegRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run a command, capturing stdout and stderr concurrently.
    ///
    /// A timed-out child is killed and reaped before this returns.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<ProcessOutcome> {
        let args = cmd.build_args();
        debug!("Running FFmpeg: {}", cmd.command_line());

        let mut child = Command::new(cmd.binary())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;
        let stdout_task = tokio::spawn(read_to_string_lossy(stdout));
        let stderr_task = tokio::spawn(read_to_string_lossy(stderr));

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                let stdout = join_reader(stdout_task).await;
                let stderr = join_reader(stderr_task).await;
                Ok(ProcessOutcome::Completed {
                    exit_code: status.code(),
                    stdout,
                    stderr,
                })
            }
            Err(_) => {
                warn!(
                    "FFmpeg timed out after {} seconds, killing process",
                    self.timeout.as_secs()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill FFmpeg: {}", e);
                }
                let stdout = join_reader_with_grace(stdout_task).await;
                let stderr = join_reader_with_grace(stderr_task).await;
                Ok(ProcessOutcome::TimedOut { stdout, stderr })
            }
        }
    }
}

async fn read_to_string_lossy<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!("Output reader stopped early: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn join_reader(task: JoinHandle<String>) -> String {
    task.await.unwrap_or_default()
}

/// A killed child's descendants may still hold the pipe open.
async fn join_reader_with_grace(mut task: JoinHandle<String>) -> String {
    match tokio::time::timeout(READER_GRACE, &mut task).await {
        Ok(result) => result.unwrap_or_default(),
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}

/// Resolve an engine binary by name or path.
pub fn check_ffmpeg(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| {
        MediaError::FfmpegNotFound(format!("'{}' is not installed or not on PATH", binary))
    })
}

/// Resolve the probe binary by name or path.
pub fn check_ffprobe(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| {
        MediaError::FfprobeNotFound(format!("'{}' is not installed or not on PATH", binary))
    })
}
