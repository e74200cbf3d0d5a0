//! Per-invocation audit log.
//!
//! The log lives beside the rendered file and outlives the render's temp
//! directory. Everything is flushed to disk before the render returns.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::command::ProcessOutcome;
use crate::error::{MediaError, MediaResult};

/// Numbered variants tried after the first choice of name is taken.
const MAX_NAME_SUFFIX: u32 = 1000;

const RULE: &str = "================================================================================";

/// Audit log file for one engine invocation.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// File name for a log started at `at`.
    pub fn file_name(at: DateTime<Utc>) -> String {
        format!("render_log_{}.txt", at.format("%Y%m%d_%H%M%S_%3f"))
    }

    /// Create the log and write the header and command line.
    pub async fn create(
        dir: &Path,
        project_id: &str,
        output: &Path,
        command_line: &str,
        at: DateTime<Utc>,
    ) -> MediaResult<Self> {
        let (path, mut file) = create_unique_file(dir, &Self::file_name(at)).await?;
        let header = format!(
            "{rule}\nRENDER LOG\n{rule}\nProject: {project}\nTimestamp: {ts}\nOutput: {output}\n\nCOMMAND:\n{cmd}\n\n",
            rule = RULE,
            project = project_id,
            ts = at.to_rfc3339(),
            output = output.display(),
            cmd = command_line,
        );
        file.write_all(header.as_bytes()).await?;
        file.flush().await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append captured output, then the return code or the timeout marker.
    pub async fn record_outcome(&self, outcome: &ProcessOutcome, timeout_secs: u64) -> MediaResult<()> {
        let mut entry = format!(
            "STDOUT:\n{}\n\nSTDERR:\n{}\n\n",
            outcome.stdout().trim_end(),
            outcome.stderr().trim_end()
        );
        match outcome {
            ProcessOutcome::Completed { exit_code, .. } => {
                let code = exit_code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string());
                entry.push_str(&format!("Return Code: {}\n", code));
            }
            ProcessOutcome::TimedOut { .. } => {
                entry.push_str(&format!(
                    "{rule}\nTIMEOUT: process exceeded {secs} seconds\n{rule}\n",
                    rule = RULE,
                    secs = timeout_secs
                ));
            }
        }
        self.append(&entry).await
    }

    /// Append an error that kept the engine from producing an outcome.
    pub async fn record_error(&self, error: &MediaError) -> MediaResult<()> {
        self.append(&format!("ERROR: {}\n", error)).await
    }

    async fn append(&self, text: &str) -> MediaResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Create `file_name` in `dir`, or `{stem}_{n}.{ext}` if it already exists.
///
/// The file is opened with `create_new`, so concurrent callers never share one.
pub(crate) async fn create_unique_file(dir: &Path, file_name: &str) -> std::io::Result<(PathBuf, tokio::fs::File)> {
    let name = Path::new(file_name);
    let stem = name.file_stem().and_then(|s| s.to_str()).unwrap_or(file_name);
    let ext = name.extension().and_then(|e| e.to_str());

    for n in 0..=MAX_NAME_SUFFIX {
        let candidate = match (n, ext) {
            (0, _) => file_name.to_string(),
            (n, Some(ext)) => format!("{}_{}.{}", stem, n, ext),
            (n, None) => format!("{}_{}", stem, n),
        };
        let path = dir.join(candidate);
        match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free name for {} in {}", file_name, dir.display()),
    ))
}
