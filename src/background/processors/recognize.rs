//! Text recognition through an external Tesseract process
//!
//! Includes:
//! - Engine binary discovery
//! - Subprocess invocation with a hard timeout
//! - Output normalization

use crate::common::TESSERACT_CANDIDATE_PATHS;
use crate::common::errors::JobError;
use crate::config::AppConfig;
use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("{0}")]
    NotFound(String),

    #[error("failed to spawn {binary:?}: {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },

    #[error("tesseract failed ({status}): {diagnostics}")]
    Execution { status: String, diagnostics: String },

    #[error("tesseract timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl From<RecognitionError> for JobError {
    fn from(err: RecognitionError) -> Self {
        match err {
            RecognitionError::NotFound(message) => JobError::EngineNotFound(message),
            // the binary exists but the OS cannot run it
            spawn @ RecognitionError::Spawn { .. } => JobError::EngineNotFound(spawn.to_string()),
            execution @ RecognitionError::Execution { .. } => {
                JobError::EngineExecution(execution.to_string())
            }
            RecognitionError::Timeout(bound) => JobError::EngineTimeout(bound),
        }
    }
}

/// Turns image bytes into plain text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: Vec<u8>) -> Result<String, RecognitionError>;
}

// ────────────────────────────────────────────────────────────────
// Engine Discovery
// ────────────────────────────────────────────────────────────────

/// Locate the engine binary.
///
/// An explicit path must point at an executable file. Without one, the
/// well-known install locations are tried in order, then `PATH`.
pub fn resolve_binary(explicit: Option<&Path>) -> Result<PathBuf, RecognitionError> {
    if let Some(path) = explicit {
        return if is_executable(path) {
            Ok(path.to_path_buf())
        } else {
            Err(RecognitionError::NotFound(format!(
                "configured TESSERACT_PATH {:?} is not an executable file",
                path
            )))
        };
    }

    if let Some(found) = TESSERACT_CANDIDATE_PATHS
        .iter()
        .map(Path::new)
        .find(|candidate| is_executable(candidate))
    {
        return Ok(found.to_path_buf());
    }

    which::which("tesseract").map_err(|_| {
        RecognitionError::NotFound(format!(
            "tesseract not found in {:?} or PATH",
            TESSERACT_CANDIDATE_PATHS
        ))
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ────────────────────────────────────────────────────────────────
// Invocation
// ────────────────────────────────────────────────────────────────

pub struct TesseractRecognizer {
    explicit_binary: Option<PathBuf>,
    tessdata_prefix: PathBuf,
    language: String,
    timeout: Duration,
}

impl TesseractRecognizer {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            explicit_binary: config.tesseract_path.clone(),
            tessdata_prefix: config.tessdata_prefix.clone(),
            language: config.ocr_language.clone(),
            timeout: config.ocr_timeout(),
        }
    }

    fn command(&self, binary: &Path) -> Command {
        let mut cmd = Command::new(binary);
        // image on stdin, text on stdout
        cmd.args(["-", "stdout", "-l", self.language.as_str()])
            .args(["--psm", "6", "--oem", "3"])
            .args(["-c", "preserve_interword_spaces=1"])
            .env("TESSDATA_PREFIX", &self.tessdata_prefix)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    async fn recognize(&self, image: Vec<u8>) -> Result<String, RecognitionError> {
        // Resolved per call so a missing engine fails the job, not the process
        let binary = resolve_binary(self.explicit_binary.as_deref())?;

        let mut child = self
            .command(&binary)
            .spawn()
            .map_err(|source| RecognitionError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        // Fed from its own task so a full stdout pipe cannot deadlock the write
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&image).await {
                    debug!("tesseract closed stdin early: {}", err);
                }
            });
        }

        // Dropping the future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| RecognitionError::Spawn {
                binary: binary.clone(),
                source,
            })?,
            Err(_) => return Err(RecognitionError::Timeout(self.timeout)),
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(RecognitionError::Execution {
                status: output.status.to_string(),
                diagnostics: stderr,
            });
        }
        if !stderr.is_empty() {
            warn!("tesseract reported: {}", stderr);
        }

        Ok(normalize_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*[\r\n]+\s*").expect("line break pattern is valid")
});

/// Collapse every line break, with the whitespace around it, to one space.
pub fn normalize_text(raw: &str) -> String {
    LINE_BREAKS.replace_all(raw, " ").trim().to_string()
}
