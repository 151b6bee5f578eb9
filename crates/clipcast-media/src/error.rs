//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("{tool} exited with status {exit_code:?}: {stderr}")]
    CommandFailed {
        tool: &'static str,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    pub fn command_failed(
        tool: &'static str,
        stderr: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::CommandFailed {
            tool,
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Whether this failure looks transient (network hiccup, rate limit,
    /// timeout) rather than a property of the input itself.
    pub fn is_transient(&self) -> bool {
        match self {
            MediaError::Timeout(_) => true,
            MediaError::DownloadFailed(msg) => stderr_looks_transient(msg),
            MediaError::CommandFailed { stderr, .. } => stderr_looks_transient(stderr),
            _ => false,
        }
    }
}

/// Subprocess tools only give us stderr text to classify with.
fn stderr_looks_transient(stderr: &str) -> bool {
    let msg = stderr.to_lowercase();
    msg.contains("timed out")
        || msg.contains("timeout")
        || msg.contains("connection reset")
        || msg.contains("connection refused")
        || msg.contains("temporary failure")
        || msg.contains("network is unreachable")
        || msg.contains("http error 429")
        || msg.contains("http error 5")
        || msg.contains("rate limit")
}
