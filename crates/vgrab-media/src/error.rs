//! Error types for tool invocations.

use thiserror::Error;

use crate::classify::DownloadFailure;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while driving the external tools.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("download failed: {0}")]
    Download(DownloadFailure),

    #[error("ffmpeg exited with status {exit_code:?}: {stderr}")]
    FfmpegFailed {
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("tool timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an ffmpeg failure error.
    pub fn ffmpeg_failed(stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// The classified download failure, if this is one.
    pub fn as_download_failure(&self) -> Option<&DownloadFailure> {
        match self {
            MediaError::Download(f) => Some(f),
            _ => None,
        }
    }
}
