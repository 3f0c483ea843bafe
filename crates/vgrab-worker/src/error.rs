//! Worker error types.

use thiserror::Error;

use vgrab_media::{DownloadFailure, MediaError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] vgrab_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// The classified download failure underneath, if any.
    pub fn as_download_failure(&self) -> Option<&DownloadFailure> {
        match self {
            WorkerError::Media(e) => e.as_download_failure(),
            _ => None,
        }
    }

    /// Permanent failures skip queue-level retry and go straight to the
    /// DLQ. A format that is unavailable after the fallback hop stays
    /// unavailable no matter how often the job is redelivered.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.as_download_failure(),
            Some(DownloadFailure::FormatUnavailable { .. })
        )
    }
}
