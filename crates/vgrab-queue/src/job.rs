//! Job payloads for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vgrab_models::{FormatSelector, JobId};

/// Job to download one video and strip it down to keyframes.
///
/// Immutable once dispatched; redelivery carries the same payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadAndCompressJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Source video URL
    pub url: String,
    /// Requested format selector
    pub format: FormatSelector,
    /// Selector to try once if the requested format is unavailable;
    /// `None` disables the fallback hop entirely
    pub fallback_format: Option<FormatSelector>,
    /// Optional `--download-sections` expression
    pub sections: Option<String>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl DownloadAndCompressJob {
    /// Create a new job with the default format and fallback.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            job_id: JobId::new(),
            url: url.into(),
            format: FormatSelector::default_video(),
            fallback_format: Some(FormatSelector::fallback_mp4()),
            sections: None,
            created_at: Utc::now(),
        }
    }

    /// Set the format selector.
    pub fn with_format(mut self, format: FormatSelector) -> Self {
        self.format = format;
        self
    }

    /// Set or disable the fallback format.
    pub fn with_fallback_format(mut self, fallback: Option<FormatSelector>) -> Self {
        self.fallback_format = fallback;
        self
    }

    /// Restrict the download to chapters/time ranges.
    pub fn with_sections(mut self, sections: impl Into<String>) -> Self {
        self.sections = Some(sections.into());
        self
    }
}

/// Job to extract audio only, straight into the output directory.
///
/// Single-shot: no fallback format and no compression step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadAudioJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Source video URL
    pub url: String,
    /// `--download-sections` expression (e.g. `*20-30`)
    pub sections: String,
    /// Audio format selector
    pub format: FormatSelector,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl DownloadAudioJob {
    /// Create a new audio job with the default audio format.
    pub fn new(url: impl Into<String>, sections: impl Into<String>) -> Self {
        Self {
            job_id: JobId::new(),
            url: url.into(),
            sections: sections.into(),
            format: FormatSelector::default_audio(),
            created_at: Utc::now(),
        }
    }

    /// Set the audio format selector.
    pub fn with_format(mut self, format: FormatSelector) -> Self {
        self.format = format;
        self
    }
}

/// Envelope for everything the queue can carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum QueueJob {
    DownloadAndCompress(DownloadAndCompressJob),
    DownloadAudio(DownloadAudioJob),
}

impl QueueJob {
    /// The job's unique ID.
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::DownloadAndCompress(j) => &j.job_id,
            QueueJob::DownloadAudio(j) => &j.job_id,
        }
    }

    /// Task name, as exposed on the submission surface.
    pub fn task_name(&self) -> &'static str {
        match self {
            QueueJob::DownloadAndCompress(_) => "download_and_compress",
            QueueJob::DownloadAudio(_) => "download_audio",
        }
    }

    /// The source URL the job operates on.
    pub fn url(&self) -> &str {
        match self {
            QueueJob::DownloadAndCompress(j) => &j.url,
            QueueJob::DownloadAudio(j) => &j.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_job_defaults() {
        let job = DownloadAndCompressJob::new("https://youtu.be/abc123def45");
        assert_eq!(job.format, FormatSelector::default_video());
        assert_eq!(job.fallback_format, Some(FormatSelector::fallback_mp4()));
        assert!(job.sections.is_none());
    }

    #[test]
    fn test_fallback_can_be_disabled() {
        let job = DownloadAndCompressJob::new("u").with_fallback_format(None);
        assert!(job.fallback_format.is_none());
    }

    #[test]
    fn test_envelope_roundtrip() {
        let job = QueueJob::DownloadAndCompress(
            DownloadAndCompressJob::new("https://youtu.be/abc123def45")
                .with_sections("*10:15-inf"),
        );
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"task\":\"download_and_compress\""));

        let back: QueueJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id(), job.job_id());
        assert_eq!(back.task_name(), "download_and_compress");
        match back {
            QueueJob::DownloadAndCompress(j) => {
                assert_eq!(j.sections.as_deref(), Some("*10:15-inf"));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_audio_envelope_roundtrip() {
        let job = QueueJob::DownloadAudio(DownloadAudioJob::new("u", "*20-30"));
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"task\":\"download_audio\""));
        let back: QueueJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_name(), "download_audio");
    }
}
