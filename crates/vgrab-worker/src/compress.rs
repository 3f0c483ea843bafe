//! The `download_and_compress` pipeline.
//!
//! One execution: fresh working directory, download (with at most one
//! format-fallback hop), triage into metadata and media, copy metadata to
//! the output directory, keyframe-strip each media file into the output
//! directory. The working directory is removed on every exit path unless
//! the debug override is set.

use std::path::{Path, PathBuf};

use tracing::warn;

use vgrab_media::{DownloadFailure, KeyframeStrip, MediaError, WorkDir, YtDlpCommand};
use vgrab_models::{FormatSelector, TaskOutcome};
use vgrab_queue::DownloadAndCompressJob;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// What to do after a failed downloader invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Try once more with this selector; the retried attempt carries no
    /// fallback of its own.
    RetryWith(FormatSelector),
    /// Propagate the failure.
    GiveUp,
}

impl FallbackDecision {
    /// Decide whether a failed download gets its one fallback hop.
    ///
    /// Rate limiting is never resolved by switching formats; it is
    /// re-raised so the queue retries the whole job later. Unknown
    /// failures likewise propagate.
    pub fn decide(failure: &DownloadFailure, fallback: Option<&FormatSelector>) -> Self {
        match failure {
            DownloadFailure::FormatUnavailable { .. } => match fallback {
                Some(f) => Self::RetryWith(f.clone()),
                None => Self::GiveUp,
            },
            DownloadFailure::RateLimited { .. } | DownloadFailure::Other { .. } => Self::GiveUp,
        }
    }
}

/// Run one `download_and_compress` execution.
pub async fn download_and_compress(
    config: &WorkerConfig,
    job: &DownloadAndCompressJob,
) -> WorkerResult<TaskOutcome> {
    let logger = JobLogger::new(&job.job_id, "download_and_compress");
    logger.log_start(&format!("Downloading video from {}", job.url));

    let mut workdir = WorkDir::create(&config.download_root).await?;
    if config.keep_workdir {
        workdir.keep();
    }

    let files = download_with_fallback(config, job, workdir.path(), &logger).await?;
    let (metadata, media) = partition_files(files);

    relocate_metadata(&metadata, &config.output_root, &logger).await?;

    if media.is_empty() {
        logger.log_warning(&format!("No media files produced for {}", job.url));
        return Ok(TaskOutcome::Empty);
    }

    let mut all_ok = true;
    for file in &media {
        let name = match file.file_name() {
            Some(n) => n,
            None => continue,
        };
        let dest = config.output_root.join(name);
        logger.log_progress(&format!("Compressing {}", name.to_string_lossy()));

        if let Err(e) = KeyframeStrip::new(file, &dest).run().await {
            all_ok = false;
            logger.log_error(&format!(
                "Compression failed for {}: {}",
                name.to_string_lossy(),
                e
            ));
        }
    }

    if all_ok {
        logger.log_completion(&format!("Compressed {} media file(s)", media.len()));
        Ok(TaskOutcome::Ok)
    } else {
        logger.log_error(&format!("Error compressing video {}", job.url));
        Ok(TaskOutcome::Failed)
    }
}

/// Invoke the downloader, applying the fallback policy on failure.
///
/// At most two invocations: the retried attempt has its fallback stripped,
/// so a second `FormatUnavailable` necessarily gives up.
async fn download_with_fallback(
    config: &WorkerConfig,
    job: &DownloadAndCompressJob,
    dest: &Path,
    logger: &JobLogger,
) -> WorkerResult<Vec<PathBuf>> {
    let mut format = job.format.clone();
    let mut fallback = job.fallback_format.clone();

    loop {
        let result = YtDlpCommand::new(&job.url, dest)
            .format(format.clone())
            .threads(config.download_threads)
            .sections(job.sections.clone())
            .run()
            .await;

        match result {
            Ok(files) => return Ok(files),
            Err(MediaError::Download(failure)) => {
                match FallbackDecision::decide(&failure, fallback.as_ref()) {
                    FallbackDecision::RetryWith(f) => {
                        logger.log_warning(&format!(
                            "Format {} not available, falling back to {}",
                            format, f
                        ));
                        format = f;
                        fallback = None;
                    }
                    FallbackDecision::GiveUp => {
                        logger.log_error(&format!(
                            "Error downloading video {}: {}",
                            job.url,
                            failure.diagnostic()
                        ));
                        return Err(MediaError::Download(failure).into());
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Partition downloaded files into metadata (`.json`) and media
/// (everything else).
pub fn partition_files(files: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
    files
        .into_iter()
        .partition(|f| f.extension().is_some_and(|ext| ext == "json"))
}

/// Copy metadata files verbatim into the output directory.
async fn relocate_metadata(
    metadata: &[PathBuf],
    output_root: &Path,
    logger: &JobLogger,
) -> WorkerResult<()> {
    for file in metadata {
        let name = match file.file_name() {
            Some(n) => n,
            None => {
                warn!("Skipping metadata file without a name: {}", file.display());
                continue;
            }
        };
        logger.log_progress(&format!("Copying json {}", name.to_string_lossy()));
        tokio::fs::copy(file, output_root.join(name)).await?;
    }
    Ok(())
}
