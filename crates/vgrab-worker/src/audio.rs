//! The `download_audio` single-shot task.

use vgrab_media::YtDlpCommand;
use vgrab_models::TaskOutcome;
use vgrab_queue::DownloadAudioJob;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;

/// Extract the requested audio sections straight into the output
/// directory. No fallback format, no compression step; a failure carries
/// the tool's raw diagnostics out to the caller.
pub async fn download_audio(
    config: &WorkerConfig,
    job: &DownloadAudioJob,
) -> WorkerResult<TaskOutcome> {
    let logger = JobLogger::new(&job.job_id, "download_audio");
    logger.log_start(&format!("Downloading audio from {}", job.url));

    YtDlpCommand::new(&job.url, &config.output_root)
        .format(job.format.clone())
        .sections(Some(job.sections.clone()))
        .threads(config.download_threads)
        .embed_metadata(false)
        .run()
        .await?;

    logger.log_completion("Audio downloaded");
    Ok(TaskOutcome::Ok)
}
