//! Structured job logging.

use tracing::{error, info, warn};
use vgrab_models::JobId;

/// Logger carrying the job id and task name as structured fields, so one
/// job's lifecycle can be followed across interleaved worker output.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    task: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and task.
    pub fn new(job_id: &JobId, task: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            task: task.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, task = %self.task, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, task = %self.task, "{}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, task = %self.task, "{}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, task = %self.task, "{}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, task = %self.task, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn task(&self) -> &str {
        &self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_fields() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "download_and_compress");
        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.task(), "download_and_compress");
    }
}
