//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vgrab_models::TaskOutcome;
use vgrab_queue::{Delivery, JobQueue, QueueJob, RetryPolicy, TaskResult};

use crate::audio::download_audio;
use crate::compress::download_and_compress;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// How many scheduled retries to promote per maintenance tick.
const PROMOTE_BATCH: usize = 16;

/// How many orphaned pending jobs to claim per maintenance tick.
const CLAIM_BATCH: usize = 5;

/// Retry behavior per task type, fixed at executor construction.
///
/// `download_audio` is single-shot by contract; its failures surface the
/// raw tool error in the DLQ record instead of being redelivered.
#[derive(Debug, Clone)]
pub struct RetryPolicies {
    pub download_and_compress: RetryPolicy,
    pub download_audio: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            download_and_compress: RetryPolicy::default(),
            download_audio: RetryPolicy::single_shot(),
        }
    }
}

impl RetryPolicies {
    fn for_job(&self, job: &QueueJob) -> &RetryPolicy {
        match job {
            QueueJob::DownloadAndCompress(_) => &self.download_and_compress,
            QueueJob::DownloadAudio(_) => &self.download_audio,
        }
    }
}

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    policies: RetryPolicies,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, policies: RetryPolicies) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            policies,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodic maintenance: promote due retries back onto the stream
        // and claim pending jobs abandoned by crashed workers.
        let queue_clone = Arc::clone(&self.queue);
        let config_clone = self.config.clone();
        let policies_clone = self.policies.clone();
        let consumer_name = self.consumer_name.clone();
        let semaphore_clone = Arc::clone(&self.job_semaphore);
        let mut shutdown_rx_maint = self.shutdown.subscribe();
        let claim_min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let maintenance_interval = self.config.maintenance_interval;

        let maintenance_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(maintenance_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx_maint.changed() => {
                        if *shutdown_rx_maint.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue_clone.promote_scheduled(PROMOTE_BATCH).await {
                            Ok(n) if n > 0 => debug!("Promoted {} scheduled retries", n),
                            Ok(_) => {}
                            Err(e) => warn!("Failed to promote scheduled retries: {}", e),
                        }

                        match queue_clone
                            .claim_pending(&consumer_name, claim_min_idle_ms, CLAIM_BATCH)
                            .await
                        {
                            Ok(deliveries) if !deliveries.is_empty() => {
                                info!("Claimed {} pending jobs", deliveries.len());
                                for delivery in deliveries {
                                    let permit =
                                        semaphore_clone.clone().acquire_owned().await;
                                    let permit = match permit {
                                        Ok(p) => p,
                                        Err(_) => break,
                                    };
                                    let config = config_clone.clone();
                                    let queue = Arc::clone(&queue_clone);
                                    let policies = policies_clone.clone();
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(config, queue, policies, delivery)
                                            .await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Failed to claim pending jobs: {}", e);
                            }
                        }
                    }
                }
            }
        });

        // Main job consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        maintenance_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(Duration::from_secs(60), self.wait_for_jobs()).await;

        info!("Job executor stopped");
        Ok(())
    }

    /// Consume and dispatch jobs from the queue.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let deliveries = self
            .queue
            .consume(
                &self.consumer_name,
                1000, // Block for 1 second
                available.min(CLAIM_BATCH),
            )
            .await?;

        if deliveries.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", deliveries.len());

        for delivery in deliveries {
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
            let config = self.config.clone();
            let queue = Arc::clone(&self.queue);
            let policies = self.policies.clone();

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(config, queue, policies, delivery).await;
            });
        }

        Ok(())
    }

    /// Execute a single delivery, then ack, schedule a retry, or
    /// dead-letter it.
    async fn execute_job(
        config: WorkerConfig,
        queue: Arc<JobQueue>,
        policies: RetryPolicies,
        delivery: Delivery,
    ) {
        let Delivery {
            message_id,
            attempt,
            job,
        } = delivery;
        let job_id = job.job_id().clone();
        info!(
            job_id = %job_id,
            task = job.task_name(),
            attempt,
            "Executing job"
        );

        match Self::process_job(&config, &job).await {
            Ok(outcome) => {
                info!(job_id = %job_id, outcome = %outcome, "Job finished");
                if let Err(e) = queue.ack(&message_id).await {
                    error!("Failed to ack job {}: {}", job_id, e);
                }
                let result = TaskResult::new(outcome, attempt);
                if let Err(e) = queue.record_result(&job_id, &result).await {
                    warn!("Failed to record result for job {}: {}", job_id, e);
                }
            }
            Err(e) => {
                error!(job_id = %job_id, attempt, "Job failed: {}", e);

                let policy = policies.for_job(&job);
                if e.is_permanent() || !policy.should_retry(attempt) {
                    if let Err(dlq_err) =
                        queue.dlq(&message_id, &job, attempt, &e.to_string()).await
                    {
                        error!("Failed to move job {} to DLQ: {}", job_id, dlq_err);
                    }
                    let result = TaskResult::new(TaskOutcome::Failed, attempt)
                        .with_error(e.to_string());
                    if let Err(re) = queue.record_result(&job_id, &result).await {
                        warn!("Failed to record result for job {}: {}", job_id, re);
                    }
                } else {
                    let delay = policy.delay_for_attempt(attempt);
                    // If parking the retry fails, the message stays
                    // un-acked and claim_pending will redeliver it.
                    if let Err(se) = queue
                        .schedule_retry(&message_id, &job, attempt + 1, delay)
                        .await
                    {
                        warn!("Failed to schedule retry for job {}: {}", job_id, se);
                    } else {
                        info!(
                            job_id = %job_id,
                            "Job will be retried (attempt {}/{})",
                            attempt + 1,
                            policy.max_attempts
                        );
                    }
                }
            }
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            let available = self.job_semaphore.available_permits();
            if available == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run the task matching the payload.
    async fn process_job(config: &WorkerConfig, job: &QueueJob) -> WorkerResult<TaskOutcome> {
        match job {
            QueueJob::DownloadAndCompress(j) => download_and_compress(config, j).await,
            QueueJob::DownloadAudio(j) => download_audio(config, j).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgrab_queue::{DownloadAndCompressJob, DownloadAudioJob};

    #[test]
    fn test_default_policies_per_task() {
        let policies = RetryPolicies::default();
        let compress = QueueJob::DownloadAndCompress(DownloadAndCompressJob::new("u"));
        let audio = QueueJob::DownloadAudio(DownloadAudioJob::new("u", "*20-30"));

        assert_eq!(policies.for_job(&compress).max_attempts, 5);
        assert_eq!(policies.for_job(&audio).max_attempts, 1);
    }
}
