//! Job queue using Redis Streams.
//!
//! Messages carry their attempt count in the envelope, so a redelivered
//! job knows how many executions came before it. Failed attempts that are
//! allowed another try are parked in a sorted set scored by their due
//! time; a periodic promoter moves due entries back onto the stream.

use std::time::Duration;

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;
use crate::result::{TaskResult, RESULT_TTL_SECS};

use vgrab_models::JobId;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Broker Redis URL
    pub redis_url: String,
    /// Result backend Redis URL (defaults to the broker)
    pub result_redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Sorted set holding delayed retries
    pub scheduled_set_name: String,
    /// TTL for terminal result records
    pub result_ttl_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            result_redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vgrab:jobs".to_string(),
            consumer_group: "vgrab:workers".to_string(),
            dlq_stream_name: "vgrab:dlq".to_string(),
            scheduled_set_name: "vgrab:scheduled".to_string(),
            result_ttl_secs: RESULT_TTL_SECS,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());
        Self {
            result_redis_url: std::env::var("RESULT_REDIS_URL")
                .unwrap_or_else(|_| redis_url.clone()),
            redis_url,
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "vgrab:jobs".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "vgrab:workers".to_string()),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "vgrab:dlq".to_string()),
            scheduled_set_name: std::env::var("QUEUE_SCHEDULED_SET")
                .unwrap_or_else(|_| "vgrab:scheduled".to_string()),
            result_ttl_secs: std::env::var("RESULT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(RESULT_TTL_SECS),
        }
    }
}

/// One message handed to a worker.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Stream message ID, needed to ack
    pub message_id: String,
    /// Which execution this is (1 for the first)
    pub attempt: u32,
    /// The job payload
    pub job: QueueJob,
}

/// Entry parked in the scheduled set until its backoff elapses.
#[derive(Debug, Serialize, Deserialize)]
struct ScheduledEntry {
    job: QueueJob,
    attempt: u32,
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    result_client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let result_client = redis::Client::open(config.result_redis_url.as_str())?;
        Ok(Self {
            client,
            result_client,
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    "Consumer group already exists: {}",
                    self.config.consumer_group
                );
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Enqueue a job for its first execution.
    pub async fn enqueue(&self, job: QueueJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let message_id = self.xadd_job(&mut conn, &job, 1).await?;
        info!(
            job_id = %job.job_id(),
            task = job.task_name(),
            "Enqueued job with message ID {}",
            message_id
        );
        Ok(message_id)
    }

    async fn xadd_job(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        job: &QueueJob,
        attempt: u32,
    ) -> QueueResult<String> {
        let payload = serde_json::to_string(job)?;
        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("attempt")
            .arg(attempt)
            .query_async(conn)
            .await?;
        Ok(message_id)
    }

    /// Acknowledge a job (mark as completed and drop it from the stream).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    /// Park a failed job until its backoff elapses, then ack the original
    /// delivery. The caller passes the attempt number the *next* execution
    /// will carry.
    pub async fn schedule_retry(
        &self,
        message_id: &str,
        job: &QueueJob,
        next_attempt: u32,
        delay: Duration,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let entry = ScheduledEntry {
            job: job.clone(),
            attempt: next_attempt,
        };
        let member = serde_json::to_string(&entry)?;
        let due_ms = chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64;

        conn.zadd::<_, _, _, ()>(&self.config.scheduled_set_name, &member, due_ms)
            .await?;

        // Only ack once the retry is safely parked; if the ZADD fails the
        // un-acked message is recovered by claim_pending instead.
        self.ack(message_id).await?;

        info!(
            job_id = %job.job_id(),
            attempt = next_attempt,
            delay_secs = delay.as_secs(),
            "Scheduled retry"
        );
        Ok(())
    }

    /// Move due scheduled retries back onto the stream.
    ///
    /// Returns the number of promoted jobs. Safe to run from several
    /// workers at once: the ZREM decides which worker re-enqueues.
    pub async fn promote_scheduled(&self, count: usize) -> QueueResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&self.config.scheduled_set_name)
            .arg("-inf")
            .arg(now_ms)
            .arg("LIMIT")
            .arg(0)
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut promoted = 0;
        for member in due {
            let removed: u32 = conn
                .zrem(&self.config.scheduled_set_name, &member)
                .await?;
            if removed == 0 {
                // Another worker won the race for this entry
                continue;
            }

            match serde_json::from_str::<ScheduledEntry>(&member) {
                Ok(entry) => {
                    let message_id = self.xadd_job(&mut conn, &entry.job, entry.attempt).await?;
                    debug!(
                        job_id = %entry.job.job_id(),
                        attempt = entry.attempt,
                        "Promoted scheduled retry as {}",
                        message_id
                    );
                    promoted += 1;
                }
                Err(e) => {
                    warn!("Dropping malformed scheduled entry: {}", e);
                }
            }
        }

        Ok(promoted)
    }

    /// Move a job to the dead letter queue and ack it.
    pub async fn dlq(
        &self,
        message_id: &str,
        job: &QueueJob,
        attempts: u32,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("attempts")
            .arg(attempts)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!(
            job_id = %job.job_id(),
            attempts,
            "Moved job to DLQ: {}",
            error
        );
        Ok(())
    }

    /// Consume jobs from the queue.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let mut deliveries = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();
                match parse_entry(&entry.map) {
                    Some((job, attempt)) => {
                        debug!(job_id = %job.job_id(), attempt, "Consumed job from stream");
                        deliveries.push(Delivery {
                            message_id,
                            attempt,
                            job,
                        });
                    }
                    None => {
                        warn!("Failed to parse job payload for {}", message_id);
                        // Ack the malformed message to prevent reprocessing
                        self.ack(&message_id).await.ok();
                    }
                }
            }
        }

        Ok(deliveries)
    }

    /// Claim pending jobs that have been idle for too long.
    /// This recovers jobs from crashed workers.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        let result: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut deliveries = Vec::new();

        for entry in result.ids {
            let message_id = entry.id.clone();
            match parse_entry(&entry.map) {
                Some((job, attempt)) => {
                    info!(job_id = %job.job_id(), attempt, "Claimed pending job from stream");
                    deliveries.push(Delivery {
                        message_id,
                        attempt,
                        job,
                    });
                }
                None => {
                    warn!("Failed to parse claimed job payload for {}", message_id);
                    self.ack(&message_id).await.ok();
                }
            }
        }

        Ok(deliveries)
    }

    /// Record a terminal result in the result backend.
    pub async fn record_result(&self, job_id: &JobId, result: &TaskResult) -> QueueResult<()> {
        let mut conn = self.result_client.get_multiplexed_async_connection().await?;

        let key = result_key(job_id);
        let payload = serde_json::to_string(result)?;
        conn.set_ex::<_, _, ()>(&key, payload, self.config.result_ttl_secs)
            .await?;

        debug!(job_id = %job_id, outcome = %result.outcome, "Recorded terminal result");
        Ok(())
    }

    /// Fetch a terminal result, if one has been recorded and not expired.
    pub async fn fetch_result(&self, job_id: &JobId) -> QueueResult<Option<TaskResult>> {
        let mut conn = self.result_client.get_multiplexed_async_connection().await?;

        let key = result_key(job_id);
        let payload: Option<String> = conn.get(&key).await?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }

    /// Get the number of retries waiting on their backoff.
    pub async fn scheduled_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.zcard(&self.config.scheduled_set_name).await?;
        Ok(len)
    }
}

fn result_key(job_id: &JobId) -> String {
    format!("vgrab:result:{}", job_id)
}

/// Extract (job, attempt) from a stream entry's field map.
fn parse_entry(
    map: &std::collections::HashMap<String, redis::Value>,
) -> Option<(QueueJob, u32)> {
    let payload = match map.get("job") {
        Some(redis::Value::BulkString(payload)) => String::from_utf8_lossy(payload),
        _ => return None,
    };
    let job = serde_json::from_str::<QueueJob>(&payload).ok()?;

    let attempt = match map.get("attempt") {
        Some(redis::Value::BulkString(raw)) => String::from_utf8_lossy(raw)
            .parse::<u32>()
            .unwrap_or(1),
        _ => 1,
    };

    Some((job, attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::DownloadAndCompressJob;

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.stream_name, "vgrab:jobs");
        assert_eq!(config.consumer_group, "vgrab:workers");
        assert_eq!(config.dlq_stream_name, "vgrab:dlq");
        assert_eq!(config.result_ttl_secs, RESULT_TTL_SECS);
    }

    #[test]
    fn test_parse_entry() {
        let job = QueueJob::DownloadAndCompress(DownloadAndCompressJob::new("u"));
        let payload = serde_json::to_string(&job).unwrap();

        let mut map = std::collections::HashMap::new();
        map.insert(
            "job".to_string(),
            redis::Value::BulkString(payload.into_bytes()),
        );
        map.insert(
            "attempt".to_string(),
            redis::Value::BulkString(b"3".to_vec()),
        );

        let (parsed, attempt) = parse_entry(&map).unwrap();
        assert_eq!(parsed.job_id(), job.job_id());
        assert_eq!(attempt, 3);
    }

    #[test]
    fn test_parse_entry_defaults_attempt_to_one() {
        let job = QueueJob::DownloadAndCompress(DownloadAndCompressJob::new("u"));
        let payload = serde_json::to_string(&job).unwrap();

        let mut map = std::collections::HashMap::new();
        map.insert(
            "job".to_string(),
            redis::Value::BulkString(payload.into_bytes()),
        );

        let (_, attempt) = parse_entry(&map).unwrap();
        assert_eq!(attempt, 1);
    }

    #[test]
    fn test_parse_entry_rejects_garbage() {
        let mut map = std::collections::HashMap::new();
        map.insert(
            "job".to_string(),
            redis::Value::BulkString(b"not json".to_vec()),
        );
        assert!(parse_entry(&map).is_none());
        assert!(parse_entry(&std::collections::HashMap::new()).is_none());
    }

    #[test]
    fn test_scheduled_entry_roundtrip() {
        let entry = ScheduledEntry {
            job: QueueJob::DownloadAndCompress(DownloadAndCompressJob::new("u")),
            attempt: 2,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: ScheduledEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attempt, 2);
        assert_eq!(back.job.job_id(), entry.job.job_id());
    }
}
