//! Redis Streams task queue for the vgrab pipeline.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams (fire-and-forget dispatch)
//! - Worker consumption with attempt accounting, delayed retries and a DLQ
//! - Terminal task results in the Redis result backend

pub mod error;
pub mod job;
pub mod queue;
pub mod result;
pub mod retry;

pub use error::{QueueError, QueueResult};
pub use job::{DownloadAndCompressJob, DownloadAudioJob, QueueJob};
pub use queue::{Delivery, JobQueue, QueueConfig};
pub use result::TaskResult;
pub use retry::RetryPolicy;
