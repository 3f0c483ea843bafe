//! Download-and-compress worker.
//!
//! This crate provides:
//! - The `download_and_compress` pipeline (scoped workdir, one-hop format
//!   fallback, metadata/media triage, per-file keyframe stripping)
//! - The `download_audio` single-shot task
//! - The queue executor loop with retry/DLQ handling and graceful shutdown

pub mod audio;
pub mod compress;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, RetryPolicies};
pub use logging::JobLogger;
