//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration, built once in `main` and passed down; nothing in
/// the pipeline reads the environment after startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root under which per-job working directories are created
    pub download_root: PathBuf,
    /// Shared output directory for finished artifacts
    pub output_root: PathBuf,
    /// Concurrent download threads passed to yt-dlp (`-N`)
    pub download_threads: u32,
    /// Debug override: keep working directories for post-mortem inspection
    pub keep_workdir: bool,
    /// Maximum concurrent jobs per worker process
    pub max_concurrent_jobs: usize,
    /// How often the worker promotes due retries and scans for orphaned
    /// pending jobs
    pub maintenance_interval: Duration,
    /// Minimum idle time before a pending job can be claimed (crash recovery)
    pub claim_min_idle: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from("/tmp/vgrab"),
            output_root: PathBuf::from("/output"),
            download_threads: 10,
            keep_workdir: false,
            max_concurrent_jobs: 2,
            maintenance_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            download_root: std::env::var("DOWNLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vgrab")),
            output_root: std::env::var("OUTPUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/output")),
            download_threads: std::env::var("DOWNLOAD_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            keep_workdir: std::env::var("KEEP_WORKDIR")
                .map(|v| {
                    let v = v.to_lowercase();
                    v == "1" || v == "true" || v == "yes"
                })
                .unwrap_or(false),
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            maintenance_interval: Duration::from_secs(
                std::env::var("WORKER_MAINTENANCE_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            claim_min_idle: Duration::from_secs(
                std::env::var("WORKER_CLAIM_MIN_IDLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.download_root, PathBuf::from("/tmp/vgrab"));
        assert_eq!(config.output_root, PathBuf::from("/output"));
        assert_eq!(config.download_threads, 10);
        assert!(!config.keep_workdir);
        assert_eq!(config.max_concurrent_jobs, 2);
    }
}
