//! Scoped working directories for job executions.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::MediaResult;

/// A uuid-named scratch directory owned by exactly one job execution.
///
/// The directory is removed when the guard is dropped, on every exit path
/// including panics. Removal failures are logged and swallowed; they must
/// never mask the job's real outcome. `keep()` disarms removal so a failed
/// job can be inspected post-mortem.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    keep: bool,
}

impl WorkDir {
    /// Create a fresh working directory under `root`.
    pub async fn create(root: impl AsRef<Path>) -> MediaResult<Self> {
        let path = root.as_ref().join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path).await?;
        debug!("Created working directory {}", path.display());
        Ok(Self { path, keep: false })
    }

    /// Path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the directory.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Disarm cleanup; the directory survives the guard.
    pub fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.keep {
            debug!(
                "Keeping working directory {} (cleanup suppressed)",
                self.path.display()
            );
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove working directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workdir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let workdir = WorkDir::create(root.path()).await.unwrap();
            tokio::fs::write(workdir.join("v.mp4"), b"data").await.unwrap();
            workdir.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_workdir_kept_when_requested() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let mut workdir = WorkDir::create(root.path()).await.unwrap();
            workdir.keep();
            workdir.path().to_path_buf()
        };
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_workdir_removed_even_after_panic() {
        let root = tempfile::tempdir().unwrap();
        let workdir = WorkDir::create(root.path()).await.unwrap();
        let path = workdir.path().to_path_buf();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _workdir = workdir;
            panic!("job blew up");
        }));
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_workdirs_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkDir::create(root.path()).await.unwrap();
        let b = WorkDir::create(root.path()).await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_drop_tolerates_already_removed_dir() {
        let root = tempfile::tempdir().unwrap();
        let workdir = WorkDir::create(root.path()).await.unwrap();
        tokio::fs::remove_dir_all(workdir.path()).await.unwrap();
        drop(workdir); // must not panic
    }
}
