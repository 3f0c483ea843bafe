//! yt-dlp command builder and runner.
//!
//! yt-dlp does all the actual network and extraction work; this module
//! only assembles the fixed argument template, runs the process, and
//! reports what landed on disk.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use vgrab_models::FormatSelector;

use crate::classify::DownloadFailure;
use crate::error::{MediaError, MediaResult};

/// Output template naming files by the video's stable identifier.
///
/// Every execution for the same video converges on the same file names,
/// which is what makes concurrent writes to the shared output directory
/// safe (last writer wins).
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// Builder for one yt-dlp invocation.
#[derive(Debug, Clone)]
pub struct YtDlpCommand {
    url: String,
    dest_dir: PathBuf,
    format: FormatSelector,
    sections: Option<String>,
    threads: u32,
    embed_metadata: bool,
}

impl YtDlpCommand {
    /// Create a new download into `dest_dir`.
    pub fn new(url: impl Into<String>, dest_dir: impl AsRef<Path>) -> Self {
        Self {
            url: url.into(),
            dest_dir: dest_dir.as_ref().to_path_buf(),
            format: FormatSelector::default(),
            sections: None,
            threads: 1,
            embed_metadata: true,
        }
    }

    /// Set the format selector.
    pub fn format(mut self, format: FormatSelector) -> Self {
        self.format = format;
        self
    }

    /// Restrict the download to chapters/time ranges
    /// (`--download-sections` grammar, e.g. `*20-30`).
    pub fn sections(mut self, sections: Option<String>) -> Self {
        self.sections = sections;
        self
    }

    /// Number of concurrent download threads yt-dlp may use internally.
    pub fn threads(mut self, threads: u32) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Whether to write the info JSON and embed subs/chapters/metadata.
    /// Audio-only extraction turns this off.
    pub fn embed_metadata(mut self, embed: bool) -> Self {
        self.embed_metadata = embed;
        self
    }

    /// Build the argument list.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-N".to_string(), self.threads.to_string()];

        if self.embed_metadata {
            args.extend(
                [
                    "--write-info-json",
                    "--embed-subs",
                    "--embed-chapters",
                    "--embed-metadata",
                ]
                .map(String::from),
            );
        }

        args.push("--no-progress".to_string());
        args.push("-q".to_string());

        args.push("--format".to_string());
        args.push(self.format.as_str().to_string());

        if let Some(sections) = &self.sections {
            args.push("--download-sections".to_string());
            args.push(sections.clone());
        }

        args.push("--output".to_string());
        args.push(
            self.dest_dir
                .join(OUTPUT_TEMPLATE)
                .to_string_lossy()
                .to_string(),
        );

        args.push(self.url.clone());
        args
    }

    /// Run yt-dlp to completion.
    ///
    /// On success, returns the regular files now present in the
    /// destination directory. On nonzero exit, returns the classified
    /// failure with the full stderr preserved.
    pub async fn run(&self) -> MediaResult<Vec<PathBuf>> {
        which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

        let args = self.build_args();
        debug!("Running yt-dlp {}", args.join(" "));
        info!(url = %self.url, format = %self.format, "Downloading video");

        let output = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            debug!("yt-dlp stderr: {}", stderr);
            return Err(MediaError::Download(DownloadFailure::classify(stderr)));
        }

        let files = list_files(&self.dest_dir).await?;
        info!(
            url = %self.url,
            file_count = files.len(),
            "Download finished"
        );
        Ok(files)
    }
}

/// List the regular files in a directory.
async fn list_files(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Check that yt-dlp is available.
pub fn check_ytdlp() -> MediaResult<PathBuf> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_video() {
        let args = YtDlpCommand::new("https://youtu.be/abc123def45", "/work/1234")
            .format(FormatSelector::default_video())
            .threads(10)
            .build_args();

        assert_eq!(args[0], "-N");
        assert_eq!(args[1], "10");
        assert!(args.contains(&"--write-info-json".to_string()));
        assert!(args.contains(&"--embed-subs".to_string()));
        assert!(args.contains(&"--no-progress".to_string()));
        assert!(args.contains(&"-q".to_string()));

        let fmt_pos = args.iter().position(|a| a == "--format").unwrap();
        assert_eq!(args[fmt_pos + 1], "b[height<=360][ext=mp4]");

        let out_pos = args.iter().position(|a| a == "--output").unwrap();
        assert_eq!(args[out_pos + 1], "/work/1234/%(id)s.%(ext)s");

        // URL comes last
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc123def45");
        assert!(!args.contains(&"--download-sections".to_string()));
    }

    #[test]
    fn test_build_args_audio() {
        let args = YtDlpCommand::new("https://youtu.be/abc123def45", "/output")
            .format(FormatSelector::default_audio())
            .sections(Some("*20-30".to_string()))
            .embed_metadata(false)
            .build_args();

        assert!(!args.contains(&"--write-info-json".to_string()));
        assert!(!args.contains(&"--embed-metadata".to_string()));

        let sec_pos = args.iter().position(|a| a == "--download-sections").unwrap();
        assert_eq!(args[sec_pos + 1], "*20-30");

        let fmt_pos = args.iter().position(|a| a == "--format").unwrap();
        assert_eq!(args[fmt_pos + 1], "140");
    }

    #[test]
    fn test_threads_clamped_to_one() {
        let args = YtDlpCommand::new("u", "/d").threads(0).build_args();
        assert_eq!(args[1], "1");
    }

    #[tokio::test]
    async fn test_list_files_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        tokio::fs::write(dir.path().join("a.mp4"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("a.info.json"), b"{}")
            .await
            .unwrap();

        let files = list_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.info.json", "a.mp4"]);
    }
}
