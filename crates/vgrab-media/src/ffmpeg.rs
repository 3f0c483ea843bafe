//! Keyframe-strip ffmpeg invocations.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// One ffmpeg run that discards non-keyframe video packets while stream-
/// copying everything else.
///
/// `-discard nokey` drops non-keyframe packets at the demuxer, `-c copy`
/// keeps all streams (subtitles included, via the explicit `-c:s copy`)
/// untouched, and `-copyts` preserves the original timestamps so the
/// output stays seekable against the source timeline.
#[derive(Debug, Clone)]
pub struct KeyframeStrip {
    input: PathBuf,
    output: PathBuf,
    timeout: Option<Duration>,
}

impl KeyframeStrip {
    /// Create a new keyframe-strip run.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            timeout: None,
        }
    }

    /// Bound the invocation; the process is killed on expiry.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the argument list.
    pub fn build_args(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-discard".to_string(),
            "nokey".to_string(),
            "-i".to_string(),
            self.input.to_string_lossy().to_string(),
            "-c:s".to_string(),
            "copy".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-copyts".to_string(),
            self.output.to_string_lossy().to_string(),
        ]
    }

    /// Run ffmpeg to completion.
    pub async fn run(&self) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = self.build_args();
        debug!("Running ffmpeg {}", args.join(" "));

        // kill_on_drop: a timed-out wait drops the child handle, which
        // must take the ffmpeg process down with it.
        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match self.timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, child.wait_with_output()).await {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!(
                            input = %self.input.display(),
                            "ffmpeg timed out after {:?}, killing process",
                            timeout
                        );
                        return Err(MediaError::Timeout(timeout.as_secs()));
                    }
                }
            }
            None => child.wait_with_output().await?,
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            Err(MediaError::ffmpeg_failed(stderr, output.status.code()))
        }
    }
}

/// Check that ffmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let args = KeyframeStrip::new("/work/v.mp4", "/output/v.mp4").build_args();
        assert_eq!(
            args,
            vec![
                "-y",
                "-hide_banner",
                "-loglevel",
                "error",
                "-discard",
                "nokey",
                "-i",
                "/work/v.mp4",
                "-c:s",
                "copy",
                "-c",
                "copy",
                "-copyts",
                "/output/v.mp4",
            ]
        );
    }

    #[test]
    fn test_discard_precedes_input() {
        // -discard is an input option; it must appear before -i or ffmpeg
        // applies it to the output instead.
        let args = KeyframeStrip::new("in.mkv", "out.mkv").build_args();
        let discard = args.iter().position(|a| a == "-discard").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(discard < input);
    }
}
