//! yt-dlp and ffmpeg CLI wrappers for the vgrab pipeline.
//!
//! This crate provides:
//! - Type-safe yt-dlp command building with output-directory listing
//! - Keyframe-strip ffmpeg invocations (`-discard nokey`, stream copy)
//! - Classification of yt-dlp failures into a closed enum
//! - Scoped working-directory lifecycle with debug-suppressible cleanup

pub mod classify;
pub mod error;
pub mod ffmpeg;
pub mod workdir;
pub mod ytdlp;

pub use classify::DownloadFailure;
pub use error::{MediaError, MediaResult};
pub use ffmpeg::{check_ffmpeg, KeyframeStrip};
pub use workdir::WorkDir;
pub use ytdlp::{check_ytdlp, YtDlpCommand};
