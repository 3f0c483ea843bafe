//! Classification of yt-dlp failures.
//!
//! yt-dlp reports everything through its exit status and stderr text, so
//! the only way to tell an upstream throttle from a missing format is to
//! match known marker phrases. The markers live here as data; nothing else
//! in the workspace matches on raw stderr.

use std::fmt;

/// Stderr phrases that indicate upstream throttling.
const RATE_LIMIT_MARKERS: &[&str] = &["Too Many Requests", "HTTP Error 429"];

/// Stderr phrases that indicate the requested format selector matched
/// nothing on the remote side.
const FORMAT_UNAVAILABLE_MARKERS: &[&str] = &["Requested format is not available"];

/// A classified yt-dlp failure.
///
/// The full stderr text is preserved on every variant for diagnostics;
/// the variant decides what the caller may do about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailure {
    /// Upstream throttling; retrying later may succeed.
    RateLimited { stderr: String },
    /// The format selector matched nothing; a different selector may work.
    FormatUnavailable { stderr: String },
    /// Anything else yt-dlp can fail with.
    Other { stderr: String },
}

impl DownloadFailure {
    /// Classify captured stderr text.
    pub fn classify(stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();

        if RATE_LIMIT_MARKERS.iter().any(|m| stderr.contains(m)) {
            return Self::RateLimited { stderr };
        }
        if FORMAT_UNAVAILABLE_MARKERS.iter().any(|m| stderr.contains(m)) {
            return Self::FormatUnavailable { stderr };
        }
        Self::Other { stderr }
    }

    /// Full captured stderr text.
    pub fn stderr(&self) -> &str {
        match self {
            Self::RateLimited { stderr }
            | Self::FormatUnavailable { stderr }
            | Self::Other { stderr } => stderr,
        }
    }

    /// Last non-empty stderr line, the part yt-dlp puts the actual
    /// diagnostic in.
    pub fn diagnostic(&self) -> &str {
        self.stderr()
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("unknown error")
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_format_unavailable(&self) -> bool {
        matches!(self, Self::FormatUnavailable { .. })
    }
}

impl fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { .. } => write!(f, "rate limited: {}", self.diagnostic()),
            Self::FormatUnavailable { .. } => {
                write!(f, "requested format not available: {}", self.diagnostic())
            }
            Self::Other { .. } => write!(f, "{}", self.diagnostic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limited() {
        let f = DownloadFailure::classify("ERROR: HTTP Error 429: Too Many Requests");
        assert!(f.is_rate_limited());

        let f = DownloadFailure::classify("WARNING: retry\nERROR: HTTP Error 429");
        assert!(f.is_rate_limited());
    }

    #[test]
    fn test_classify_format_unavailable() {
        let f = DownloadFailure::classify(
            "ERROR: [youtube] abc123def45: Requested format is not available. \
             Use --list-formats for a list of available formats",
        );
        assert!(f.is_format_unavailable());
        assert!(!f.is_rate_limited());
    }

    #[test]
    fn test_classify_other_preserves_stderr() {
        let stderr = "ERROR: [youtube] xyz: Video unavailable";
        let f = DownloadFailure::classify(stderr);
        assert_eq!(f, DownloadFailure::Other { stderr: stderr.to_string() });
        assert_eq!(f.stderr(), stderr);
    }

    #[test]
    fn test_diagnostic_is_last_nonempty_line() {
        let f = DownloadFailure::classify("WARNING: something\nERROR: the real reason\n\n");
        assert_eq!(f.diagnostic(), "ERROR: the real reason");

        let f = DownloadFailure::classify("");
        assert_eq!(f.diagnostic(), "unknown error");
    }

    #[test]
    fn test_rate_limit_wins_over_format() {
        // A throttled response sometimes arrives mid-format-probe; the
        // transient classification must win so the job is retried.
        let f = DownloadFailure::classify(
            "Requested format is not available\nERROR: HTTP Error 429: Too Many Requests",
        );
        assert!(f.is_rate_limited());
    }
}
