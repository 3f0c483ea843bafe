//! yt-dlp format selectors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A yt-dlp format selector expression.
///
/// The grammar is owned by yt-dlp ("FORMAT SELECTION" in its help text);
/// this type only carries the expression around and supplies the
/// pipeline's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatSelector(pub String);

impl FormatSelector {
    /// Create from an existing expression.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Default video selector: best MP4 capped at 360p.
    pub fn default_video() -> Self {
        Self("b[height<=360][ext=mp4]".to_string())
    }

    /// Default fallback selector: best MP4 of any resolution.
    pub fn fallback_mp4() -> Self {
        Self("b[ext=mp4]".to_string())
    }

    /// Default audio selector: itag 140 (m4a audio).
    pub fn default_audio() -> Self {
        Self("140".to_string())
    }

    /// Get the inner expression.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FormatSelector {
    fn default() -> Self {
        Self::default_video()
    }
}

impl fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FormatSelector {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FormatSelector {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(FormatSelector::default().as_str(), "b[height<=360][ext=mp4]");
        assert_eq!(FormatSelector::fallback_mp4().as_str(), "b[ext=mp4]");
        assert_eq!(FormatSelector::default_audio().as_str(), "140");
    }

    #[test]
    fn test_transparent_serde() {
        let f = FormatSelector::new("bv*+ba/b");
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, "\"bv*+ba/b\"");
        let back: FormatSelector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
