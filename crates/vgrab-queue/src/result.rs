//! Terminal task results in the result backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vgrab_models::TaskOutcome;

/// How long terminal results stay readable (24 hours).
pub const RESULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Terminal record for one task, written once when the task leaves the
/// queue for good (success, soft failure, or dead-letter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Terminal outcome
    pub outcome: TaskOutcome,
    /// Executions it took to get there
    pub attempts: u32,
    /// Last error text, preserved for operator inspection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the record was written
    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    /// Record a terminal outcome.
    pub fn new(outcome: TaskOutcome, attempts: u32) -> Self {
        Self {
            outcome,
            attempts,
            error: None,
            finished_at: Utc::now(),
        }
    }

    /// Attach the last error text.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_roundtrip() {
        let result = TaskResult::new(TaskOutcome::Failed, 5)
            .with_error("ERROR: unsupported codec");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"failed\""));
        assert!(json.contains("unsupported codec"));

        let back: TaskResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.outcome, TaskOutcome::Failed);
        assert_eq!(back.attempts, 5);
    }

    #[test]
    fn test_success_omits_error_field() {
        let result = TaskResult::new(TaskOutcome::Ok, 1);
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("error"));
    }
}
