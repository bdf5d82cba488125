//! Retry eligibility and retry-context formatting for failed tasks.

use crate::constants::MAX_RETRIES_DEFAULT;
use crate::models::Task;

const ERROR_TRUNCATE_LEN: usize = 2000;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    global_max_retries: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            global_max_retries: MAX_RETRIES_DEFAULT,
        }
    }
}

impl RetryPolicy {
    pub fn new(global_max_retries: i64) -> Self {
        Self { global_max_retries }
    }

    /// A task may retry while it has not yet exhausted either its own
    /// per-task ceiling or the engine-wide ceiling, whichever is tighter.
    pub fn should_retry(&self, task: &Task) -> bool {
        task.retry_count < task.max_retries.min(self.global_max_retries)
    }

    pub fn prepare_retry_context(&self, task: &Task, error_output: &str) -> String {
        let truncated: String = error_output.chars().take(ERROR_TRUNCATE_LEN).collect();
        format!(
            "PREVIOUS ATTEMPT FAILED (attempt {}):\nError: {}\n\nPlease address this error and try a different approach if needed.",
            task.retry_count + 1,
            truncated,
        )
    }
}
