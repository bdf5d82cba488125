//! Fixed environment constants.
//!
//! These are deliberately not read from the environment or config files:
//! the orchestration core's timing and concurrency envelope is a fixed
//! property of the system, not a per-deployment knob.

/// Engine tick cadence, in seconds.
pub const POLL_INTERVAL_SECS: u64 = 2;

/// A coding/review/etc. worker session is declared timed out after this long.
pub const SESSION_TIMEOUT_SECS: u64 = 1800;

/// Review and security-review sessions use a tighter timeout.
pub const REVIEW_TIMEOUT_SECS: u64 = 600;

/// Default per-task retry ceiling, also used as the engine-wide ceiling.
pub const MAX_RETRIES_DEFAULT: i64 = 1;

/// How long the session manager waits for a SIGTERM'd worker to exit
/// before escalating to SIGKILL.
pub const GRACEFUL_KILL_WAIT_SECS: u64 = 10;

/// Exactly one coding worker may run at a time.
pub const MAX_CONCURRENT_CODING: usize = 1;

/// Exactly one review worker (review or security_review) may run at a time.
pub const MAX_CONCURRENT_REVIEW: usize = 1;

pub const DB_FILENAME: &str = "orchestrator.db";
pub const PROJECT_HIDDEN_DIR: &str = ".forge-core";
pub const BRIEFS_DIR: &str = "briefs";
pub const LOGS_DIR: &str = "logs";
pub const PLANS_DIR: &str = "plans";
pub const REPORTING_SOCKET_FILENAME: &str = "reporting.sock";
pub const REPORTING_CHANNEL_CONFIG_FILENAME: &str = "reporting-channel.json";
