//! Status and kind enumerations shared across the runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Initialized,
    Planning,
    Planned,
    Running,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Retrying,
    Paused,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Coding,
    Review,
    SecurityReview,
    Deployment,
    Verification,
    Planning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Starting,
    Running,
    Completed,
    Failed,
    Killed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Coding,
    Review,
    SecurityReview,
    Planning,
    Deployment,
    Verification,
}

impl From<TaskKind> for SessionKind {
    fn from(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Coding => SessionKind::Coding,
            TaskKind::Review => SessionKind::Review,
            TaskKind::SecurityReview => SessionKind::SecurityReview,
            TaskKind::Deployment => SessionKind::Deployment,
            TaskKind::Verification => SessionKind::Verification,
            TaskKind::Planning => SessionKind::Planning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatusChanged,
    Created,
    Retried,
    Error,
    Paused,
    Resumed,
    ReviewScheduled,
    DeploymentStarted,
    VerificationResult,
    HumanInputRequested,
}

macro_rules! impl_display_via_str {
    ($ty:ty, $( $variant:ident => $str:literal ),+ $(,)?) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $( Self::$variant => $str, )+
                };
                f.write_str(s)
            }
        }

        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $str, )+
                }
            }

            pub fn parse_str(s: &str) -> Option<Self> {
                match s {
                    $( $str => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

impl_display_via_str!(ProjectStatus,
    Initialized => "initialized",
    Planning => "planning",
    Planned => "planned",
    Running => "running",
    Paused => "paused",
    Completed => "completed",
    Failed => "failed",
);

impl_display_via_str!(PhaseStatus,
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
    Skipped => "skipped",
);

impl_display_via_str!(TaskStatus,
    Pending => "pending",
    Queued => "queued",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Retrying => "retrying",
    Paused => "paused",
    Skipped => "skipped",
);

impl_display_via_str!(TaskKind,
    Coding => "coding",
    Review => "review",
    SecurityReview => "security_review",
    Deployment => "deployment",
    Verification => "verification",
    Planning => "planning",
);

impl_display_via_str!(SessionStatus,
    Pending => "pending",
    Starting => "starting",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Killed => "killed",
    TimedOut => "timed_out",
);

impl_display_via_str!(SessionKind,
    Coding => "coding",
    Review => "review",
    SecurityReview => "security_review",
    Planning => "planning",
    Deployment => "deployment",
    Verification => "verification",
);

impl_display_via_str!(EventKind,
    StatusChanged => "status_changed",
    Created => "created",
    Retried => "retried",
    Error => "error",
    Paused => "paused",
    Resumed => "resumed",
    ReviewScheduled => "review_scheduled",
    DeploymentStarted => "deployment_started",
    VerificationResult => "verification_result",
    HumanInputRequested => "human_input_requested",
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_round_trips_through_str() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Retrying,
            TaskStatus::Paused,
            TaskStatus::Skipped,
        ] {
            let parsed = TaskStatus::parse_str(s.as_str()).unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn task_kind_maps_to_session_kind() {
        assert_eq!(SessionKind::from(TaskKind::Coding), SessionKind::Coding);
        assert_eq!(
            SessionKind::from(TaskKind::SecurityReview),
            SessionKind::SecurityReview
        );
    }

    #[test]
    fn unknown_string_does_not_parse() {
        assert!(PhaseStatus::parse_str("bogus").is_none());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&TaskStatus::Retrying).unwrap();
        assert_eq!(json, "\"retrying\"");
    }
}
