//! Domain entities persisted by the store and passed between components.

use crate::enums::{EventKind, PhaseStatus, ProjectStatus, SessionKind, SessionStatus, TaskKind, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub project_dir: String,
    pub prd_path: String,
    pub bootstrap_path: Option<String>,
    pub claude_md_path: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub project_id: String,
    pub sequence: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: PhaseStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub phase_id: String,
    pub project_id: String,
    pub sequence: i64,
    pub name: String,
    pub description: Option<String>,
    pub task_kind: TaskKind,
    pub brief_path: Option<String>,
    pub status: TaskStatus,
    pub retry_count: i64,
    pub max_retries: i64,
    pub error_context: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Text searched by the security-relevance heuristic.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.name, self.description.as_deref().unwrap_or(""))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: String,
    pub depends_on_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub task_id: String,
    pub project_id: String,
    pub session_kind: SessionKind,
    pub pane_handle: Option<String>,
    pub pid: Option<i64>,
    pub status: SessionStatus,
    pub exit_code: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub log_path: Option<String>,
    pub error_output: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub project_id: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub event_kind: EventKind,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapCheck {
    pub id: String,
    pub project_id: String,
    pub check_name: String,
    pub check_type: String,
    pub command: String,
    pub expected: Option<String>,
    pub actual_output: Option<String>,
    pub passed: bool,
    pub run_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searchable_text_includes_name_and_description() {
        let task = Task {
            id: "t1".into(),
            phase_id: "p1".into(),
            project_id: "proj1".into(),
            sequence: 1,
            name: "Rotate JWT secret".into(),
            description: Some("update the auth token handling".into()),
            task_kind: TaskKind::Coding,
            brief_path: None,
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: 1,
            error_context: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        let text = task.searchable_text();
        assert!(text.contains("Rotate JWT secret"));
        assert!(text.contains("auth token"));
    }

    #[test]
    fn searchable_text_handles_missing_description() {
        let task = Task {
            id: "t1".into(),
            phase_id: "p1".into(),
            project_id: "proj1".into(),
            sequence: 1,
            name: "Add README".into(),
            description: None,
            task_kind: TaskKind::Coding,
            brief_path: None,
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: 1,
            error_context: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(task.searchable_text(), "Add README ");
    }
}
