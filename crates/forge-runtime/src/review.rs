//! Schedules follow-on review work after a coding task completes.

use forge_common::enums::{EventKind, TaskKind, TaskStatus};
use forge_common::errors::CoreResult;
use forge_common::events::EngineEvent;
use forge_common::models::Task;
use forge_common::security::is_security_relevant;

use crate::events::EventBus;
use crate::store::Store;

pub struct ReviewCoordinator<'a> {
    store: &'a Store,
    event_bus: Option<&'a EventBus>,
}

impl<'a> ReviewCoordinator<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store, event_bus: None }
    }

    pub fn with_event_bus(store: &'a Store, event_bus: &'a EventBus) -> Self {
        Self { store, event_bus: Some(event_bus) }
    }

    /// Create a review task (and, for security-relevant work, a
    /// security_review task too) depending on `completed_task`.
    pub fn schedule_review(&self, completed_task: &Task) -> CoreResult<Vec<Task>> {
        let mut scheduled = vec![self.schedule_one(completed_task, TaskKind::Review)?];

        if is_security_relevant(&completed_task.searchable_text()) {
            scheduled.push(self.schedule_one(completed_task, TaskKind::SecurityReview)?);
        }

        Ok(scheduled)
    }

    fn schedule_one(&self, completed_task: &Task, kind: TaskKind) -> CoreResult<Task> {
        let siblings = self.store.get_tasks_by_phase(&completed_task.phase_id)?;
        let next_sequence = siblings.iter().map(|t| t.sequence).max().unwrap_or(0) + 1;

        let review_id = uuid::Uuid::new_v4().to_string();
        let name = match kind {
            TaskKind::SecurityReview => format!("Security review: {}", completed_task.name),
            _ => format!("Review: {}", completed_task.name),
        };

        let task = self.store.create_task(
            &review_id,
            &completed_task.phase_id,
            &completed_task.project_id,
            next_sequence,
            &name,
            kind,
            completed_task.description.as_deref(),
            completed_task.max_retries,
        )?;
        self.store.add_task_dependency(&task.id, &completed_task.id)?;
        let task = self.store.update_task_status(&task.id, TaskStatus::Queued)?;

        let message = match kind {
            TaskKind::SecurityReview => format!("Security review scheduled for {}", completed_task.name),
            _ => format!("Review scheduled for {}", completed_task.name),
        };
        let metadata = format!(r#"{{"depends_on":"{}"}}"#, completed_task.id);
        self.store.create_event(
            &completed_task.project_id,
            "task",
            &task.id,
            EventKind::ReviewScheduled,
            None,
            Some(&message),
            Some(&metadata),
        )?;
        if let Some(bus) = self.event_bus {
            bus.publish(
                EngineEvent::new(EventKind::ReviewScheduled, "task", &task.id, message)
                    .with_values(None, Some(task.status.as_str().to_string()))
                    .with_metadata(metadata),
            );
        }

        Ok(task)
    }

    /// Files changed for `task`, recovered from the most recent
    /// `report_completion` event metadata rather than a substring search.
    pub fn get_files_changed(&self, task_id: &str) -> CoreResult<Vec<String>> {
        // `get_events_by_entity` orders newest-first, so the first match here
        // is the most recent one.
        let events = self.store.get_events_by_entity("task", task_id)?;
        let files = events
            .into_iter()
            .find_map(|event| {
                let metadata: serde_json::Value =
                    event.metadata.as_deref().and_then(|m| serde_json::from_str(m).ok())?;
                metadata.get("files_changed")?.as_array().map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect::<Vec<_>>()
                })
            })
            .unwrap_or_default();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Store, Task) {
        let store = Store::open_in_memory().unwrap();
        let project = store
            .create_project("proj1", "Demo", "/tmp/demo", "/tmp/prd.md", None, None)
            .unwrap();
        let phase = store.create_phase("phase1", &project.id, 1, "Phase 1", None).unwrap();
        let task = store
            .create_task("task1", &phase.id, &project.id, 1, "Build it", TaskKind::Coding, None, 1)
            .unwrap();
        (store, task)
    }

    #[test]
    fn scheduling_a_review_for_ordinary_work_creates_only_one_task() {
        let (store, task) = setup();
        let coordinator = ReviewCoordinator::new(&store);
        let scheduled = coordinator.schedule_review(&task).unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].task_kind, TaskKind::Review);
        assert_eq!(scheduled[0].status, TaskStatus::Queued);

        let deps = store.get_task_dependencies(&scheduled[0].id).unwrap();
        assert_eq!(deps[0].depends_on_id, task.id);
    }

    #[test]
    fn scheduling_a_review_for_security_relevant_work_creates_both_tasks() {
        let store = Store::open_in_memory().unwrap();
        let project = store
            .create_project("proj1", "Demo", "/tmp/demo", "/tmp/prd.md", None, None)
            .unwrap();
        let phase = store.create_phase("phase1", &project.id, 1, "Phase 1", None).unwrap();
        let task = store
            .create_task(
                "task1",
                &phase.id,
                &project.id,
                1,
                "Implement authentication",
                TaskKind::Coding,
                None,
                1,
            )
            .unwrap();

        let coordinator = ReviewCoordinator::new(&store);
        let scheduled = coordinator.schedule_review(&task).unwrap();
        assert_eq!(scheduled.len(), 2);
        assert_eq!(scheduled[0].task_kind, TaskKind::Review);
        assert_eq!(scheduled[1].task_kind, TaskKind::SecurityReview);
    }

    #[test]
    fn get_files_changed_reads_the_most_recent_completion_event() {
        let (store, task) = setup();
        store
            .create_event(
                &task.project_id,
                "task",
                &task.id,
                EventKind::StatusChanged,
                None,
                Some("completed"),
                Some(r#"{"summary":"first pass","files_changed":["a.rs"]}"#),
            )
            .unwrap();
        store
            .create_event(
                &task.project_id,
                "task",
                &task.id,
                EventKind::StatusChanged,
                None,
                Some("completed"),
                Some(r#"{"summary":"second pass","files_changed":["a.rs","b.rs"]}"#),
            )
            .unwrap();

        let coordinator = ReviewCoordinator::new(&store);
        let files = coordinator.get_files_changed(&task.id).unwrap();
        assert_eq!(files, vec!["a.rs".to_string(), "b.rs".to_string()]);
    }

    #[test]
    fn get_files_changed_returns_empty_when_no_completion_event_exists() {
        let (store, task) = setup();
        let coordinator = ReviewCoordinator::new(&store);
        assert!(coordinator.get_files_changed(&task.id).unwrap().is_empty());
    }
}
