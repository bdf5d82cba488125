//! The periodic driver that ties scheduler, session manager, retry policy,
//! and review coordinator into one cooperative tick loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use forge_common::constants::POLL_INTERVAL_SECS;
use forge_common::enums::{EventKind, PhaseStatus, ProjectStatus, SessionStatus, TaskStatus};
use forge_common::errors::CoreResult;
use forge_common::events::EngineEvent;
use forge_common::models::Task;
use forge_common::retry::RetryPolicy;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::EventBus;
use crate::review::ReviewCoordinator;
use crate::scheduler::Scheduler;
use crate::session::SessionManager;
use crate::store::Store;

pub struct Engine {
    store: Store,
    session_manager: SessionManager,
    event_bus: EventBus,
    retry_policy: RetryPolicy,
    project_id: String,
    briefs_dir: std::path::PathBuf,
    paused: AtomicBool,
}

impl Engine {
    pub fn new(
        store: Store,
        session_manager: SessionManager,
        event_bus: EventBus,
        retry_policy: RetryPolicy,
        project_id: String,
        briefs_dir: std::path::PathBuf,
    ) -> Self {
        Self {
            store,
            session_manager,
            event_bus,
            retry_policy,
            project_id,
            briefs_dir,
            paused: AtomicBool::new(false),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Exposed for integration tests that need to inspect persisted state
    /// directly; production callers drive everything through `tick`/`run`.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Idempotent: a pause request while already paused is a no-op.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Idempotent: a resume request while already running is a no-op.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Drives the tick loop until the project completes or `cancel` fires.
    /// `stop()` on the token is cooperative: the in-flight tick finishes.
    pub async fn run(&self, cancel: CancellationToken) -> CoreResult<()> {
        let project = self.store.get_project(&self.project_id)?;
        if matches!(project.status, ProjectStatus::Planned | ProjectStatus::Paused) {
            self.store.update_project_status(&self.project_id, ProjectStatus::Running)?;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(POLL_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(project_id = %self.project_id, "engine stopping");
                    return Ok(());
                }
                _ = interval.tick() => {
                    if !self.tick().await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Runs a single tick. Returns `Ok(false)` once the project has
    /// completed, `Ok(true)` to keep looping.
    pub async fn tick(&self) -> CoreResult<bool> {
        self.reap().await?;

        let scheduler = Scheduler::new(&self.store);
        if scheduler.all_complete(&self.project_id)? {
            self.complete_project().await?;
            return Ok(false);
        }

        let project = self.store.get_project(&self.project_id)?;
        if project.status == ProjectStatus::Paused || self.paused.load(Ordering::SeqCst) {
            return Ok(true);
        }

        self.dispatch_review().await?;
        self.dispatch_coding().await?;
        self.detect_deadlock().await?;

        Ok(true)
    }

    async fn reap(&self) -> CoreResult<()> {
        for (session_id, task_id, result) in self.session_manager.check_active().await {
            let status = if result.timed_out {
                SessionStatus::TimedOut
            } else if result.exit_code == Some(0) {
                SessionStatus::Completed
            } else {
                SessionStatus::Failed
            };
            self.store
                .update_session_completed(&session_id, status, result.exit_code.unwrap_or(-1) as i64)?;
            if !result.error_output.is_empty() {
                self.store.update_session_error(&session_id, &result.error_output)?;
            }
            self.publish(
                EventKind::StatusChanged,
                "session",
                &session_id,
                format!("session {}", status.as_str()),
                None,
                Some(status.as_str().to_string()),
                None,
            )?;

            let task = self.store.get_task(&task_id)?;
            // A worker that already reported itself via the reporting
            // channel has moved the task off `running`; nothing left to do.
            if task.status != TaskStatus::Running {
                continue;
            }

            if status == SessionStatus::Completed {
                self.complete_task(&task).await?;
            } else {
                self.fail_task(&task, &result.error_output).await?;
            }
        }
        Ok(())
    }

    async fn complete_task(&self, task: &Task) -> CoreResult<()> {
        self.store.update_task_status(&task.id, TaskStatus::Completed)?;
        self.publish(
            EventKind::StatusChanged,
            "task",
            &task.id,
            format!("{} completed", task.name),
            Some(TaskStatus::Running.as_str().to_string()),
            Some(TaskStatus::Completed.as_str().to_string()),
            None,
        )?;

        let coordinator = ReviewCoordinator::with_event_bus(&self.store, &self.event_bus);
        coordinator.schedule_review(task)?;

        self.check_phase_completion(&task.phase_id).await?;
        Ok(())
    }

    async fn fail_task(&self, task: &Task, error_output: &str) -> CoreResult<()> {
        // Decide retry eligibility on the pre-increment retry_count: the
        // ceiling permits exactly `max_retries` retries, so the count that
        // matters is the number of attempts already made before this failure.
        let should_retry = self.retry_policy.should_retry(task);

        let refreshed = self.store.update_task_error(&task.id, error_output)?;
        self.store.update_task_status(&task.id, TaskStatus::Failed)?;
        self.publish(
            EventKind::Error,
            "task",
            &task.id,
            format!("{} failed", task.name),
            Some(TaskStatus::Running.as_str().to_string()),
            Some(TaskStatus::Failed.as_str().to_string()),
            None,
        )?;

        if should_retry {
            self.store.update_task_status(&task.id, TaskStatus::Retrying)?;
            self.publish(
                EventKind::Retried,
                "task",
                &task.id,
                format!("{} will retry (attempt {})", task.name, refreshed.retry_count + 1),
                Some(TaskStatus::Failed.as_str().to_string()),
                Some(TaskStatus::Retrying.as_str().to_string()),
                None,
            )?;
        } else {
            self.store.update_task_status(&task.id, TaskStatus::Paused)?;
            self.publish(
                EventKind::Paused,
                "task",
                &task.id,
                format!("{} exhausted retries", task.name),
                Some(TaskStatus::Failed.as_str().to_string()),
                Some(TaskStatus::Paused.as_str().to_string()),
                None,
            )?;
        }
        Ok(())
    }

    async fn check_phase_completion(&self, phase_id: &str) -> CoreResult<()> {
        let tasks = self.store.get_tasks_by_phase(phase_id)?;
        if tasks.iter().all(|t| matches!(t.status, TaskStatus::Completed | TaskStatus::Skipped)) {
            let phase = self.store.get_phase(phase_id)?;
            if phase.status != PhaseStatus::Completed {
                self.store.update_phase_status(phase_id, PhaseStatus::Completed)?;
                self.publish(
                    EventKind::StatusChanged,
                    "phase",
                    phase_id,
                    format!("{} completed", phase.name),
                    Some(phase.status.as_str().to_string()),
                    Some(PhaseStatus::Completed.as_str().to_string()),
                    None,
                )?;
            }
        }
        Ok(())
    }

    async fn complete_project(&self) -> CoreResult<()> {
        let project = self.store.get_project(&self.project_id)?;
        if project.status != ProjectStatus::Completed {
            self.store.update_project_status(&self.project_id, ProjectStatus::Completed)?;
            self.publish(
                EventKind::StatusChanged,
                "project",
                &self.project_id,
                "project completed",
                Some(project.status.as_str().to_string()),
                Some(ProjectStatus::Completed.as_str().to_string()),
                None,
            )?;
        }
        Ok(())
    }

    async fn dispatch_review(&self) -> CoreResult<()> {
        if self.session_manager.has_active_review() {
            return Ok(());
        }
        let Some(task) = Scheduler::new(&self.store).next_review_task(&self.project_id)? else {
            return Ok(());
        };
        self.dispatch(task, TaskStatus::Queued).await
    }

    async fn dispatch_coding(&self) -> CoreResult<()> {
        if self.session_manager.has_active_coding() {
            return Ok(());
        }

        let retrying = self.store.get_tasks_by_status(&self.project_id, TaskStatus::Retrying)?;
        if let Some(task) = retrying.into_iter().next() {
            return self.dispatch_retry(task).await;
        }

        let Some(task) = Scheduler::new(&self.store).next_coding_task(&self.project_id)? else {
            return Ok(());
        };

        let phase = self.store.get_phase(&task.phase_id)?;
        if phase.status == PhaseStatus::Pending {
            self.store.update_phase_status(&task.phase_id, PhaseStatus::InProgress)?;
            self.publish(
                EventKind::StatusChanged,
                "phase",
                &task.phase_id,
                format!("{} started", phase.name),
                Some(PhaseStatus::Pending.as_str().to_string()),
                Some(PhaseStatus::InProgress.as_str().to_string()),
                None,
            )?;
        }

        self.dispatch(task, TaskStatus::Pending).await
    }

    /// Moves `task` through the required pre-dispatch transitions and hands
    /// it to the session manager. `from_status` is the status the task is
    /// currently expected to be in (`pending` for fresh coding work,
    /// `queued` for review tasks the coordinator already queued).
    async fn dispatch(&self, task: Task, from_status: TaskStatus) -> CoreResult<()> {
        if from_status == TaskStatus::Pending {
            self.transition_task(&task.id, TaskStatus::Pending, TaskStatus::Queued)?;
        }
        self.transition_task(&task.id, TaskStatus::Queued, TaskStatus::Running)?;

        let brief_path = self.ensure_brief(&task).await?;
        let task = self.store.get_task(&task.id)?;
        self.session_manager.spawn(&self.store, &task, &brief_path).await?;
        Ok(())
    }

    async fn dispatch_retry(&self, task: Task) -> CoreResult<()> {
        self.transition_task(&task.id, TaskStatus::Retrying, TaskStatus::Running)?;

        let retry_context = self.retry_policy.prepare_retry_context(
            &task,
            task.error_context.as_deref().unwrap_or("unknown error"),
        );
        let base = self.ensure_brief(&task).await?;
        let mut content = tokio::fs::read_to_string(&base).await.unwrap_or_default();
        content.push_str("\n\n");
        content.push_str(&retry_context);
        tokio::fs::write(&base, &content).await?;

        let task = self.store.get_task(&task.id)?;
        self.session_manager.spawn(&self.store, &task, &base).await?;
        Ok(())
    }

    fn transition_task(&self, task_id: &str, from: TaskStatus, to: TaskStatus) -> CoreResult<()> {
        forge_common::state_machine::validate_task_transition(from, to)?;
        self.store.update_task_status(task_id, to)?;
        self.publish(
            EventKind::StatusChanged,
            "task",
            task_id,
            format!("{} -> {}", from.as_str(), to.as_str()),
            Some(from.as_str().to_string()),
            Some(to.as_str().to_string()),
            None,
        )
    }

    async fn ensure_brief(&self, task: &Task) -> CoreResult<std::path::PathBuf> {
        if let Some(path) = &task.brief_path {
            let path = std::path::PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
        }

        tokio::fs::create_dir_all(&self.briefs_dir).await?;
        let path = self.briefs_dir.join(format!("{}.md", task.id));
        let content = format!(
            "# Task: {}\n\n{}\n",
            task.name,
            task.description.as_deref().unwrap_or("")
        );
        tokio::fs::write(&path, content).await?;
        self.store.update_task_brief_path(&task.id, &path.to_string_lossy())?;
        Ok(path)
    }

    async fn detect_deadlock(&self) -> CoreResult<()> {
        if !self.session_manager.active_session_ids().is_empty() {
            return Ok(());
        }

        let scheduler = Scheduler::new(&self.store);
        if scheduler.has_schedulable(&self.project_id)? {
            return Ok(());
        }
        if scheduler.all_complete(&self.project_id)? {
            return Ok(());
        }

        let still_working = self
            .store
            .get_tasks_by_project(&self.project_id)?
            .into_iter()
            .any(|t| matches!(t.status, TaskStatus::Running | TaskStatus::Retrying));
        if still_working {
            return Ok(());
        }

        warn!(project_id = %self.project_id, "deadlock detected, pausing project");
        self.store.update_project_status(&self.project_id, ProjectStatus::Paused)?;
        self.publish(
            EventKind::Paused,
            "project",
            &self.project_id,
            "Deadlock detected",
            None,
            Some(ProjectStatus::Paused.as_str().to_string()),
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn publish(
        &self,
        kind: EventKind,
        entity_kind: &str,
        entity_id: &str,
        message: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
        metadata: Option<String>,
    ) -> CoreResult<()> {
        let message = message.into();
        self.store.create_event(
            &self.project_id,
            entity_kind,
            entity_id,
            kind,
            old_value.as_deref(),
            new_value.as_deref(),
            metadata.as_deref(),
        )?;
        let mut event = EngineEvent::new(kind, entity_kind, entity_id, message)
            .with_values(old_value, new_value);
        if let Some(metadata) = metadata {
            event = event.with_metadata(metadata);
        }
        self.event_bus.publish(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_common::enums::TaskKind;

    fn make_engine(dir: &std::path::Path, worker_cmd: &str) -> Engine {
        let store = Store::open_in_memory().unwrap();
        let session_manager = SessionManager::new(dir.to_path_buf(), worker_cmd.into(), vec![]);
        Engine::new(
            store,
            session_manager,
            EventBus::new(),
            RetryPolicy::default(),
            "proj1".into(),
            dir.join("briefs"),
        )
    }

    #[tokio::test]
    async fn empty_plan_completes_on_first_tick() {
        let dir = tempfile::tempdir().unwrap();
        let engine = make_engine(dir.path(), "true");
        engine
            .store
            .create_project("proj1", "Demo", dir.path().to_str().unwrap(), "prd.md", None, None)
            .unwrap();

        let keep_going = engine.tick().await.unwrap();
        assert!(!keep_going);
        assert_eq!(
            engine.store.get_project("proj1").unwrap().status,
            ProjectStatus::Completed
        );
    }

    #[tokio::test]
    async fn linear_two_task_plan_dispatches_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = make_engine(dir.path(), "true");
        let project = engine
            .store
            .create_project("proj1", "Demo", dir.path().to_str().unwrap(), "prd.md", None, None)
            .unwrap();
        let phase = engine.store.create_phase("phase1", &project.id, 1, "P1", None).unwrap();
        let t1 = engine
            .store
            .create_task("t1", &phase.id, &project.id, 1, "Build it", TaskKind::Coding, None, 1)
            .unwrap();
        engine
            .store
            .create_task("t2", &phase.id, &project.id, 2, "Build more", TaskKind::Coding, None, 1)
            .unwrap();
        engine.store.add_task_dependency("t2", &t1.id).unwrap();

        // Dispatch T1.
        engine.tick().await.unwrap();
        assert_eq!(engine.store.get_task("t1").unwrap().status, TaskStatus::Running);

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Reap T1, schedule its review, dispatch the review slot.
        engine.tick().await.unwrap();
        let t1_after = engine.store.get_task("t1").unwrap();
        assert_eq!(t1_after.status, TaskStatus::Completed);

        let tasks = engine.store.get_tasks_by_project("proj1").unwrap();
        assert!(tasks.iter().any(|t| t.task_kind == TaskKind::Review));
    }

    #[tokio::test]
    async fn retry_exhaustion_pauses_the_task_instead_of_retrying() {
        let dir = tempfile::tempdir().unwrap();
        let engine = make_engine(dir.path(), "false");
        let project = engine
            .store
            .create_project("proj1", "Demo", dir.path().to_str().unwrap(), "prd.md", None, None)
            .unwrap();
        let phase = engine.store.create_phase("phase1", &project.id, 1, "P1", None).unwrap();
        engine
            .store
            .create_task("t1", &phase.id, &project.id, 1, "Build it", TaskKind::Coding, None, 0)
            .unwrap();

        engine.tick().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        engine.tick().await.unwrap();

        assert_eq!(engine.store.get_task("t1").unwrap().status, TaskStatus::Paused);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = make_engine(dir.path(), "true");
        engine.pause();
        engine.pause();
        assert!(engine.paused.load(Ordering::SeqCst));
        engine.resume();
        engine.resume();
        assert!(!engine.paused.load(Ordering::SeqCst));
    }
}
