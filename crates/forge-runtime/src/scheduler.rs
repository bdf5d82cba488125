//! Determines which tasks are eligible to run next.

use forge_common::enums::{PhaseStatus, TaskKind, TaskStatus};
use forge_common::errors::CoreResult;
use forge_common::models::Task;
use forge_common::security::is_security_relevant;

use crate::store::Store;

pub struct Scheduler<'a> {
    store: &'a Store,
}

impl<'a> Scheduler<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// The next eligible coding/deployment/verification/planning task whose
    /// phase is ready to run.
    pub fn next_coding_task(&self, project_id: &str) -> CoreResult<Option<Task>> {
        let eligible = self.store.get_pending_tasks_with_met_dependencies(project_id)?;
        for task in eligible {
            if matches!(
                task.task_kind,
                TaskKind::Coding | TaskKind::Deployment | TaskKind::Verification | TaskKind::Planning
            ) && self.phase_ready(&task)?
            {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    /// The next queued review or security_review task.
    pub fn next_review_task(&self, project_id: &str) -> CoreResult<Option<Task>> {
        let queued = self.store.get_tasks_by_status(project_id, TaskStatus::Queued)?;
        Ok(queued
            .into_iter()
            .find(|t| matches!(t.task_kind, TaskKind::Review | TaskKind::SecurityReview)))
    }

    pub fn has_schedulable(&self, project_id: &str) -> CoreResult<bool> {
        if !self
            .store
            .get_pending_tasks_with_met_dependencies(project_id)?
            .is_empty()
        {
            return Ok(true);
        }
        Ok(!self
            .store
            .get_tasks_by_status(project_id, TaskStatus::Queued)?
            .is_empty())
    }

    pub fn all_complete(&self, project_id: &str) -> CoreResult<bool> {
        let tasks = self.store.get_tasks_by_project(project_id)?;
        Ok(tasks
            .iter()
            .all(|t| matches!(t.status, TaskStatus::Completed | TaskStatus::Skipped)))
    }

    pub fn dependencies_met(&self, task_id: &str) -> CoreResult<bool> {
        let deps = self.store.get_task_dependencies(task_id)?;
        for dep in deps {
            let dep_task = self.store.get_task(&dep.depends_on_id)?;
            if dep_task.status != TaskStatus::Completed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_security_relevant(&self, task: &Task) -> bool {
        is_security_relevant(&task.searchable_text())
    }

    fn phase_ready(&self, task: &Task) -> CoreResult<bool> {
        let phases = self.store.get_phases_by_project(&task.project_id)?;
        let Some(task_phase) = phases.iter().find(|p| p.id == task.phase_id) else {
            return Ok(false);
        };
        for phase in &phases {
            if phase.sequence < task_phase.sequence
                && !matches!(phase.status, PhaseStatus::Completed | PhaseStatus::Skipped)
            {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
