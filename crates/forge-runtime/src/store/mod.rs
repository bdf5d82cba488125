//! SQLite-backed durable store for the orchestration core's task graph.
//!
//! Each public method opens no new connection of its own (the `Store`
//! wraps one long-lived `rusqlite::Connection` per orchestrator process)
//! but runs as a short, self-contained statement or pair of statements,
//! mirroring how the reporting channel opens a brand new `Store` per RPC.

mod queries;

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use forge_common::enums::{
    EventKind, PhaseStatus, ProjectStatus, SessionKind, SessionStatus, TaskKind, TaskStatus,
};
use forge_common::errors::{CoreError, CoreResult};
use forge_common::models::{BootstrapCheck, Event, Phase, Project, Session, Task, TaskDependency};
use rusqlite::{Connection, Row, params};

pub struct Store {
    conn: Connection,
}

fn map_sqlite(err: rusqlite::Error) -> CoreError {
    CoreError::Infrastructure(anyhow::Error::new(err))
}

fn parse_dt(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

fn parse_dt_opt(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.map(|s| parse_dt(&s))
}

fn required_enum<T>(raw: String, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unrecognized value: {raw}").into(),
        )
    })
}

fn project_from_row(row: &Row) -> rusqlite::Result<Project> {
    let status: String = row.get("status")?;
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        project_dir: row.get("project_dir")?,
        prd_path: row.get("prd_path")?,
        bootstrap_path: row.get("bootstrap_path")?,
        claude_md_path: row.get("claude_md_path")?,
        status: required_enum(status, ProjectStatus::parse_str)?,
        created_at: parse_dt(&row.get::<_, String>("created_at")?),
        updated_at: parse_dt(&row.get::<_, String>("updated_at")?),
    })
}

fn phase_from_row(row: &Row) -> rusqlite::Result<Phase> {
    let status: String = row.get("status")?;
    Ok(Phase {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        sequence: row.get("sequence")?,
        name: row.get("name")?,
        description: row.get("description")?,
        status: required_enum(status, PhaseStatus::parse_str)?,
        started_at: parse_dt_opt(row.get("started_at")?),
        completed_at: parse_dt_opt(row.get("completed_at")?),
        created_at: parse_dt(&row.get::<_, String>("created_at")?),
    })
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get("status")?;
    let kind: String = row.get("task_kind")?;
    Ok(Task {
        id: row.get("id")?,
        phase_id: row.get("phase_id")?,
        project_id: row.get("project_id")?,
        sequence: row.get("sequence")?,
        name: row.get("name")?,
        description: row.get("description")?,
        task_kind: required_enum(kind, TaskKind::parse_str)?,
        brief_path: row.get("brief_path")?,
        status: required_enum(status, TaskStatus::parse_str)?,
        retry_count: row.get("retry_count")?,
        max_retries: row.get("max_retries")?,
        error_context: row.get("error_context")?,
        started_at: parse_dt_opt(row.get("started_at")?),
        completed_at: parse_dt_opt(row.get("completed_at")?),
        created_at: parse_dt(&row.get::<_, String>("created_at")?),
    })
}

fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    let status: String = row.get("status")?;
    let kind: String = row.get("session_kind")?;
    Ok(Session {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        project_id: row.get("project_id")?,
        session_kind: required_enum(kind, SessionKind::parse_str)?,
        pane_handle: row.get("pane_handle")?,
        pid: row.get("pid")?,
        status: required_enum(status, SessionStatus::parse_str)?,
        exit_code: row.get("exit_code")?,
        started_at: parse_dt_opt(row.get("started_at")?),
        completed_at: parse_dt_opt(row.get("completed_at")?),
        duration_secs: row.get("duration_secs")?,
        log_path: row.get("log_path")?,
        error_output: row.get("error_output")?,
        created_at: parse_dt(&row.get::<_, String>("created_at")?),
    })
}

fn event_from_row(row: &Row) -> rusqlite::Result<Event> {
    let kind: String = row.get("event_kind")?;
    Ok(Event {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        entity_kind: row.get("entity_kind")?,
        entity_id: row.get("entity_id")?,
        event_kind: required_enum(kind, EventKind::parse_str)?,
        old_value: row.get("old_value")?,
        new_value: row.get("new_value")?,
        metadata: row.get("metadata")?,
        created_at: parse_dt(&row.get::<_, String>("created_at")?),
    })
}

fn bootstrap_check_from_row(row: &Row) -> rusqlite::Result<BootstrapCheck> {
    Ok(BootstrapCheck {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        check_name: row.get("check_name")?,
        check_type: row.get("check_type")?,
        command: row.get("command")?,
        expected: row.get("expected")?,
        actual_output: row.get("actual_output")?,
        passed: row.get::<_, i64>("passed")? != 0,
        run_at: parse_dt(&row.get::<_, String>("run_at")?),
    })
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let conn = Connection::open(path).map_err(map_sqlite)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> CoreResult<()> {
        self.conn.execute_batch(queries::SCHEMA).map_err(map_sqlite)
    }

    // -- Projects --

    pub fn create_project(
        &self,
        id: &str,
        name: &str,
        project_dir: &str,
        prd_path: &str,
        bootstrap_path: Option<&str>,
        claude_md_path: Option<&str>,
    ) -> CoreResult<Project> {
        self.conn
            .execute(
                queries::INSERT_PROJECT,
                params![
                    id,
                    name,
                    project_dir,
                    prd_path,
                    bootstrap_path,
                    claude_md_path,
                    ProjectStatus::Initialized.as_str(),
                ],
            )
            .map_err(map_sqlite)?;
        self.get_project(id)
    }

    pub fn get_project(&self, project_id: &str) -> CoreResult<Project> {
        self.conn
            .query_row(queries::SELECT_PROJECT_BY_ID, params![project_id], project_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    CoreError::not_found("project", project_id)
                }
                other => map_sqlite(other),
            })
    }

    pub fn update_project_status(&self, project_id: &str, status: ProjectStatus) -> CoreResult<Project> {
        self.conn
            .execute(queries::UPDATE_PROJECT_STATUS, params![status.as_str(), project_id])
            .map_err(map_sqlite)?;
        self.get_project(project_id)
    }

    /// Cascades via the schema's `ON DELETE CASCADE` foreign keys: removes
    /// every phase, task, session, event, dependency, and bootstrap check
    /// that referenced this project.
    pub fn delete_project(&self, project_id: &str) -> CoreResult<()> {
        self.conn
            .execute(queries::DELETE_PROJECT, params![project_id])
            .map_err(map_sqlite)?;
        Ok(())
    }

    // -- Phases --

    pub fn create_phase(
        &self,
        id: &str,
        project_id: &str,
        sequence: i64,
        name: &str,
        description: Option<&str>,
    ) -> CoreResult<Phase> {
        self.conn
            .execute(
                queries::INSERT_PHASE,
                params![id, project_id, sequence, name, description, PhaseStatus::Pending.as_str()],
            )
            .map_err(map_sqlite)?;
        self.get_phase(id)
    }

    pub fn get_phase(&self, phase_id: &str) -> CoreResult<Phase> {
        // There's no SELECT-by-id query in the original contract (phases
        // are always looked up by project), so filter the project listing.
        let project_id: String = self
            .conn
            .query_row(
                "SELECT project_id FROM phases WHERE id = ?1",
                params![phase_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CoreError::not_found("phase", phase_id),
                other => map_sqlite(other),
            })?;
        self.get_phases_by_project(&project_id)?
            .into_iter()
            .find(|p| p.id == phase_id)
            .ok_or_else(|| CoreError::not_found("phase", phase_id))
    }

    pub fn get_phases_by_project(&self, project_id: &str) -> CoreResult<Vec<Phase>> {
        let mut stmt = self
            .conn
            .prepare(queries::SELECT_PHASES_BY_PROJECT)
            .map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params![project_id], phase_from_row)
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    pub fn update_phase_status(&self, phase_id: &str, status: PhaseStatus) -> CoreResult<()> {
        let query = match status {
            PhaseStatus::InProgress => queries::UPDATE_PHASE_STARTED,
            PhaseStatus::Completed | PhaseStatus::Failed => queries::UPDATE_PHASE_COMPLETED,
            _ => queries::UPDATE_PHASE_STATUS,
        };
        self.conn
            .execute(query, params![status.as_str(), phase_id])
            .map_err(map_sqlite)?;
        Ok(())
    }

    // -- Tasks --

    #[allow(clippy::too_many_arguments)]
    pub fn create_task(
        &self,
        id: &str,
        phase_id: &str,
        project_id: &str,
        sequence: i64,
        name: &str,
        task_kind: TaskKind,
        description: Option<&str>,
        max_retries: i64,
    ) -> CoreResult<Task> {
        self.conn
            .execute(
                queries::INSERT_TASK,
                params![
                    id,
                    phase_id,
                    project_id,
                    sequence,
                    name,
                    description,
                    task_kind.as_str(),
                    Option::<&str>::None,
                    TaskStatus::Pending.as_str(),
                    0,
                    max_retries,
                ],
            )
            .map_err(map_sqlite)?;
        self.get_task(id)
    }

    pub fn get_task(&self, task_id: &str) -> CoreResult<Task> {
        self.conn
            .query_row(queries::SELECT_TASK_BY_ID, params![task_id], task_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CoreError::not_found("task", task_id),
                other => map_sqlite(other),
            })
    }

    pub fn get_tasks_by_phase(&self, phase_id: &str) -> CoreResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(queries::SELECT_TASKS_BY_PHASE).map_err(map_sqlite)?;
        let rows = stmt.query_map(params![phase_id], task_from_row).map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    pub fn get_tasks_by_project(&self, project_id: &str) -> CoreResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(queries::SELECT_TASKS_BY_PROJECT).map_err(map_sqlite)?;
        let rows = stmt.query_map(params![project_id], task_from_row).map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    pub fn get_tasks_by_status(&self, project_id: &str, status: TaskStatus) -> CoreResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(queries::SELECT_TASKS_BY_STATUS).map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params![project_id, status.as_str()], task_from_row)
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    pub fn get_pending_tasks_with_met_dependencies(&self, project_id: &str) -> CoreResult<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(queries::SELECT_PENDING_TASKS_WITH_MET_DEPENDENCIES)
            .map_err(map_sqlite)?;
        let rows = stmt.query_map(params![project_id], task_from_row).map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    pub fn update_task_status(&self, task_id: &str, status: TaskStatus) -> CoreResult<Task> {
        let query = match status {
            TaskStatus::Running => queries::UPDATE_TASK_STARTED,
            TaskStatus::Completed => queries::UPDATE_TASK_COMPLETED,
            _ => queries::UPDATE_TASK_STATUS,
        };
        self.conn
            .execute(query, params![status.as_str(), task_id])
            .map_err(map_sqlite)?;
        self.get_task(task_id)
    }

    pub fn update_task_error(&self, task_id: &str, error_context: &str) -> CoreResult<Task> {
        self.conn
            .execute(queries::UPDATE_TASK_ERROR, params![error_context, task_id])
            .map_err(map_sqlite)?;
        self.get_task(task_id)
    }

    pub fn update_task_brief_path(&self, task_id: &str, brief_path: &str) -> CoreResult<Task> {
        self.conn
            .execute(queries::UPDATE_TASK_BRIEF_PATH, params![brief_path, task_id])
            .map_err(map_sqlite)?;
        self.get_task(task_id)
    }

    // -- Task dependencies --

    pub fn add_task_dependency(&self, task_id: &str, depends_on_id: &str) -> CoreResult<TaskDependency> {
        self.conn
            .execute(queries::INSERT_TASK_DEPENDENCY, params![task_id, depends_on_id])
            .map_err(map_sqlite)?;
        Ok(TaskDependency {
            task_id: task_id.to_string(),
            depends_on_id: depends_on_id.to_string(),
        })
    }

    pub fn get_task_dependencies(&self, task_id: &str) -> CoreResult<Vec<TaskDependency>> {
        let mut stmt = self
            .conn
            .prepare(queries::SELECT_TASK_DEPENDENCIES)
            .map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params![task_id], |row| {
                Ok(TaskDependency {
                    task_id: row.get("task_id")?,
                    depends_on_id: row.get("depends_on_id")?,
                })
            })
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    // -- Sessions --

    pub fn create_session(
        &self,
        id: &str,
        task_id: &str,
        project_id: &str,
        session_kind: SessionKind,
        pane_handle: Option<&str>,
        log_path: Option<&str>,
    ) -> CoreResult<Session> {
        self.conn
            .execute(
                queries::INSERT_SESSION,
                params![
                    id,
                    task_id,
                    project_id,
                    session_kind.as_str(),
                    pane_handle,
                    Option::<i64>::None,
                    SessionStatus::Pending.as_str(),
                    log_path,
                ],
            )
            .map_err(map_sqlite)?;
        self.get_session(id)
    }

    pub fn get_session(&self, session_id: &str) -> CoreResult<Session> {
        self.conn
            .query_row(queries::SELECT_SESSION_BY_ID, params![session_id], session_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CoreError::not_found("session", session_id),
                other => map_sqlite(other),
            })
    }

    pub fn get_sessions_by_task(&self, task_id: &str) -> CoreResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(queries::SELECT_SESSIONS_BY_TASK).map_err(map_sqlite)?;
        let rows = stmt.query_map(params![task_id], session_from_row).map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    pub fn get_active_sessions(&self, project_id: &str) -> CoreResult<Vec<Session>> {
        let mut stmt = self.conn.prepare(queries::SELECT_ACTIVE_SESSIONS).map_err(map_sqlite)?;
        let rows = stmt.query_map(params![project_id], session_from_row).map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    pub fn update_session_status(&self, session_id: &str, status: SessionStatus) -> CoreResult<()> {
        self.conn
            .execute(queries::UPDATE_SESSION_STATUS, params![status.as_str(), session_id])
            .map_err(map_sqlite)?;
        Ok(())
    }

    pub fn update_session_started(&self, session_id: &str, pid: i64) -> CoreResult<()> {
        self.conn
            .execute(queries::UPDATE_SESSION_STARTED, params![pid, session_id])
            .map_err(map_sqlite)?;
        Ok(())
    }

    pub fn update_session_completed(
        &self,
        session_id: &str,
        status: SessionStatus,
        exit_code: i64,
    ) -> CoreResult<()> {
        self.conn
            .execute(
                queries::UPDATE_SESSION_COMPLETED,
                params![status.as_str(), exit_code, session_id],
            )
            .map_err(map_sqlite)?;
        Ok(())
    }

    pub fn update_session_error(&self, session_id: &str, error_output: &str) -> CoreResult<()> {
        self.conn
            .execute(queries::UPDATE_SESSION_ERROR, params![error_output, session_id])
            .map_err(map_sqlite)?;
        Ok(())
    }

    // -- Events --

    pub fn create_event(
        &self,
        project_id: &str,
        entity_kind: &str,
        entity_id: &str,
        event_kind: EventKind,
        old_value: Option<&str>,
        new_value: Option<&str>,
        metadata: Option<&str>,
    ) -> CoreResult<Event> {
        self.conn
            .execute(
                queries::INSERT_EVENT,
                params![
                    project_id,
                    entity_kind,
                    entity_id,
                    event_kind.as_str(),
                    old_value,
                    new_value,
                    metadata,
                ],
            )
            .map_err(map_sqlite)?;
        let event_id = self.conn.last_insert_rowid();
        self.conn
            .query_row(queries::SELECT_EVENT_BY_ID, params![event_id], event_from_row)
            .map_err(map_sqlite)
    }

    pub fn get_events_by_project(&self, project_id: &str, limit: i64) -> CoreResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(queries::SELECT_EVENTS_BY_PROJECT).map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params![project_id, limit], event_from_row)
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    pub fn get_events_by_entity(&self, entity_kind: &str, entity_id: &str) -> CoreResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(queries::SELECT_EVENTS_BY_ENTITY).map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params![entity_kind, entity_id], event_from_row)
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }

    // -- Bootstrap checks --

    #[allow(clippy::too_many_arguments)]
    pub fn create_bootstrap_check(
        &self,
        id: &str,
        project_id: &str,
        check_name: &str,
        check_type: &str,
        command: &str,
        expected: Option<&str>,
        actual_output: Option<&str>,
        passed: bool,
    ) -> CoreResult<BootstrapCheck> {
        self.conn
            .execute(
                queries::INSERT_BOOTSTRAP_CHECK,
                params![
                    id,
                    project_id,
                    check_name,
                    check_type,
                    command,
                    expected,
                    actual_output,
                    passed as i64,
                ],
            )
            .map_err(map_sqlite)?;
        self.conn
            .query_row(
                "SELECT * FROM bootstrap_checks WHERE id = ?1",
                params![id],
                bootstrap_check_from_row,
            )
            .map_err(map_sqlite)
    }

    pub fn get_bootstrap_checks_by_project(&self, project_id: &str) -> CoreResult<Vec<BootstrapCheck>> {
        let mut stmt = self
            .conn
            .prepare(queries::SELECT_BOOTSTRAP_CHECKS_BY_PROJECT)
            .map_err(map_sqlite)?;
        let rows = stmt
            .query_map(params![project_id], bootstrap_check_from_row)
            .map_err(map_sqlite)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_project(store: &Store) -> Project {
        store
            .create_project("proj1", "Demo", "/tmp/demo", "/tmp/demo/prd.md", None, None)
            .unwrap()
    }

    fn seed_phase(store: &Store, project_id: &str, sequence: i64) -> Phase {
        store
            .create_phase(&format!("phase{sequence}"), project_id, sequence, "Phase", None)
            .unwrap()
    }

    fn seed_task(store: &Store, phase_id: &str, project_id: &str, sequence: i64) -> Task {
        store
            .create_task(
                &format!("task{sequence}"),
                phase_id,
                project_id,
                sequence,
                "Do work",
                TaskKind::Coding,
                None,
                1,
            )
            .unwrap()
    }

    #[test]
    fn create_and_get_project_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let created = seed_project(&store);
        let fetched = store.get_project(&created.id).unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.status, ProjectStatus::Initialized);
    }

    #[test]
    fn get_project_missing_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.get_project("nope").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn task_status_update_sets_started_at_on_running() {
        let store = Store::open_in_memory().unwrap();
        let project = seed_project(&store);
        let phase = seed_phase(&store, &project.id, 1);
        let task = seed_task(&store, &phase.id, &project.id, 1);
        assert!(task.started_at.is_none());

        let running = store.update_task_status(&task.id, TaskStatus::Running).unwrap();
        assert!(running.started_at.is_some());
    }

    #[test]
    fn task_error_update_increments_retry_count() {
        let store = Store::open_in_memory().unwrap();
        let project = seed_project(&store);
        let phase = seed_phase(&store, &project.id, 1);
        let task = seed_task(&store, &phase.id, &project.id, 1);

        let updated = store.update_task_error(&task.id, "boom").unwrap();
        assert_eq!(updated.retry_count, 1);
        assert_eq!(updated.error_context.as_deref(), Some("boom"));
    }

    #[test]
    fn pending_tasks_with_met_dependencies_excludes_blocked_tasks() {
        let store = Store::open_in_memory().unwrap();
        let project = seed_project(&store);
        let phase = seed_phase(&store, &project.id, 1);
        let upstream = seed_task(&store, &phase.id, &project.id, 1);
        let downstream = seed_task(&store, &phase.id, &project.id, 2);
        store.add_task_dependency(&downstream.id, &upstream.id).unwrap();

        let eligible = store.get_pending_tasks_with_met_dependencies(&project.id).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, upstream.id);

        store.update_task_status(&upstream.id, TaskStatus::Queued).unwrap();
        store.update_task_status(&upstream.id, TaskStatus::Running).unwrap();
        store.update_task_status(&upstream.id, TaskStatus::Completed).unwrap();

        let eligible = store.get_pending_tasks_with_met_dependencies(&project.id).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, downstream.id);
    }

    #[test]
    fn deleting_a_project_cascades_to_phases_tasks_and_sessions() {
        let store = Store::open_in_memory().unwrap();
        let project = seed_project(&store);
        let phase = seed_phase(&store, &project.id, 1);
        let task = seed_task(&store, &phase.id, &project.id, 1);
        store
            .create_session("sess1", &task.id, &project.id, SessionKind::Coding, Some("coding"), None)
            .unwrap();

        store.delete_project(&project.id).unwrap();

        assert!(store.get_phases_by_project(&project.id).unwrap().is_empty());
        assert!(store.get_tasks_by_project(&project.id).unwrap().is_empty());
        assert!(store.get_active_sessions(&project.id).unwrap().is_empty());
    }

    #[test]
    fn events_round_trip_with_metadata() {
        let store = Store::open_in_memory().unwrap();
        let project = seed_project(&store);
        let phase = seed_phase(&store, &project.id, 1);
        let task = seed_task(&store, &phase.id, &project.id, 1);

        let event = store
            .create_event(
                &project.id,
                "task",
                &task.id,
                EventKind::StatusChanged,
                Some("pending"),
                Some("queued"),
                Some("{\"files_changed\":[\"a.rs\"]}"),
            )
            .unwrap();
        assert_eq!(event.new_value.as_deref(), Some("queued"));

        let fetched = store.get_events_by_entity("task", &task.id).unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(fetched[0].metadata.as_ref().unwrap().contains("files_changed"));
    }

    #[test]
    fn active_sessions_excludes_completed_sessions() {
        let store = Store::open_in_memory().unwrap();
        let project = seed_project(&store);
        let phase = seed_phase(&store, &project.id, 1);
        let task = seed_task(&store, &phase.id, &project.id, 1);
        let session = store
            .create_session("sess1", &task.id, &project.id, SessionKind::Coding, Some("coding"), None)
            .unwrap();

        assert_eq!(store.get_active_sessions(&project.id).unwrap().len(), 1);

        store.update_session_completed(&session.id, SessionStatus::Completed, 0).unwrap();
        assert!(store.get_active_sessions(&project.id).unwrap().is_empty());
    }
}
