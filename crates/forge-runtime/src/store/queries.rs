//! Named SQL text, kept apart from the `Store` methods that run it.

pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    project_dir TEXT NOT NULL,
    prd_path TEXT NOT NULL,
    bootstrap_path TEXT,
    claude_md_path TEXT,
    status TEXT NOT NULL DEFAULT 'initialized',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS phases (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    started_at TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(project_id, sequence)
);
CREATE INDEX IF NOT EXISTS idx_phases_project ON phases(project_id);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    phase_id TEXT NOT NULL REFERENCES phases(id) ON DELETE CASCADE,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    task_kind TEXT NOT NULL,
    brief_path TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    retry_count INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL DEFAULT 1,
    error_context TEXT,
    started_at TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(phase_id, sequence)
);
CREATE INDEX IF NOT EXISTS idx_tasks_phase ON tasks(phase_id);
CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

CREATE TABLE IF NOT EXISTS task_dependencies (
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    depends_on_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    PRIMARY KEY (task_id, depends_on_id)
);
CREATE INDEX IF NOT EXISTS idx_deps_depends_on ON task_dependencies(depends_on_id);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    session_kind TEXT NOT NULL,
    pane_handle TEXT,
    pid INTEGER,
    status TEXT NOT NULL DEFAULT 'pending',
    exit_code INTEGER,
    started_at TEXT,
    completed_at TEXT,
    duration_secs INTEGER,
    log_path TEXT,
    error_output TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_sessions_task ON sessions(task_id);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    entity_kind TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_kind TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_events_project ON events(project_id);
CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_kind, entity_id);

CREATE TABLE IF NOT EXISTS bootstrap_checks (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    check_name TEXT NOT NULL,
    check_type TEXT NOT NULL,
    command TEXT NOT NULL,
    expected TEXT,
    actual_output TEXT,
    passed INTEGER NOT NULL DEFAULT 0,
    run_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_bootstrap_project ON bootstrap_checks(project_id);
";

pub const INSERT_PROJECT: &str = "
INSERT INTO projects (id, name, project_dir, prd_path, bootstrap_path, claude_md_path, status)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
";
pub const SELECT_PROJECT_BY_ID: &str = "SELECT * FROM projects WHERE id = ?1";
pub const UPDATE_PROJECT_STATUS: &str =
    "UPDATE projects SET status = ?1, updated_at = datetime('now') WHERE id = ?2";
pub const DELETE_PROJECT: &str = "DELETE FROM projects WHERE id = ?1";

pub const INSERT_PHASE: &str = "
INSERT INTO phases (id, project_id, sequence, name, description, status)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
";
pub const SELECT_PHASES_BY_PROJECT: &str =
    "SELECT * FROM phases WHERE project_id = ?1 ORDER BY sequence";
pub const UPDATE_PHASE_STATUS: &str = "UPDATE phases SET status = ?1 WHERE id = ?2";
pub const UPDATE_PHASE_STARTED: &str =
    "UPDATE phases SET status = ?1, started_at = datetime('now') WHERE id = ?2";
pub const UPDATE_PHASE_COMPLETED: &str =
    "UPDATE phases SET status = ?1, completed_at = datetime('now') WHERE id = ?2";

pub const INSERT_TASK: &str = "
INSERT INTO tasks (
    id, phase_id, project_id, sequence, name, description,
    task_kind, brief_path, status, retry_count, max_retries
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
";
pub const SELECT_TASK_BY_ID: &str = "SELECT * FROM tasks WHERE id = ?1";
pub const SELECT_TASKS_BY_PHASE: &str = "SELECT * FROM tasks WHERE phase_id = ?1 ORDER BY sequence";
pub const SELECT_TASKS_BY_PROJECT: &str =
    "SELECT * FROM tasks WHERE project_id = ?1 ORDER BY sequence";
pub const SELECT_TASKS_BY_STATUS: &str =
    "SELECT * FROM tasks WHERE project_id = ?1 AND status = ?2";
pub const UPDATE_TASK_STATUS: &str = "UPDATE tasks SET status = ?1 WHERE id = ?2";
pub const UPDATE_TASK_STARTED: &str =
    "UPDATE tasks SET status = ?1, started_at = datetime('now') WHERE id = ?2";
pub const UPDATE_TASK_COMPLETED: &str =
    "UPDATE tasks SET status = ?1, completed_at = datetime('now') WHERE id = ?2";
pub const UPDATE_TASK_ERROR: &str =
    "UPDATE tasks SET error_context = ?1, retry_count = retry_count + 1 WHERE id = ?2";
pub const UPDATE_TASK_BRIEF_PATH: &str = "UPDATE tasks SET brief_path = ?1 WHERE id = ?2";

pub const INSERT_TASK_DEPENDENCY: &str =
    "INSERT INTO task_dependencies (task_id, depends_on_id) VALUES (?1, ?2)";
pub const SELECT_TASK_DEPENDENCIES: &str =
    "SELECT * FROM task_dependencies WHERE task_id = ?1";

pub const SELECT_PENDING_TASKS_WITH_MET_DEPENDENCIES: &str = "
SELECT t.* FROM tasks t
WHERE t.project_id = ?1
  AND t.status = 'pending'
  AND NOT EXISTS (
    SELECT 1 FROM task_dependencies td
    JOIN tasks dep ON dep.id = td.depends_on_id
    WHERE td.task_id = t.id AND dep.status != 'completed'
  )
ORDER BY t.sequence
";

pub const INSERT_SESSION: &str = "
INSERT INTO sessions (
    id, task_id, project_id, session_kind, pane_handle, pid, status, log_path
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
";
pub const SELECT_SESSIONS_BY_TASK: &str =
    "SELECT * FROM sessions WHERE task_id = ?1 ORDER BY created_at DESC";
pub const SELECT_SESSION_BY_ID: &str = "SELECT * FROM sessions WHERE id = ?1";
pub const SELECT_ACTIVE_SESSIONS: &str =
    "SELECT * FROM sessions WHERE project_id = ?1 AND status IN ('pending', 'starting', 'running')";
pub const UPDATE_SESSION_STATUS: &str = "UPDATE sessions SET status = ?1 WHERE id = ?2";
pub const UPDATE_SESSION_COMPLETED: &str = "
UPDATE sessions SET status = ?1, exit_code = ?2, completed_at = datetime('now'),
    duration_secs = CAST((julianday(datetime('now')) - julianday(started_at)) * 86400 AS INTEGER)
WHERE id = ?3
";
pub const UPDATE_SESSION_STARTED: &str =
    "UPDATE sessions SET status = 'running', started_at = datetime('now'), pid = ?1 WHERE id = ?2";
pub const UPDATE_SESSION_ERROR: &str = "UPDATE sessions SET error_output = ?1 WHERE id = ?2";

pub const INSERT_EVENT: &str = "
INSERT INTO events (project_id, entity_kind, entity_id, event_kind, old_value, new_value, metadata)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
";
pub const SELECT_EVENT_BY_ID: &str = "SELECT * FROM events WHERE id = ?1";
pub const SELECT_EVENTS_BY_PROJECT: &str =
    "SELECT * FROM events WHERE project_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2";
pub const SELECT_EVENTS_BY_ENTITY: &str =
    "SELECT * FROM events WHERE entity_kind = ?1 AND entity_id = ?2 ORDER BY created_at DESC, id DESC";

pub const INSERT_BOOTSTRAP_CHECK: &str = "
INSERT INTO bootstrap_checks (id, project_id, check_name, check_type, command, expected, actual_output, passed)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
";
pub const SELECT_BOOTSTRAP_CHECKS_BY_PROJECT: &str =
    "SELECT * FROM bootstrap_checks WHERE project_id = ?1 ORDER BY run_at";
