//! Spawns and tracks the worker processes that drive each task.
//!
//! A worker is a plain child process, not a terminal-multiplexer pane: the
//! two-slot exclusivity the engine needs (one coding worker, one review
//! worker) is modeled as an opaque `SlotKind` rather than a literal pane
//! identifier, which is the only thing the original tmux-pane bookkeeping
//! actually provided.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use forge_common::constants::{GRACEFUL_KILL_WAIT_SECS, REVIEW_TIMEOUT_SECS, SESSION_TIMEOUT_SECS};
use forge_common::enums::{SessionKind, SessionStatus, TaskKind};
use forge_common::errors::CoreResult;
use forge_common::models::{Session, Task};
use forge_common::state_machine::validate_session_transition;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Coding,
    Review,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Coding => "coding",
            SlotKind::Review => "review",
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            SlotKind::Coding => Duration::from_secs(SESSION_TIMEOUT_SECS),
            SlotKind::Review => Duration::from_secs(REVIEW_TIMEOUT_SECS),
        }
    }
}

impl From<TaskKind> for SlotKind {
    fn from(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Coding | TaskKind::Deployment | TaskKind::Verification | TaskKind::Planning => {
                SlotKind::Coding
            }
            TaskKind::Review | TaskKind::SecurityReview => SlotKind::Review,
        }
    }
}

/// Outcome of polling an active session for completion.
#[derive(Debug, Clone)]
pub struct SessionCheckResult {
    pub exited: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub error_output: String,
}

struct ActiveSession {
    task_id: String,
    slot: SlotKind,
    child: Child,
    started_at: Instant,
    error_output: Arc<AsyncMutex<String>>,
}

/// Drives worker processes and tracks which of the two slots are busy.
pub struct SessionManager {
    project_dir: PathBuf,
    worker_cmd: String,
    worker_args: Vec<String>,
    active: DashMap<String, ActiveSession>,
}

impl SessionManager {
    pub fn new(project_dir: PathBuf, worker_cmd: String, worker_args: Vec<String>) -> Self {
        Self {
            project_dir,
            worker_cmd,
            worker_args,
            active: DashMap::new(),
        }
    }

    pub fn has_active_coding(&self) -> bool {
        self.active.iter().any(|entry| entry.value().slot == SlotKind::Coding)
    }

    pub fn has_active_review(&self) -> bool {
        self.active.iter().any(|entry| entry.value().slot == SlotKind::Review)
    }

    pub fn active_session_ids(&self) -> Vec<String> {
        self.active.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Spawn a worker for `task`, piping `brief_path`'s contents to its
    /// stdin. Creates the session row in the store and returns it.
    pub async fn spawn(&self, store: &Store, task: &Task, brief_path: &Path) -> CoreResult<Session> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let slot = SlotKind::from(task.task_kind);
        let session_kind = SessionKind::from(task.task_kind);

        let log_path = self
            .project_dir
            .join(".forge-core")
            .join("logs")
            .join(format!("session-{session_id}.log"));
        if let Some(parent) = log_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let brief = tokio::fs::read(brief_path).await?;

        let mut command = Command::new(&self.worker_cmd);
        command
            .args(&self.worker_args)
            .current_dir(&self.project_dir)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = command.spawn().map_err(|e| {
            forge_common::errors::CoreError::WorkerFailure {
                task_id: task.id.clone(),
                message: format!("failed to spawn worker: {e}"),
            }
        })?;
        let pid = child.id().unwrap_or(0) as i64;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&brief).await?;
            stdin.shutdown().await?;
        }

        let error_output = Arc::new(AsyncMutex::new(String::new()));

        if let Some(stdout) = child.stdout.take() {
            let log_path = log_path.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stdout).lines();
                let mut log = match tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_path)
                    .await
                {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(error = %e, "failed to open session log for stdout");
                        return;
                    }
                };
                while let Ok(Some(line)) = reader.next_line().await {
                    let _ = log.write_all(line.as_bytes()).await;
                    let _ = log.write_all(b"\n").await;
                }
            });
        }

        if let Some(stderr) = child.stderr.take() {
            let log_path = log_path.clone();
            let error_output = error_output.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                let mut log = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_path)
                    .await
                    .ok();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Some(ref mut log) = log {
                        let _ = log.write_all(b"[stderr] ").await;
                        let _ = log.write_all(line.as_bytes()).await;
                        let _ = log.write_all(b"\n").await;
                    }
                    let mut buf = error_output.lock().await;
                    buf.push_str(&line);
                    buf.push('\n');
                }
            });
        }

        let session = store.create_session(
            &session_id,
            &task.id,
            &task.project_id,
            session_kind,
            Some(slot.as_str()),
            Some(&log_path.to_string_lossy()),
        )?;

        validate_session_transition(SessionStatus::Pending, SessionStatus::Starting)?;
        store.update_session_status(&session_id, SessionStatus::Starting)?;

        validate_session_transition(SessionStatus::Starting, SessionStatus::Running)?;
        store.update_session_started(&session_id, pid)?;

        self.active.insert(
            session_id.clone(),
            ActiveSession {
                task_id: task.id.clone(),
                slot,
                child,
                started_at: Instant::now(),
                error_output,
            },
        );

        debug!(session_id = %session_id, task_id = %task.id, slot = %slot.as_str(), "spawned worker session");
        store.get_session(&session_id)
    }

    /// Poll every active session for exit or timeout, removing finished
    /// sessions from the active set.
    pub async fn check_active(&self) -> Vec<(String, String, SessionCheckResult)> {
        let ids: Vec<String> = self.active.iter().map(|e| e.key().clone()).collect();
        let mut results = Vec::new();

        for id in ids {
            let timed_out = {
                let Some(entry) = self.active.get(&id) else { continue };
                entry.started_at.elapsed() > entry.slot.timeout()
            };

            if timed_out {
                if let Some((_, mut session)) = self.active.remove(&id) {
                    let _ = session.child.kill().await;
                    let error_output = session.error_output.lock().await.clone();
                    results.push((
                        id,
                        session.task_id,
                        SessionCheckResult {
                            exited: true,
                            exit_code: None,
                            timed_out: true,
                            error_output,
                        },
                    ));
                }
                continue;
            }

            let exit_status = {
                let Some(mut entry) = self.active.get_mut(&id) else { continue };
                entry.child.try_wait().ok().flatten()
            };

            if let Some(status) = exit_status {
                if let Some((_, session)) = self.active.remove(&id) {
                    let error_output = session.error_output.lock().await.clone();
                    results.push((
                        id,
                        session.task_id,
                        SessionCheckResult {
                            exited: true,
                            exit_code: status.code(),
                            timed_out: false,
                            error_output,
                        },
                    ));
                }
            }
        }

        results
    }

    /// Kill a running session: SIGTERM first, escalating to SIGKILL after
    /// `GRACEFUL_KILL_WAIT_SECS` if the worker hasn't exited.
    pub async fn kill_session(&self, session_id: &str) {
        let Some((_, mut session)) = self.active.remove(session_id) else {
            return;
        };

        if let Some(pid) = session.child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }

        let graceful = tokio::time::timeout(
            Duration::from_secs(GRACEFUL_KILL_WAIT_SECS),
            session.child.wait(),
        )
        .await;

        if graceful.is_err() {
            let _ = session.child.kill().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_kind_groups_task_kinds_into_two_slots() {
        assert_eq!(SlotKind::from(TaskKind::Coding), SlotKind::Coding);
        assert_eq!(SlotKind::from(TaskKind::Deployment), SlotKind::Coding);
        assert_eq!(SlotKind::from(TaskKind::Review), SlotKind::Review);
        assert_eq!(SlotKind::from(TaskKind::SecurityReview), SlotKind::Review);
    }

    #[tokio::test]
    async fn spawning_a_coding_and_review_session_occupies_both_slots() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let project = store
            .create_project("proj1", "Demo", dir.path().to_str().unwrap(), "prd.md", None, None)
            .unwrap();
        let phase = store.create_phase("phase1", &project.id, 1, "Phase 1", None).unwrap();
        let coding_task = store
            .create_task("task1", &phase.id, &project.id, 1, "Build", TaskKind::Coding, None, 1)
            .unwrap();
        let review_task = store
            .create_task("task2", &phase.id, &project.id, 2, "Review", TaskKind::Review, None, 1)
            .unwrap();

        let brief = dir.path().join("brief.md");
        tokio::fs::write(&brief, "do the thing").await.unwrap();

        let manager = SessionManager::new(dir.path().to_path_buf(), "true".into(), vec![]);
        assert!(!manager.has_active_coding());
        assert!(!manager.has_active_review());

        manager.spawn(&store, &coding_task, &brief).await.unwrap();
        assert!(manager.has_active_coding());
        assert!(!manager.has_active_review());

        manager.spawn(&store, &review_task, &brief).await.unwrap();
        assert!(manager.has_active_review());
    }

    #[tokio::test]
    async fn check_active_reports_exit_for_a_finished_process() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        let project = store
            .create_project("proj1", "Demo", dir.path().to_str().unwrap(), "prd.md", None, None)
            .unwrap();
        let phase = store.create_phase("phase1", &project.id, 1, "Phase 1", None).unwrap();
        let task = store
            .create_task("task1", &phase.id, &project.id, 1, "Build", TaskKind::Coding, None, 1)
            .unwrap();

        let brief = dir.path().join("brief.md");
        tokio::fs::write(&brief, "do the thing").await.unwrap();

        let manager = SessionManager::new(dir.path().to_path_buf(), "true".into(), vec![]);
        manager.spawn(&store, &task, &brief).await.unwrap();

        // Give the trivially-exiting `true` process a moment to finish.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let results = manager.check_active().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].2.exited);
        assert_eq!(results[0].2.exit_code, Some(0));
        assert!(!manager.has_active_coding());
    }
}
