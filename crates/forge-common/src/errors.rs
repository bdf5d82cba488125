//! Typed error hierarchy for the orchestration core.
//!
//! One enum covers the whole domain: lookups, transition legality, the
//! reporting channel's input validation, worker failures, scheduling
//! deadlock, and infrastructure (store/IO) errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity_kind} not found: {id}")]
    NotFound { entity_kind: String, id: String },

    #[error("invalid {entity_kind} transition: {current} -> {target}")]
    InvalidTransition {
        entity_kind: String,
        current: String,
        target: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("worker failed for task {task_id}: {message}")]
    WorkerFailure { task_id: String, message: String },

    #[error("deadlock detected for project {project_id}: {reason}")]
    Deadlock { project_id: String, reason: String },

    #[error("infrastructure error: {0}")]
    Infrastructure(#[source] anyhow::Error),
}

impl CoreError {
    pub fn not_found(entity_kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_kind: entity_kind.into(),
            id: id.into(),
        }
    }

    pub fn invalid_transition(
        entity_kind: impl Into<String>,
        current: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            entity_kind: entity_kind.into(),
            current: current.into(),
            target: target.into(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Infrastructure(anyhow::Error::new(err))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
