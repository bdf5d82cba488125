//! Transition tables for the three entity state machines.
//!
//! Every legal transition is listed explicitly; anything not listed is
//! rejected with `CoreError::InvalidTransition`. No transition is inferred.

use crate::enums::{PhaseStatus, SessionStatus, TaskStatus};
use crate::errors::CoreError;

pub fn validate_task_transition(current: TaskStatus, target: TaskStatus) -> Result<(), CoreError> {
    use TaskStatus::*;
    let allowed: &[TaskStatus] = match current {
        Pending => &[Queued, Skipped],
        Queued => &[Running, Skipped],
        Running => &[Completed, Failed],
        Failed => &[Retrying, Paused, Skipped],
        Retrying => &[Running],
        Paused => &[Queued, Skipped],
        Completed => &[],
        Skipped => &[],
    };
    if allowed.contains(&target) {
        Ok(())
    } else {
        Err(CoreError::invalid_transition("task", current.as_str(), target.as_str()))
    }
}

pub fn validate_phase_transition(current: PhaseStatus, target: PhaseStatus) -> Result<(), CoreError> {
    use PhaseStatus::*;
    let allowed: &[PhaseStatus] = match current {
        Pending => &[InProgress, Skipped],
        InProgress => &[Completed, Failed, Skipped],
        Completed => &[],
        Failed => &[InProgress],
        Skipped => &[],
    };
    if allowed.contains(&target) {
        Ok(())
    } else {
        Err(CoreError::invalid_transition("phase", current.as_str(), target.as_str()))
    }
}

pub fn validate_session_transition(
    current: SessionStatus,
    target: SessionStatus,
) -> Result<(), CoreError> {
    use SessionStatus::*;
    let allowed: &[SessionStatus] = match current {
        Pending => &[Starting, Failed],
        Starting => &[Running, Failed],
        Running => &[Completed, Failed, Killed, TimedOut],
        Completed => &[],
        Failed => &[],
        Killed => &[],
        TimedOut => &[],
    };
    if allowed.contains(&target) {
        Ok(())
    } else {
        Err(CoreError::invalid_transition("session", current.as_str(), target.as_str()))
    }
}
