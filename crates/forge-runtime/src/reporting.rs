//! The Reporting Channel: the gRPC surface a worker process uses to report
//! progress, completion, failure and review results, pull context, and ask
//! for human input.
//!
//! Every handler opens a fresh [`Store`] rather than sharing one across
//! calls, so concurrent RPCs don't contend on a single `rusqlite::Connection`
//! and each call is its own serializable unit of work.

use std::path::PathBuf;

use forge_common::enums::{EventKind, TaskKind, TaskStatus};
use forge_common::errors::{CoreError, CoreResult};
use forge_common::retry::RetryPolicy;
use forge_proto::pb::reporting_channel_server::ReportingChannel as ReportingChannelService;
use forge_proto::{
    Ack, CompletedTaskSummary, CurrentPhaseSummary, GetContextRequest, GetContextResponse,
    ReportCompletionRequest, ReportFailureRequest, ReportProgressRequest, ReportReviewRequest,
    RequestHumanInputRequest,
};
use serde_json::json;
use tonic::{Request, Response, Status};
use tracing::info;

use crate::store::Store;

const ERROR_TRUNCATE_LEN: usize = 2000;

pub struct ReportingChannelHandler {
    db_path: PathBuf,
    retry_policy: RetryPolicy,
}

impl ReportingChannelHandler {
    pub fn new(db_path: PathBuf, retry_policy: RetryPolicy) -> Self {
        Self { db_path, retry_policy }
    }

    fn open_store(&self) -> CoreResult<Store> {
        Store::open(&self.db_path)
    }

    fn require_running(&self, store: &Store, task_id: &str) -> CoreResult<forge_common::models::Task> {
        let task = store.get_task(task_id)?;
        if task.status != TaskStatus::Running {
            return Err(CoreError::invalid_transition("task", task.status.as_str(), "reported-on"));
        }
        Ok(task)
    }
}

#[tonic::async_trait]
impl ReportingChannelService for ReportingChannelHandler {
    async fn report_progress(
        &self,
        request: Request<ReportProgressRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let store = self.open_store().map_err(forge_proto::core_error_to_status)?;
        self.require_running(&store, &req.task_id)
            .map_err(forge_proto::core_error_to_status)?;

        let metadata = json!({
            "status": req.status,
            "message": req.message,
            "percent": req.percent_complete,
        });
        store
            .create_event(
                &store.get_task(&req.task_id).map_err(forge_proto::core_error_to_status)?.project_id,
                "task",
                &req.task_id,
                EventKind::StatusChanged,
                None,
                Some(&req.status),
                Some(&metadata.to_string()),
            )
            .map_err(forge_proto::core_error_to_status)?;

        info!(task_id = %req.task_id, "progress reported");
        Ok(Response::new(Ack {
            success: true,
            message: "progress recorded".into(),
        }))
    }

    async fn report_completion(
        &self,
        request: Request<ReportCompletionRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let store = self.open_store().map_err(forge_proto::core_error_to_status)?;
        let task = self
            .require_running(&store, &req.task_id)
            .map_err(forge_proto::core_error_to_status)?;

        store
            .update_task_status(&req.task_id, TaskStatus::Completed)
            .map_err(forge_proto::core_error_to_status)?;

        let metadata = json!({
            "summary": req.summary,
            "files_changed": req.files_changed,
            "test_results": req.test_results,
        });
        store
            .create_event(
                &task.project_id,
                "task",
                &req.task_id,
                EventKind::StatusChanged,
                Some(TaskStatus::Running.as_str()),
                Some(TaskStatus::Completed.as_str()),
                Some(&metadata.to_string()),
            )
            .map_err(forge_proto::core_error_to_status)?;

        info!(task_id = %req.task_id, "task reported complete");
        Ok(Response::new(Ack {
            success: true,
            message: "completion recorded".into(),
        }))
    }

    async fn report_failure(
        &self,
        request: Request<ReportFailureRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let store = self.open_store().map_err(forge_proto::core_error_to_status)?;
        let task = self
            .require_running(&store, &req.task_id)
            .map_err(forge_proto::core_error_to_status)?;

        // Decide retry eligibility on the pre-increment retry_count: the
        // ceiling permits exactly `max_retries` retries.
        let retry_eligible = self.retry_policy.should_retry(&task);

        let truncated: String = req.error_message.chars().take(ERROR_TRUNCATE_LEN).collect();
        store
            .update_task_error(&req.task_id, &truncated)
            .map_err(forge_proto::core_error_to_status)?;

        store
            .update_task_status(&req.task_id, TaskStatus::Failed)
            .map_err(forge_proto::core_error_to_status)?;

        let next_status = if retry_eligible {
            store
                .update_task_status(&req.task_id, TaskStatus::Retrying)
                .map_err(forge_proto::core_error_to_status)?;
            TaskStatus::Retrying
        } else {
            TaskStatus::Failed
        };

        let metadata = json!({
            "error_type": req.error_type,
            "error_message": truncated,
            "attempted_fixes": req.attempted_fixes,
        });
        store
            .create_event(
                &task.project_id,
                "task",
                &req.task_id,
                EventKind::Error,
                Some(TaskStatus::Running.as_str()),
                Some(next_status.as_str()),
                Some(&metadata.to_string()),
            )
            .map_err(forge_proto::core_error_to_status)?;

        info!(task_id = %req.task_id, retry_eligible, "task reported failed");
        Ok(Response::new(Ack {
            success: true,
            message: "failure recorded".into(),
        }))
    }

    async fn report_review(
        &self,
        request: Request<ReportReviewRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let store = self.open_store().map_err(forge_proto::core_error_to_status)?;
        let task = store.get_task(&req.task_id).map_err(forge_proto::core_error_to_status)?;
        if !matches!(task.task_kind, TaskKind::Review | TaskKind::SecurityReview) {
            return Err(forge_proto::core_error_to_status(CoreError::InvalidInput(format!(
                "task {} is not a review task",
                req.task_id
            ))));
        }

        let event_kind = if req.verdict == "critical_issues" {
            EventKind::Error
        } else {
            EventKind::StatusChanged
        };
        let metadata = json!({
            "verdict": req.verdict,
            "findings": req.findings,
            "summary": req.summary,
        });
        store
            .create_event(
                &task.project_id,
                "task",
                &req.task_id,
                event_kind,
                None,
                Some(&req.verdict),
                Some(&metadata.to_string()),
            )
            .map_err(forge_proto::core_error_to_status)?;

        info!(task_id = %req.task_id, verdict = %req.verdict, "review verdict recorded");
        Ok(Response::new(Ack {
            success: true,
            message: "review recorded".into(),
        }))
    }

    async fn get_context(
        &self,
        request: Request<GetContextRequest>,
    ) -> Result<Response<GetContextResponse>, Status> {
        let req = request.into_inner();
        let store = self.open_store().map_err(forge_proto::core_error_to_status)?;
        let task = store.get_task(&req.task_id).map_err(forge_proto::core_error_to_status)?;

        let completed_tasks = store
            .get_tasks_by_project(&task.project_id)
            .map_err(forge_proto::core_error_to_status)?
            .into_iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| CompletedTaskSummary {
                id: t.id,
                name: t.name,
                task_kind: t.task_kind.as_str().to_string(),
            })
            .collect();

        let current_phase = store
            .get_phase(&task.phase_id)
            .ok()
            .map(|phase| CurrentPhaseSummary {
                name: phase.name,
                sequence: phase.sequence,
                status: phase.status.as_str().to_string(),
            });

        let review_findings = store
            .get_events_by_entity("task", &req.task_id)
            .map_err(forge_proto::core_error_to_status)?
            .into_iter()
            .filter_map(|event| {
                let metadata: serde_json::Value = event.metadata.as_deref().and_then(|m| serde_json::from_str(m).ok())?;
                metadata
                    .get("findings")?
                    .as_array()
                    .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>())
            })
            .flatten()
            .collect();

        Ok(Response::new(GetContextResponse {
            completed_tasks,
            current_phase,
            review_findings,
        }))
    }

    async fn request_human_input(
        &self,
        request: Request<RequestHumanInputRequest>,
    ) -> Result<Response<Ack>, Status> {
        let req = request.into_inner();
        let store = self.open_store().map_err(forge_proto::core_error_to_status)?;
        let task = store.get_task(&req.task_id).map_err(forge_proto::core_error_to_status)?;

        let metadata = json!({
            "question": req.question,
            "options": req.options,
            "context": req.context,
        });
        store
            .create_event(
                &task.project_id,
                "task",
                &req.task_id,
                EventKind::HumanInputRequested,
                None,
                None,
                Some(&metadata.to_string()),
            )
            .map_err(forge_proto::core_error_to_status)?;

        info!(task_id = %req.task_id, "human input requested");
        Ok(Response::new(Ack {
            success: true,
            message: "request recorded".into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_common::enums::TaskKind as Kind;

    fn setup_running_task(db_path: &std::path::Path) -> (Store, String) {
        let store = Store::open(db_path).unwrap();
        let project = store
            .create_project("proj1", "Demo", "/tmp/demo", "/tmp/prd.md", None, None)
            .unwrap();
        let phase = store.create_phase("phase1", &project.id, 1, "Phase 1", None).unwrap();
        let task = store
            .create_task("task1", &phase.id, &project.id, 1, "Build it", Kind::Coding, None, 1)
            .unwrap();
        store.update_task_status("task1", TaskStatus::Queued).unwrap();
        store.update_task_status("task1", TaskStatus::Running).unwrap();
        (store, task.id)
    }

    #[tokio::test]
    async fn report_completion_transitions_task_and_records_files_changed() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("orchestrator.db");
        let (_store, task_id) = setup_running_task(&db_path);

        let handler = ReportingChannelHandler::new(db_path.clone(), RetryPolicy::default());
        let response = handler
            .report_completion(Request::new(ReportCompletionRequest {
                task_id: task_id.clone(),
                summary: "done".into(),
                files_changed: vec!["src/lib.rs".into()],
                test_results: Some("all green".into()),
            }))
            .await
            .unwrap();
        assert!(response.into_inner().success);

        let store = Store::open(&db_path).unwrap();
        let task = store.get_task(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn report_failure_on_non_running_task_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("orchestrator.db");
        let store = Store::open(&db_path).unwrap();
        let project = store
            .create_project("proj1", "Demo", "/tmp/demo", "/tmp/prd.md", None, None)
            .unwrap();
        let phase = store.create_phase("phase1", &project.id, 1, "Phase 1", None).unwrap();
        let task = store
            .create_task("task1", &phase.id, &project.id, 1, "Build it", Kind::Coding, None, 1)
            .unwrap();

        let handler = ReportingChannelHandler::new(db_path, RetryPolicy::default());
        let result = handler
            .report_failure(Request::new(ReportFailureRequest {
                task_id: task.id,
                error_type: "panic".into(),
                error_message: "boom".into(),
                attempted_fixes: vec![],
            }))
            .await;
        assert_eq!(result.unwrap_err().code(), tonic::Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn report_failure_within_retry_budget_requeues_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("orchestrator.db");
        let (_store, task_id) = setup_running_task(&db_path);

        let handler = ReportingChannelHandler::new(db_path.clone(), RetryPolicy::default());
        handler
            .report_failure(Request::new(ReportFailureRequest {
                task_id: task_id.clone(),
                error_type: "panic".into(),
                error_message: "boom".into(),
                attempted_fixes: vec![],
            }))
            .await
            .unwrap();

        let store = Store::open(&db_path).unwrap();
        let task = store.get_task(&task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Retrying);
        assert_eq!(task.retry_count, 1);
    }

    #[tokio::test]
    async fn report_review_on_a_coding_task_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("orchestrator.db");
        let (_store, task_id) = setup_running_task(&db_path);

        let handler = ReportingChannelHandler::new(db_path, RetryPolicy::default());
        let result = handler
            .report_review(Request::new(ReportReviewRequest {
                task_id,
                verdict: "approved".into(),
                findings: vec![],
                summary: "looks fine".into(),
            }))
            .await;
        assert_eq!(result.unwrap_err().code(), tonic::Code::InvalidArgument);
    }
}
