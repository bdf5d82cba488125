//! Generated gRPC types for the reporting channel, plus the conversions
//! the runtime needs to go from domain errors to `tonic::Status` and back.

pub mod pb {
    tonic::include_proto!("forge.reporting.v1");
}

pub use pb::reporting_channel_client::ReportingChannelClient;
pub use pb::reporting_channel_server::{ReportingChannel, ReportingChannelServer};
pub use pb::{
    Ack, CompletedTaskSummary, CurrentPhaseSummary, GetContextRequest, GetContextResponse,
    ReportCompletionRequest, ReportFailureRequest, ReportProgressRequest, ReportReviewRequest,
    RequestHumanInputRequest,
};

use forge_common::errors::CoreError;
use tonic::Status;

/// Maps a domain error to the gRPC status the reporting channel returns.
///
/// `InvalidInput` and `InvalidTransition` are the caller's fault (bad
/// precondition, e.g. reporting on a task that isn't running) and map to
/// codes a worker implementation can branch on; everything else is
/// collapsed to `Internal` since it reflects a core-side problem the
/// worker cannot act on.
pub fn core_error_to_status(err: CoreError) -> Status {
    match err {
        CoreError::NotFound { entity_kind, id } => {
            Status::not_found(format!("{entity_kind} not found: {id}"))
        }
        CoreError::InvalidInput(msg) => Status::invalid_argument(msg),
        CoreError::InvalidTransition {
            entity_kind,
            current,
            target,
        } => Status::failed_precondition(format!(
            "invalid {entity_kind} transition: {current} -> {target}"
        )),
        other => Status::internal(other.to_string()),
    }
}
