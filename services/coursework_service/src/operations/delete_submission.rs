use serde::Deserialize;
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::Actor;
use crate::model::{ActivityAction, AssignmentStatus, EntityType};
use crate::store::{StoreError, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct DeleteSubmissionInput {
    pub actor: Actor,
    pub submission_id: Uuid,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DeleteSubmissionError {
    #[error("Submission not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,

    #[error("The submission has been graded and cannot be withdrawn.")]
    AlreadyGraded,
}

/// Withdraws an ungraded submission. The attempt number it held is released
/// back to the sequence, and the assignment drops back to in-progress.
pub async fn delete_submission(
    ctx: &Context,
    store: &(impl SubmissionsRepository + Sync),
    input: &DeleteSubmissionInput,
) -> Result<(), EndpointError<DeleteSubmissionError>> {
    let submission = store.submission(&input.submission_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(DeleteSubmissionError::NotFound),
        e => {
            log::error!("Failed to load submission {}: {:?}.", input.submission_id, e);
            EndpointError::internal()
        }
    })?;

    if submission.account_id != input.actor.account_id {
        return Err(EndpointError::operation(DeleteSubmissionError::AccessDenied));
    }

    if submission.is_graded() {
        return Err(EndpointError::operation(DeleteSubmissionError::AlreadyGraded));
    }

    store.delete_submission(&input.submission_id).await.map_err(|e| {
        log::error!("Failed to delete submission {}: {:?}.", input.submission_id, e);
        EndpointError::internal()
    })?;

    if let Err(e) = store
        .put_assignment_status(&submission.task_id, &submission.account_id, AssignmentStatus::InProgress)
        .await
    {
        log::warn!(
            "Could not reset assignment ({}, {}) after withdrawal: {:?}.",
            submission.task_id,
            submission.account_id,
            e
        );
    }

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Delete,
            EntityType::Submission,
            &input.submission_id,
            json!({ "task_id": submission.task_id, "attempt_number": submission.attempt_number }),
        )
        .await;

    Ok(())
}

impl OperationError for DeleteSubmissionError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
            Self::AlreadyGraded => tonic::Code::FailedPrecondition,
        }
    }
}
