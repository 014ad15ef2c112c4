use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::Actor;
use crate::model::{ActivityAction, EntityType, Submission};
use crate::store::{StoreError, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateSubmissionInput {
    pub actor: Actor,
    pub submission_id: Uuid,
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdateSubmissionOutput {
    pub submission: Submission,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum UpdateSubmissionError {
    #[error("Submission not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,

    #[error("The submission has been graded and is immutable.")]
    AlreadyGraded,
}

/// Replaces the content of an ungraded submission. Only the submitter may edit
/// their own work; once a grade lands the record is frozen.
pub async fn update_submission(
    ctx: &Context,
    store: &(impl SubmissionsRepository + Sync),
    input: &UpdateSubmissionInput,
) -> Result<UpdateSubmissionOutput, EndpointError<UpdateSubmissionError>> {
    let mut submission = store.submission(&input.submission_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(UpdateSubmissionError::NotFound),
        e => {
            log::error!("Failed to load submission {}: {:?}.", input.submission_id, e);
            EndpointError::internal()
        }
    })?;

    if submission.account_id != input.actor.account_id {
        return Err(EndpointError::operation(UpdateSubmissionError::AccessDenied));
    }

    if submission.is_graded() {
        return Err(EndpointError::operation(UpdateSubmissionError::AlreadyGraded));
    }

    submission.content = input.content.clone();
    store.update_submission(&submission).await.map_err(|e| {
        log::error!("Failed to store submission {}: {:?}.", input.submission_id, e);
        EndpointError::internal()
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Update,
            EntityType::Submission,
            &submission.submission_id,
            json!({ "attempt_number": submission.attempt_number }),
        )
        .await;

    Ok(UpdateSubmissionOutput { submission })
}

impl OperationError for UpdateSubmissionError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
            Self::AlreadyGraded => tonic::Code::FailedPrecondition,
        }
    }
}
