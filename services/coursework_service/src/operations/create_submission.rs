use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::Actor;
use crate::model::{ActivityAction, AssignmentStatus, EntityType, Submission, TaskState};
use crate::store::{InsertSubmissionError, StoreError, SubmissionsRepository};
use crate::Context;

/// One reservation plus one retry; a second collision in a row means the pair
/// is under live contention and the caller should come back.
const ATTEMPT_RESERVATION_TRIES: u32 = 2;

#[derive(Clone, Debug, Deserialize)]
pub struct CreateSubmissionInput {
    pub actor: Actor,
    pub task_id: Uuid,
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateSubmissionOutput {
    pub submission: Submission,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CreateSubmissionError {
    #[error("Task not found.")]
    TaskNotFound,

    #[error("The task is not assigned to this account.")]
    NotAssigned,

    #[error("The task is not open for submissions.")]
    TaskNotOpen,

    #[error("The submission window for this task has closed.")]
    PastDue,

    #[error("Could not reserve an attempt number; please retry.")]
    AttemptConflict,
}

/// Records a new attempt against an assigned, published task.
///
/// Attempt numbers per (task, account) are gapless at creation time: the store
/// hands out the smallest free number, and a concurrent claim of the same
/// number is retried once against a fresh number before giving up.
pub async fn create_submission(
    ctx: &Context,
    store: &(impl SubmissionsRepository + Sync),
    input: &CreateSubmissionInput,
) -> Result<CreateSubmissionOutput, EndpointError<CreateSubmissionError>> {
    let task = store.task(&input.task_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(CreateSubmissionError::TaskNotFound),
        e => {
            log::error!("Failed to load task {}: {:?}.", input.task_id, e);
            EndpointError::internal()
        }
    })?;

    let assigned = store
        .assignment(&input.task_id, &input.actor.account_id)
        .await
        .map_err(|e| {
            log::error!("Failed to load assignment: {:?}.", e);
            EndpointError::internal()
        })?
        .is_some();
    if !assigned {
        return Err(EndpointError::operation(CreateSubmissionError::NotAssigned));
    }

    if task.state != TaskState::Published {
        return Err(EndpointError::operation(CreateSubmissionError::TaskNotOpen));
    }

    if let Some(due_at) = task.due_at {
        if Utc::now() > due_at && !task.allow_late_submission {
            return Err(EndpointError::operation(CreateSubmissionError::PastDue));
        }
    }

    let mut submission = None;
    for _ in 0..ATTEMPT_RESERVATION_TRIES {
        let attempt_number = store
            .next_attempt_number(&input.task_id, &input.actor.account_id)
            .await
            .map_err(|e| {
                log::error!("Failed to compute next attempt number: {:?}.", e);
                EndpointError::internal()
            })?;

        let candidate = Submission::builder()
            .task_id(input.task_id)
            .account_id(input.actor.account_id)
            .attempt_number(attempt_number)
            .content(input.content.clone())
            .build();

        match store.insert_submission(&candidate).await {
            Ok(()) => {
                submission = Some(candidate);
                break;
            }
            Err(InsertSubmissionError::DuplicateAttempt) => {
                log::warn!(
                    "Attempt {} on task {} was claimed concurrently; retrying.",
                    attempt_number,
                    input.task_id
                );
            }
            Err(InsertSubmissionError::Other(e)) => {
                log::error!("Failed to store submission: {:?}.", e);
                return Err(EndpointError::internal());
            }
        }
    }
    let Some(submission) = submission else {
        return Err(EndpointError::operation(CreateSubmissionError::AttemptConflict));
    };

    store
        .put_assignment_status(&input.task_id, &input.actor.account_id, AssignmentStatus::Submitted)
        .await
        .map_err(|e| {
            log::error!("Failed to update assignment status: {:?}.", e);
            EndpointError::internal()
        })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Submit,
            EntityType::Submission,
            &submission.submission_id,
            json!({ "task_id": input.task_id, "attempt_number": submission.attempt_number }),
        )
        .await;

    Ok(CreateSubmissionOutput { submission })
}

impl OperationError for CreateSubmissionError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::TaskNotFound => tonic::Code::NotFound,
            Self::NotAssigned | Self::TaskNotOpen | Self::PastDue => tonic::Code::FailedPrecondition,
            Self::AttemptConflict => tonic::Code::Aborted,
        }
    }
}
