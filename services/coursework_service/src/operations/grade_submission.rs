use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, SubmissionCapability};
use crate::model::{ActivityAction, AssignmentStatus, EntityType, Submission};
use crate::store::{CoursesRepository, DocumentsRepository, StoreError, SubmissionsRepository};
use crate::Context;

const MIN_GRADE: i32 = 0;
const MAX_GRADE: i32 = 100;

#[derive(Clone, Debug, Deserialize)]
pub struct GradeSubmissionInput {
    pub actor: Actor,
    pub submission_id: Uuid,
    pub grade: i32,

    /// Replacing an existing grade must be asked for explicitly.
    #[serde(default)]
    pub regrade: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GradeSubmissionOutput {
    pub submission: Submission,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GradeSubmissionError {
    #[error("Submission not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,

    #[error("The submission is already graded; regrading must be explicit.")]
    AlreadyGraded,
}

/// Assigns a grade to a submission on behalf of the course's teaching staff.
pub async fn grade_submission(
    ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &GradeSubmissionInput,
) -> Result<GradeSubmissionOutput, EndpointError<GradeSubmissionError>> {
    if !(MIN_GRADE..=MAX_GRADE).contains(&input.grade) {
        return Err(EndpointError::validation(format!(
            "Grade must be between {} and {}.",
            MIN_GRADE, MAX_GRADE
        )));
    }

    let decision = resolve(
        store,
        &input.actor,
        &AccessRequest::Submission {
            submission_id: input.submission_id,
            capability: SubmissionCapability::Grade,
        },
    )
    .await
    .map_err(|e| match e {
        ResolveError::NotFound => EndpointError::operation(GradeSubmissionError::NotFound),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        log::info!(
            "Denied grading of {} by {} ({:?}).",
            input.submission_id,
            input.actor.account_id,
            decision.reason
        );
        return Err(EndpointError::operation(GradeSubmissionError::AccessDenied));
    }

    let mut submission = store.submission(&input.submission_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(GradeSubmissionError::NotFound),
        e => {
            log::error!("Failed to load submission {}: {:?}.", input.submission_id, e);
            EndpointError::internal()
        }
    })?;

    if submission.is_graded() && !input.regrade {
        return Err(EndpointError::operation(GradeSubmissionError::AlreadyGraded));
    }
    let regraded = submission.is_graded();

    submission.grade = Some(input.grade);
    submission.graded_at = Some(Utc::now());
    submission.graded_by = Some(input.actor.account_id);
    store.update_submission(&submission).await.map_err(|e| {
        log::error!("Failed to store submission {}: {:?}.", input.submission_id, e);
        EndpointError::internal()
    })?;

    // The assignment row may have been removed since the submission landed;
    // the grade stands either way.
    if let Err(e) = store
        .put_assignment_status(&submission.task_id, &submission.account_id, AssignmentStatus::Graded)
        .await
    {
        log::warn!(
            "Could not mark assignment ({}, {}) as graded: {:?}.",
            submission.task_id,
            submission.account_id,
            e
        );
    }

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Grade,
            EntityType::Submission,
            &submission.submission_id,
            json!({ "grade": input.grade, "regrade": regraded }),
        )
        .await;

    Ok(GradeSubmissionOutput { submission })
}

impl OperationError for GradeSubmissionError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
            Self::AlreadyGraded => tonic::Code::FailedPrecondition,
        }
    }
}
