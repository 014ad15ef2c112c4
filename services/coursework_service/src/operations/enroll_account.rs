use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, CourseCapability};
use crate::model::{ActivityAction, CourseRole, Enrollment, EntityType};
use crate::store::{
    AccountsRepository, CoursesRepository, DocumentsRepository, EnrollError, StoreError,
    SubmissionsRepository,
};
use crate::Context;
use uuid::Uuid;

#[derive(Clone, Debug, Deserialize)]
pub struct EnrollAccountInput {
    pub actor: Actor,
    pub course_id: Uuid,
    pub account_id: Uuid,

    #[serde(default = "default_role")]
    pub role: CourseRole,
}

fn default_role() -> CourseRole {
    CourseRole::Student
}

#[derive(Clone, Debug, Serialize)]
pub struct EnrollAccountOutput {
    pub enrollment: Enrollment,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EnrollAccountError {
    #[error("Course not found.")]
    CourseNotFound,

    #[error("Account not found.")]
    AccountNotFound,

    #[error("Access denied.")]
    AccessDenied,

    #[error("The account is already enrolled in this course.")]
    AlreadyEnrolled,
}

pub async fn enroll_account(
    ctx: &Context,
    store: &(impl AccountsRepository + CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &EnrollAccountInput,
) -> Result<EnrollAccountOutput, EndpointError<EnrollAccountError>> {
    store.account(&input.account_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(EnrollAccountError::AccountNotFound),
        e => {
            log::error!("Failed to load account {}: {:?}.", input.account_id, e);
            EndpointError::internal()
        }
    })?;

    let decision = resolve(
        store,
        &input.actor,
        &AccessRequest::Course {
            course_id: input.course_id,
            capability: CourseCapability::EnrollMember,
        },
    )
    .await
    .map_err(|e| match e {
        ResolveError::NotFound => EndpointError::operation(EnrollAccountError::CourseNotFound),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        log::info!(
            "Denied enrollment of {} into {} by {} ({:?}).",
            input.account_id,
            input.course_id,
            input.actor.account_id,
            decision.reason
        );
        return Err(EndpointError::operation(EnrollAccountError::AccessDenied));
    }

    let enrollment = Enrollment::builder()
        .course_id(input.course_id)
        .account_id(input.account_id)
        .role(input.role)
        .build();
    store.put_enrollment(&enrollment).await.map_err(|e| match e {
        EnrollError::DuplicateEnrollment => EndpointError::operation(EnrollAccountError::AlreadyEnrolled),
        EnrollError::Other(e) => {
            log::error!("Failed to store enrollment: {:?}.", e);
            EndpointError::internal()
        }
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Create,
            EntityType::Enrollment,
            &input.account_id,
            json!({ "course_id": input.course_id, "role": input.role }),
        )
        .await;

    Ok(EnrollAccountOutput { enrollment })
}

impl OperationError for EnrollAccountError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::CourseNotFound | Self::AccountNotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
            Self::AlreadyEnrolled => tonic::Code::AlreadyExists,
        }
    }
}
