use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, CourseCapability};
use crate::activity;
use crate::model::{ActivityAction, ActivityLogEntry, EntityType};
use crate::store::{
    ActivityRepository, CoursesRepository, DocumentsRepository, StoreError, SubmissionsRepository,
};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct CourseActivityInput {
    pub actor: Actor,
    pub course_id: Uuid,

    /// Caps the feed; absent means the configured page size.
    #[serde(default)]
    pub limit: Option<i32>,
}

/// Wire shape of one audit entry, shared with the document feed.
#[derive(Clone, Debug, Serialize)]
pub struct ActivityView {
    pub entry_id: Uuid,
    pub account_id: Uuid,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityLogEntry> for ActivityView {
    fn from(entry: ActivityLogEntry) -> Self {
        ActivityView {
            entry_id: entry.entry_id,
            account_id: entry.account_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            metadata: entry.metadata,
            created_at: entry.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CourseActivityOutput {
    pub entries: Vec<ActivityView>,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CourseActivityError {
    #[error("Course not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,
}

/// Time-descending audit feed of everything contained in a course. Reserved
/// for the course's managing staff; enrollment alone does not open it.
pub async fn course_activity(
    ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + ActivityRepository + Sync),
    input: &CourseActivityInput,
) -> Result<CourseActivityOutput, EndpointError<CourseActivityError>> {
    let limit = match input.limit {
        Some(limit) if limit <= 0 => {
            return Err(EndpointError::validation("Limit must be positive."));
        }
        Some(limit) => limit,
        None => ctx.activity_page_size,
    };

    let decision = resolve(
        store,
        &input.actor,
        &AccessRequest::Course {
            course_id: input.course_id,
            capability: CourseCapability::Manage,
        },
    )
    .await
    .map_err(|e| match e {
        ResolveError::NotFound => EndpointError::operation(CourseActivityError::NotFound),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        log::info!(
            "Denied activity feed of course {} to {} ({:?}).",
            input.course_id,
            input.actor.account_id,
            decision.reason
        );
        return Err(EndpointError::operation(CourseActivityError::AccessDenied));
    }

    let entries = activity::course_activity(store, &input.course_id, limit)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => EndpointError::operation(CourseActivityError::NotFound),
            e => {
                log::error!("Failed to build activity feed for {}: {:?}.", input.course_id, e);
                EndpointError::internal()
            }
        })?;

    Ok(CourseActivityOutput {
        entries: entries.into_iter().map(ActivityView::from).collect(),
    })
}

impl OperationError for CourseActivityError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
        }
    }
}
