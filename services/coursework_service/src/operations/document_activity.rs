use serde::{Deserialize, Serialize};
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, DocumentCapability};
use crate::activity;
use crate::operations::course_activity::ActivityView;
use crate::store::{
    ActivityRepository, CoursesRepository, DocumentsRepository, SubmissionsRepository,
};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct DocumentActivityInput {
    pub actor: Actor,
    pub document_id: Uuid,

    #[serde(default)]
    pub limit: Option<i32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DocumentActivityOutput {
    pub entries: Vec<ActivityView>,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DocumentActivityError {
    #[error("Document not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,
}

/// The document's own audit feed, open to anyone who can view the document.
pub async fn document_activity(
    ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + ActivityRepository + Sync),
    input: &DocumentActivityInput,
) -> Result<DocumentActivityOutput, EndpointError<DocumentActivityError>> {
    let limit = match input.limit {
        Some(limit) if limit <= 0 => {
            return Err(EndpointError::validation("Limit must be positive."));
        }
        Some(limit) => limit,
        None => ctx.document_activity_page_size,
    };

    let decision = resolve(
        store,
        &input.actor,
        &AccessRequest::Document {
            document_id: input.document_id,
            capability: DocumentCapability::View,
            include_deleted: false,
        },
    )
    .await
    .map_err(|e| match e {
        ResolveError::NotFound => EndpointError::operation(DocumentActivityError::NotFound),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        return Err(EndpointError::operation(DocumentActivityError::AccessDenied));
    }

    let entries = activity::document_activity(store, &input.document_id, limit)
        .await
        .map_err(|e| {
            log::error!("Failed to build activity feed for {}: {:?}.", input.document_id, e);
            EndpointError::internal()
        })?;

    Ok(DocumentActivityOutput {
        entries: entries.into_iter().map(ActivityView::from).collect(),
    })
}

impl OperationError for DocumentActivityError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
        }
    }
}
