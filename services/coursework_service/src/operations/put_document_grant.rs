use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, DocumentCapability};
use crate::model::{ActivityAction, DocumentPermission, EntityType, PermissionLevel};
use crate::store::{CoursesRepository, DocumentsRepository, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct PutDocumentGrantInput {
    pub actor: Actor,
    pub document_id: Uuid,

    /// Exactly one of `account_id` and `course_id` names the grantee.
    #[serde(default)]
    pub account_id: Option<Uuid>,

    #[serde(default)]
    pub course_id: Option<Uuid>,

    pub level: PermissionLevel,
}

#[derive(Clone, Debug, Serialize)]
pub struct PutDocumentGrantOutput {
    pub grant: DocumentPermission,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PutDocumentGrantError {
    #[error("Document not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,
}

/// Attaches an explicit permission grant to a document. Only holders of the
/// document's admin capability may share it.
pub async fn put_document_grant(
    ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &PutDocumentGrantInput,
) -> Result<PutDocumentGrantOutput, EndpointError<PutDocumentGrantError>> {
    if input.account_id.is_some() == input.course_id.is_some() {
        return Err(EndpointError::validation(
            "Exactly one of account_id and course_id must be set.",
        ));
    }

    let decision = resolve(
        store,
        &input.actor,
        &AccessRequest::Document {
            document_id: input.document_id,
            capability: DocumentCapability::Admin,
            include_deleted: false,
        },
    )
    .await
    .map_err(|e| match e {
        ResolveError::NotFound => EndpointError::operation(PutDocumentGrantError::NotFound),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        log::info!(
            "Denied sharing of document {} by {} ({:?}).",
            input.document_id,
            input.actor.account_id,
            decision.reason
        );
        return Err(EndpointError::operation(PutDocumentGrantError::AccessDenied));
    }

    let grant = DocumentPermission::builder()
        .document_id(input.document_id)
        .account_id(input.account_id)
        .course_id(input.course_id)
        .level(input.level)
        .build();
    store.put_grant(&grant).await.map_err(|e| {
        log::error!("Failed to store grant on {}: {:?}.", input.document_id, e);
        EndpointError::internal()
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Update,
            EntityType::Document,
            &input.document_id,
            json!({
                "grant_account_id": input.account_id,
                "grant_course_id": input.course_id,
                "level": input.level,
            }),
        )
        .await;

    Ok(PutDocumentGrantOutput { grant })
}

impl OperationError for PutDocumentGrantError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
        }
    }
}
