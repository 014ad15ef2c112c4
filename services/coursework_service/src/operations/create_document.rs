use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve_course_membership, ResolveError};
use crate::access::Actor;
use crate::model::{ActivityAction, DocType, Document, EntityType};
use crate::store::{CoursesRepository, DocumentsRepository, StoreError};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct CreateDocumentInput {
    pub actor: Actor,
    pub title: String,
    pub content: String,

    #[serde(default)]
    pub folder_id: Option<Uuid>,

    /// Attaches the document to a course; requires membership. Absent means a
    /// private document.
    #[serde(default)]
    pub course_id: Option<Uuid>,

    #[serde(default = "default_doc_type")]
    pub doc_type: DocType,
}

fn default_doc_type() -> DocType {
    DocType::Page
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateDocumentOutput {
    pub document: Document,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CreateDocumentError {
    #[error("Course not found.")]
    CourseNotFound,

    #[error("Folder not found.")]
    FolderNotFound,

    #[error("The caller is not a member of the course.")]
    NotCourseMember,
}

pub async fn create_document(
    ctx: &Context,
    store: &(impl CoursesRepository + DocumentsRepository + Sync),
    input: &CreateDocumentInput,
) -> Result<CreateDocumentOutput, EndpointError<CreateDocumentError>> {
    if input.title.trim().is_empty() {
        return Err(EndpointError::validation("Document title must not be empty."));
    }

    // A document can only be filed into a folder of its own author.
    if let Some(folder_id) = &input.folder_id {
        let folder = store.folder(folder_id).await.map_err(|e| match e {
            StoreError::NotFound => EndpointError::operation(CreateDocumentError::FolderNotFound),
            e => {
                log::error!("Failed to load folder {}: {:?}.", folder_id, e);
                EndpointError::internal()
            }
        })?;
        if folder.owner_id != input.actor.account_id {
            return Err(EndpointError::operation(CreateDocumentError::FolderNotFound));
        }
    }

    if let Some(course_id) = &input.course_id {
        let decision = resolve_course_membership(store, &input.actor, course_id)
            .await
            .map_err(|e| match e {
                ResolveError::NotFound => EndpointError::operation(CreateDocumentError::CourseNotFound),
                ResolveError::Datastore(e) => {
                    log::error!("Permission resolution failed: {:?}.", e);
                    EndpointError::internal()
                }
            })?;
        if !decision.allow {
            return Err(EndpointError::operation(CreateDocumentError::NotCourseMember));
        }
    }

    let document = Document::builder()
        .title(input.title.clone())
        .content(input.content.clone())
        .author_id(input.actor.account_id)
        .folder_id(input.folder_id)
        .course_id(input.course_id)
        .doc_type(input.doc_type)
        .build();
    store.insert_document(&document).await.map_err(|e| {
        log::error!("Failed to store document: {:?}.", e);
        EndpointError::internal()
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Create,
            EntityType::Document,
            &document.document_id,
            json!({ "title": document.title, "course_id": document.course_id }),
        )
        .await;

    Ok(CreateDocumentOutput { document })
}

impl OperationError for CreateDocumentError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::CourseNotFound | Self::FolderNotFound => tonic::Code::NotFound,
            Self::NotCourseMember => tonic::Code::PermissionDenied,
        }
    }
}
