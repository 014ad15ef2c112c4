use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, DocumentCapability};
use crate::model::{ActivityAction, Document, EntityType};
use crate::store::{CoursesRepository, DocumentsRepository, StoreError, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateDocumentInput {
    pub actor: Actor,
    pub document_id: Uuid,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdateDocumentOutput {
    pub document: Document,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum UpdateDocumentError {
    #[error("Document not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,
}

pub async fn update_document(
    ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &UpdateDocumentInput,
) -> Result<UpdateDocumentOutput, EndpointError<UpdateDocumentError>> {
    if let Some(title) = &input.title {
        if title.trim().is_empty() {
            return Err(EndpointError::validation("Document title must not be empty."));
        }
    }

    let decision = resolve(
        store,
        &input.actor,
        &AccessRequest::Document {
            document_id: input.document_id,
            capability: DocumentCapability::Edit,
            include_deleted: false,
        },
    )
    .await
    .map_err(|e| match e {
        ResolveError::NotFound => EndpointError::operation(UpdateDocumentError::NotFound),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        log::info!(
            "Denied edit of document {} by {} ({:?}).",
            input.document_id,
            input.actor.account_id,
            decision.reason
        );
        return Err(EndpointError::operation(UpdateDocumentError::AccessDenied));
    }

    let mut document = store.document(&input.document_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(UpdateDocumentError::NotFound),
        e => {
            log::error!("Failed to load document {}: {:?}.", input.document_id, e);
            EndpointError::internal()
        }
    })?;

    let mut changed_fields = Vec::new();
    if let Some(title) = &input.title {
        document.title = title.clone();
        changed_fields.push("title");
    }
    if let Some(content) = &input.content {
        document.content = content.clone();
        changed_fields.push("content");
    }
    document.updated_at = Utc::now();

    store.update_document(&document).await.map_err(|e| {
        log::error!("Failed to store document {}: {:?}.", input.document_id, e);
        EndpointError::internal()
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Update,
            EntityType::Document,
            &document.document_id,
            json!({ "fields": changed_fields }),
        )
        .await;

    Ok(UpdateDocumentOutput { document })
}

impl OperationError for UpdateDocumentError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{DocumentPermission, GlobalRole, PermissionLevel};
    use crate::store::MemoryStore;

    fn seed(store: &MemoryStore, author: &Actor) -> Uuid {
        let document = Document::builder()
            .title("Before")
            .content("old")
            .author_id(author.account_id)
            .build();
        let document_id = document.document_id;
        store.put_document(document);
        document_id
    }

    #[tokio::test]
    async fn the_author_edits_title_and_content() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let document_id = seed(&store, &author);

        let output = update_document(
            &ctx,
            store.as_ref(),
            &UpdateDocumentInput {
                actor: author,
                document_id,
                title: Some("After".to_owned()),
                content: Some("new".to_owned()),
            },
        )
        .await
        .unwrap();

        assert_eq!(output.document.title, "After");
        assert_eq!(output.document.content, "new");
        assert!(output.document.updated_at >= output.document.created_at);
    }

    #[tokio::test]
    async fn an_edit_grant_suffices_for_a_non_author() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let editor = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let document_id = seed(&store, &author);

        let input = UpdateDocumentInput {
            actor: editor,
            document_id,
            title: None,
            content: Some("their edit".to_owned()),
        };
        assert!(matches!(
            update_document(&ctx, store.as_ref(), &input).await,
            Err(EndpointError::Operation(UpdateDocumentError::AccessDenied))
        ));

        store
            .put_grant(
                &DocumentPermission::builder()
                    .document_id(document_id)
                    .account_id(Some(editor.account_id))
                    .level(PermissionLevel::Edit)
                    .build(),
            )
            .await
            .unwrap();

        let output = update_document(&ctx, store.as_ref(), &input).await.unwrap();
        assert_eq!(output.document.content, "their edit");
    }

    #[tokio::test]
    async fn blank_titles_fail_validation() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let document_id = seed(&store, &author);

        assert!(matches!(
            update_document(
                &ctx,
                store.as_ref(),
                &UpdateDocumentInput {
                    actor: author,
                    document_id,
                    title: Some("  ".to_owned()),
                    content: None,
                },
            )
            .await,
            Err(EndpointError::Validation(_))
        ));
    }
}
