use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, DocumentCapability};
use crate::model::{ActivityAction, EntityType};
use crate::store::{CoursesRepository, DocumentsRepository, StoreError, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct DeleteDocumentInput {
    pub actor: Actor,
    pub document_id: Uuid,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DeleteDocumentError {
    /// Also returned for a document that is already soft-deleted; deleting
    /// twice looks like deleting something that was never there.
    #[error("Document not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,
}

/// Soft delete: the row stays for audit and author recovery, every read path
/// masks it as absent.
pub async fn delete_document(
    ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &DeleteDocumentInput,
) -> Result<(), EndpointError<DeleteDocumentError>> {
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
        ResolveError::NotFound => EndpointError::operation(DeleteDocumentError::NotFound),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        log::info!(
            "Denied deletion of document {} by {} ({:?}).",
            input.document_id,
            input.actor.account_id,
            decision.reason
        );
        return Err(EndpointError::operation(DeleteDocumentError::AccessDenied));
    }

    let mut document = store.document(&input.document_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(DeleteDocumentError::NotFound),
        e => {
            log::error!("Failed to load document {}: {:?}.", input.document_id, e);
            EndpointError::internal()
        }
    })?;

    document.is_deleted = true;
    document.updated_at = Utc::now();
    store.update_document(&document).await.map_err(|e| {
        log::error!("Failed to store document {}: {:?}.", input.document_id, e);
        EndpointError::internal()
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Delete,
            EntityType::Document,
            &input.document_id,
            Value::Null,
        )
        .await;

    Ok(())
}

impl OperationError for DeleteDocumentError {
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
    use crate::model::{Document, GlobalRole};
    use crate::store::MemoryStore;

    fn seed(store: &MemoryStore, author: &Actor) -> Uuid {
        let document = Document::builder()
            .title("Notes")
            .content("...")
            .author_id(author.account_id)
            .build();
        let document_id = document.document_id;
        store.put_document(document);
        document_id
    }

    #[tokio::test]
    async fn the_author_soft_deletes_and_a_second_delete_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let document_id = seed(&store, &author);

        let input = DeleteDocumentInput {
            actor: author,
            document_id,
        };
        delete_document(&ctx, store.as_ref(), &input).await.unwrap();

        // Row survives, flagged.
        assert!(store.document(&document_id).await.unwrap().is_deleted);

        assert!(matches!(
            delete_document(&ctx, store.as_ref(), &input).await,
            Err(EndpointError::Operation(DeleteDocumentError::NotFound))
        ));
    }

    #[tokio::test]
    async fn a_platform_admin_may_delete_any_document() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let document_id = seed(&store, &author);

        delete_document(
            &ctx,
            store.as_ref(),
            &DeleteDocumentInput {
                actor: Actor::new(Uuid::new_v4(), GlobalRole::Admin),
                document_id,
            },
        )
        .await
        .unwrap();

        assert!(store.document(&document_id).await.unwrap().is_deleted);
    }

    #[tokio::test]
    async fn strangers_are_denied() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let document_id = seed(&store, &author);

        assert!(matches!(
            delete_document(
                &ctx,
                store.as_ref(),
                &DeleteDocumentInput {
                    actor: Actor::new(Uuid::new_v4(), GlobalRole::Student),
                    document_id,
                },
            )
            .await,
            Err(EndpointError::Operation(DeleteDocumentError::AccessDenied))
        ));
    }
}
