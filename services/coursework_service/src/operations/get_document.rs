use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, DocumentCapability};
use crate::model::{Document, EntityType};
use crate::store::{CoursesRepository, DocumentsRepository, StoreError, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct GetDocumentInput {
    pub actor: Actor,
    pub document_id: Uuid,

    /// Author-only: return the document even if soft-deleted.
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GetDocumentOutput {
    pub document: Document,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GetDocumentError {
    /// Covers both genuinely absent and soft-deleted documents; the two are
    /// indistinguishable to the caller.
    #[error("Document not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,
}

pub async fn get_document(
    ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &GetDocumentInput,
) -> Result<GetDocumentOutput, EndpointError<GetDocumentError>> {
    let decision = resolve(
        store,
        &input.actor,
        &AccessRequest::Document {
            document_id: input.document_id,
            capability: DocumentCapability::View,
            include_deleted: input.include_deleted,
        },
    )
    .await
    .map_err(|e| match e {
        ResolveError::NotFound => EndpointError::operation(GetDocumentError::NotFound),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        log::info!(
            "Denied view of document {} by {} ({:?}).",
            input.document_id,
            input.actor.account_id,
            decision.reason
        );
        return Err(EndpointError::operation(GetDocumentError::AccessDenied));
    }

    let document = store.document(&input.document_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(GetDocumentError::NotFound),
        e => {
            log::error!("Failed to load document {}: {:?}.", input.document_id, e);
            EndpointError::internal()
        }
    })?;

    if !document.is_deleted {
        // Counted store-side; a lost bump is not worth failing the read over.
        if let Err(e) = store.bump_view_count(&input.document_id).await {
            log::warn!("View count bump failed for {}: {:?}.", input.document_id, e);
        }
        ctx.recorder
            .record_view(&input.actor.account_id, EntityType::Document, &input.document_id, Value::Null);
    }

    Ok(GetDocumentOutput { document })
}

impl OperationError for GetDocumentError {
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
    use crate::model::GlobalRole;
    use crate::store::ActivityRepository as _;
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        ctx: Context,
        author: Actor,
        document_id: Uuid,
    }

    fn fixture(deleted: bool) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);

        let document = Document::builder()
            .title("Notes")
            .content("...")
            .author_id(author.account_id)
            .is_deleted(deleted)
            .build();
        let document_id = document.document_id;
        store.put_document(document);

        Fixture {
            store,
            ctx,
            author,
            document_id,
        }
    }

    #[tokio::test]
    async fn a_view_bumps_the_counter_and_lands_in_the_audit_feed() {
        let fx = fixture(false);

        get_document(
            &fx.ctx,
            fx.store.as_ref(),
            &GetDocumentInput {
                actor: fx.author,
                document_id: fx.document_id,
                include_deleted: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(fx.store.document(&fx.document_id).await.unwrap().view_count, 1);

        // The view entry is appended off the request path.
        for _ in 0..100 {
            tokio::task::yield_now().await;
            let entries = fx
                .store
                .entries_for_entity(EntityType::Document, &fx.document_id, 10)
                .await
                .unwrap();
            if !entries.is_empty() {
                return;
            }
        }
        panic!("view entry never landed");
    }

    #[tokio::test]
    async fn deleted_documents_are_masked_as_absent() {
        let fx = fixture(true);
        let stranger = Actor::new(Uuid::new_v4(), GlobalRole::Student);

        assert!(matches!(
            get_document(
                &fx.ctx,
                fx.store.as_ref(),
                &GetDocumentInput {
                    actor: stranger,
                    document_id: fx.document_id,
                    include_deleted: false,
                },
            )
            .await,
            Err(EndpointError::Operation(GetDocumentError::NotFound))
        ));
    }

    #[tokio::test]
    async fn the_author_may_read_their_deleted_document_on_request() {
        let fx = fixture(true);

        let output = get_document(
            &fx.ctx,
            fx.store.as_ref(),
            &GetDocumentInput {
                actor: fx.author,
                document_id: fx.document_id,
                include_deleted: true,
            },
        )
        .await
        .unwrap();

        assert!(output.document.is_deleted);
        // No counter bump for a deleted read.
        assert_eq!(fx.store.document(&fx.document_id).await.unwrap().view_count, 0);
    }

    #[tokio::test]
    async fn strangers_are_denied_but_told_nothing_more() {
        let fx = fixture(false);
        let stranger = Actor::new(Uuid::new_v4(), GlobalRole::Student);

        assert!(matches!(
            get_document(
                &fx.ctx,
                fx.store.as_ref(),
                &GetDocumentInput {
                    actor: stranger,
                    document_id: fx.document_id,
                    include_deleted: false,
                },
            )
            .await,
            Err(EndpointError::Operation(GetDocumentError::AccessDenied))
        ));
    }
}
