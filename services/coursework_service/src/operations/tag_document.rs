use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve, ResolveError};
use crate::access::{AccessRequest, Actor, DocumentCapability};
use crate::model::{ActivityAction, EntityType, Tag};
use crate::store::{CoursesRepository, DocumentsRepository, LinkTagError, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct TagDocumentInput {
    pub actor: Actor,
    pub document_id: Uuid,
    pub tag_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TagDocumentOutput {
    pub tag: Tag,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TagDocumentError {
    #[error("Document not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,

    #[error("The tag is already attached to this document.")]
    AlreadyTagged,
}

/// Attaches a tag by name, minting the tag on first use anywhere on the
/// platform.
pub async fn tag_document(
    ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &TagDocumentInput,
) -> Result<TagDocumentOutput, EndpointError<TagDocumentError>> {
    let tag_name = input.tag_name.trim();
    if tag_name.is_empty() {
        return Err(EndpointError::validation("Tag name must not be empty."));
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
        ResolveError::NotFound => EndpointError::operation(TagDocumentError::NotFound),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        return Err(EndpointError::operation(TagDocumentError::AccessDenied));
    }

    let tag = store.ensure_tag(tag_name).await.map_err(|e| {
        log::error!("Failed to resolve tag {:?}: {:?}.", tag_name, e);
        EndpointError::internal()
    })?;

    store
        .link_tag(&input.document_id, &tag.tag_id)
        .await
        .map_err(|e| match e {
            LinkTagError::DuplicateLink => EndpointError::operation(TagDocumentError::AlreadyTagged),
            LinkTagError::Other(e) => {
                log::error!("Failed to link tag {} to {}: {:?}.", tag.tag_id, input.document_id, e);
                EndpointError::internal()
            }
        })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Update,
            EntityType::Document,
            &input.document_id,
            json!({ "tag": tag.name }),
        )
        .await;

    Ok(TagDocumentOutput { tag })
}

impl OperationError for TagDocumentError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
            Self::AlreadyTagged => tonic::Code::AlreadyExists,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{Document, GlobalRole};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        ctx: Context,
        author: Actor,
        document_id: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);

        let document = Document::builder()
            .title("Notes")
            .content("...")
            .author_id(author.account_id)
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
    async fn tag_names_are_shared_across_documents() {
        let fx = fixture();
        let second = Document::builder()
            .title("More notes")
            .content("...")
            .author_id(fx.author.account_id)
            .build();
        let second_id = second.document_id;
        fx.store.put_document(second);

        let first = tag_document(
            &fx.ctx,
            fx.store.as_ref(),
            &TagDocumentInput {
                actor: fx.author,
                document_id: fx.document_id,
                tag_name: "rust".to_owned(),
            },
        )
        .await
        .unwrap();
        let reused = tag_document(
            &fx.ctx,
            fx.store.as_ref(),
            &TagDocumentInput {
                actor: fx.author,
                document_id: second_id,
                tag_name: "rust".to_owned(),
            },
        )
        .await
        .unwrap();

        assert_eq!(first.tag.tag_id, reused.tag.tag_id);
    }

    #[tokio::test]
    async fn tagging_twice_is_already_tagged() {
        let fx = fixture();
        let input = TagDocumentInput {
            actor: fx.author,
            document_id: fx.document_id,
            tag_name: "exam".to_owned(),
        };

        tag_document(&fx.ctx, fx.store.as_ref(), &input).await.unwrap();
        assert!(matches!(
            tag_document(&fx.ctx, fx.store.as_ref(), &input).await,
            Err(EndpointError::Operation(TagDocumentError::AlreadyTagged))
        ));
    }

    #[tokio::test]
    async fn tagging_requires_the_edit_capability() {
        let fx = fixture();

        assert!(matches!(
            tag_document(
                &fx.ctx,
                fx.store.as_ref(),
                &TagDocumentInput {
                    actor: Actor::new(Uuid::new_v4(), GlobalRole::Student),
                    document_id: fx.document_id,
                    tag_name: "exam".to_owned(),
                },
            )
            .await,
            Err(EndpointError::Operation(TagDocumentError::AccessDenied))
        ));
    }
}
