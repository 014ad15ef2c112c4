use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::Actor;
use crate::model::{ActivityAction, Comment, EntityType, GlobalRole};
use crate::store::{DocumentsRepository, StoreError};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct ResolveCommentInput {
    pub actor: Actor,
    pub comment_id: Uuid,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResolveCommentOutput {
    pub comment: Comment,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ResolveCommentError {
    #[error("Comment not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,
}

/// Marks a comment as resolved. Only its author or a platform admin may close
/// it; resolving an already-resolved comment is a no-op.
pub async fn resolve_comment(
    ctx: &Context,
    store: &(impl DocumentsRepository + Sync),
    input: &ResolveCommentInput,
) -> Result<ResolveCommentOutput, EndpointError<ResolveCommentError>> {
    let mut comment = store.comment(&input.comment_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(ResolveCommentError::NotFound),
        e => {
            log::error!("Failed to load comment {}: {:?}.", input.comment_id, e);
            EndpointError::internal()
        }
    })?;

    if comment.account_id != input.actor.account_id && input.actor.role != GlobalRole::Admin {
        return Err(EndpointError::operation(ResolveCommentError::AccessDenied));
    }

    if !comment.is_resolved {
        comment.is_resolved = true;
        store.update_comment(&comment).await.map_err(|e| {
            log::error!("Failed to store comment {}: {:?}.", input.comment_id, e);
            EndpointError::internal()
        })?;

        ctx.recorder
            .record(
                &input.actor.account_id,
                ActivityAction::Update,
                EntityType::Comment,
                &comment.comment_id,
                json!({ "resolved": true }),
            )
            .await;
    }

    Ok(ResolveCommentOutput { comment })
}

impl OperationError for ResolveCommentError {
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
    use crate::store::MemoryStore;

    async fn seed(store: &MemoryStore, author: &Actor) -> Uuid {
        let comment = Comment::builder()
            .entity_type(EntityType::Document)
            .entity_id(Uuid::new_v4())
            .account_id(author.account_id)
            .content("is this right?")
            .build();
        let comment_id = comment.comment_id;
        store.put_comment(&comment).await.unwrap();
        comment_id
    }

    #[tokio::test]
    async fn the_author_resolves_their_comment() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let comment_id = seed(&store, &author).await;

        let output = resolve_comment(
            &ctx,
            store.as_ref(),
            &ResolveCommentInput {
                actor: author,
                comment_id,
            },
        )
        .await
        .unwrap();

        assert!(output.comment.is_resolved);
        assert!(store.comment(&comment_id).await.unwrap().is_resolved);
    }

    #[tokio::test]
    async fn resolving_twice_stays_resolved() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let comment_id = seed(&store, &author).await;
        let input = ResolveCommentInput {
            actor: author,
            comment_id,
        };

        resolve_comment(&ctx, store.as_ref(), &input).await.unwrap();
        let again = resolve_comment(&ctx, store.as_ref(), &input).await.unwrap();
        assert!(again.comment.is_resolved);
    }

    #[tokio::test]
    async fn others_cannot_resolve_unless_admin() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let comment_id = seed(&store, &author).await;

        assert!(matches!(
            resolve_comment(
                &ctx,
                store.as_ref(),
                &ResolveCommentInput {
                    actor: Actor::new(Uuid::new_v4(), GlobalRole::Student),
                    comment_id,
                },
            )
            .await,
            Err(EndpointError::Operation(ResolveCommentError::AccessDenied))
        ));

        resolve_comment(
            &ctx,
            store.as_ref(),
            &ResolveCommentInput {
                actor: Actor::new(Uuid::new_v4(), GlobalRole::Admin),
                comment_id,
            },
        )
        .await
        .unwrap();
    }
}
