use std::collections::{HashMap, HashSet, VecDeque};

use serde::Deserialize;
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::Actor;
use crate::model::{ActivityAction, EntityType, GlobalRole};
use crate::store::{DocumentsRepository, StoreError};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct DeleteCommentInput {
    pub actor: Actor,
    pub comment_id: Uuid,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DeleteCommentError {
    #[error("Comment not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,
}

/// Deletes a comment along with every reply under it, however deep, so no
/// thread is left dangling from a removed parent.
pub async fn delete_comment(
    ctx: &Context,
    store: &(impl DocumentsRepository + Sync),
    input: &DeleteCommentInput,
) -> Result<(), EndpointError<DeleteCommentError>> {
    let comment = store.comment(&input.comment_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(DeleteCommentError::NotFound),
        e => {
            log::error!("Failed to load comment {}: {:?}.", input.comment_id, e);
            EndpointError::internal()
        }
    })?;

    if comment.account_id != input.actor.account_id && input.actor.role != GlobalRole::Admin {
        return Err(EndpointError::operation(DeleteCommentError::AccessDenied));
    }

    // One listing of the entity's comments yields the whole subtree.
    let siblings = store
        .comments_for_entity(comment.entity_type, &comment.entity_id)
        .await
        .map_err(|e| {
            log::error!("Failed to list comments on {}: {:?}.", comment.entity_id, e);
            EndpointError::internal()
        })?;

    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for sibling in &siblings {
        if let Some(parent_id) = sibling.parent_id {
            children.entry(parent_id).or_default().push(sibling.comment_id);
        }
    }

    let mut subtree = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([input.comment_id]);
    while let Some(comment_id) = queue.pop_front() {
        if !seen.insert(comment_id) {
            continue;
        }
        subtree.push(comment_id);
        if let Some(replies) = children.get(&comment_id) {
            queue.extend(replies.iter().copied());
        }
    }

    store.delete_comments(&subtree).await.map_err(|e| {
        log::error!("Failed to delete comment subtree of {}: {:?}.", input.comment_id, e);
        EndpointError::internal()
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Delete,
            EntityType::Comment,
            &input.comment_id,
            json!({ "deleted_count": subtree.len() }),
        )
        .await;

    Ok(())
}

impl OperationError for DeleteCommentError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
        }
    }
}
