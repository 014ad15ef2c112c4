use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use service_core::tree::{build_forest, OrphanPolicy, TreeNode};
use thiserror::Error;
use uuid::Uuid;

use crate::access::{Actor, DocumentCapability};
use crate::model::{Comment, EntityType};
use crate::operations::create_comment::{check_comment_capability, CommentCapabilityError};
use crate::store::{CoursesRepository, DocumentsRepository, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct ListCommentsInput {
    pub actor: Actor,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentNode {
    pub comment_id: Uuid,
    pub account_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub replies: Vec<CommentNode>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ListCommentsOutput {
    pub threads: Vec<CommentNode>,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ListCommentsError {
    #[error("Entity not found.")]
    EntityNotFound,

    #[error("Access denied.")]
    AccessDenied,
}

/// Returns the comment threads of one entity, oldest-first at every level.
/// A reply whose parent was removed out from under it is dropped rather than
/// surfaced detached.
pub async fn list_comments(
    _ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &ListCommentsInput,
) -> Result<ListCommentsOutput, EndpointError<ListCommentsError>> {
    if !input.entity_type.supports_comments() {
        return Err(EndpointError::validation(format!(
            "Comments are not supported on {} entities.",
            input.entity_type
        )));
    }

    check_comment_capability(
        store,
        &input.actor,
        input.entity_type,
        &input.entity_id,
        DocumentCapability::View,
    )
    .await?;

    let comments = store
        .comments_for_entity(input.entity_type, &input.entity_id)
        .await
        .map_err(|e| {
            log::error!("Failed to list comments on {}: {:?}.", input.entity_id, e);
            EndpointError::internal()
        })?;

    let forest = build_forest(comments, OrphanPolicy::Drop).map_err(|e| {
        log::error!("Comment thread on {} is corrupt: {}.", input.entity_id, e);
        EndpointError::internal()
    })?;

    Ok(ListCommentsOutput {
        threads: forest.into_iter().map(to_wire).collect(),
    })
}

fn to_wire(node: TreeNode<Comment>) -> CommentNode {
    CommentNode {
        comment_id: node.row.comment_id,
        account_id: node.row.account_id,
        parent_id: node.row.parent_id,
        content: node.row.content,
        is_resolved: node.row.is_resolved,
        created_at: node.row.created_at,
        replies: node.children.into_iter().map(to_wire).collect(),
    }
}

impl From<CommentCapabilityError> for ListCommentsError {
    fn from(err: CommentCapabilityError) -> Self {
        match err {
            CommentCapabilityError::EntityNotFound => ListCommentsError::EntityNotFound,
            CommentCapabilityError::AccessDenied => ListCommentsError::AccessDenied,
        }
    }
}

impl OperationError for ListCommentsError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::EntityNotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
        }
    }
}
