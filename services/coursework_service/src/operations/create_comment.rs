use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::resolver::{resolve, resolve_course_membership, ResolveError};
use crate::access::{AccessRequest, Actor, DocumentCapability, SubmissionCapability};
use crate::model::{ActivityAction, Comment, EntityType};
use crate::store::{CoursesRepository, DocumentsRepository, StoreError, SubmissionsRepository};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct CreateCommentInput {
    pub actor: Actor,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub content: String,

    /// Reply threading; the parent must hang off the same entity.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateCommentOutput {
    pub comment: Comment,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CreateCommentError {
    #[error("Entity not found.")]
    EntityNotFound,

    #[error("Parent comment not found.")]
    ParentNotFound,

    #[error("Access denied.")]
    AccessDenied,
}

/// Adds a comment to a document, task or submission.
///
/// Who may comment follows the entity: documents need the comment capability,
/// tasks need course membership, submissions admit their owner plus anyone who
/// could grade them.
pub async fn create_comment(
    ctx: &Context,
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    input: &CreateCommentInput,
) -> Result<CreateCommentOutput, EndpointError<CreateCommentError>> {
    if !input.entity_type.supports_comments() {
        return Err(EndpointError::validation(format!(
            "Comments are not supported on {} entities.",
            input.entity_type
        )));
    }
    if input.content.trim().is_empty() {
        return Err(EndpointError::validation("Comment content must not be empty."));
    }

    check_comment_capability(
        store,
        &input.actor,
        input.entity_type,
        &input.entity_id,
        DocumentCapability::Comment,
    )
    .await?;

    if let Some(parent_id) = &input.parent_id {
        let parent = store.comment(parent_id).await.map_err(|e| match e {
            StoreError::NotFound => EndpointError::operation(CreateCommentError::ParentNotFound),
            e => {
                log::error!("Failed to load comment {}: {:?}.", parent_id, e);
                EndpointError::internal()
            }
        })?;
        if parent.entity_type != input.entity_type || parent.entity_id != input.entity_id {
            return Err(EndpointError::operation(CreateCommentError::ParentNotFound));
        }
    }

    let comment = Comment::builder()
        .entity_type(input.entity_type)
        .entity_id(input.entity_id)
        .account_id(input.actor.account_id)
        .parent_id(input.parent_id)
        .content(input.content.clone())
        .build();
    store.put_comment(&comment).await.map_err(|e| {
        log::error!("Failed to store comment: {:?}.", e);
        EndpointError::internal()
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Create,
            EntityType::Comment,
            &comment.comment_id,
            json!({ "entity_type": input.entity_type, "entity_id": input.entity_id }),
        )
        .await;

    Ok(CreateCommentOutput { comment })
}

/// Shared with listing: commenting and reading a thread take the same
/// entity-level check, except documents, where the caller names the capability
/// (comment to write, view to read).
pub(super) async fn check_comment_capability<E>(
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    actor: &Actor,
    entity_type: EntityType,
    entity_id: &Uuid,
    document_capability: DocumentCapability,
) -> Result<(), EndpointError<E>>
where
    E: OperationError + From<CommentCapabilityError>,
{
    let decision = match entity_type {
        EntityType::Document => resolve(
            store,
            actor,
            &AccessRequest::Document {
                document_id: *entity_id,
                capability: document_capability,
                include_deleted: false,
            },
        )
        .await,
        EntityType::Task => {
            let course_id = course_of_task(store, entity_id).await?;
            resolve_course_membership(store, actor, &course_id).await
        }
        EntityType::Submission => {
            match store.submission(entity_id).await {
                Ok(submission) if submission.account_id == actor.account_id => return Ok(()),
                Ok(_) => {
                    resolve(
                        store,
                        actor,
                        &AccessRequest::Submission {
                            submission_id: *entity_id,
                            capability: SubmissionCapability::Grade,
                        },
                    )
                    .await
                }
                Err(StoreError::NotFound) => Err(ResolveError::NotFound),
                Err(StoreError::Other(e)) => Err(ResolveError::Datastore(e)),
            }
        }
        _ => return Err(CommentCapabilityError::EntityNotFound.into_endpoint()),
    };

    let decision = decision.map_err(|e| match e {
        ResolveError::NotFound => CommentCapabilityError::EntityNotFound.into_endpoint(),
        ResolveError::Datastore(e) => {
            log::error!("Permission resolution failed: {:?}.", e);
            EndpointError::internal()
        }
    })?;
    if !decision.allow {
        return Err(CommentCapabilityError::AccessDenied.into_endpoint());
    }
    Ok(())
}

async fn course_of_task<E>(
    store: &(impl CoursesRepository + SubmissionsRepository + Sync),
    task_id: &Uuid,
) -> Result<Uuid, EndpointError<E>>
where
    E: OperationError + From<CommentCapabilityError>,
{
    let lookup = async {
        let task = store.task(task_id).await?;
        let project = store.project(&task.project_id).await?;
        Ok::<Uuid, StoreError>(project.course_id)
    };
    lookup.await.map_err(|e| match e {
        StoreError::NotFound => CommentCapabilityError::EntityNotFound.into_endpoint(),
        e => {
            log::error!("Failed to walk task {} to its course: {:?}.", task_id, e);
            EndpointError::internal()
        }
    })
}

/// Capability failures shared between the comment operations; each operation
/// folds them into its own error enum.
#[derive(Clone, Copy, Debug)]
pub(super) enum CommentCapabilityError {
    EntityNotFound,
    AccessDenied,
}

impl CommentCapabilityError {
    fn into_endpoint<E>(self) -> EndpointError<E>
    where
        E: OperationError + From<CommentCapabilityError>,
    {
        EndpointError::operation(self.into())
    }
}

impl From<CommentCapabilityError> for CreateCommentError {
    fn from(err: CommentCapabilityError) -> Self {
        match err {
            CommentCapabilityError::EntityNotFound => CreateCommentError::EntityNotFound,
            CommentCapabilityError::AccessDenied => CreateCommentError::AccessDenied,
        }
    }
}

impl OperationError for CreateCommentError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::EntityNotFound | Self::ParentNotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
        }
    }
}
