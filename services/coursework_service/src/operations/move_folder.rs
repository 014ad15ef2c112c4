use std::collections::HashSet;

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
pub struct MoveFolderInput {
    pub actor: Actor,
    pub folder_id: Uuid,

    /// `None` re-roots the folder at the top level.
    pub new_parent_id: Option<Uuid>,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MoveFolderError {
    #[error("Folder not found.")]
    NotFound,

    #[error("Parent folder not found.")]
    ParentNotFound,

    #[error("Access denied.")]
    AccessDenied,

    #[error("The move would make the folder an ancestor of itself.")]
    WouldCreateCycle,
}

/// Re-parents a folder. The new parent's ancestor chain is walked before the
/// write; finding the moved folder on it (itself included) rejects the move,
/// so the parent-pointer graph stays a forest.
pub async fn move_folder(
    ctx: &Context,
    store: &(impl DocumentsRepository + Sync),
    input: &MoveFolderInput,
) -> Result<(), EndpointError<MoveFolderError>> {
    let folder = store.folder(&input.folder_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(MoveFolderError::NotFound),
        e => {
            log::error!("Failed to load folder {}: {:?}.", input.folder_id, e);
            EndpointError::internal()
        }
    })?;

    if folder.owner_id != input.actor.account_id && input.actor.role != GlobalRole::Admin {
        return Err(EndpointError::operation(MoveFolderError::AccessDenied));
    }

    if let Some(new_parent_id) = &input.new_parent_id {
        let mut visited = HashSet::from([input.folder_id]);
        let mut cursor = Some(*new_parent_id);
        while let Some(ancestor_id) = cursor {
            if !visited.insert(ancestor_id) {
                return Err(EndpointError::operation(MoveFolderError::WouldCreateCycle));
            }
            let ancestor = store.folder(&ancestor_id).await.map_err(|e| match e {
                StoreError::NotFound => EndpointError::operation(MoveFolderError::ParentNotFound),
                e => {
                    log::error!("Failed to load folder {}: {:?}.", ancestor_id, e);
                    EndpointError::internal()
                }
            })?;
            if ancestor.owner_id != folder.owner_id {
                return Err(EndpointError::operation(MoveFolderError::ParentNotFound));
            }
            cursor = ancestor.parent_id;
        }
    }

    store
        .update_folder_parent(&input.folder_id, input.new_parent_id)
        .await
        .map_err(|e| {
            log::error!("Failed to re-parent folder {}: {:?}.", input.folder_id, e);
            EndpointError::internal()
        })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Update,
            EntityType::Folder,
            &input.folder_id,
            json!({ "from": folder.parent_id, "to": input.new_parent_id }),
        )
        .await;

    Ok(())
}

impl OperationError for MoveFolderError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound | Self::ParentNotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
            Self::WouldCreateCycle => tonic::Code::FailedPrecondition,
        }
    }
}
