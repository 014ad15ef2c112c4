use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use thiserror::Error;
use uuid::Uuid;

use crate::access::Actor;
use crate::model::{ActivityAction, EntityType, Folder};
use crate::store::{DocumentsRepository, StoreError};
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct CreateFolderInput {
    pub actor: Actor,
    pub name: String,

    #[serde(default)]
    pub parent_id: Option<Uuid>,

    #[serde(default)]
    pub course_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateFolderOutput {
    pub folder: Folder,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CreateFolderError {
    #[error("Parent folder not found.")]
    ParentNotFound,
}

/// Creates a folder under the actor's own hierarchy. A parent belonging to
/// another account is indistinguishable from a missing one.
pub async fn create_folder(
    ctx: &Context,
    store: &(impl DocumentsRepository + Sync),
    input: &CreateFolderInput,
) -> Result<CreateFolderOutput, EndpointError<CreateFolderError>> {
    if input.name.trim().is_empty() {
        return Err(EndpointError::validation("Folder name must not be empty."));
    }

    if let Some(parent_id) = &input.parent_id {
        let parent = store.folder(parent_id).await.map_err(|e| match e {
            StoreError::NotFound => EndpointError::operation(CreateFolderError::ParentNotFound),
            e => {
                log::error!("Failed to load folder {}: {:?}.", parent_id, e);
                EndpointError::internal()
            }
        })?;
        if parent.owner_id != input.actor.account_id {
            return Err(EndpointError::operation(CreateFolderError::ParentNotFound));
        }
    }

    let folder = Folder::builder()
        .name(input.name.clone())
        .owner_id(input.actor.account_id)
        .parent_id(input.parent_id)
        .course_id(input.course_id)
        .build();
    store.insert_folder(&folder).await.map_err(|e| {
        log::error!("Failed to store folder: {:?}.", e);
        EndpointError::internal()
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Create,
            EntityType::Folder,
            &folder.folder_id,
            json!({ "name": folder.name, "parent_id": folder.parent_id }),
        )
        .await;

    Ok(CreateFolderOutput { folder })
}

impl OperationError for CreateFolderError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::ParentNotFound => tonic::Code::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::GlobalRole;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn a_nested_folder_is_created_under_its_parent() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let owner = Actor::new(Uuid::new_v4(), GlobalRole::Student);

        let root = create_folder(
            &ctx,
            store.as_ref(),
            &CreateFolderInput {
                actor: owner,
                name: "courses".to_owned(),
                parent_id: None,
                course_id: None,
            },
        )
        .await
        .unwrap();

        let child = create_folder(
            &ctx,
            store.as_ref(),
            &CreateFolderInput {
                actor: owner,
                name: "week-1".to_owned(),
                parent_id: Some(root.folder.folder_id),
                course_id: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(child.folder.parent_id, Some(root.folder.folder_id));
        assert_eq!(child.folder.owner_id, owner.account_id);
    }

    #[tokio::test]
    async fn a_foreign_parent_is_masked_as_absent() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let owner = Actor::new(Uuid::new_v4(), GlobalRole::Student);

        let foreign = Folder::builder().name("theirs").owner_id(Uuid::new_v4()).build();
        let foreign_id = foreign.folder_id;
        store.put_folder(foreign);

        assert!(matches!(
            create_folder(
                &ctx,
                store.as_ref(),
                &CreateFolderInput {
                    actor: owner,
                    name: "sneaky".to_owned(),
                    parent_id: Some(foreign_id),
                    course_id: None,
                },
            )
            .await,
            Err(EndpointError::Operation(CreateFolderError::ParentNotFound))
        ));
    }

    #[tokio::test]
    async fn blank_names_fail_validation() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());

        assert!(matches!(
            create_folder(
                &ctx,
                store.as_ref(),
                &CreateFolderInput {
                    actor: Actor::new(Uuid::new_v4(), GlobalRole::Student),
                    name: " ".to_owned(),
                    parent_id: None,
                    course_id: None,
                },
            )
            .await,
            Err(EndpointError::Validation(_))
        ));
    }
}
