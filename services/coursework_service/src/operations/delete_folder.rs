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
pub struct DeleteFolderInput {
    pub actor: Actor,
    pub folder_id: Uuid,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DeleteFolderError {
    #[error("Folder not found.")]
    NotFound,

    #[error("Access denied.")]
    AccessDenied,

    #[error("The folder still contains folders or documents.")]
    NotEmpty,
}

/// Deletes an empty folder. Soft-deleted documents filed inside do not count
/// as contents.
pub async fn delete_folder(
    ctx: &Context,
    store: &(impl DocumentsRepository + Sync),
    input: &DeleteFolderInput,
) -> Result<(), EndpointError<DeleteFolderError>> {
    let folder = store.folder(&input.folder_id).await.map_err(|e| match e {
        StoreError::NotFound => EndpointError::operation(DeleteFolderError::NotFound),
        e => {
            log::error!("Failed to load folder {}: {:?}.", input.folder_id, e);
            EndpointError::internal()
        }
    })?;

    if folder.owner_id != input.actor.account_id && input.actor.role != GlobalRole::Admin {
        return Err(EndpointError::operation(DeleteFolderError::AccessDenied));
    }

    let child_folders = store.child_folder_count(&input.folder_id).await.map_err(|e| {
        log::error!("Failed to count children of {}: {:?}.", input.folder_id, e);
        EndpointError::internal()
    })?;
    let live_documents = store
        .live_document_count_in_folder(&input.folder_id)
        .await
        .map_err(|e| {
            log::error!("Failed to count documents in {}: {:?}.", input.folder_id, e);
            EndpointError::internal()
        })?;
    if child_folders > 0 || live_documents > 0 {
        return Err(EndpointError::operation(DeleteFolderError::NotEmpty));
    }

    store.delete_folder(&input.folder_id).await.map_err(|e| {
        log::error!("Failed to delete folder {}: {:?}.", input.folder_id, e);
        EndpointError::internal()
    })?;

    ctx.recorder
        .record(
            &input.actor.account_id,
            ActivityAction::Delete,
            EntityType::Folder,
            &input.folder_id,
            json!({ "name": folder.name }),
        )
        .await;

    Ok(())
}

impl OperationError for DeleteFolderError {
    fn code(&self) -> tonic::Code {
        match self {
            Self::NotFound => tonic::Code::NotFound,
            Self::AccessDenied => tonic::Code::PermissionDenied,
            Self::NotEmpty => tonic::Code::FailedPrecondition,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{Document, Folder};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        ctx: Context,
        owner: Actor,
        folder_id: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let owner = Actor::new(Uuid::new_v4(), GlobalRole::Student);

        let folder = Folder::builder().name("scratch").owner_id(owner.account_id).build();
        let folder_id = folder.folder_id;
        store.put_folder(folder);

        Fixture {
            store,
            ctx,
            owner,
            folder_id,
        }
    }

    fn input(fx: &Fixture) -> DeleteFolderInput {
        DeleteFolderInput {
            actor: fx.owner,
            folder_id: fx.folder_id,
        }
    }

    #[tokio::test]
    async fn an_empty_folder_is_deleted() {
        let fx = fixture();

        delete_folder(&fx.ctx, fx.store.as_ref(), &input(&fx)).await.unwrap();

        assert!(matches!(fx.store.folder(&fx.folder_id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn child_folders_block_deletion() {
        let fx = fixture();
        fx.store.put_folder(
            Folder::builder()
                .name("inner")
                .owner_id(fx.owner.account_id)
                .parent_id(Some(fx.folder_id))
                .build(),
        );

        assert!(matches!(
            delete_folder(&fx.ctx, fx.store.as_ref(), &input(&fx)).await,
            Err(EndpointError::Operation(DeleteFolderError::NotEmpty))
        ));
    }

    #[tokio::test]
    async fn live_documents_block_deletion_but_deleted_ones_do_not() {
        let fx = fixture();
        let document = Document::builder()
            .title("draft")
            .content("...")
            .author_id(fx.owner.account_id)
            .folder_id(Some(fx.folder_id))
            .build();
        let document_id = document.document_id;
        fx.store.put_document(document);

        assert!(matches!(
            delete_folder(&fx.ctx, fx.store.as_ref(), &input(&fx)).await,
            Err(EndpointError::Operation(DeleteFolderError::NotEmpty))
        ));

        let mut deleted = fx.store.document(&document_id).await.unwrap();
        deleted.is_deleted = true;
        fx.store.update_document(&deleted).await.unwrap();

        delete_folder(&fx.ctx, fx.store.as_ref(), &input(&fx)).await.unwrap();
    }

    #[tokio::test]
    async fn only_the_owner_or_an_admin_may_delete() {
        let fx = fixture();

        assert!(matches!(
            delete_folder(
                &fx.ctx,
                fx.store.as_ref(),
                &DeleteFolderInput {
                    actor: Actor::new(Uuid::new_v4(), GlobalRole::Student),
                    folder_id: fx.folder_id,
                },
            )
            .await,
            Err(EndpointError::Operation(DeleteFolderError::AccessDenied))
        ));
    }
}
