use serde::{Deserialize, Serialize};
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::OperationError;
use service_core::tree::{build_forest, OrphanPolicy, TreeNode};
use thiserror::Error;
use uuid::Uuid;

use crate::access::Actor;
use crate::model::Folder;
use crate::store::DocumentsRepository;
use crate::Context;

#[derive(Clone, Debug, Deserialize)]
pub struct GetFolderTreeInput {
    pub actor: Actor,

    /// Narrows the tree to folders filed under one course.
    #[serde(default)]
    pub course_id: Option<Uuid>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FolderNode {
    pub folder_id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub children: Vec<FolderNode>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GetFolderTreeOutput {
    pub roots: Vec<FolderNode>,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GetFolderTreeError {}

/// Returns the actor's own folders as a forest. Sibling order follows the
/// store's name ordering; a folder whose parent fell outside the requested
/// scope is promoted to a root rather than dropped.
pub async fn get_folder_tree(
    _ctx: &Context,
    store: &(impl DocumentsRepository + Sync),
    input: &GetFolderTreeInput,
) -> Result<GetFolderTreeOutput, EndpointError<GetFolderTreeError>> {
    let folders = store
        .folders_for_owner(&input.actor.account_id, input.course_id.as_ref())
        .await
        .map_err(|e| {
            log::error!("Failed to list folders for {}: {:?}.", input.actor.account_id, e);
            EndpointError::internal()
        })?;

    let forest = build_forest(folders, OrphanPolicy::PromoteToRoot).map_err(|e| {
        // A stored parent cycle is data corruption, not a caller mistake.
        log::error!("Folder tree for {} is corrupt: {}.", input.actor.account_id, e);
        EndpointError::internal()
    })?;

    Ok(GetFolderTreeOutput {
        roots: forest.into_iter().map(to_wire).collect(),
    })
}

fn to_wire(node: TreeNode<Folder>) -> FolderNode {
    FolderNode {
        folder_id: node.row.folder_id,
        name: node.row.name,
        parent_id: node.row.parent_id,
        course_id: node.row.course_id,
        children: node.children.into_iter().map(to_wire).collect(),
    }
}

impl OperationError for GetFolderTreeError {
    fn code(&self) -> tonic::Code {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::GlobalRole;
    use crate::store::MemoryStore;

    fn folder(store: &MemoryStore, owner: &Actor, name: &str, parent_id: Option<Uuid>) -> Uuid {
        let folder = Folder::builder()
            .name(name)
            .owner_id(owner.account_id)
            .parent_id(parent_id)
            .build();
        let folder_id = folder.folder_id;
        store.put_folder(folder);
        folder_id
    }

    #[tokio::test]
    async fn nesting_and_sibling_order_are_preserved() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let owner = Actor::new(Uuid::new_v4(), GlobalRole::Student);

        let root = folder(&store, &owner, "courses", None);
        folder(&store, &owner, "zeta", Some(root));
        folder(&store, &owner, "alpha", Some(root));

        let output = get_folder_tree(
            &ctx,
            store.as_ref(),
            &GetFolderTreeInput {
                actor: owner,
                course_id: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(output.roots.len(), 1);
        let names: Vec<&str> = output.roots[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn other_owners_folders_are_invisible() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let owner = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let neighbor = Actor::new(Uuid::new_v4(), GlobalRole::Student);

        folder(&store, &owner, "mine", None);
        folder(&store, &neighbor, "theirs", None);

        let output = get_folder_tree(
            &ctx,
            store.as_ref(),
            &GetFolderTreeInput {
                actor: owner,
                course_id: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(output.roots.len(), 1);
        assert_eq!(output.roots[0].name, "mine");
    }

    #[tokio::test]
    async fn a_folder_with_an_out_of_scope_parent_becomes_a_root() {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(store.clone());
        let owner = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let course_id = Uuid::new_v4();

        // The parent is unscoped; only the child carries the course.
        let parent = folder(&store, &owner, "general", None);
        let child = Folder::builder()
            .name("week-1")
            .owner_id(owner.account_id)
            .parent_id(Some(parent))
            .course_id(Some(course_id))
            .build();
        store.put_folder(child);

        let output = get_folder_tree(
            &ctx,
            store.as_ref(),
            &GetFolderTreeInput {
                actor: owner,
                course_id: Some(course_id),
            },
        )
        .await
        .unwrap();

        assert_eq!(output.roots.len(), 1);
        assert_eq!(output.roots[0].name, "week-1");
    }
}
