//! Reconstruction of parent-pointer tables into nested forests.
//!
//! Callers hand over a pre-filtered, pre-ordered flat row set; the builder
//! assembles it into a forest in one pass over a parent → children index.
//! Sibling order is whatever order the rows came in, so the caller's ordering
//! contract (folders by name, comments by creation time) survives assembly.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

/// A flat row participating in a parent-pointer hierarchy.
pub trait TreeRow {
    fn id(&self) -> Uuid;
    fn parent_id(&self) -> Option<Uuid>;
}

/// What to do with a row whose declared parent is not in the candidate set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrphanPolicy {
    /// The parent was scoped out by the caller's filter; the row becomes a root.
    PromoteToRoot,

    /// A missing parent means a lost subtree. The row is dropped and the drop
    /// is logged as a data anomaly.
    Drop,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum TreeError {
    #[error("Row {0} is part of a parent-pointer cycle.")]
    Cycle(Uuid),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreeNode<T> {
    pub row: T,
    pub children: Vec<TreeNode<T>>,
}

/// Builds a forest out of `rows`.
///
/// Runs in O(n): one pass to classify rows and index children by parent, one
/// traversal from the roots to attach them. Rows that declare a parent that is
/// its own transitive descendant never get attached; such cycles are rejected
/// with [`TreeError::Cycle`] instead of recursing forever.
pub fn build_forest<T: TreeRow>(rows: Vec<T>, orphan_policy: OrphanPolicy) -> Result<Vec<TreeNode<T>>, TreeError> {
    let ids: HashSet<Uuid> = rows.iter().map(TreeRow::id).collect();

    let mut children_of: HashMap<Uuid, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    let mut drop_queue = Vec::new();
    let mut slots: Vec<Option<T>> = rows.into_iter().map(Some).collect();

    for (idx, row) in slots.iter().enumerate() {
        let row = row.as_ref().expect("slot vacated during classification");
        match row.parent_id() {
            None => roots.push(idx),
            Some(parent) if ids.contains(&parent) => children_of.entry(parent).or_default().push(idx),
            Some(_) => match orphan_policy {
                OrphanPolicy::PromoteToRoot => roots.push(idx),
                OrphanPolicy::Drop => drop_queue.push(idx),
            },
        }
    }

    // Dropping a row orphans its own descendants in turn; the whole subtree goes.
    while let Some(idx) = drop_queue.pop() {
        let Some(row) = slots[idx].take() else { continue };
        if let Some(parent) = row.parent_id() {
            log::warn!(
                "Dropping row {}: parent {} is not part of the assembled forest.",
                row.id(),
                parent
            );
        }
        if let Some(child_indices) = children_of.get(&row.id()) {
            drop_queue.extend(child_indices);
        }
    }

    let mut forest = Vec::with_capacity(roots.len());
    for idx in roots {
        forest.push(attach(idx, &mut slots, &children_of));
    }

    // Every row is classified exactly once: attached under its parent, promoted,
    // or dropped. Whatever is left never became reachable from a root.
    if let Some(row) = slots.iter().flatten().next() {
        return Err(TreeError::Cycle(row.id()));
    }

    Ok(forest)
}

fn attach<T: TreeRow>(idx: usize, slots: &mut [Option<T>], children_of: &HashMap<Uuid, Vec<usize>>) -> TreeNode<T> {
    let row = slots[idx].take().expect("row attached twice");
    let children = children_of
        .get(&row.id())
        .map(|child_indices| {
            child_indices
                .iter()
                .map(|&child_idx| attach(child_idx, slots, children_of))
                .collect()
        })
        .unwrap_or_default();

    TreeNode { row, children }
}
