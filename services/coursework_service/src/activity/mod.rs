//! Course activity aggregation and audit recording.

pub mod recorder;

pub use recorder::AuditRecorder;

use std::collections::HashSet;

use uuid::Uuid;

use crate::model::{ActivityLogEntry, EntityType};
use crate::store::{
    ActivityRepository, CoursesRepository, DocumentsRepository, StoreError, SubmissionsRepository,
};

/// The typed sets of entity ids considered "within" one course: the course
/// itself, its projects, their tasks, those tasks' submissions, and the
/// course's documents.
#[derive(Clone, Debug)]
pub struct ContainmentClosure {
    pub course_id: Uuid,
    pub project_ids: HashSet<Uuid>,
    pub task_ids: HashSet<Uuid>,
    pub submission_ids: HashSet<Uuid>,
    pub document_ids: HashSet<Uuid>,
}

impl ContainmentClosure {
    /// Typed membership test; an id only counts within its own entity kind.
    pub fn contains(&self, entity_type: EntityType, entity_id: &Uuid) -> bool {
        match entity_type {
            EntityType::Course => self.course_id == *entity_id,
            EntityType::Project => self.project_ids.contains(entity_id),
            EntityType::Task => self.task_ids.contains(entity_id),
            EntityType::Submission => self.submission_ids.contains(entity_id),
            EntityType::Document => self.document_ids.contains(entity_id),
            _ => false,
        }
    }
}

/// Walks the containment graph of a course one level at a time; each level is
/// one bulk lookup, so the closure costs four queries however large the course.
pub async fn containment_closure(
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    course_id: &Uuid,
) -> Result<ContainmentClosure, StoreError> {
    // Existence check doubles as the NotFound path.
    store.course(course_id).await?;

    let project_ids = store.project_ids_for_course(course_id).await?;
    let task_ids = store.task_ids_for_projects(&project_ids).await?;
    let submission_ids = store.submission_ids_for_tasks(&task_ids).await?;
    let document_ids = store.document_ids_for_course(course_id).await?;

    Ok(ContainmentClosure {
        course_id: *course_id,
        project_ids: project_ids.into_iter().collect(),
        task_ids: task_ids.into_iter().collect(),
        submission_ids: submission_ids.into_iter().collect(),
        document_ids: document_ids.into_iter().collect(),
    })
}

/// Time-descending audit feed of everything within the course, capped at
/// `limit`. The closure filter is pushed into the store.
pub async fn course_activity(
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + ActivityRepository + Sync),
    course_id: &Uuid,
    limit: i32,
) -> Result<Vec<ActivityLogEntry>, StoreError> {
    let closure = containment_closure(store, course_id).await?;
    store.entries_in_closure(&closure, limit).await
}

/// Single-entity special case: the document's own feed, time-descending.
pub async fn document_activity(
    store: &(impl ActivityRepository + Sync),
    document_id: &Uuid,
    limit: i32,
) -> Result<Vec<ActivityLogEntry>, StoreError> {
    store.entries_for_entity(EntityType::Document, document_id, limit).await
}
