//! Narrow interfaces over the entity graph store.
//!
//! Operations take `&(impl A + B)` bounds over these traits; a relational
//! backend implements them outside this crate, and [`super::MemoryStore`]
//! implements them in-process. Absence of matching rows is a valid empty
//! result for every listing method, never an error.

use std::error::Error;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::activity::ContainmentClosure;
use crate::model::{
    ActivityLogEntry, AssignmentStatus, Comment, Course, Document, DocumentPermission, Enrollment,
    EntityType, Folder, Project, Submission, Tag, Task, TaskAssignment, UserAccount,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item not found.")]
    NotFound,

    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

#[derive(Debug, Error)]
pub enum EnrollError {
    #[error("The account is already enrolled in this course.")]
    DuplicateEnrollment,

    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

#[derive(Debug, Error)]
pub enum InsertSubmissionError {
    #[error("A submission with this attempt number already exists.")]
    DuplicateAttempt,

    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

#[derive(Debug, Error)]
pub enum LinkTagError {
    #[error("The tag is already linked to this document.")]
    DuplicateLink,

    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

#[async_trait]
pub trait AccountsRepository {
    async fn account(&self, account_id: &Uuid) -> Result<UserAccount, StoreError>;
}

#[async_trait]
pub trait CoursesRepository {
    async fn course(&self, course_id: &Uuid) -> Result<Course, StoreError>;

    async fn enrollment(&self, course_id: &Uuid, account_id: &Uuid) -> Result<Option<Enrollment>, StoreError>;

    async fn enrollments_for_account(&self, account_id: &Uuid) -> Result<Vec<Enrollment>, StoreError>;

    /// Uniqueness on (course, account) is the store's to enforce.
    async fn put_enrollment(&self, enrollment: &Enrollment) -> Result<(), EnrollError>;

    async fn project(&self, project_id: &Uuid) -> Result<Project, StoreError>;

    async fn project_ids_for_course(&self, course_id: &Uuid) -> Result<Vec<Uuid>, StoreError>;
}

#[async_trait]
pub trait SubmissionsRepository {
    async fn task(&self, task_id: &Uuid) -> Result<Task, StoreError>;

    async fn task_ids_for_projects(&self, project_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError>;

    async fn assignment(&self, task_id: &Uuid, account_id: &Uuid) -> Result<Option<TaskAssignment>, StoreError>;

    async fn put_assignment_status(
        &self,
        task_id: &Uuid,
        account_id: &Uuid,
        status: AssignmentStatus,
    ) -> Result<(), StoreError>;

    async fn submission(&self, submission_id: &Uuid) -> Result<Submission, StoreError>;

    async fn submission_ids_for_tasks(&self, task_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError>;

    /// Smallest positive attempt number not taken by any current submission of
    /// this (task, account) pair.
    async fn next_attempt_number(&self, task_id: &Uuid, account_id: &Uuid) -> Result<i32, StoreError>;

    /// Uniqueness on (task, account, attempt_number) is the store's to enforce;
    /// a concurrent duplicate surfaces as [`InsertSubmissionError::DuplicateAttempt`].
    async fn insert_submission(&self, submission: &Submission) -> Result<(), InsertSubmissionError>;

    async fn update_submission(&self, submission: &Submission) -> Result<(), StoreError>;

    async fn delete_submission(&self, submission_id: &Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DocumentsRepository {
    async fn document(&self, document_id: &Uuid) -> Result<Document, StoreError>;

    async fn document_ids_for_course(&self, course_id: &Uuid) -> Result<Vec<Uuid>, StoreError>;

    async fn insert_document(&self, document: &Document) -> Result<(), StoreError>;

    async fn update_document(&self, document: &Document) -> Result<(), StoreError>;

    /// Monotonic counter bump, performed store-side so concurrent views cannot
    /// lose increments.
    async fn bump_view_count(&self, document_id: &Uuid) -> Result<(), StoreError>;

    async fn grants_for_document(&self, document_id: &Uuid) -> Result<Vec<DocumentPermission>, StoreError>;

    async fn put_grant(&self, grant: &DocumentPermission) -> Result<(), StoreError>;

    /// Returns the tag with the given name, creating it on first use.
    async fn ensure_tag(&self, name: &str) -> Result<Tag, StoreError>;

    async fn link_tag(&self, document_id: &Uuid, tag_id: &Uuid) -> Result<(), LinkTagError>;

    async fn folder(&self, folder_id: &Uuid) -> Result<Folder, StoreError>;

    async fn insert_folder(&self, folder: &Folder) -> Result<(), StoreError>;

    /// Folders of one owner, optionally narrowed to one course scope,
    /// name-ascending.
    async fn folders_for_owner(&self, owner_id: &Uuid, course_id: Option<&Uuid>) -> Result<Vec<Folder>, StoreError>;

    async fn update_folder_parent(&self, folder_id: &Uuid, parent_id: Option<Uuid>) -> Result<(), StoreError>;

    async fn delete_folder(&self, folder_id: &Uuid) -> Result<(), StoreError>;

    async fn child_folder_count(&self, folder_id: &Uuid) -> Result<usize, StoreError>;

    async fn live_document_count_in_folder(&self, folder_id: &Uuid) -> Result<usize, StoreError>;

    async fn comment(&self, comment_id: &Uuid) -> Result<Comment, StoreError>;

    /// All comments of one entity, creation-time ascending.
    async fn comments_for_entity(&self, entity_type: EntityType, entity_id: &Uuid) -> Result<Vec<Comment>, StoreError>;

    async fn put_comment(&self, comment: &Comment) -> Result<(), StoreError>;

    async fn update_comment(&self, comment: &Comment) -> Result<(), StoreError>;

    async fn delete_comments(&self, comment_ids: &[Uuid]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ActivityRepository {
    /// Append-only; the engine never updates or deletes entries.
    async fn append(&self, entry: &ActivityLogEntry) -> Result<(), StoreError>;

    /// Entries whose (entity_type, entity_id) falls inside the closure,
    /// time-descending, truncated to `limit`. The closure filter is applied by
    /// the store, not by the caller over the full log.
    async fn entries_in_closure(
        &self,
        closure: &ContainmentClosure,
        limit: i32,
    ) -> Result<Vec<ActivityLogEntry>, StoreError>;

    /// Entries of a single entity, time-descending, truncated to `limit`.
    async fn entries_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &Uuid,
        limit: i32,
    ) -> Result<Vec<ActivityLogEntry>, StoreError>;
}

pub trait ThreadSafeStore:
    AccountsRepository + CoursesRepository + SubmissionsRepository + DocumentsRepository + ActivityRepository + Send + Sync
{
}

impl<T> ThreadSafeStore for T where
    T: AccountsRepository
        + CoursesRepository
        + SubmissionsRepository
        + DocumentsRepository
        + ActivityRepository
        + Send
        + Sync
{
}
