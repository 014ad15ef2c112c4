//! In-process implementation of the repository traits.
//!
//! Backs every test in this crate and doubles as the storage handle for
//! embedded deployments. Each method takes the table lock once, so a single
//! call observes one consistent snapshot; uniqueness rules the relational
//! backend would enforce with constraints are enforced here under the write
//! lock.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::activity::ContainmentClosure;
use crate::model::{
    ActivityLogEntry, AssignmentStatus, Comment, Course, Document, DocumentPermission, DocumentTag,
    Enrollment, EntityType, Folder, Project, Submission, Tag, Task, TaskAssignment, UserAccount,
};
use crate::store::repository::{
    AccountsRepository, ActivityRepository, CoursesRepository, DocumentsRepository, EnrollError,
    InsertSubmissionError, LinkTagError, StoreError, SubmissionsRepository,
};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, UserAccount>,
    courses: HashMap<Uuid, Course>,
    enrollments: Vec<Enrollment>,
    projects: HashMap<Uuid, Project>,
    tasks: HashMap<Uuid, Task>,
    assignments: Vec<TaskAssignment>,
    submissions: HashMap<Uuid, Submission>,
    documents: HashMap<Uuid, Document>,
    folders: HashMap<Uuid, Folder>,
    grants: Vec<DocumentPermission>,
    tags: HashMap<Uuid, Tag>,
    document_tags: Vec<DocumentTag>,
    comments: HashMap<Uuid, Comment>,
    activity: Vec<ActivityLogEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers for tests and embedding callers. Mutations the engine
    // performs at runtime go through the repository traits instead.

    pub fn put_account(&self, account: UserAccount) {
        self.tables.write().unwrap().accounts.insert(account.account_id, account);
    }

    pub fn put_course(&self, course: Course) {
        self.tables.write().unwrap().courses.insert(course.course_id, course);
    }

    pub fn put_project(&self, project: Project) {
        self.tables.write().unwrap().projects.insert(project.project_id, project);
    }

    pub fn put_task(&self, task: Task) {
        self.tables.write().unwrap().tasks.insert(task.task_id, task);
    }

    pub fn put_assignment(&self, assignment: TaskAssignment) {
        let mut tables = self.tables.write().unwrap();
        tables
            .assignments
            .retain(|a| !(a.task_id == assignment.task_id && a.account_id == assignment.account_id));
        tables.assignments.push(assignment);
    }

    pub fn put_document(&self, document: Document) {
        self.tables.write().unwrap().documents.insert(document.document_id, document);
    }

    pub fn put_folder(&self, folder: Folder) {
        self.tables.write().unwrap().folders.insert(folder.folder_id, folder);
    }
}

#[async_trait]
impl AccountsRepository for MemoryStore {
    async fn account(&self, account_id: &Uuid) -> Result<UserAccount, StoreError> {
        let tables = self.tables.read().unwrap();
        tables.accounts.get(account_id).cloned().ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl CoursesRepository for MemoryStore {
    async fn course(&self, course_id: &Uuid) -> Result<Course, StoreError> {
        let tables = self.tables.read().unwrap();
        tables.courses.get(course_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn enrollment(&self, course_id: &Uuid, account_id: &Uuid) -> Result<Option<Enrollment>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .enrollments
            .iter()
            .find(|e| e.course_id == *course_id && e.account_id == *account_id)
            .cloned())
    }

    async fn enrollments_for_account(&self, account_id: &Uuid) -> Result<Vec<Enrollment>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .enrollments
            .iter()
            .filter(|e| e.account_id == *account_id)
            .cloned()
            .collect())
    }

    async fn put_enrollment(&self, enrollment: &Enrollment) -> Result<(), EnrollError> {
        let mut tables = self.tables.write().unwrap();
        let duplicate = tables
            .enrollments
            .iter()
            .any(|e| e.course_id == enrollment.course_id && e.account_id == enrollment.account_id);
        if duplicate {
            return Err(EnrollError::DuplicateEnrollment);
        }

        tables.enrollments.push(enrollment.clone());
        Ok(())
    }

    async fn project(&self, project_id: &Uuid) -> Result<Project, StoreError> {
        let tables = self.tables.read().unwrap();
        tables.projects.get(project_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn project_ids_for_course(&self, course_id: &Uuid) -> Result<Vec<Uuid>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .projects
            .values()
            .filter(|p| p.course_id == *course_id)
            .map(|p| p.project_id)
            .collect())
    }
}

#[async_trait]
impl SubmissionsRepository for MemoryStore {
    async fn task(&self, task_id: &Uuid) -> Result<Task, StoreError> {
        let tables = self.tables.read().unwrap();
        tables.tasks.get(task_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn task_ids_for_projects(&self, project_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .tasks
            .values()
            .filter(|t| project_ids.contains(&t.project_id))
            .map(|t| t.task_id)
            .collect())
    }

    async fn assignment(&self, task_id: &Uuid, account_id: &Uuid) -> Result<Option<TaskAssignment>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .assignments
            .iter()
            .find(|a| a.task_id == *task_id && a.account_id == *account_id)
            .cloned())
    }

    async fn put_assignment_status(
        &self,
        task_id: &Uuid,
        account_id: &Uuid,
        status: AssignmentStatus,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        let assignment = tables
            .assignments
            .iter_mut()
            .find(|a| a.task_id == *task_id && a.account_id == *account_id)
            .ok_or(StoreError::NotFound)?;
        assignment.status = status;
        Ok(())
    }

    async fn submission(&self, submission_id: &Uuid) -> Result<Submission, StoreError> {
        let tables = self.tables.read().unwrap();
        tables.submissions.get(submission_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn submission_ids_for_tasks(&self, task_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .submissions
            .values()
            .filter(|s| task_ids.contains(&s.task_id))
            .map(|s| s.submission_id)
            .collect())
    }

    async fn next_attempt_number(&self, task_id: &Uuid, account_id: &Uuid) -> Result<i32, StoreError> {
        let tables = self.tables.read().unwrap();
        let mut attempt = 1;
        loop {
            let taken = tables
                .submissions
                .values()
                .any(|s| s.task_id == *task_id && s.account_id == *account_id && s.attempt_number == attempt);
            if !taken {
                return Ok(attempt);
            }
            attempt += 1;
        }
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), InsertSubmissionError> {
        let mut tables = self.tables.write().unwrap();
        let duplicate = tables.submissions.values().any(|s| {
            s.task_id == submission.task_id
                && s.account_id == submission.account_id
                && s.attempt_number == submission.attempt_number
        });
        if duplicate {
            return Err(InsertSubmissionError::DuplicateAttempt);
        }

        tables.submissions.insert(submission.submission_id, submission.clone());
        Ok(())
    }

    async fn update_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        if !tables.submissions.contains_key(&submission.submission_id) {
            return Err(StoreError::NotFound);
        }

        tables.submissions.insert(submission.submission_id, submission.clone());
        Ok(())
    }

    async fn delete_submission(&self, submission_id: &Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        tables.submissions.remove(submission_id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl DocumentsRepository for MemoryStore {
    async fn document(&self, document_id: &Uuid) -> Result<Document, StoreError> {
        let tables = self.tables.read().unwrap();
        tables.documents.get(document_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn document_ids_for_course(&self, course_id: &Uuid) -> Result<Vec<Uuid>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .documents
            .values()
            .filter(|d| d.course_id == Some(*course_id))
            .map(|d| d.document_id)
            .collect())
    }

    async fn insert_document(&self, document: &Document) -> Result<(), StoreError> {
        self.tables
            .write()
            .unwrap()
            .documents
            .insert(document.document_id, document.clone());
        Ok(())
    }

    async fn update_document(&self, document: &Document) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        if !tables.documents.contains_key(&document.document_id) {
            return Err(StoreError::NotFound);
        }

        tables.documents.insert(document.document_id, document.clone());
        Ok(())
    }

    async fn bump_view_count(&self, document_id: &Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        let document = tables.documents.get_mut(document_id).ok_or(StoreError::NotFound)?;
        document.view_count += 1;
        Ok(())
    }

    async fn grants_for_document(&self, document_id: &Uuid) -> Result<Vec<DocumentPermission>, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .grants
            .iter()
            .filter(|g| g.document_id == *document_id)
            .cloned()
            .collect())
    }

    async fn put_grant(&self, grant: &DocumentPermission) -> Result<(), StoreError> {
        self.tables.write().unwrap().grants.push(grant.clone());
        Ok(())
    }

    async fn ensure_tag(&self, name: &str) -> Result<Tag, StoreError> {
        let mut tables = self.tables.write().unwrap();
        if let Some(tag) = tables.tags.values().find(|t| t.name == name) {
            return Ok(tag.clone());
        }

        let tag = Tag::builder().name(name).build();
        tables.tags.insert(tag.tag_id, tag.clone());
        Ok(tag)
    }

    async fn link_tag(&self, document_id: &Uuid, tag_id: &Uuid) -> Result<(), LinkTagError> {
        let mut tables = self.tables.write().unwrap();
        let duplicate = tables
            .document_tags
            .iter()
            .any(|link| link.document_id == *document_id && link.tag_id == *tag_id);
        if duplicate {
            return Err(LinkTagError::DuplicateLink);
        }

        tables.document_tags.push(DocumentTag {
            document_id: *document_id,
            tag_id: *tag_id,
        });
        Ok(())
    }

    async fn folder(&self, folder_id: &Uuid) -> Result<Folder, StoreError> {
        let tables = self.tables.read().unwrap();
        tables.folders.get(folder_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn insert_folder(&self, folder: &Folder) -> Result<(), StoreError> {
        self.tables.write().unwrap().folders.insert(folder.folder_id, folder.clone());
        Ok(())
    }

    async fn folders_for_owner(&self, owner_id: &Uuid, course_id: Option<&Uuid>) -> Result<Vec<Folder>, StoreError> {
        let tables = self.tables.read().unwrap();
        let mut folders: Vec<Folder> = tables
            .folders
            .values()
            .filter(|f| f.owner_id == *owner_id)
            .filter(|f| course_id.map_or(true, |course_id| f.course_id == Some(*course_id)))
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    async fn update_folder_parent(&self, folder_id: &Uuid, parent_id: Option<Uuid>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        let folder = tables.folders.get_mut(folder_id).ok_or(StoreError::NotFound)?;
        folder.parent_id = parent_id;
        Ok(())
    }

    async fn delete_folder(&self, folder_id: &Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        tables.folders.remove(folder_id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn child_folder_count(&self, folder_id: &Uuid) -> Result<usize, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables.folders.values().filter(|f| f.parent_id == Some(*folder_id)).count())
    }

    async fn live_document_count_in_folder(&self, folder_id: &Uuid) -> Result<usize, StoreError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .documents
            .values()
            .filter(|d| d.folder_id == Some(*folder_id) && !d.is_deleted)
            .count())
    }

    async fn comment(&self, comment_id: &Uuid) -> Result<Comment, StoreError> {
        let tables = self.tables.read().unwrap();
        tables.comments.get(comment_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn comments_for_entity(&self, entity_type: EntityType, entity_id: &Uuid) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.read().unwrap();
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.entity_type == entity_type && c.entity_id == *entity_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn put_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.tables.write().unwrap().comments.insert(comment.comment_id, comment.clone());
        Ok(())
    }

    async fn update_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        if !tables.comments.contains_key(&comment.comment_id) {
            return Err(StoreError::NotFound);
        }

        tables.comments.insert(comment.comment_id, comment.clone());
        Ok(())
    }

    async fn delete_comments(&self, comment_ids: &[Uuid]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        for comment_id in comment_ids {
            tables.comments.remove(comment_id);
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityRepository for MemoryStore {
    async fn append(&self, entry: &ActivityLogEntry) -> Result<(), StoreError> {
        self.tables.write().unwrap().activity.push(entry.clone());
        Ok(())
    }

    async fn entries_in_closure(
        &self,
        closure: &ContainmentClosure,
        limit: i32,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let tables = self.tables.read().unwrap();
        let mut entries: Vec<ActivityLogEntry> = tables
            .activity
            .iter()
            .filter(|e| closure.contains(e.entity_type, &e.entity_id))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn entries_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &Uuid,
        limit: i32,
    ) -> Result<Vec<ActivityLogEntry>, StoreError> {
        let tables = self.tables.read().unwrap();
        let mut entries: Vec<ActivityLogEntry> = tables
            .activity
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == *entity_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}
