//! Entity model of the coursework platform, as seen by the engine.
//!
//! The engine only ever reads and writes these records through the repository
//! traits in [`crate::store`]; whatever schema backs them is the storage
//! layer's business.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Platform-wide default role of an account, distinct from any per-course role.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    Admin,
    Instructor,
    TeachingAssistant,
    Student,
    Reader,
}

/// Role held within one course through an [`Enrollment`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CourseRole {
    Student,
    TeachingAssistant,
    Instructor,
}

impl CourseRole {
    /// Explicit rank table; higher outranks lower.
    pub fn rank(&self) -> u8 {
        match self {
            CourseRole::Student => 0,
            CourseRole::TeachingAssistant => 1,
            CourseRole::Instructor => 2,
        }
    }

    /// Whether this role is sufficient for course-management capabilities,
    /// grading included.
    pub fn can_manage(&self) -> bool {
        self.rank() >= CourseRole::TeachingAssistant.rank()
    }
}

/// Permission level carried by a [`DocumentPermission`] grant.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    View,
    Comment,
    Edit,
    Admin,
}

impl PermissionLevel {
    /// Explicit rank table; `admin > edit > comment > view`.
    pub fn rank(&self) -> u8 {
        match self {
            PermissionLevel::View => 0,
            PermissionLevel::Comment => 1,
            PermissionLevel::Edit => 2,
            PermissionLevel::Admin => 3,
        }
    }

    pub fn satisfies(&self, required: PermissionLevel) -> bool {
        self.rank() >= required.rank()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Page,
    Note,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Draft,
    Published,
    Closed,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    NotStarted,
    InProgress,
    Submitted,
    Graded,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    View,
    Submit,
    Grade,
}

/// Entity kinds addressable by audit entries, comments and permission checks.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Course,
    Enrollment,
    Project,
    Task,
    Submission,
    Document,
    Folder,
    Comment,
}

impl EntityType {
    /// Entity kinds that can carry comment threads.
    pub fn supports_comments(&self) -> bool {
        matches!(self, EntityType::Document | EntityType::Task | EntityType::Submission)
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityType::Course => "course",
            EntityType::Enrollment => "enrollment",
            EntityType::Project => "project",
            EntityType::Task => "task",
            EntityType::Submission => "submission",
            EntityType::Document => "document",
            EntityType::Folder => "folder",
            EntityType::Comment => "comment",
        };
        write!(f, "{}", name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct UserAccount {
    #[builder(default = Uuid::new_v4())]
    pub account_id: Uuid,

    #[builder(setter(into))]
    pub email: String,

    #[builder(setter(into))]
    pub first_name: String,

    #[builder(setter(into))]
    pub last_name: String,

    #[builder(default = GlobalRole::Student)]
    pub role: GlobalRole,

    #[builder(default = true)]
    pub is_active: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Course {
    #[builder(default = Uuid::new_v4())]
    pub course_id: Uuid,

    #[builder(setter(into))]
    pub code: String,

    #[builder(setter(into))]
    pub name: String,

    #[builder(default)]
    pub instructor_id: Option<Uuid>,

    #[builder(default = true)]
    pub is_active: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Enrollment {
    pub course_id: Uuid,
    pub account_id: Uuid,

    #[builder(default = CourseRole::Student)]
    pub role: CourseRole,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Project {
    #[builder(default = Uuid::new_v4())]
    pub project_id: Uuid,

    pub course_id: Uuid,

    #[builder(setter(into))]
    pub name: String,

    /// Explicit ordering among sibling projects of a course.
    #[builder(default = 0)]
    pub rank: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Task {
    #[builder(default = Uuid::new_v4())]
    pub task_id: Uuid,

    pub project_id: Uuid,

    #[builder(setter(into))]
    pub title: String,

    #[builder(default = TaskState::Draft)]
    pub state: TaskState,

    #[builder(default)]
    pub due_at: Option<DateTime<Utc>>,

    #[builder(default = false)]
    pub allow_late_submission: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct TaskAssignment {
    pub task_id: Uuid,
    pub account_id: Uuid,

    #[builder(default = AssignmentStatus::NotStarted)]
    pub status: AssignmentStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Submission {
    #[builder(default = Uuid::new_v4())]
    pub submission_id: Uuid,

    pub task_id: Uuid,
    pub account_id: Uuid,

    /// Per (task, account) sequence number; gapless at creation time.
    pub attempt_number: i32,

    #[builder(setter(into))]
    pub content: String,

    #[builder(default = Utc::now())]
    pub submitted_at: DateTime<Utc>,

    #[builder(default)]
    pub grade: Option<i32>,

    #[builder(default)]
    pub graded_at: Option<DateTime<Utc>>,

    #[builder(default)]
    pub graded_by: Option<Uuid>,
}

impl Submission {
    /// A graded submission is immutable to its owner.
    pub fn is_graded(&self) -> bool {
        self.graded_at.is_some()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Document {
    #[builder(default = Uuid::new_v4())]
    pub document_id: Uuid,

    #[builder(setter(into))]
    pub title: String,

    #[builder(setter(into))]
    pub content: String,

    pub author_id: Uuid,

    #[builder(default)]
    pub folder_id: Option<Uuid>,

    /// A document with no course is private to its author plus explicit grantees.
    #[builder(default)]
    pub course_id: Option<Uuid>,

    #[builder(default = DocType::Page)]
    pub doc_type: DocType,

    #[builder(default = false)]
    pub is_deleted: bool,

    #[builder(default = 0)]
    pub view_count: i64,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,

    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Folder {
    #[builder(default = Uuid::new_v4())]
    pub folder_id: Uuid,

    #[builder(setter(into))]
    pub name: String,

    #[builder(default)]
    pub parent_id: Option<Uuid>,

    pub owner_id: Uuid,

    #[builder(default)]
    pub course_id: Option<Uuid>,
}

impl service_core::tree::TreeRow for Folder {
    fn id(&self) -> Uuid {
        self.folder_id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }
}

/// Grants `level` on one document to exactly one of an account or a whole course.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct DocumentPermission {
    #[builder(default = Uuid::new_v4())]
    pub permission_id: Uuid,

    pub document_id: Uuid,

    #[builder(default)]
    pub account_id: Option<Uuid>,

    #[builder(default)]
    pub course_id: Option<Uuid>,

    pub level: PermissionLevel,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Tag {
    #[builder(default = Uuid::new_v4())]
    pub tag_id: Uuid,

    #[builder(setter(into))]
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DocumentTag {
    pub document_id: Uuid,
    pub tag_id: Uuid,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct Comment {
    #[builder(default = Uuid::new_v4())]
    pub comment_id: Uuid,

    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub account_id: Uuid,

    /// Threaded reply within the same (entity_type, entity_id).
    #[builder(default)]
    pub parent_id: Option<Uuid>,

    #[builder(setter(into))]
    pub content: String,

    #[builder(default = false)]
    pub is_resolved: bool,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl service_core::tree::TreeRow for Comment {
    fn id(&self) -> Uuid {
        self.comment_id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }
}

/// Append-only audit record; never mutated or deleted by the engine.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, TypedBuilder)]
pub struct ActivityLogEntry {
    #[builder(default = Uuid::new_v4())]
    pub entry_id: Uuid,

    pub account_id: Uuid,
    pub action: ActivityAction,
    pub entity_type: EntityType,
    pub entity_id: Uuid,

    #[builder(default = Value::Null)]
    pub metadata: Value,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}
