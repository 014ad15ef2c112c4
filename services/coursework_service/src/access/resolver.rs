use std::collections::HashSet;
use std::error::Error;

use thiserror::Error;
use uuid::Uuid;

use crate::access::{
    AccessRequest, Actor, CourseCapability, Decision, DecisionReason, DocumentCapability,
    SubmissionCapability,
};
use crate::model::GlobalRole;
use crate::store::{CoursesRepository, DocumentsRepository, StoreError, SubmissionsRepository};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resource is absent or soft-deleted. Masks existence; the caller
    /// maps this to 404 semantics, not 403.
    #[error("Resource not found.")]
    NotFound,

    #[error("Underlying datastore error: {0}.")]
    Datastore(#[source] Box<dyn Error + Send + Sync>),
}

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ResolveError::NotFound,
            StoreError::Other(e) => ResolveError::Datastore(e),
        }
    }
}

/// Resolves whether `actor` holds the requested capability.
///
/// Evaluation order is a contract: global admin override, then ownership, then
/// course-role sufficiency, then enrollment-implied document access, then
/// explicit grants. The first matching rule wins and names the decision's
/// reason.
pub async fn resolve(
    store: &(impl CoursesRepository + SubmissionsRepository + DocumentsRepository + Sync),
    actor: &Actor,
    request: &AccessRequest,
) -> Result<Decision, ResolveError> {
    if actor.role == GlobalRole::Admin {
        return Ok(Decision::allow(DecisionReason::AdminOverride));
    }

    match request {
        AccessRequest::Course { course_id, capability } => {
            resolve_course(store, actor, course_id, *capability).await
        }
        AccessRequest::Document {
            document_id,
            capability,
            include_deleted,
        } => resolve_document(store, actor, document_id, *capability, *include_deleted).await,
        AccessRequest::Submission {
            submission_id,
            capability,
        } => resolve_submission(store, actor, submission_id, *capability).await,
    }
}

/// Membership probe: is the actor inside the course at all? Allows admins,
/// the course owner, and anyone enrolled, whatever their per-course role.
/// Entity kinds whose visibility follows course membership (tasks,
/// course-scoped creation) check this instead of a capability.
pub async fn resolve_course_membership(
    store: &(impl CoursesRepository + Sync),
    actor: &Actor,
    course_id: &Uuid,
) -> Result<Decision, ResolveError> {
    if actor.role == GlobalRole::Admin {
        return Ok(Decision::allow(DecisionReason::AdminOverride));
    }

    let course = store.course(course_id).await?;
    if course.instructor_id == Some(actor.account_id) {
        return Ok(Decision::allow(DecisionReason::Owner));
    }

    if store.enrollment(course_id, &actor.account_id).await?.is_some() {
        return Ok(Decision::allow(DecisionReason::Enrolled));
    }

    Ok(Decision::deny())
}

async fn resolve_course(
    store: &(impl CoursesRepository + Sync),
    actor: &Actor,
    course_id: &Uuid,
    capability: CourseCapability,
) -> Result<Decision, ResolveError> {
    let course = store.course(course_id).await?;

    if course.instructor_id == Some(actor.account_id) {
        return Ok(Decision::allow(DecisionReason::Owner));
    }

    if let Some(enrollment) = store.enrollment(course_id, &actor.account_id).await? {
        // Both course capabilities currently gate on management rank; members
        // of the teaching staff may manage and may enroll others.
        let sufficient = match capability {
            CourseCapability::Manage | CourseCapability::EnrollMember => enrollment.role.can_manage(),
        };
        if sufficient {
            return Ok(Decision::allow(DecisionReason::CourseRole));
        }
    }

    Ok(Decision::deny())
}

async fn resolve_document(
    store: &(impl CoursesRepository + DocumentsRepository + Sync),
    actor: &Actor,
    document_id: &Uuid,
    capability: DocumentCapability,
    include_deleted: bool,
) -> Result<Decision, ResolveError> {
    let document = store.document(document_id).await?;

    let author_viewing_deleted = include_deleted && document.author_id == actor.account_id;
    if document.is_deleted && !author_viewing_deleted {
        return Err(ResolveError::NotFound);
    }

    if document.author_id == actor.account_id {
        return Ok(Decision::allow(DecisionReason::Owner));
    }

    // Enrollment in the document's course implies view and comment, never edit
    // or admin, regardless of the per-course role.
    if let Some(course_id) = document.course_id {
        let enrolled = store.enrollment(&course_id, &actor.account_id).await?.is_some();
        if enrolled
            && matches!(
                capability,
                DocumentCapability::View | DocumentCapability::Comment
            )
        {
            return Ok(Decision::allow(DecisionReason::Enrolled));
        }
    }

    let grants = store.grants_for_document(document_id).await?;
    if !grants.is_empty() {
        let enrolled_courses: HashSet<Uuid> = store
            .enrollments_for_account(&actor.account_id)
            .await?
            .into_iter()
            .map(|e| e.course_id)
            .collect();

        let best = grants
            .iter()
            .filter(|g| {
                g.account_id == Some(actor.account_id)
                    || g.course_id.map_or(false, |course_id| enrolled_courses.contains(&course_id))
            })
            .map(|g| g.level)
            .max_by_key(|level| level.rank());

        if let Some(level) = best {
            if level.satisfies(capability.required_level()) {
                return Ok(Decision::allow(DecisionReason::ExplicitGrant));
            }
        }
    }

    Ok(Decision::deny())
}

async fn resolve_submission(
    store: &(impl CoursesRepository + SubmissionsRepository + Sync),
    actor: &Actor,
    submission_id: &Uuid,
    capability: SubmissionCapability,
) -> Result<Decision, ResolveError> {
    let SubmissionCapability::Grade = capability;

    // The relevant course is derived by walking submission -> task -> project.
    let submission = store.submission(submission_id).await?;
    let task = store.task(&submission.task_id).await?;
    let project = store.project(&task.project_id).await?;
    let course = store.course(&project.course_id).await?;

    if course.instructor_id == Some(actor.account_id) {
        return Ok(Decision::allow(DecisionReason::Owner));
    }

    if let Some(enrollment) = store.enrollment(&course.course_id, &actor.account_id).await? {
        if enrollment.role.can_manage() {
            return Ok(Decision::allow(DecisionReason::CourseRole));
        }
    }

    Ok(Decision::deny())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::model::{
        Course, CourseRole, Document, DocumentPermission, Enrollment, PermissionLevel, Project,
        Submission, Task,
    };
    use crate::store::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        course_id: Uuid,
        instructor: Actor,
        student: Actor,
        outsider: Actor,
        admin: Actor,
        document_id: Uuid,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let instructor = Actor::new(Uuid::new_v4(), GlobalRole::Instructor);
        let student = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let outsider = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let admin = Actor::new(Uuid::new_v4(), GlobalRole::Admin);

        let course = Course::builder()
            .code("CS101")
            .name("Intro to Computer Science")
            .instructor_id(Some(instructor.account_id))
            .build();
        let course_id = course.course_id;
        store.put_course(course);

        let document = Document::builder()
            .title("Syllabus")
            .content("Week one: hello world.")
            .author_id(instructor.account_id)
            .course_id(Some(course_id))
            .build();
        let document_id = document.document_id;
        store.put_document(document);

        Fixture {
            store,
            course_id,
            instructor,
            student,
            outsider,
            admin,
            document_id,
        }
    }

    async fn enroll(fx: &Fixture, actor: &Actor, role: CourseRole) {
        fx.store
            .put_enrollment(
                &Enrollment::builder()
                    .course_id(fx.course_id)
                    .account_id(actor.account_id)
                    .role(role)
                    .build(),
            )
            .await
            .unwrap();
    }

    fn doc_request(fx: &Fixture, capability: DocumentCapability) -> AccessRequest {
        AccessRequest::Document {
            document_id: fx.document_id,
            capability,
            include_deleted: false,
        }
    }

    #[rstest]
    #[case(DocumentCapability::View)]
    #[case(DocumentCapability::Comment)]
    #[case(DocumentCapability::Edit)]
    #[case(DocumentCapability::Admin)]
    #[tokio::test]
    async fn admin_always_allowed(#[case] capability: DocumentCapability) {
        let fx = fixture();
        let decision = resolve(&fx.store, &fx.admin, &doc_request(&fx, capability))
            .await
            .unwrap();
        assert_eq!(decision, Decision::allow(DecisionReason::AdminOverride));
    }

    #[tokio::test]
    async fn author_without_enrollment_may_edit() {
        let fx = fixture();
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let document = Document::builder()
            .title("Scratch pad")
            .content("...")
            .author_id(author.account_id)
            .build();
        let document_id = document.document_id;
        fx.store.put_document(document);

        let decision = resolve(
            &fx.store,
            &author,
            &AccessRequest::Document {
                document_id,
                capability: DocumentCapability::Edit,
                include_deleted: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(decision, Decision::allow(DecisionReason::Owner));
    }

    #[rstest]
    #[case(DocumentCapability::View, true)]
    #[case(DocumentCapability::Comment, true)]
    #[case(DocumentCapability::Edit, false)]
    #[case(DocumentCapability::Admin, false)]
    #[tokio::test]
    async fn enrollment_implies_view_and_comment_only(
        #[case] capability: DocumentCapability,
        #[case] expect_allow: bool,
    ) {
        let fx = fixture();
        enroll(&fx, &fx.student, CourseRole::Student).await;

        let decision = resolve(&fx.store, &fx.student, &doc_request(&fx, capability))
            .await
            .unwrap();

        assert_eq!(decision.allow, expect_allow);
        if expect_allow {
            assert_eq!(decision.reason, DecisionReason::Enrolled);
        } else {
            assert_eq!(decision.reason, DecisionReason::NoGrant);
        }
    }

    #[tokio::test]
    async fn teaching_assistant_enrollment_does_not_imply_edit() {
        let fx = fixture();
        enroll(&fx, &fx.student, CourseRole::TeachingAssistant).await;

        let decision = resolve(&fx.store, &fx.student, &doc_request(&fx, DocumentCapability::Edit))
            .await
            .unwrap();

        assert!(!decision.allow);
    }

    #[tokio::test]
    async fn highest_matching_grant_wins() {
        let fx = fixture();
        for level in [PermissionLevel::View, PermissionLevel::Comment] {
            fx.store
                .put_grant(
                    &DocumentPermission::builder()
                        .document_id(fx.document_id)
                        .account_id(Some(fx.outsider.account_id))
                        .level(level)
                        .build(),
                )
                .await
                .unwrap();
        }

        let comment = resolve(&fx.store, &fx.outsider, &doc_request(&fx, DocumentCapability::Comment))
            .await
            .unwrap();
        assert_eq!(comment, Decision::allow(DecisionReason::ExplicitGrant));

        let edit = resolve(&fx.store, &fx.outsider, &doc_request(&fx, DocumentCapability::Edit))
            .await
            .unwrap();
        assert_eq!(edit, Decision::deny());
    }

    #[tokio::test]
    async fn course_wide_grant_reaches_enrollees() {
        let fx = fixture();
        let other_course = Course::builder().code("CS201").name("Data Structures").build();
        let other_course_id = other_course.course_id;
        fx.store.put_course(other_course);
        fx.store
            .put_enrollment(
                &Enrollment::builder()
                    .course_id(other_course_id)
                    .account_id(fx.outsider.account_id)
                    .build(),
            )
            .await
            .unwrap();
        fx.store
            .put_grant(
                &DocumentPermission::builder()
                    .document_id(fx.document_id)
                    .course_id(Some(other_course_id))
                    .level(PermissionLevel::Edit)
                    .build(),
            )
            .await
            .unwrap();

        let decision = resolve(&fx.store, &fx.outsider, &doc_request(&fx, DocumentCapability::Edit))
            .await
            .unwrap();

        assert_eq!(decision, Decision::allow(DecisionReason::ExplicitGrant));
    }

    #[tokio::test]
    async fn deleted_document_is_not_found_despite_grant() {
        let fx = fixture();
        let mut document = fx.store.document(&fx.document_id).await.unwrap();
        document.is_deleted = true;
        fx.store.update_document(&document).await.unwrap();
        fx.store
            .put_grant(
                &DocumentPermission::builder()
                    .document_id(fx.document_id)
                    .account_id(Some(fx.outsider.account_id))
                    .level(PermissionLevel::View)
                    .build(),
            )
            .await
            .unwrap();

        let result = resolve(&fx.store, &fx.outsider, &doc_request(&fx, DocumentCapability::View)).await;
        assert!(matches!(result, Err(ResolveError::NotFound)));

        // The include-deleted path works for the author only.
        let author_result = resolve(
            &fx.store,
            &fx.instructor,
            &AccessRequest::Document {
                document_id: fx.document_id,
                capability: DocumentCapability::View,
                include_deleted: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(author_result, Decision::allow(DecisionReason::Owner));

        let outsider_result = resolve(
            &fx.store,
            &fx.outsider,
            &AccessRequest::Document {
                document_id: fx.document_id,
                capability: DocumentCapability::View,
                include_deleted: true,
            },
        )
        .await;
        assert!(matches!(outsider_result, Err(ResolveError::NotFound)));
    }

    #[tokio::test]
    async fn private_document_is_author_only() {
        let fx = fixture();
        let author = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        let document = Document::builder()
            .title("Notes")
            .content("...")
            .author_id(author.account_id)
            .build();
        let document_id = document.document_id;
        fx.store.put_document(document);

        let request = AccessRequest::Document {
            document_id,
            capability: DocumentCapability::View,
            include_deleted: false,
        };
        assert!(resolve(&fx.store, &author, &request).await.unwrap().allow);
        assert!(!resolve(&fx.store, &fx.outsider, &request).await.unwrap().allow);
    }

    #[tokio::test]
    async fn grading_walks_up_to_the_course() {
        let fx = fixture();
        let project = Project::builder().course_id(fx.course_id).name("Compilers").build();
        let task = Task::builder().project_id(project.project_id).title("Lexer").build();
        let submission = Submission::builder()
            .task_id(task.task_id)
            .account_id(fx.student.account_id)
            .attempt_number(1)
            .content("fn main() {}")
            .build();
        let submission_id = submission.submission_id;
        fx.store.put_project(project);
        fx.store.put_task(task);
        fx.store.insert_submission(&submission).await.unwrap();

        let ta = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        enroll(&fx, &ta, CourseRole::TeachingAssistant).await;
        enroll(&fx, &fx.student, CourseRole::Student).await;

        let request = AccessRequest::Submission {
            submission_id,
            capability: SubmissionCapability::Grade,
        };

        let ta_decision = resolve(&fx.store, &ta, &request).await.unwrap();
        assert_eq!(ta_decision, Decision::allow(DecisionReason::CourseRole));

        let owner_decision = resolve(&fx.store, &fx.student, &request).await.unwrap();
        assert!(!owner_decision.allow);

        let instructor_decision = resolve(&fx.store, &fx.instructor, &request).await.unwrap();
        assert_eq!(instructor_decision, Decision::allow(DecisionReason::Owner));
    }

    #[tokio::test]
    async fn course_management_requires_staff_rank() {
        let fx = fixture();
        enroll(&fx, &fx.student, CourseRole::Student).await;

        let request = AccessRequest::Course {
            course_id: fx.course_id,
            capability: CourseCapability::Manage,
        };
        assert!(!resolve(&fx.store, &fx.student, &request).await.unwrap().allow);
        assert!(resolve(&fx.store, &fx.instructor, &request).await.unwrap().allow);

        let ta = Actor::new(Uuid::new_v4(), GlobalRole::Student);
        enroll(&fx, &ta, CourseRole::TeachingAssistant).await;
        let decision = resolve(&fx.store, &ta, &request).await.unwrap();
        assert_eq!(decision, Decision::allow(DecisionReason::CourseRole));
    }

    #[tokio::test]
    async fn missing_course_is_not_found() {
        let fx = fixture();
        let request = AccessRequest::Course {
            course_id: Uuid::new_v4(),
            capability: CourseCapability::Manage,
        };
        assert!(matches!(
            resolve(&fx.store, &fx.student, &request).await,
            Err(ResolveError::NotFound)
        ));
    }
}
