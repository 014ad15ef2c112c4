//! Permission resolution for courses, documents and submissions.
//!
//! Every capability check in the engine funnels through [`resolver::resolve`];
//! no handler branches on role strings of its own.

pub mod resolver;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{GlobalRole, PermissionLevel};

/// The authenticated caller, as supplied by the identity collaborator.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Actor {
    pub account_id: Uuid,
    pub role: GlobalRole,
}

impl Actor {
    pub fn new(account_id: Uuid, role: GlobalRole) -> Self {
        Actor { account_id, role }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CourseCapability {
    Manage,
    EnrollMember,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentCapability {
    View,
    Comment,
    Edit,
    Admin,
}

impl DocumentCapability {
    /// The grant level an explicit [`crate::model::DocumentPermission`] must
    /// meet or exceed.
    pub fn required_level(&self) -> PermissionLevel {
        match self {
            DocumentCapability::View => PermissionLevel::View,
            DocumentCapability::Comment => PermissionLevel::Comment,
            DocumentCapability::Edit => PermissionLevel::Edit,
            DocumentCapability::Admin => PermissionLevel::Admin,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionCapability {
    Grade,
}

/// A typed (resource, capability) pair; capabilities are only expressible for
/// the resource kind they belong to.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AccessRequest {
    Course {
        course_id: Uuid,
        capability: CourseCapability,
    },
    Document {
        document_id: Uuid,
        capability: DocumentCapability,
        /// Author-only escape hatch: resolve against a soft-deleted document
        /// instead of masking it as absent.
        #[serde(default)]
        include_deleted: bool,
    },
    Submission {
        submission_id: Uuid,
        capability: SubmissionCapability,
    },
}

/// Why a resolution came out the way it did. Logged for observability; never
/// returned to unauthorized callers in error payloads.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    AdminOverride,
    Owner,
    CourseRole,
    Enrolled,
    ExplicitGrant,
    NoGrant,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Decision {
    pub allow: bool,
    pub reason: DecisionReason,
}

impl Decision {
    pub fn allow(reason: DecisionReason) -> Self {
        Decision { allow: true, reason }
    }

    pub fn deny() -> Self {
        Decision {
            allow: false,
            reason: DecisionReason::NoGrant,
        }
    }
}
