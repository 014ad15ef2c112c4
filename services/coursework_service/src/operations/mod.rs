//! The operation layer exposed to the route/controller layer.
//!
//! Every operation follows the same shape: an input carrying the
//! already-authenticated [`crate::access::Actor`], a typed error enum mapped to
//! a gRPC code, and a `pub async fn op(ctx, store, input)`. Capability checks
//! run through [`crate::access::resolver`] before any mutation; mutating
//! operations record through [`crate::activity::AuditRecorder`] after their
//! commit, and an audit failure never fails the operation.

pub mod check_access;
pub mod course_activity;
pub mod create_comment;
pub mod create_document;
pub mod create_folder;
pub mod create_submission;
pub mod delete_comment;
pub mod delete_document;
pub mod delete_folder;
pub mod delete_submission;
pub mod document_activity;
pub mod enroll_account;
pub mod get_document;
pub mod get_folder_tree;
pub mod grade_submission;
pub mod list_comments;
pub mod move_folder;
pub mod put_document_grant;
pub mod resolve_comment;
pub mod tag_document;
pub mod update_document;
pub mod update_submission;
