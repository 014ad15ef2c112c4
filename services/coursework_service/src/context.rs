use core::fmt;
use std::env;
use std::sync::Arc;

use crate::activity::AuditRecorder;
use crate::store::ActivityRepository;

pub(crate) enum ContextKey {
    ActivityPageSize,
    DocumentActivityPageSize,
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ActivityPageSize => write!(f, "ACTIVITY_PAGE_SIZE"),
            Self::DocumentActivityPageSize => write!(f, "DOCUMENT_ACTIVITY_PAGE_SIZE"),
        }
    }
}

/// Per-process dependencies of the operation layer: the audit recorder and the
/// paging knobs. The entity graph store itself is passed to each operation by
/// the caller, so tests can hand in whatever implementation they like.
pub struct Context {
    pub recorder: AuditRecorder,
    pub activity_page_size: i32,
    pub document_activity_page_size: i32,
}

impl Context {
    pub fn new(audit_store: Arc<dyn ActivityRepository + Send + Sync>) -> Self {
        Context {
            recorder: AuditRecorder::new(audit_store),
            activity_page_size: Context::key_or(&ContextKey::ActivityPageSize, 50),
            document_activity_page_size: Context::key_or(&ContextKey::DocumentActivityPageSize, 25),
        }
    }

    fn key_or(key: &ContextKey, default: i32) -> i32 {
        env::var(key.to_string())
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
