use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::model::{ActivityAction, ActivityLogEntry, EntityType};
use crate::store::ActivityRepository;

/// Append-only audit writer.
///
/// Recording never fails past its caller: a failed append is logged on the
/// operational channel and swallowed, so the business operation that triggered
/// it stands either way.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn ActivityRepository + Send + Sync>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn ActivityRepository + Send + Sync>) -> Self {
        AuditRecorder { store }
    }

    /// Synchronous append; awaited by mutating operations after their commit.
    pub async fn record(
        &self,
        actor_id: &Uuid,
        action: ActivityAction,
        entity_type: EntityType,
        entity_id: &Uuid,
        metadata: Value,
    ) {
        let entry = ActivityLogEntry::builder()
            .account_id(*actor_id)
            .action(action)
            .entity_type(entity_type)
            .entity_id(*entity_id)
            .metadata(metadata)
            .build();

        if let Err(e) = self.store.append(&entry).await {
            log::error!(
                "Audit append failed for {} {} (action {:?}): {:?}.",
                entity_type,
                entity_id,
                action,
                e
            );
        }
    }

    /// View logging is advisory: the append runs on a detached task after the
    /// response is produced, and completeness is best-effort.
    pub fn record_view(&self, actor_id: &Uuid, entity_type: EntityType, entity_id: &Uuid, metadata: Value) {
        let store = Arc::clone(&self.store);
        let entry = ActivityLogEntry::builder()
            .account_id(*actor_id)
            .action(ActivityAction::View)
            .entity_type(entity_type)
            .entity_id(*entity_id)
            .metadata(metadata)
            .build();

        tokio::spawn(async move {
            if let Err(e) = store.append(&entry).await {
                log::error!(
                    "View audit append failed for {} {}: {:?}.",
                    entry.entity_type,
                    entry.entity_id,
                    e
                );
            }
        });
    }
}
