use common::types::{AttributeSet, FailureReason, TrackedEntity, UpsertOutcome};

use crate::orion_client::{ContextStore, PatchStatus};

/// Update-or-create of one entity against the context store.
///
/// Only a 404 on the partial update leads to a create. Any other failure is
/// reported as-is so schema errors are never masked as a missing record.
/// Nothing is retried here; the next cycle is the retry.
pub async fn upsert(
    store: &dyn ContextStore,
    entity: &TrackedEntity,
    attrs: &AttributeSet,
) -> UpsertOutcome {
    match store.patch_attrs(&entity.id, attrs).await {
        Ok(PatchStatus::Patched) => UpsertOutcome::Updated,
        Ok(PatchStatus::NotFound) => {
            tracing::debug!("[reconcile] {} not found, creating", entity.id);
            match store.create_entity(entity, attrs).await {
                Ok(()) => UpsertOutcome::Created,
                Err(e) => UpsertOutcome::Failed(FailureReason::from(e)),
            }
        }
        Err(e) => UpsertOutcome::Failed(FailureReason::from(e)),
    }
}
