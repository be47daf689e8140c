//! Optimistic inserts into the primary collection with rollback and
//! promotion.
//!
//! Each operation is a single synchronous mutation of the collection, so a
//! reader never observes a half-applied insert.

use tracing::debug;

use crate::collection::PrimaryCollection;
use crate::entity::{Entity, Fields};
use crate::id::{Id, StableId, TempToken};

/// Reference to an optimistic row, keyed by its temporary token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptimisticHandle(TempToken);

impl OptimisticHandle {
    /// Token of the optimistic row.
    #[must_use]
    pub const fn token(self) -> TempToken {
        self.0
    }

    fn id(self) -> Id {
        Id::Temporary(self.0)
    }
}

/// Append a copy of a staged entity marked as optimistic. Returns `None` for
/// entities that already carry a server id.
pub fn apply_insert(collection: &mut PrimaryCollection, entity: &Entity) -> Option<OptimisticHandle> {
    let token = entity.id.as_temporary()?;
    let mut row = entity.clone();
    row.is_staged = false;
    row.is_optimistic = true;
    collection.push(row);
    Some(OptimisticHandle(token))
}

/// Remove exactly the row inserted under `handle`. A no-op once the row has
/// been promoted or already removed.
pub fn rollback(collection: &mut PrimaryCollection, handle: OptimisticHandle) -> bool {
    collection.remove(&handle.id()).is_some()
}

/// Promote the row behind `handle` to `stable_id`, overlaying `server_fields`.
///
/// When a row with `stable_id` already exists (a job tick merged it first)
/// the temporary row is dropped and its fields folded into the existing row.
/// When the temporary row is gone, `fallback` seeds the confirmed record.
/// Returns the confirmed entity as stored.
pub fn confirm(
    collection: &mut PrimaryCollection,
    handle: OptimisticHandle,
    fallback: &Entity,
    stable_id: StableId,
    server_fields: &Fields,
) -> Entity {
    let temp_id = handle.id();
    let stable = Id::Stable(stable_id.clone());

    if collection.contains(&stable) {
        let staged_fields = collection
            .remove(&temp_id)
            .map_or_else(|| fallback.fields.clone(), |row| row.fields);
        if let Some(existing) = collection.get_mut(&stable) {
            let mut fields = staged_fields;
            fields.merge_from(&existing.fields);
            fields.merge_from(server_fields);
            existing.fields = fields;
            existing.is_optimistic = false;
            existing.is_staged = false;
            debug!(id = %stable_id, "promotion folded into existing row");
            return existing.clone();
        }
    }

    let mut fields = collection
        .get(&temp_id)
        .map_or_else(|| fallback.fields.clone(), |row| row.fields.clone());
    fields.merge_from(server_fields);
    let promoted = Entity::confirmed(stable_id, fallback.kind, fields);
    if !collection.replace(&temp_id, promoted.clone()) {
        collection.push(promoted.clone());
    }
    promoted
}
