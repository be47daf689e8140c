//! Merge per-record poll deltas into the primary collection.

use tracing::trace;

use crate::collection::PrimaryCollection;
use crate::entity::Entity;
use crate::id::Id;
use crate::job::PollResult;

/// Counts of what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Existing rows whose fields changed.
    pub updated: usize,
    /// Rows appended because their id was unknown.
    pub appended: usize,
    /// Deltas that changed nothing.
    pub unchanged: usize,
}

impl MergeSummary {
    /// Whether the merge modified the collection.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.updated > 0 || self.appended > 0
    }
}

/// Apply `result` to `collection`. Each delta is shallow-merged into the row
/// with the same stable id, or appended as a new row. Rows not named by a
/// delta are never touched, so applying the same result twice is a no-op the
/// second time.
pub fn merge(collection: &mut PrimaryCollection, result: &PollResult) -> MergeSummary {
    let mut summary = MergeSummary::default();
    for delta in &result.deltas {
        let id = Id::Stable(delta.id.clone());
        if let Some(existing) = collection.get_mut(&id) {
            if existing.fields.merge_from(&delta.fields) {
                summary.updated += 1;
            } else {
                summary.unchanged += 1;
            }
            continue;
        }
        trace!(id = %delta.id, kind = %delta.kind, "appending record reported by job");
        collection.push(Entity::confirmed(
            delta.id.clone(),
            delta.kind,
            delta.fields.clone(),
        ));
        summary.appended += 1;
    }
    summary
}
