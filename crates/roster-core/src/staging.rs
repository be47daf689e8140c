//! Client-side buffer of records awaiting submission.
//!
//! # Design
//! - Entries keep insertion order; every kind shares one allocator so a
//!   temporary token is never reused across batches.
//! - Values are normalised on write: strings are upper-cased unless the kind
//!   schema marks the field as verbatim.

use serde_json::Value;

use crate::entity::{Entity, Fields};
use crate::id::{IdentityAllocator, TempToken};
use crate::kind::EntityKind;

/// Normalise a single field value for `kind`.
#[must_use]
pub fn normalize_value(kind: EntityKind, field: &str, value: Value) -> Value {
    match value {
        Value::String(text) if !kind.schema().is_verbatim(field) => {
            Value::String(text.to_uppercase())
        }
        other => other,
    }
}

/// Normalise every field of a record for `kind`.
#[must_use]
pub fn normalize_fields(kind: EntityKind, fields: Fields) -> Fields {
    fields
        .into_inner()
        .into_iter()
        .map(|(name, value)| {
            let value = normalize_value(kind, &name, value);
            (name, value)
        })
        .collect()
}

/// Ordered staging buffer shared by all kinds.
#[derive(Debug, Default)]
pub struct StagingStore {
    allocator: IdentityAllocator,
    entries: Vec<Entity>,
}

impl StagingStore {
    /// Empty store with a fresh allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and assign it a temporary id. Callers run the
    /// duplicate guard first.
    pub fn add(&mut self, kind: EntityKind, fields: Fields) -> TempToken {
        let token = self.allocator.next_token();
        self.entries
            .push(Entity::staged(token, kind, normalize_fields(kind, fields)));
        token
    }

    /// Set one field of a staged record. Unknown tokens are ignored; returns
    /// whether a record was updated.
    pub fn update(&mut self, token: TempToken, field: &str, value: Value) -> bool {
        let Some(entity) = self.position(token).map(|index| &mut self.entries[index]) else {
            return false;
        };
        let value = normalize_value(entity.kind, field, value);
        entity.fields.insert(field, value);
        true
    }

    /// Remove a staged record.
    pub fn remove(&mut self, token: TempToken) -> Option<Entity> {
        self.position(token).map(|index| self.entries.remove(index))
    }

    /// Drop every staged record, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Drop the staged records of one kind.
    pub fn clear_kind(&mut self, kind: EntityKind) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entity| entity.kind != kind);
        before - self.entries.len()
    }

    /// Staged records of one kind in insertion order.
    #[must_use]
    pub fn list(&self, kind: EntityKind) -> Vec<&Entity> {
        self.entries
            .iter()
            .filter(|entity| entity.kind == kind)
            .collect()
    }

    /// Look up a staged record.
    #[must_use]
    pub fn get(&self, token: TempToken) -> Option<&Entity> {
        self.position(token).map(|index| &self.entries[index])
    }

    /// Iterate over every staged record.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entries.iter()
    }

    /// Total number of staged records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain the batch of one kind for submission.
    pub fn take(&mut self, kind: EntityKind) -> Vec<Entity> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entity| entity.kind == kind);
        self.entries = kept;
        taken
    }

    /// Put records back after a failed submission, ahead of anything staged
    /// since, keeping their original order. Records whose token is already
    /// staged or that carry a server id are skipped. Returns how many were
    /// restored.
    pub fn restore(&mut self, entities: Vec<Entity>) -> usize {
        let mut restored: Vec<Entity> = entities
            .into_iter()
            .filter(|entity| {
                entity
                    .id
                    .as_temporary()
                    .is_some_and(|token| self.position(token).is_none())
            })
            .map(|mut entity| {
                entity.is_staged = true;
                entity.is_optimistic = false;
                entity
            })
            .collect();
        let count = restored.len();
        restored.append(&mut self.entries);
        self.entries = restored;
        count
    }

    fn position(&self, token: TempToken) -> Option<usize> {
        self.entries
            .iter()
            .position(|entity| entity.id.as_temporary() == Some(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(name, value)| (*name, json!(value)))
            .collect()
    }

    #[test]
    fn add_uppercases_all_but_verbatim_fields() {
        let mut store = StagingStore::new();
        let token = store.add(
            EntityKind::Unit,
            fields(&[("name", "Law School"), ("website", "https://Law.example")]),
        );
        let entity = store.get(token).expect("staged entity");
        assert!(entity.is_staged);
        assert_eq!(entity.fields.get_str("name"), Some("LAW SCHOOL"));
        assert_eq!(
            entity.fields.get_str("website"),
            Some("https://Law.example")
        );
    }

    #[test]
    fn update_normalizes_and_ignores_unknown_tokens() {
        let mut store = StagingStore::new();
        let token = store.add(EntityKind::Unit, fields(&[("name", "a")]));
        assert!(store.update(token, "name", json!("renamed")));
        assert_eq!(
            store.get(token).and_then(|e| e.fields.get_str("name")),
            Some("RENAMED")
        );

        let mut other = StagingStore::new();
        let foreign = other.add(EntityKind::Unit, fields(&[("name", "b")]));
        assert!(!store.update(foreign, "name", json!("ignored")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn take_drains_one_kind_and_restore_prepends_in_order() {
        let mut store = StagingStore::new();
        let a = store.add(EntityKind::Unit, fields(&[("name", "a")]));
        let g = store.add(
            EntityKind::Grouping,
            fields(&[("name", "g"), ("unit", "a")]),
        );
        let b = store.add(EntityKind::Unit, fields(&[("name", "b")]));

        let batch = store.take(EntityKind::Unit);
        assert_eq!(batch.len(), 2);
        assert_eq!(store.len(), 1);

        let c = store.add(EntityKind::Unit, fields(&[("name", "c")]));
        assert_eq!(store.restore(batch), 2);

        let order: Vec<_> = store
            .iter()
            .filter_map(|entity| entity.id.as_temporary())
            .collect();
        assert_eq!(order, vec![a, b, g, c]);
    }

    #[test]
    fn restore_skips_tokens_already_staged() {
        let mut store = StagingStore::new();
        let a = store.add(EntityKind::Unit, fields(&[("name", "a")]));
        let copy = store.get(a).cloned().expect("staged entity");
        assert_eq!(store.restore(vec![copy]), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_kind_and_remove() {
        let mut store = StagingStore::new();
        let a = store.add(EntityKind::Unit, fields(&[("name", "a")]));
        store.add(EntityKind::Item, fields(&[("name", "i"), ("grouping", "g")]));
        store.add(EntityKind::Item, fields(&[("name", "j"), ("grouping", "g")]));

        assert_eq!(store.clear_kind(EntityKind::Item), 2);
        assert!(store.remove(a).is_some());
        assert!(store.remove(a).is_none());
        assert!(store.is_empty());
        assert_eq!(store.clear(), 0);
    }
}
