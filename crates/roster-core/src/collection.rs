//! Primary collection of confirmed and in-flight records.
//!
//! # Design
//! - Entities are stored by id with a separate ordered id list, so updates
//!   by identity never disturb the order of unrelated rows.
//! - Every mutation touches the map and the order list in one call.

use std::collections::{HashMap, HashSet};

use crate::entity::Entity;
use crate::id::Id;
use crate::kind::EntityKind;

/// Authoritative in-memory list of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryCollection {
    by_id: HashMap<Id, Entity>,
    order: Vec<Id>,
}

impl PrimaryCollection {
    /// Empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: &Id) -> Option<&Entity> {
        self.by_id.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &Id) -> Option<&mut Entity> {
        self.by_id.get_mut(id)
    }

    /// Whether a record with `id` is present.
    #[must_use]
    pub fn contains(&self, id: &Id) -> bool {
        self.by_id.contains_key(id)
    }

    /// Records in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Records of one kind in display order.
    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.iter().filter(move |entity| entity.kind == kind)
    }

    /// Snapshot of the ids currently present.
    #[must_use]
    pub fn id_set(&self) -> HashSet<Id> {
        self.order.iter().cloned().collect()
    }

    /// Records still awaiting confirmation.
    #[must_use]
    pub fn optimistic_count(&self) -> usize {
        self.by_id
            .values()
            .filter(|entity| entity.is_optimistic)
            .count()
    }

    /// Append a record. If its id is already present the existing record is
    /// replaced in place and `false` is returned.
    pub fn push(&mut self, entity: Entity) -> bool {
        let id = entity.id.clone();
        if self.by_id.insert(id.clone(), entity).is_some() {
            return false;
        }
        self.order.push(id);
        true
    }

    /// Remove a record by id.
    pub fn remove(&mut self, id: &Id) -> Option<Entity> {
        let removed = self.by_id.remove(id)?;
        self.order.retain(|candidate| candidate != id);
        Some(removed)
    }

    /// Swap the record stored under `old` for `entity` at the same position.
    /// Returns `false` when `old` is absent.
    pub(crate) fn replace(&mut self, old: &Id, entity: Entity) -> bool {
        let Some(slot) = self.order.iter().position(|candidate| candidate == old) else {
            return false;
        };
        self.by_id.remove(old);
        self.order[slot] = entity.id.clone();
        self.by_id.insert(entity.id.clone(), entity);
        true
    }

    /// Replace the confirmed records of `kind` with a fresh server listing.
    /// Optimistic records and other kinds are left alone; listed records that
    /// already exist are refreshed in place.
    pub fn replace_confirmed(&mut self, kind: EntityKind, records: Vec<Entity>) {
        let fresh: HashSet<Id> = records.iter().map(|entity| entity.id.clone()).collect();
        let stale: Vec<Id> = self
            .of_kind(kind)
            .filter(|entity| !entity.is_optimistic && !fresh.contains(&entity.id))
            .map(|entity| entity.id.clone())
            .collect();
        for id in &stale {
            self.remove(id);
        }
        for record in records {
            self.push(record);
        }
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.by_id.clear();
        self.order.clear();
    }
}
