//! Duplicate detection over staged and confirmed records.
//!
//! # Design
//! - Keys come from a pluggable [`KeyExtractor`]; the default derives them
//!   from the kind schema.
//! - Checks are pure scans; the guard never mutates what it inspects.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::entity::{CompositeKey, Entity, Fields};
use crate::id::Id;
use crate::kind::EntityKind;

/// Derives the composite natural key of a record.
pub trait KeyExtractor: Send + Sync {
    /// Compute the key of `fields` for `kind`.
    fn composite_key(&self, kind: EntityKind, fields: &Fields) -> CompositeKey;
}

/// Key extractor reading the key fields declared by each kind's schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaKeys;

impl KeyExtractor for SchemaKeys {
    fn composite_key(&self, kind: EntityKind, fields: &Fields) -> CompositeKey {
        CompositeKey::new(
            kind,
            kind.schema()
                .key_fields
                .iter()
                .map(|field| fields.text(field)),
        )
    }
}

/// A candidate record collides with an existing one.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("'{key}' already exists")]
pub struct DuplicateConflict {
    /// Shared composite key.
    pub key: CompositeKey,
    /// The record already holding the key.
    pub existing: Entity,
}

/// Rejects records whose composite key is already taken.
#[derive(Clone)]
pub struct DuplicateGuard {
    extractor: Arc<dyn KeyExtractor>,
}

impl DuplicateGuard {
    /// Guard using a custom key extractor.
    #[must_use]
    pub fn new(extractor: impl KeyExtractor + 'static) -> Self {
        Self {
            extractor: Arc::new(extractor),
        }
    }

    /// Key of `fields` for `kind`.
    #[must_use]
    pub fn key_for(&self, kind: EntityKind, fields: &Fields) -> CompositeKey {
        self.extractor.composite_key(kind, fields)
    }

    /// Scan `staged` then `confirmed` for a record of the same kind sharing
    /// the candidate's key. The entity whose id equals `ignore` is skipped so
    /// a record never conflicts with itself.
    ///
    /// # Errors
    ///
    /// Returns the first conflicting record found.
    pub fn check<'a, S, C>(
        &self,
        kind: EntityKind,
        candidate: &Fields,
        staged: S,
        confirmed: C,
        ignore: Option<&Id>,
    ) -> Result<(), DuplicateConflict>
    where
        S: IntoIterator<Item = &'a Entity>,
        C: IntoIterator<Item = &'a Entity>,
    {
        let key = self.key_for(kind, candidate);
        staged
            .into_iter()
            .chain(confirmed)
            .filter(|entity| entity.kind == kind)
            .filter(|entity| ignore != Some(&entity.id))
            .find(|entity| self.key_for(kind, &entity.fields) == key)
            .map_or(Ok(()), |existing| {
                Err(DuplicateConflict {
                    key: key.clone(),
                    existing: existing.clone(),
                })
            })
    }
}

impl Default for DuplicateGuard {
    fn default() -> Self {
        Self::new(SchemaKeys)
    }
}

impl fmt::Debug for DuplicateGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicateGuard").finish_non_exhaustive()
    }
}
