//! Entity records, their field maps and derived composite keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{Id, StableId, TempToken};
use crate::kind::EntityKind;

/// Ordered map of field name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, Value>);

impl Fields {
    /// Empty field map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Borrow a raw field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Borrow a field value when it is a JSON string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Textual form of a field: strings as-is, `null`/absent as empty, other
    /// values in their JSON rendering.
    #[must_use]
    pub fn text(&self, name: &str) -> String {
        match self.0.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    /// Remove a field.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Whether the field is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterate over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow-merge `other` into `self`: fields present in `other` replace
    /// ours, absent fields are left untouched. Returns whether anything
    /// changed.
    pub fn merge_from(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (name, value) in &other.0 {
            if self.0.get(name) != Some(value) {
                self.0.insert(name.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Consume the map into its inner representation.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for Fields {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A catalog record in staging or in the primary collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Temporary or server-assigned identity.
    pub id: Id,
    /// Record kind.
    pub kind: EntityKind,
    /// Kind-specific fields.
    pub fields: Fields,
    /// Held in staging, not yet submitted.
    pub is_staged: bool,
    /// Shown in the primary collection while awaiting confirmation.
    pub is_optimistic: bool,
}

impl Entity {
    /// A freshly staged record.
    #[must_use]
    pub const fn staged(token: TempToken, kind: EntityKind, fields: Fields) -> Self {
        Self {
            id: Id::Temporary(token),
            kind,
            fields,
            is_staged: true,
            is_optimistic: false,
        }
    }

    /// A record confirmed by the server.
    #[must_use]
    pub const fn confirmed(id: StableId, kind: EntityKind, fields: Fields) -> Self {
        Self {
            id: Id::Stable(id),
            kind,
            fields,
            is_staged: false,
            is_optimistic: false,
        }
    }

    /// Display label: `name`, then `full_name`, then the id.
    #[must_use]
    pub fn label(&self) -> String {
        ["name", "full_name", "email"]
            .iter()
            .map(|field| self.fields.text(field))
            .find(|text| !text.trim().is_empty())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Normalise one key component: trimmed and upper-cased.
#[must_use]
pub fn normalize_component(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Natural key of a record, derived from its kind's key fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    kind: EntityKind,
    parts: Vec<String>,
}

impl CompositeKey {
    /// Build a key, normalising every component.
    pub fn new<I, S>(kind: EntityKind, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            kind,
            parts: parts
                .into_iter()
                .map(|part| normalize_component(part.as_ref()))
                .collect(),
        }
    }

    /// Kind the key belongs to.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Normalised key components.
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join(" / "))
    }
}
