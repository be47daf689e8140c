//! Entity kinds and their per-kind field schemas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::Fields;

/// The record kinds managed by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// Top-level organisational unit.
    Unit,
    /// Unit nested below a parent unit.
    SubUnit,
    /// Grouping of items owned by a unit.
    Grouping,
    /// Individual item inside a grouping.
    Item,
    /// Person identified by email.
    Person,
}

/// Field layout for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSchema {
    /// Fields forming the composite natural key, in key order.
    pub key_fields: &'static [&'static str],
    /// Fields that must be present and non-blank before staging.
    pub required_fields: &'static [&'static str],
    /// Fields stored exactly as typed (no upper-casing).
    pub verbatim_fields: &'static [&'static str],
}

const UNIT_SCHEMA: KindSchema = KindSchema {
    key_fields: &["name"],
    required_fields: &["name"],
    verbatim_fields: &["website"],
};

const SUB_UNIT_SCHEMA: KindSchema = KindSchema {
    key_fields: &["name", "parent"],
    required_fields: &["name", "parent"],
    verbatim_fields: &["website"],
};

const GROUPING_SCHEMA: KindSchema = KindSchema {
    key_fields: &["name", "unit"],
    required_fields: &["name", "unit"],
    verbatim_fields: &[],
};

const ITEM_SCHEMA: KindSchema = KindSchema {
    key_fields: &["name", "grouping"],
    required_fields: &["name", "grouping"],
    verbatim_fields: &["link"],
};

const PERSON_SCHEMA: KindSchema = KindSchema {
    key_fields: &["email"],
    required_fields: &["email", "full_name"],
    verbatim_fields: &["email", "profile_url"],
};

impl KindSchema {
    /// Whether `field` keeps its value exactly as typed.
    #[must_use]
    pub fn is_verbatim(&self, field: &str) -> bool {
        self.verbatim_fields.contains(&field)
    }

    /// First required field that is absent, null or blank.
    #[must_use]
    pub fn missing_required(&self, fields: &Fields) -> Option<&'static str> {
        self.required_fields
            .iter()
            .copied()
            .find(|field| fields.text(field).trim().is_empty())
    }
}

impl EntityKind {
    /// Every kind, in dependency order.
    pub const ALL: [Self; 5] = [
        Self::Unit,
        Self::SubUnit,
        Self::Grouping,
        Self::Item,
        Self::Person,
    ];

    /// Singular slug used in notifications and metrics labels.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::SubUnit => "sub-unit",
            Self::Grouping => "grouping",
            Self::Item => "item",
            Self::Person => "person",
        }
    }

    /// Collection path segment used by the catalog API.
    #[must_use]
    pub const fn collection_path(self) -> &'static str {
        match self {
            Self::Unit => "units",
            Self::SubUnit => "sub-units",
            Self::Grouping => "groupings",
            Self::Item => "items",
            Self::Person => "people",
        }
    }

    /// Field schema for this kind.
    #[must_use]
    pub const fn schema(self) -> &'static KindSchema {
        match self {
            Self::Unit => &UNIT_SCHEMA,
            Self::SubUnit => &SUB_UNIT_SCHEMA,
            Self::Grouping => &GROUPING_SCHEMA,
            Self::Item => &ITEM_SCHEMA,
            Self::Person => &PERSON_SCHEMA,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Raised when a string names no known kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown entity kind")]
pub struct ParseKindError {
    /// The rejected input.
    pub value: String,
}

impl FromStr for EntityKind {
    type Err = ParseKindError;

    /// Accepts the singular slug or the collection path, ignoring case and
    /// `_`/`-` differences.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug() == normalized || kind.collection_path() == normalized)
            .ok_or_else(|| ParseKindError {
                value: value.to_string(),
            })
    }
}
