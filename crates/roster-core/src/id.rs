//! Record identities: client-minted temporary tokens and server-assigned ids.
//!
//! # Design
//! - The two id spaces are separate enum variants, so classification never
//!   depends on inspecting the string form of an id.
//! - Temporary tokens carry a per-allocator nonce; tokens from two allocators
//!   never compare equal even when their sequence numbers match.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-generated identity for a record that has not been persisted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TempToken {
    session: Uuid,
    seq: u64,
}

impl TempToken {
    /// Sequence number within the allocating session.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Nonce of the allocator that minted this token.
    #[must_use]
    pub const fn session(&self) -> Uuid {
        self.session
    }
}

impl fmt::Display for TempToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmp-{}", self.seq)
    }
}

/// Server-assigned identity of a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    /// Wrap a server identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StableId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StableId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of an entity in staging or in the primary collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Id {
    /// Not yet confirmed by the server.
    Temporary(TempToken),
    /// Assigned by the server.
    Stable(StableId),
}

impl Id {
    /// Classify this identity.
    #[must_use]
    pub const fn class(&self) -> IdClass {
        match self {
            Self::Temporary(_) => IdClass::Temporary,
            Self::Stable(_) => IdClass::Stable,
        }
    }

    /// Returns the temporary token when the id has not been promoted.
    #[must_use]
    pub const fn as_temporary(&self) -> Option<TempToken> {
        match self {
            Self::Temporary(token) => Some(*token),
            Self::Stable(_) => None,
        }
    }

    /// Returns the server id once the record is confirmed.
    #[must_use]
    pub const fn as_stable(&self) -> Option<&StableId> {
        match self {
            Self::Stable(id) => Some(id),
            Self::Temporary(_) => None,
        }
    }

    /// Whether the id is a client-minted temporary token.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary(token) => token.fmt(f),
            Self::Stable(id) => id.fmt(f),
        }
    }
}

impl From<TempToken> for Id {
    fn from(token: TempToken) -> Self {
        Self::Temporary(token)
    }
}

impl From<StableId> for Id {
    fn from(id: StableId) -> Self {
        Self::Stable(id)
    }
}

/// Which id space an [`Id`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdClass {
    /// Client-minted, pending confirmation.
    Temporary,
    /// Server-assigned.
    Stable,
}

/// Mints temporary identities that cannot collide with each other or with
/// server ids.
#[derive(Debug, Clone)]
pub struct IdentityAllocator {
    session: Uuid,
    next_seq: u64,
}

impl IdentityAllocator {
    /// Create an allocator with a fresh session nonce.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Uuid::new_v4(),
            next_seq: 1,
        }
    }

    /// Mint the next temporary token.
    pub const fn next_token(&mut self) -> TempToken {
        let token = TempToken {
            session: self.session,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        token
    }

    /// Mint the next temporary id.
    pub const fn next_temporary(&mut self) -> Id {
        Id::Temporary(self.next_token())
    }

    /// Classify an id by its variant.
    #[must_use]
    pub const fn classify(id: &Id) -> IdClass {
        id.class()
    }
}

impl Default for IdentityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
