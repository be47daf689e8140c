//! Error types for staging, submission and remote catalog access.
//!
//! # Design
//! - Keep error messages constant while carrying context fields for callers.
//! - Local validation failures never wrap a network error and vice versa.

use thiserror::Error;

use crate::guard::DuplicateConflict;
use crate::kind::EntityKind;

/// Failure reported by a remote catalog or job-status endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// The request never produced a response (connection, timeout, TLS).
    #[error("catalog request failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Transport failure detail.
        message: String,
    },
    /// The service answered with a non-success status.
    #[error("catalog rejected the request")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Problem detail or response body.
        message: String,
    },
    /// The response body did not match the expected contract.
    #[error("catalog response could not be decoded")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Decoder failure detail.
        message: String,
    },
}

impl CatalogError {
    /// Operation that produced the failure.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. } => operation,
        }
    }

    /// One-line description suitable for a notification.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Transport { operation, message } | Self::Decode { operation, message } => {
                format!("{operation}: {message}")
            }
            Self::Status {
                operation,
                status,
                message,
            } => format!("{operation}: {message} (status {status})"),
        }
    }
}

/// Local validation failure raised before a record reaches staging.
#[derive(Debug, Error)]
pub enum StageError {
    /// A field required by the kind schema is absent or blank.
    #[error("missing required field")]
    MissingField {
        /// Entity kind being staged.
        kind: EntityKind,
        /// Name of the missing field.
        field: &'static str,
    },
    /// The record collides with a staged or confirmed record.
    #[error("duplicate record")]
    Duplicate {
        /// Entity kind being staged.
        kind: EntityKind,
        /// Conflicting record details.
        conflict: Box<DuplicateConflict>,
    },
}

impl StageError {
    /// Human-readable reason including the offending field or record.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::MissingField { kind, field } => {
                format!("{kind} record is missing required field '{field}'")
            }
            Self::Duplicate { conflict, .. } => conflict.to_string(),
        }
    }
}

/// Failure of a whole bulk submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Late duplicate checks failed; nothing was sent and staging is intact.
    #[error("submission rejected because of duplicate records")]
    Conflicts {
        /// Entity kind being submitted.
        kind: EntityKind,
        /// Labels of the offending records.
        names: Vec<String>,
    },
    /// The bulk call failed outright; the batch was rolled back and restored.
    #[error("bulk submission failed")]
    Remote {
        /// Entity kind being submitted.
        kind: EntityKind,
        /// Number of records restored to staging.
        restored: usize,
        /// Underlying catalog failure.
        #[source]
        source: CatalogError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_error_detail_includes_status() {
        let err = CatalogError::Status {
            operation: "catalog.bulk_create",
            status: 503,
            message: "maintenance".into(),
        };
        assert_eq!(err.operation(), "catalog.bulk_create");
        assert_eq!(
            err.detail(),
            "catalog.bulk_create: maintenance (status 503)"
        );
        assert_eq!(err.to_string(), "catalog rejected the request");
    }

    #[test]
    fn missing_field_reason_names_field() {
        let err = StageError::MissingField {
            kind: EntityKind::SubUnit,
            field: "parent",
        };
        assert_eq!(
            err.reason(),
            "sub-unit record is missing required field 'parent'"
        );
    }
}
