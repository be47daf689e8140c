//! Service traits for the remote catalog and job-status endpoints.
//!
//! The HTTP implementation lives in `roster-client`; tests use in-memory
//! fakes.

use async_trait::async_trait;

use crate::entity::Fields;
use crate::error::CatalogError;
use crate::id::StableId;
use crate::job::JobStatus;
use crate::kind::EntityKind;

/// A record as persisted by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedRecord {
    /// Server-assigned id.
    pub id: StableId,
    /// Stored fields, including any server-derived ones.
    pub fields: Fields,
}

/// Bulk create and list access to the catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Create `records` of `kind` in one call. The response order is not
    /// guaranteed to match the request.
    async fn bulk_create(
        &self,
        kind: EntityKind,
        records: &[Fields],
    ) -> Result<Vec<ConfirmedRecord>, CatalogError>;

    /// List the persisted records of `kind`.
    async fn list(&self, kind: EntityKind) -> Result<Vec<ConfirmedRecord>, CatalogError>;
}

/// Status and cleanup access for one background job.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Identifier of the job being observed.
    fn job_id(&self) -> &str;

    /// Fetch the current status.
    async fn fetch_status(&self) -> Result<JobStatus, CatalogError>;

    /// Release server-side resources once the job is complete.
    async fn cleanup(&self) -> Result<(), CatalogError>;
}
