//! Catalog list and bulk-create over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use roster_api_models::{BulkCreateRequest, ModelError, RecordListResponse};
use roster_core::{CatalogError, CatalogService, ConfirmedRecord, EntityKind, Fields};
use tracing::{info, instrument, warn};

use crate::HttpTransport;

/// [`CatalogService`] backed by the `/v1/catalog` endpoints.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    transport: Arc<HttpTransport>,
}

impl HttpCatalogClient {
    /// Adapter sharing `transport`.
    #[must_use]
    pub const fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }
}

fn decode_error(operation: &'static str, err: &ModelError) -> CatalogError {
    CatalogError::Decode {
        operation,
        message: err.to_string(),
    }
}

#[async_trait]
impl CatalogService for HttpCatalogClient {
    #[instrument(name = "catalog.bulk_create", skip_all, fields(kind = %kind, count = records.len()))]
    async fn bulk_create(
        &self,
        kind: EntityKind,
        records: &[Fields],
    ) -> Result<Vec<ConfirmedRecord>, CatalogError> {
        const OPERATION: &str = "catalog.bulk_create";
        let url = self.transport.url(
            OPERATION,
            &format!("/v1/catalog/{}/bulk", kind.collection_path()),
        )?;
        let body = BulkCreateRequest::new(kind, records);
        let request = self.transport.client().post(url).json(&body);
        let response: RecordListResponse = self.transport.execute(OPERATION, request).await?;
        let identified = response.into_identified();
        if !identified.missing_ids.is_empty() {
            warn!(
                positions = ?identified.missing_ids,
                "bulk create response carried records without an id"
            );
        }
        info!(confirmed = identified.records.len(), "bulk create answered");
        Ok(identified.records)
    }

    #[instrument(name = "catalog.list", skip_all, fields(kind = %kind))]
    async fn list(&self, kind: EntityKind) -> Result<Vec<ConfirmedRecord>, CatalogError> {
        const OPERATION: &str = "catalog.list";
        let url = self
            .transport
            .url(OPERATION, &format!("/v1/catalog/{}", kind.collection_path()))?;
        let request = self.transport.client().get(url);
        let response: RecordListResponse = self.transport.execute(OPERATION, request).await?;
        response
            .into_confirmed()
            .map_err(|err| decode_error(OPERATION, &err))
    }
}
