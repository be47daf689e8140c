//! Job status and cleanup over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use roster_api_models::JobStatusResponse;
use roster_core::{CatalogError, EntityKind, JobStatus, JobStatusSource};
use tracing::{debug, instrument};

use crate::HttpTransport;

/// [`JobStatusSource`] for one job behind the `/v1/jobs` endpoints.
#[derive(Debug, Clone)]
pub struct HttpJobStatus {
    transport: Arc<HttpTransport>,
    job_id: String,
    kind: EntityKind,
}

impl HttpJobStatus {
    /// Adapter for `job_id`; records reported without a kind are treated as
    /// `kind`.
    #[must_use]
    pub fn new(transport: Arc<HttpTransport>, job_id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            transport,
            job_id: job_id.into(),
            kind,
        }
    }
}

#[async_trait]
impl JobStatusSource for HttpJobStatus {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    #[instrument(name = "jobs.status", skip_all, fields(job = %self.job_id))]
    async fn fetch_status(&self) -> Result<JobStatus, CatalogError> {
        const OPERATION: &str = "jobs.status";
        let url = self
            .transport
            .url(OPERATION, &format!("/v1/jobs/{}/status", self.job_id))?;
        let request = self.transport.client().get(url);
        let response: JobStatusResponse = self.transport.execute(OPERATION, request).await?;
        let status = response
            .into_status(self.kind)
            .map_err(|err| CatalogError::Decode {
                operation: OPERATION,
                message: err.to_string(),
            })?;
        debug!(
            queued = status.progress.queued_count,
            deltas = status.result.deltas.len(),
            "job status received"
        );
        Ok(status)
    }

    #[instrument(name = "jobs.cleanup", skip_all, fields(job = %self.job_id))]
    async fn cleanup(&self) -> Result<(), CatalogError> {
        const OPERATION: &str = "jobs.cleanup";
        let url = self
            .transport
            .url(OPERATION, &format!("/v1/jobs/{}/cleanup", self.job_id))?;
        let request = self.transport.client().post(url);
        self.transport.dispatch(OPERATION, request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HEADER_REQUEST_ID;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use roster_core::StableId;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    fn job_for(server: &MockServer) -> HttpJobStatus {
        let transport = HttpTransport::new(
            Url::parse(&server.base_url()).expect("mock url"),
            None,
            Duration::from_secs(5),
        )
        .expect("transport");
        HttpJobStatus::new(transport.shared(), "job-9", EntityKind::Item)
    }

    #[tokio::test]
    async fn status_is_normalised_at_the_boundary() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/jobs/job-9/status")
                .header_exists(HEADER_REQUEST_ID);
            then.status(200).json_body(json!({
                "queuedCount": 0,
                "completedPercentage": 100,
                "statusSummary": {"done": 1},
                "records": {"confirmedId": 42, "status": "done"}
            }));
        });

        let status = job_for(&server).fetch_status().await.expect("status");
        mock.assert();
        assert!(status.progress.is_complete());
        assert_eq!(status.result.deltas[0].id, StableId::new("42"));
        assert_eq!(status.result.deltas[0].kind, EntityKind::Item);
    }

    #[tokio::test]
    async fn stable_id_records_are_kept() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v1/jobs/job-9/status");
            then.status(200).json_body(json!({
                "queuedCount": 1,
                "completedPercentage": 50,
                "records": [{"stableId": "42", "status": "done"}]
            }));
        });

        let status = job_for(&server).fetch_status().await.expect("status");
        assert!(!status.progress.is_complete());
        assert_eq!(status.result.deltas.len(), 1);
        assert_eq!(status.result.deltas[0].id, StableId::new("42"));
        assert_eq!(status.result.deltas[0].fields.get_str("status"), Some("done"));
    }

    #[tokio::test]
    async fn cleanup_reports_failures() {
        let server = MockServer::start_async().await;
        let ok = server.mock(|when, then| {
            when.method(POST).path("/v1/jobs/job-9/cleanup");
            then.status(204);
        });
        job_for(&server).cleanup().await.expect("cleanup succeeds");
        ok.assert();

        let failing = MockServer::start_async().await;
        failing.mock(|when, then| {
            when.method(POST).path("/v1/jobs/job-9/cleanup");
            then.status(404).body("no such job");
        });
        let err = job_for(&failing).cleanup().await.unwrap_err();
        assert_eq!(
            err,
            CatalogError::Status {
                operation: "jobs.cleanup",
                status: 404,
                message: "no such job".into(),
            }
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let transport = HttpTransport::new(
            Url::parse("http://127.0.0.1:9/").expect("url"),
            None,
            Duration::from_millis(200),
        )
        .expect("transport");
        let job = HttpJobStatus::new(transport.shared(), "job-1", EntityKind::Unit);
        let err = job.fetch_status().await.unwrap_err();
        assert!(matches!(err, CatalogError::Transport { operation: "jobs.status", .. }));
    }
}
