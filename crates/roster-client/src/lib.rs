#![forbid(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(unreachable_pub, clippy::all, clippy::pedantic, clippy::nursery)]

//! `reqwest` implementation of the Roster service traits.
//!
//! # Design
//! - One [`HttpTransport`] holds the shared client, base URL and credential;
//!   the catalog and job adapters borrow it through an `Arc`.
//! - Non-success responses are classified from RFC9457 problem documents into
//!   [`CatalogError::Status`]; bodies are decoded separately so decode
//!   failures stay distinguishable from transport failures.

mod catalog;
mod jobs;
mod problem;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use roster_core::CatalogError;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

pub use catalog::HttpCatalogClient;
pub use jobs::HttpJobStatus;
pub use problem::classify_problem;

/// Header carrying the `key_id:secret` credential.
pub const HEADER_API_KEY: &str = "x-roster-api-key";
/// Header carrying the per-process request identifier.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Rejected API key input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The value has no `:` separator.
    #[error("API key must be provided as key_id:secret")]
    Malformed,
    /// One of the components is blank.
    #[error("API key components cannot be empty strings")]
    Empty,
}

/// API key credential sent with every request.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyCredential {
    key_id: String,
    secret: String,
}

impl ApiKeyCredential {
    /// Parse a `key_id:secret` pair.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the separator is missing or either
    /// component is blank.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let (key_id, secret) = raw.trim().split_once(':').ok_or(CredentialError::Malformed)?;
        if key_id.trim().is_empty() || secret.trim().is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(Self {
            key_id: key_id.trim().to_string(),
            secret: secret.trim().to_string(),
        })
    }

    /// Key identifier (safe to log).
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Value for the [`HEADER_API_KEY`] header.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("{}:{}", self.key_id, self.secret)
    }
}

impl std::fmt::Debug for ApiKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyCredential")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Shared HTTP plumbing for the catalog and job adapters.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    api_key: Option<ApiKeyCredential>,
}

impl HttpTransport {
    /// Build a transport with a request timeout and a fresh request id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Transport`] when the HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: Url,
        api_key: Option<ApiKeyCredential>,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let request_id = Uuid::new_v4().simple().to_string();
        let mut default_headers = HeaderMap::new();
        let value = HeaderValue::from_str(&request_id).map_err(|err| CatalogError::Transport {
            operation: "client.build",
            message: err.to_string(),
        })?;
        default_headers.insert(HEADER_REQUEST_ID, value);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|err| CatalogError::Transport {
                operation: "client.build",
                message: format!("failed to build HTTP client: {err}"),
            })?;
        debug!(%base_url, %request_id, "catalog transport ready");
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Wrap in an `Arc` for sharing between adapters.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn url(&self, operation: &'static str, path: &str) -> Result<Url, CatalogError> {
        self.base_url
            .join(path)
            .map_err(|err| CatalogError::Transport {
                operation,
                message: format!("invalid base URL: {err}"),
            })
    }

    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(credential) => request.header(HEADER_API_KEY, credential.header_value()),
            None => request,
        }
    }

    pub(crate) const fn client(&self) -> &Client {
        &self.client
    }

    /// Send `request`, classify failures and decode the JSON body.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, CatalogError> {
        let response = self.dispatch(operation, request).await?;
        let bytes = response.bytes().await.map_err(|err| CatalogError::Transport {
            operation,
            message: err.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|err| CatalogError::Decode {
            operation,
            message: err.to_string(),
        })
    }

    /// Send `request` and classify failures, ignoring the body.
    pub(crate) async fn dispatch(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, CatalogError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| CatalogError::Transport {
                operation,
                message: err.to_string(),
            })?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify_problem(operation, response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_parsing_trims_and_validates() {
        let credential = ApiKeyCredential::parse("  ops : s3cret ").expect("valid key");
        assert_eq!(credential.key_id(), "ops");
        assert_eq!(credential.header_value(), "ops:s3cret");
        assert!(!format!("{credential:?}").contains("s3cret"));

        assert_eq!(
            ApiKeyCredential::parse("no-separator"),
            Err(CredentialError::Malformed)
        );
        assert_eq!(ApiKeyCredential::parse(" :secret"), Err(CredentialError::Empty));
    }

    #[test]
    fn url_joins_paths_against_base() {
        let transport = HttpTransport::new(
            Url::parse("http://127.0.0.1:9/").expect("url"),
            None,
            Duration::from_secs(1),
        )
        .expect("transport");
        let url = transport
            .url("catalog.list", "/v1/catalog/units")
            .expect("joined");
        assert_eq!(url.as_str(), "http://127.0.0.1:9/v1/catalog/units");
    }
}
