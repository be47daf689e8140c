//! Shared error types and the application context handed to command handlers.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use roster_client::{ApiKeyCredential, HttpCatalogClient, HttpTransport};
use roster_config::{RosterConfig, parse_api_url};
use roster_core::{CatalogError, PollerOptions, StageError, SubmitError, Workspace};
use roster_events::EventBus;
use roster_telemetry::Metrics;

use crate::cli::OutputFormat;
use crate::output::render_notification;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Client-side rejections (bad payload, conflicts) are validation errors;
/// everything else is an operational failure.
pub(crate) fn catalog_error(err: &CatalogError) -> CliError {
    match err {
        CatalogError::Status {
            status: 400 | 409 | 422,
            ..
        } => CliError::validation(err.detail()),
        _ => CliError::failure(anyhow!(err.detail())),
    }
}

pub(crate) fn stage_error(index: usize, err: &StageError) -> CliError {
    CliError::validation(format!("record {index}: {}", err.reason()))
}

pub(crate) fn submit_error(err: &SubmitError) -> CliError {
    match err {
        SubmitError::Conflicts { kind, names } => CliError::validation(format!(
            "{kind} submission rejected; duplicate records: {}",
            names.join(", ")
        )),
        SubmitError::Remote {
            kind,
            restored,
            source,
        } => {
            let base = catalog_error(source);
            let message = format!(
                "{kind} submission failed ({restored} records restored to staging): {}",
                base.display_message()
            );
            match base {
                CliError::Validation(_) => CliError::validation(message),
                CliError::Failure(_) => CliError::failure(anyhow!(message)),
            }
        }
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) catalog: Arc<HttpCatalogClient>,
    pub(crate) bus: EventBus,
    pub(crate) metrics: Metrics,
    pub(crate) output: OutputFormat,
    pub(crate) poll: PollerOptions,
    printed_through: Arc<AtomicU64>,
}

impl AppContext {
    /// Build the transport, notification bus and metrics from configuration.
    pub(crate) fn from_config(config: &RosterConfig, output: OutputFormat) -> CliResult<Self> {
        let base_url = parse_api_url(&config.api.url)
            .map_err(|err| CliError::validation(format!("configuration error: {}", err.detail())))?;
        let api_key = config
            .api
            .api_key
            .as_deref()
            .map(ApiKeyCredential::parse)
            .transpose()
            .map_err(|err| CliError::validation(err.to_string()))?;
        let transport = HttpTransport::new(base_url, api_key, config.api.timeout())
            .map_err(|err| catalog_error(&err))?
            .shared();
        let metrics = Metrics::new()
            .map_err(|err| CliError::failure(anyhow!("failed to initialise metrics: {err}")))?;

        Ok(Self {
            catalog: Arc::new(HttpCatalogClient::new(Arc::clone(&transport))),
            transport,
            bus: EventBus::new(),
            metrics,
            output,
            poll: PollerOptions::new(config.polling.interval(), config.polling.failure_threshold),
            printed_through: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Fresh workspace wired to this context's bus and metrics.
    pub(crate) fn workspace(&self) -> Workspace {
        Workspace::new()
            .with_events(self.bus.clone())
            .with_metrics(self.metrics.clone())
    }

    /// Print notifications published since the previous flush to stderr.
    pub(crate) fn flush_notifications(&self) {
        let since = self.printed_through.load(Ordering::Relaxed);
        let mut stream = self.bus.subscribe(Some(since));
        for envelope in stream.drain_ready() {
            eprintln!("{}", render_notification(&envelope.event));
            self.printed_through.fetch_max(envelope.id, Ordering::Relaxed);
        }
    }
}
