//! Logging initialisation.
//!
//! # Design
//! - One global subscriber writing to stderr so stdout stays free for
//!   command output (tables, JSON, metrics).
//! - `RUST_LOG` wins over the configured level when it parses.
//! - The build revision is recorded once and attached to the first event.

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::error::{Result, TelemetryError};

/// Level used when neither `RUST_LOG` nor configuration provide one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] when a global subscriber is
/// already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    tracing_subscriber::registry()
        .with(output_layer(config.format))
        .with(level_filter(config.level))
        .try_init()
        .map_err(|source| TelemetryError::SubscriberInstall { source })?;

    tracing::debug!(build_sha = build_sha(), format = ?config.format, "logging initialised");
    Ok(())
}

/// Build revision recorded by [`init_logging`], `dev` before initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Inputs for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Fallback filter directive such as `info` or `roster_core=debug`.
    pub level: &'a str,
    /// Output format.
    pub format: LogFormat,
    /// Build revision.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: "dev",
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened.
    Json,
    /// Compact human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty for debug builds, JSON for release builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Map a configured format name; unrecognised names fall back to
/// [`LogFormat::infer`]. `None` means nothing was configured.
#[must_use]
pub fn log_format_from_config(value: Option<&str>) -> Option<LogFormat> {
    value.map(|value| match value.trim().to_ascii_lowercase().as_str() {
        "json" => LogFormat::Json,
        "pretty" | "text" | "compact" => LogFormat::Pretty,
        _ => LogFormat::infer(),
    })
}

fn output_layer(format: LogFormat) -> BoxedLayer {
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Pretty => layer.compact().boxed(),
    }
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_are_case_insensitive_with_aliases() {
        assert_eq!(log_format_from_config(Some("JSON")), Some(LogFormat::Json));
        assert_eq!(
            log_format_from_config(Some(" text ")),
            Some(LogFormat::Pretty)
        );
        assert_eq!(
            log_format_from_config(Some("xml")),
            Some(LogFormat::infer())
        );
        assert_eq!(log_format_from_config(None), None);
    }

    #[test]
    fn second_install_is_rejected() {
        let config = LoggingConfig {
            level: "roster_core=debug",
            format: LogFormat::Json,
            build_sha: "abc123",
        };
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(matches!(
            second,
            Err(TelemetryError::SubscriberInstall { .. })
        ));
        if first.is_ok() {
            assert_eq!(build_sha(), "abc123");
        }
    }
}
