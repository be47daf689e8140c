//! Telemetry error type.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Failures while installing logging or maintaining the metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed, or installing failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A collector could not be constructed.
    #[error("failed to build metrics collector")]
    MetricsCollector {
        /// Metric name.
        name: &'static str,
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// A collector could not be registered (usually a duplicate name).
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Metric name.
        name: &'static str,
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The text exposition could not be encoded.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The encoder produced bytes that are not UTF-8.
    #[error("metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    /// Metric name tied to a collector failure, if any.
    #[must_use]
    pub const fn metric(&self) -> Option<&'static str> {
        match self {
            Self::MetricsCollector { name, .. } | Self::MetricsRegister { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn register_failures_name_the_metric() {
        let err = TelemetryError::MetricsRegister {
            name: "roster_staged_records",
            source: PrometheusError::AlreadyReg,
        };
        assert_eq!(err.to_string(), "failed to register metrics collector");
        assert_eq!(err.metric(), Some("roster_staged_records"));
        assert!(err.source().is_some());
    }

    #[test]
    fn utf8_failures_carry_no_metric_name() {
        let source = String::from_utf8(vec![0, 159]).unwrap_err();
        let err = TelemetryError::MetricsUtf8 { source };
        assert_eq!(err.metric(), None);
        assert!(err.source().is_some());
    }
}
