//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges relevant to staging, submission and polling.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the workspace.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

struct MetricsInner {
    registry: Registry,
    submissions_total: IntCounterVec,
    records_confirmed_total: IntCounterVec,
    records_rolled_back_total: IntCounterVec,
    poll_ticks_total: IntCounterVec,
    merge_actions_total: IntCounterVec,
    jobs_completed_total: IntCounter,
    cleanup_failures_total: IntCounter,
    staged_records: IntGauge,
    active_pollers: IntGauge,
    submit_latency_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Records currently waiting in staging.
    pub staged_records: i64,
    /// Poll loops currently running.
    pub active_pollers: i64,
    /// Round-trip latency of the most recent bulk submission (ms).
    pub submit_latency_ms: i64,
    /// Jobs observed to completion.
    pub jobs_completed_total: u64,
    /// Cleanup calls that failed.
    pub cleanup_failures_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let submissions_total = counter_vec(
            "roster_submissions_total",
            "Bulk submissions by entity kind and outcome",
            &["kind", "outcome"],
        )?;
        let records_confirmed_total = counter_vec(
            "roster_records_confirmed_total",
            "Staged records promoted to server identities",
            &["kind"],
        )?;
        let records_rolled_back_total = counter_vec(
            "roster_records_rolled_back_total",
            "Optimistic records rolled back after a failed submission",
            &["kind"],
        )?;
        let poll_ticks_total = counter_vec(
            "roster_poll_ticks_total",
            "Job status poll ticks by outcome",
            &["outcome"],
        )?;
        let merge_actions_total = counter_vec(
            "roster_merge_actions_total",
            "Poll deltas merged into the primary collection by action",
            &["action"],
        )?;
        let jobs_completed_total = counter(
            "roster_jobs_completed_total",
            "Background jobs observed to completion",
        )?;
        let cleanup_failures_total = counter(
            "roster_cleanup_failures_total",
            "Job cleanup calls that failed",
        )?;
        let staged_records = gauge("roster_staged_records", "Records waiting in staging")?;
        let active_pollers = gauge("roster_active_pollers", "Job poll loops currently running")?;
        let submit_latency_ms = gauge(
            "roster_submit_latency_ms",
            "Round-trip latency of the latest bulk submission (ms)",
        )?;

        register(&registry, "roster_submissions_total", &submissions_total)?;
        register(
            &registry,
            "roster_records_confirmed_total",
            &records_confirmed_total,
        )?;
        register(
            &registry,
            "roster_records_rolled_back_total",
            &records_rolled_back_total,
        )?;
        register(&registry, "roster_poll_ticks_total", &poll_ticks_total)?;
        register(&registry, "roster_merge_actions_total", &merge_actions_total)?;
        register(&registry, "roster_jobs_completed_total", &jobs_completed_total)?;
        register(
            &registry,
            "roster_cleanup_failures_total",
            &cleanup_failures_total,
        )?;
        register(&registry, "roster_staged_records", &staged_records)?;
        register(&registry, "roster_active_pollers", &active_pollers)?;
        register(&registry, "roster_submit_latency_ms", &submit_latency_ms)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                submissions_total,
                records_confirmed_total,
                records_rolled_back_total,
                poll_ticks_total,
                merge_actions_total,
                jobs_completed_total,
                cleanup_failures_total,
                staged_records,
                active_pollers,
                submit_latency_ms,
            }),
        })
    }

    /// Count a bulk submission for the given kind and outcome.
    pub fn inc_submission(&self, kind: &str, outcome: &str) {
        self.inner
            .submissions_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Count records promoted to server identities.
    pub fn add_confirmed(&self, kind: &str, count: usize) {
        self.inner
            .records_confirmed_total
            .with_label_values(&[kind])
            .inc_by(to_u64(count));
    }

    /// Count optimistic records rolled back.
    pub fn add_rolled_back(&self, kind: &str, count: usize) {
        self.inner
            .records_rolled_back_total
            .with_label_values(&[kind])
            .inc_by(to_u64(count));
    }

    /// Count a poll tick (`ok`, `failed`).
    pub fn inc_poll_tick(&self, outcome: &str) {
        self.inner
            .poll_ticks_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count merge actions (`updated`, `appended`, `unchanged`).
    pub fn add_merge_actions(&self, action: &str, count: usize) {
        if count == 0 {
            return;
        }
        self.inner
            .merge_actions_total
            .with_label_values(&[action])
            .inc_by(to_u64(count));
    }

    /// Count a job observed to completion.
    pub fn inc_job_completed(&self) {
        self.inner.jobs_completed_total.inc();
    }

    /// Count a failed cleanup call.
    pub fn inc_cleanup_failure(&self) {
        self.inner.cleanup_failures_total.inc();
    }

    /// Set the staged records gauge.
    pub fn set_staged_records(&self, count: usize) {
        self.inner
            .staged_records
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Mark a poll loop as started.
    pub fn inc_active_pollers(&self) {
        self.inner.active_pollers.inc();
    }

    /// Mark a poll loop as stopped.
    pub fn dec_active_pollers(&self) {
        self.inner.active_pollers.dec();
    }

    /// Record the round-trip latency of a bulk submission.
    pub fn observe_submit_latency(&self, duration: Duration) {
        self.inner
            .submit_latency_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            staged_records: self.inner.staged_records.get(),
            active_pollers: self.inner.active_pollers.get(),
            submit_latency_ms: self.inner.submit_latency_ms.get(),
            jobs_completed_total: self.inner.jobs_completed_total.get(),
            cleanup_failures_total: self.inner.cleanup_failures_total.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

fn to_u64(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_submission("unit", "confirmed");
        metrics.add_confirmed("unit", 3);
        metrics.add_rolled_back("unit", 1);
        metrics.inc_poll_tick("ok");
        metrics.add_merge_actions("appended", 2);
        metrics.add_merge_actions("updated", 0);
        metrics.inc_job_completed();
        metrics.inc_cleanup_failure();
        metrics.set_staged_records(4);
        metrics.inc_active_pollers();
        metrics.observe_submit_latency(Duration::from_millis(85));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.staged_records, 4);
        assert_eq!(snapshot.active_pollers, 1);
        assert_eq!(snapshot.submit_latency_ms, 85);
        assert_eq!(snapshot.jobs_completed_total, 1);
        assert_eq!(snapshot.cleanup_failures_total, 1);

        metrics.dec_active_pollers();
        assert_eq!(metrics.snapshot().active_pollers, 0);

        let rendered = metrics.render()?;
        assert!(rendered.contains("roster_submissions_total"));
        assert!(rendered.contains("roster_records_rolled_back_total"));
        assert!(rendered.contains("roster_merge_actions_total{action=\"appended\"} 2"));
        Ok(())
    }

    #[test]
    fn snapshot_serializes_to_json() -> Result<()> {
        let metrics = Metrics::new()?;
        let value = serde_json::to_value(metrics.snapshot()).expect("serialize snapshot");
        assert_eq!(value["staged_records"], 0);
        Ok(())
    }
}
