//! Fixed-interval polling of a background job.
//!
//! # Design
//! - The poll loop runs on its own task and owns no collection state; it only
//!   forwards [`PollEvent`]s over a channel to whoever owns the workspace.
//! - One loop per poller. Each `start` gets a fresh running flag, so a restart
//!   after completion begins a new cycle.
//! - `stop` and `Drop` abort a running loop without cleanup. A loop that has
//!   already completed is left to finish its cleanup call.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use roster_events::{Event, EventBus};
use roster_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::job::JobStatus;
use crate::service::JobStatusSource;

/// Default delay between two status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default number of consecutive failures before escalating.
pub const DEFAULT_ESCALATE_AFTER: u32 = 5;

/// Messages delivered by a running poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A status response was received.
    Tick(JobStatus),
    /// A status request failed; the loop retries on the next tick.
    TickFailed {
        /// Failures in the current streak.
        consecutive: u32,
        /// Failure description.
        message: String,
    },
    /// The failure streak reached the escalation threshold.
    Escalated {
        /// Failures in the current streak.
        consecutive: u32,
    },
    /// The job finished and the loop has stopped.
    Completed {
        /// Whether the cleanup call succeeded.
        cleanup_succeeded: bool,
    },
}

/// Receiving end of a poll loop.
pub type PollFeed = mpsc::UnboundedReceiver<PollEvent>;

/// Lifecycle state of a [`JobPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// No loop is running.
    Idle,
    /// A loop is polling.
    Polling,
}

/// Tuning for a [`JobPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerOptions {
    /// Fixed delay between ticks.
    pub interval: Duration,
    /// Escalate once per streak after this many consecutive failures.
    pub escalate_after: Option<NonZeroU32>,
}

impl PollerOptions {
    /// Options with an escalation threshold where `0` disables escalation.
    #[must_use]
    pub const fn new(interval: Duration, escalate_after: u32) -> Self {
        Self {
            interval,
            escalate_after: NonZeroU32::new(escalate_after),
        }
    }
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_ESCALATE_AFTER)
    }
}

struct ActiveLoop {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

/// Polls one job until it completes or is stopped.
pub struct JobPoller<S: ?Sized> {
    source: Arc<S>,
    options: PollerOptions,
    events: Option<EventBus>,
    metrics: Option<Metrics>,
    active: Option<ActiveLoop>,
}

impl<S> JobPoller<S>
where
    S: JobStatusSource + ?Sized + 'static,
{
    /// Poller for `source`; nothing runs until [`Self::start`].
    #[must_use]
    pub const fn new(source: Arc<S>, options: PollerOptions) -> Self {
        Self {
            source,
            options,
            events: None,
            metrics: None,
            active: None,
        }
    }

    /// Publish progress and failure notifications on `bus`.
    #[must_use]
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Record poll metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PollerState {
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.running.load(Ordering::Acquire))
        {
            PollerState::Polling
        } else {
            PollerState::Idle
        }
    }

    /// Start polling. Returns the event feed, or `None` when a loop is
    /// already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Option<PollFeed> {
        if self.state() == PollerState::Polling {
            debug!(job = self.source.job_id(), "poller already running");
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));
        let poll_loop = PollLoop {
            source: Arc::clone(&self.source),
            options: self.options,
            events: self.events.clone(),
            metrics: self.metrics.clone(),
            running: Arc::clone(&running),
            tx,
        };
        if let Some(metrics) = &self.metrics {
            metrics.inc_active_pollers();
        }
        info!(
            job = self.source.job_id(),
            interval_ms = u64::try_from(self.options.interval.as_millis()).unwrap_or(u64::MAX),
            "job polling started"
        );
        let handle = tokio::spawn(poll_loop.run());
        self.active = Some(ActiveLoop { handle, running });
        Some(rx)
    }

    /// Stop a running loop without calling cleanup. Returns whether a loop
    /// was running.
    pub fn stop(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        let was_running = active.running.swap(false, Ordering::AcqRel);
        if was_running {
            active.handle.abort();
            if let Some(metrics) = &self.metrics {
                metrics.dec_active_pollers();
            }
            info!(job = self.source.job_id(), "job polling stopped");
        }
        was_running
    }
}

impl<S: ?Sized> Drop for JobPoller<S> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take()
            && active.running.swap(false, Ordering::AcqRel)
        {
            active.handle.abort();
            if let Some(metrics) = &self.metrics {
                metrics.dec_active_pollers();
            }
        }
    }
}

struct PollLoop<S: ?Sized> {
    source: Arc<S>,
    options: PollerOptions,
    events: Option<EventBus>,
    metrics: Option<Metrics>,
    running: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<PollEvent>,
}

impl<S> PollLoop<S>
where
    S: JobStatusSource + ?Sized,
{
    async fn run(self) {
        let mut ticker = time::interval(self.options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive: u32 = 0;

        loop {
            ticker.tick().await;
            match self.source.fetch_status().await {
                Ok(status) => {
                    consecutive = 0;
                    self.count_tick("ok");
                    let complete = status.progress.is_complete();
                    self.publish(Event::JobProgress {
                        job: self.job(),
                        queued: status.progress.queued_count,
                        completed_percentage: status.progress.completed_percentage,
                    });
                    if self.tx.send(PollEvent::Tick(status)).is_err() {
                        debug!(job = self.source.job_id(), "poll feed closed");
                        self.finish();
                        return;
                    }
                    if complete {
                        self.complete().await;
                        return;
                    }
                }
                Err(err) => {
                    consecutive = consecutive.saturating_add(1);
                    self.count_tick("failed");
                    let message = err.detail();
                    warn!(
                        job = self.source.job_id(),
                        consecutive,
                        error = %message,
                        "job status poll failed"
                    );
                    self.publish(Event::PollFailed {
                        job: self.job(),
                        consecutive,
                        message: message.clone(),
                    });
                    if self
                        .tx
                        .send(PollEvent::TickFailed {
                            consecutive,
                            message,
                        })
                        .is_err()
                    {
                        debug!(job = self.source.job_id(), "poll feed closed");
                        self.finish();
                        return;
                    }
                    if self
                        .options
                        .escalate_after
                        .is_some_and(|threshold| consecutive == threshold.get())
                    {
                        warn!(job = self.source.job_id(), consecutive, "job polling keeps failing");
                        self.publish(Event::PollEscalated {
                            job: self.job(),
                            consecutive,
                        });
                        if self.tx.send(PollEvent::Escalated { consecutive }).is_err() {
                            debug!(job = self.source.job_id(), "poll feed closed");
                            self.finish();
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn complete(&self) {
        self.finish();
        let cleanup_succeeded = match self.source.cleanup().await {
            Ok(()) => {
                info!(job = self.source.job_id(), "job cleanup succeeded");
                true
            }
            Err(err) => {
                warn!(job = self.source.job_id(), error = %err.detail(), "job cleanup failed");
                if let Some(metrics) = &self.metrics {
                    metrics.inc_cleanup_failure();
                }
                false
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.inc_job_completed();
        }
        self.publish(Event::JobCompleted {
            job: self.job(),
            cleanup_succeeded,
        });
        if self
            .tx
            .send(PollEvent::Completed { cleanup_succeeded })
            .is_err()
        {
            debug!(job = self.source.job_id(), "poll feed closed before completion");
        }
    }

    fn finish(&self) {
        if self.running.swap(false, Ordering::AcqRel)
            && let Some(metrics) = &self.metrics
        {
            metrics.dec_active_pollers();
        }
    }

    fn job(&self) -> String {
        self.source.job_id().to_string()
    }

    fn count_tick(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_poll_tick(outcome);
        }
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}
