//! Notification payloads carried across the workspace.

use chrono::{DateTime, Utc};

/// Identifier assigned to each event emitted on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// User-visible notifications raised by staging, submission and job polling.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A record passed validation and was added to the staging batch.
    RecordStaged {
        /// Entity kind slug.
        kind: String,
        /// Display label of the staged record.
        label: String,
    },
    /// A record was refused before reaching the staging batch.
    StageRejected {
        /// Entity kind slug.
        kind: String,
        /// Human-readable rejection reason.
        reason: String,
    },
    /// Every record of a bulk submission was confirmed by the catalog.
    SubmissionConfirmed {
        /// Entity kind slug.
        kind: String,
        /// Number of confirmed records.
        count: usize,
    },
    /// Some records were confirmed, the rest were rolled back to staging.
    SubmissionPartial {
        /// Entity kind slug.
        kind: String,
        /// Number of confirmed records.
        confirmed: usize,
        /// Labels of the records that did not persist.
        failed: Vec<String>,
    },
    /// A submission was aborted locally because of duplicate keys.
    SubmissionRejected {
        /// Entity kind slug.
        kind: String,
        /// Labels of the conflicting records.
        conflicts: Vec<String>,
    },
    /// The bulk call failed outright and the whole batch was restored.
    SubmissionFailed {
        /// Entity kind slug.
        kind: String,
        /// Number of records restored to staging.
        restored: usize,
        /// Failure detail.
        message: String,
    },
    /// A poll tick reported job progress.
    JobProgress {
        /// Job identifier.
        job: String,
        /// Records still queued on the server.
        queued: u64,
        /// Completion percentage in the range 0-100.
        completed_percentage: f64,
    },
    /// A poll tick failed; polling continues on the next interval.
    PollFailed {
        /// Job identifier.
        job: String,
        /// Consecutive failed ticks including this one.
        consecutive: u32,
        /// Failure detail.
        message: String,
    },
    /// Poll failures crossed the configured escalation threshold.
    PollEscalated {
        /// Job identifier.
        job: String,
        /// Consecutive failed ticks observed.
        consecutive: u32,
    },
    /// The job finished and the cleanup call was issued.
    JobCompleted {
        /// Job identifier.
        job: String,
        /// Whether the cleanup call succeeded.
        cleanup_succeeded: bool,
    },
}

impl Event {
    /// Machine-friendly discriminator for log fields and filters.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RecordStaged { .. } => "record_staged",
            Self::StageRejected { .. } => "stage_rejected",
            Self::SubmissionConfirmed { .. } => "submission_confirmed",
            Self::SubmissionPartial { .. } => "submission_partial",
            Self::SubmissionRejected { .. } => "submission_rejected",
            Self::SubmissionFailed { .. } => "submission_failed",
            Self::JobProgress { .. } => "job_progress",
            Self::PollFailed { .. } => "poll_failed",
            Self::PollEscalated { .. } => "poll_escalated",
            Self::JobCompleted { .. } => "job_completed",
        }
    }

    /// Whether the notification reports something the operator must act on.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::StageRejected { .. }
                | Self::SubmissionPartial { .. }
                | Self::SubmissionRejected { .. }
                | Self::SubmissionFailed { .. }
                | Self::PollFailed { .. }
                | Self::PollEscalated { .. }
        )
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: EventId,
    /// Time the event was published.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}
