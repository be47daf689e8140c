//! Background job progress and per-record poll results.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::Fields;
use crate::id::StableId;
use crate::kind::EntityKind;

/// Aggregate progress of a background job, replaced wholesale on every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    /// Records still waiting to be processed.
    pub queued_count: u64,
    /// Completion in percent (0 to 100).
    pub completed_percentage: f64,
    /// Record counts keyed by status label.
    pub status_summary: BTreeMap<String, u64>,
}

impl JobProgress {
    /// A job is complete once it reports 100% or has nothing queued.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_percentage >= 100.0 || self.queued_count == 0
    }
}

/// Server-side update for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct PollDelta {
    /// Server id of the record.
    pub id: StableId,
    /// Record kind.
    pub kind: EntityKind,
    /// Fields reported by this tick.
    pub fields: Fields,
}

/// Per-record updates carried by one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollResult {
    /// Updates in the order the server reported them.
    pub deltas: Vec<PollDelta>,
}

impl PollResult {
    /// Whether the tick carried no record updates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// Normalised response of the job status endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobStatus {
    /// Aggregate progress.
    pub progress: JobProgress,
    /// Record updates.
    pub result: PollResult,
}
