//! Single-owner bundle of staging, the primary collection and job progress.
//!
//! # Design
//! - The workspace is owned by one task; asynchronous work (bulk calls, poll
//!   loops) hands results back through [`crate::BatchSubmitter::reconcile`]
//!   and [`Workspace::apply_poll_event`], so no lock guards the collection.
//! - Notifications and metrics are optional and never affect state changes.

use roster_events::{Event, EventBus};
use roster_telemetry::Metrics;
use serde_json::Value;
use tracing::{debug, info};

use crate::collection::PrimaryCollection;
use crate::entity::{Entity, Fields};
use crate::error::StageError;
use crate::guard::DuplicateGuard;
use crate::id::TempToken;
use crate::job::JobProgress;
use crate::kind::EntityKind;
use crate::merge::{MergeSummary, merge};
use crate::poller::PollEvent;
use crate::service::ConfirmedRecord;
use crate::staging::{StagingStore, normalize_fields};

/// What applying a [`PollEvent`] did to the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollApplied {
    /// Progress replaced and record deltas merged.
    Merged(MergeSummary),
    /// A tick failed; state untouched.
    Failed,
    /// The failure streak was escalated; state untouched.
    Escalated,
    /// The job finished.
    Finished {
        /// Whether the cleanup call succeeded.
        cleanup_succeeded: bool,
    },
}

/// Staging, collection and progress for one operator session.
#[derive(Debug, Default)]
pub struct Workspace {
    staging: StagingStore,
    collection: PrimaryCollection,
    guard: DuplicateGuard,
    progress: Option<JobProgress>,
    events: Option<EventBus>,
    metrics: Option<Metrics>,
}

impl Workspace {
    /// Empty workspace using schema-derived duplicate keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the duplicate guard.
    #[must_use]
    pub fn with_guard(mut self, guard: DuplicateGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Publish notifications on `bus`.
    #[must_use]
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Record staging and submission metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate and stage a record.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::MissingField`] when a required field is blank and
    /// [`StageError::Duplicate`] when the composite key is already staged or
    /// confirmed. Rejections are also published as notifications.
    pub fn stage(&mut self, kind: EntityKind, fields: Fields) -> Result<TempToken, StageError> {
        let fields = normalize_fields(kind, fields);
        let checked = kind
            .schema()
            .missing_required(&fields)
            .map_or(Ok(()), |field| Err(StageError::MissingField { kind, field }))
            .and_then(|()| {
                self.guard
                    .check(
                        kind,
                        &fields,
                        self.staging.list(kind),
                        self.collection.of_kind(kind),
                        None,
                    )
                    .map_err(|conflict| StageError::Duplicate {
                        kind,
                        conflict: Box::new(conflict),
                    })
            });

        if let Err(err) = checked {
            debug!(kind = %kind, reason = %err.reason(), "record rejected before staging");
            self.publish(Event::StageRejected {
                kind: kind.slug().to_string(),
                reason: err.reason(),
            });
            return Err(err);
        }

        let token = self.staging.add(kind, fields);
        if let Some(entity) = self.staging.get(token) {
            let label = entity.label();
            self.publish(Event::RecordStaged {
                kind: kind.slug().to_string(),
                label,
            });
        }
        self.record_staged_gauge();
        Ok(token)
    }

    /// Edit one field of a staged record; unknown tokens are ignored.
    pub fn edit(&mut self, token: TempToken, field: &str, value: Value) -> bool {
        self.staging.update(token, field, value)
    }

    /// Remove a staged record.
    pub fn unstage(&mut self, token: TempToken) -> Option<Entity> {
        let removed = self.staging.remove(token);
        self.record_staged_gauge();
        removed
    }

    /// Drop everything staged.
    pub fn clear_staging(&mut self) -> usize {
        let removed = self.staging.clear();
        self.record_staged_gauge();
        removed
    }

    /// Staged records of one kind.
    #[must_use]
    pub fn staged(&self, kind: EntityKind) -> Vec<&Entity> {
        self.staging.list(kind)
    }

    /// Read access to the staging store.
    #[must_use]
    pub const fn staging(&self) -> &StagingStore {
        &self.staging
    }

    /// Read access to the primary collection.
    #[must_use]
    pub const fn collection(&self) -> &PrimaryCollection {
        &self.collection
    }

    /// Duplicate guard in use.
    #[must_use]
    pub const fn guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    /// Replace the confirmed records of `kind` with a server listing.
    pub fn load_confirmed(&mut self, kind: EntityKind, records: Vec<ConfirmedRecord>) {
        let count = records.len();
        let entities = records
            .into_iter()
            .map(|record| Entity::confirmed(record.id, kind, record.fields))
            .collect();
        self.collection.replace_confirmed(kind, entities);
        debug!(kind = %kind, count, "confirmed records loaded");
    }

    /// Forget the progress of any previous job.
    pub fn begin_job(&mut self) {
        self.progress = None;
    }

    /// Latest progress reported for the current job.
    #[must_use]
    pub const fn job_progress(&self) -> Option<&JobProgress> {
        self.progress.as_ref()
    }

    /// Fold one poll event into the workspace.
    pub fn apply_poll_event(&mut self, event: PollEvent) -> PollApplied {
        match event {
            PollEvent::Tick(status) => {
                let summary = merge(&mut self.collection, &status.result);
                self.progress = Some(status.progress);
                if let Some(metrics) = &self.metrics {
                    metrics.add_merge_actions("updated", summary.updated);
                    metrics.add_merge_actions("appended", summary.appended);
                    metrics.add_merge_actions("unchanged", summary.unchanged);
                }
                PollApplied::Merged(summary)
            }
            PollEvent::TickFailed { .. } => PollApplied::Failed,
            PollEvent::Escalated { .. } => PollApplied::Escalated,
            PollEvent::Completed { cleanup_succeeded } => {
                info!(cleanup_succeeded, "job finished");
                PollApplied::Finished { cleanup_succeeded }
            }
        }
    }

    /// Drop staging, collection and progress.
    pub fn reset(&mut self) {
        self.staging.clear();
        self.collection.clear();
        self.progress = None;
        self.record_staged_gauge();
    }

    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&mut StagingStore, &mut PrimaryCollection, &DuplicateGuard) {
        (&mut self.staging, &mut self.collection, &self.guard)
    }

    pub(crate) const fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub(crate) fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    pub(crate) fn record_staged_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_staged_records(self.staging.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{Id, StableId};
    use crate::job::{JobStatus, PollDelta, PollResult};
    use serde_json::json;

    fn unit(name: &str) -> Fields {
        [("name", json!(name))].into_iter().collect()
    }

    #[test]
    fn duplicate_rejection_keeps_first_record() {
        let bus = EventBus::new();
        let mut workspace = Workspace::new().with_events(bus.clone());
        workspace
            .stage(EntityKind::Unit, unit("Acme U"))
            .expect("first record staged");
        let err = workspace
            .stage(EntityKind::Unit, unit("  acme u"))
            .unwrap_err();
        assert!(matches!(err, StageError::Duplicate { .. }));
        assert_eq!(workspace.staged(EntityKind::Unit).len(), 1);

        let events: Vec<_> = bus
            .subscribe(Some(0))
            .drain_ready()
            .into_iter()
            .map(|envelope| envelope.event)
            .collect();
        assert!(matches!(events[0], Event::RecordStaged { .. }));
        assert!(matches!(events[1], Event::StageRejected { .. }));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let mut workspace = Workspace::new();
        let err = workspace
            .stage(EntityKind::SubUnit, unit("Law School"))
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::MissingField {
                field: "parent",
                ..
            }
        ));
        assert!(workspace.staging().is_empty());
    }

    #[test]
    fn staged_record_conflicts_with_confirmed_listing() {
        let mut workspace = Workspace::new();
        workspace.load_confirmed(
            EntityKind::Unit,
            vec![ConfirmedRecord {
                id: StableId::new("1"),
                fields: unit("ACME U"),
            }],
        );
        assert!(workspace.stage(EntityKind::Unit, unit("acme u")).is_err());
        assert!(workspace.stage(EntityKind::Unit, unit("Beta U")).is_ok());
    }

    #[test]
    fn poll_ticks_replace_progress_and_merge_records() {
        let mut workspace = Workspace::new();
        workspace.begin_job();
        assert!(workspace.job_progress().is_none());

        let status = JobStatus {
            progress: JobProgress {
                queued_count: 2,
                completed_percentage: 50.0,
                status_summary: [("done".to_string(), 1)].into_iter().collect(),
            },
            result: PollResult {
                deltas: vec![PollDelta {
                    id: StableId::new("42"),
                    kind: EntityKind::Item,
                    fields: [("status", json!("done"))].into_iter().collect(),
                }],
            },
        };
        let applied = workspace.apply_poll_event(PollEvent::Tick(status.clone()));
        assert_eq!(
            applied,
            PollApplied::Merged(MergeSummary {
                appended: 1,
                ..MergeSummary::default()
            })
        );
        let again = workspace.apply_poll_event(PollEvent::Tick(status));
        assert!(matches!(again, PollApplied::Merged(summary) if !summary.changed()));
        assert_eq!(workspace.collection().len(), 1);
        assert!(workspace
            .collection()
            .contains(&Id::Stable(StableId::new("42"))));
        assert_eq!(
            workspace.job_progress().map(|progress| progress.queued_count),
            Some(2)
        );
    }

    #[test]
    fn edit_unstage_and_reset() {
        let metrics = Metrics::new().expect("metrics");
        let mut workspace = Workspace::new().with_metrics(metrics.clone());
        let token = workspace
            .stage(EntityKind::Unit, unit("a"))
            .expect("staged");
        workspace
            .stage(EntityKind::Unit, unit("b"))
            .expect("staged");
        assert_eq!(metrics.snapshot().staged_records, 2);

        assert!(workspace.edit(token, "name", json!("renamed")));
        assert_eq!(
            workspace
                .staging()
                .get(token)
                .and_then(|entity| entity.fields.get_str("name")),
            Some("RENAMED")
        );
        assert!(workspace.unstage(token).is_some());
        assert_eq!(metrics.snapshot().staged_records, 1);

        workspace.reset();
        assert!(workspace.staging().is_empty());
        assert!(workspace.collection().is_empty());
        assert_eq!(metrics.snapshot().staged_records, 0);
    }
}
