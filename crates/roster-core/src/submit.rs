//! Bulk submission of a staging batch and reconciliation of the response.
//!
//! # Design
//! - Submission is split into `prepare` (sync), `send` (async) and
//!   `reconcile` (sync) so the owner of the workspace can keep working while
//!   the bulk call is in flight. [`BatchSubmitter::submit`] chains the three.
//! - Response records are matched to staged records by composite key, never
//!   by position; every collection update locates rows by id.
//! - Late duplicate checks are all-or-nothing: one conflict aborts the batch
//!   before anything is sent.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use roster_events::Event;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::entity::{CompositeKey, Entity, Fields};
use crate::error::{CatalogError, SubmitError};
use crate::kind::EntityKind;
use crate::optimistic::{OptimisticHandle, apply_insert, confirm, rollback};
use crate::service::{CatalogService, ConfirmedRecord};
use crate::workspace::Workspace;

/// Outcome of a submission that reached the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmitResult {
    /// Records promoted to server ids, as stored in the collection.
    pub confirmed: Vec<Entity>,
    /// Records the server did not confirm; they are back in staging.
    pub failed: Vec<Entity>,
}

impl SubmitResult {
    /// Whether nothing was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.failed.is_empty()
    }

    /// Labels of the records that did not persist.
    #[must_use]
    pub fn failed_labels(&self) -> Vec<String> {
        self.failed.iter().map(Entity::label).collect()
    }
}

/// A drained batch that has been applied optimistically and awaits the bulk
/// call.
#[derive(Debug)]
pub struct PendingSubmission {
    kind: EntityKind,
    batch: Vec<(Entity, OptimisticHandle)>,
}

impl PendingSubmission {
    /// Kind of every record in the batch.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Number of records in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Request payload, one field map per record in staging order.
    #[must_use]
    pub fn payload(&self) -> Vec<Fields> {
        self.batch
            .iter()
            .map(|(entity, _)| entity.fields.clone())
            .collect()
    }
}

/// Submits staging batches through a [`CatalogService`].
pub struct BatchSubmitter<C: ?Sized> {
    catalog: Arc<C>,
}

impl<C> BatchSubmitter<C>
where
    C: CatalogService + ?Sized,
{
    /// Submitter backed by `catalog`.
    #[must_use]
    pub const fn new(catalog: Arc<C>) -> Self {
        Self { catalog }
    }

    /// Validate the staged batch of `kind`, drain it and insert it
    /// optimistically. Returns `None` when nothing of that kind is staged.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Conflicts`] when any staged record duplicates a
    /// confirmed record or another record of the batch; staging and the
    /// collection are left untouched.
    pub fn prepare(
        &self,
        workspace: &mut Workspace,
        kind: EntityKind,
    ) -> Result<Option<PendingSubmission>, SubmitError> {
        let names = {
            let (staging, collection, guard) = workspace.parts_mut();
            let staged = staging.list(kind);
            if staged.is_empty() {
                return Ok(None);
            }
            staged
                .iter()
                .filter(|entity| {
                    guard
                        .check(
                            kind,
                            &entity.fields,
                            staged.iter().copied(),
                            collection.of_kind(kind),
                            Some(&entity.id),
                        )
                        .is_err()
                })
                .map(|entity| entity.label())
                .collect::<Vec<_>>()
        };

        if !names.is_empty() {
            warn!(kind = %kind, conflicts = ?names, "submission rejected before sending");
            workspace.publish(Event::SubmissionRejected {
                kind: kind.slug().to_string(),
                conflicts: names.clone(),
            });
            if let Some(metrics) = workspace.metrics() {
                metrics.inc_submission(kind.slug(), "rejected");
            }
            return Err(SubmitError::Conflicts { kind, names });
        }

        let (staging, collection, _) = workspace.parts_mut();
        let batch = staging
            .take(kind)
            .into_iter()
            .filter_map(|entity| {
                let handle = apply_insert(collection, &entity)?;
                Some((entity, handle))
            })
            .collect();
        workspace.record_staged_gauge();
        Ok(Some(PendingSubmission { kind, batch }))
    }

    /// Issue the bulk call for a prepared batch.
    ///
    /// # Errors
    ///
    /// Propagates the catalog failure unchanged.
    pub async fn send(
        &self,
        pending: &PendingSubmission,
    ) -> Result<Vec<ConfirmedRecord>, CatalogError> {
        self.catalog
            .bulk_create(pending.kind, &pending.payload())
            .await
    }

    /// Apply the bulk call outcome to the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Remote`] after rolling back and restoring the
    /// whole batch when the call failed outright.
    pub fn reconcile(
        &self,
        workspace: &mut Workspace,
        pending: PendingSubmission,
        outcome: Result<Vec<ConfirmedRecord>, CatalogError>,
    ) -> Result<SubmitResult, SubmitError> {
        let kind = pending.kind;
        match outcome {
            Ok(records) => Ok(Self::reconcile_records(workspace, pending, records)),
            Err(source) => {
                let restored = Self::roll_back(workspace, kind, pending.batch);
                warn!(
                    kind = %kind,
                    restored,
                    error = %source.detail(),
                    "bulk submission failed; batch restored to staging"
                );
                workspace.publish(Event::SubmissionFailed {
                    kind: kind.slug().to_string(),
                    restored,
                    message: source.detail(),
                });
                if let Some(metrics) = workspace.metrics() {
                    metrics.inc_submission(kind.slug(), "failed");
                }
                Err(SubmitError::Remote {
                    kind,
                    restored,
                    source,
                })
            }
        }
    }

    /// Prepare, send and reconcile the staged batch of `kind`.
    ///
    /// # Errors
    ///
    /// See [`Self::prepare`] and [`Self::reconcile`].
    #[instrument(name = "batch.submit", skip_all, fields(kind = %kind))]
    pub async fn submit(
        &self,
        workspace: &mut Workspace,
        kind: EntityKind,
    ) -> Result<SubmitResult, SubmitError> {
        let Some(pending) = self.prepare(workspace, kind)? else {
            return Ok(SubmitResult::default());
        };
        let started = Instant::now();
        let outcome = self.send(&pending).await;
        if let Some(metrics) = workspace.metrics() {
            metrics.observe_submit_latency(started.elapsed());
        }
        self.reconcile(workspace, pending, outcome)
    }

    fn reconcile_records(
        workspace: &mut Workspace,
        pending: PendingSubmission,
        records: Vec<ConfirmedRecord>,
    ) -> SubmitResult {
        let kind = pending.kind;
        let mut by_key: HashMap<CompositeKey, VecDeque<ConfirmedRecord>> = HashMap::new();
        for record in records {
            let key = workspace.guard().key_for(kind, &record.fields);
            by_key.entry(key).or_default().push_back(record);
        }

        let mut result = SubmitResult::default();
        let mut unmatched = Vec::new();
        {
            let (_, collection, guard) = workspace.parts_mut();
            for (entity, handle) in pending.batch {
                let key = guard.key_for(kind, &entity.fields);
                match by_key.get_mut(&key).and_then(VecDeque::pop_front) {
                    Some(record) => {
                        let promoted =
                            confirm(collection, handle, &entity, record.id, &record.fields);
                        result.confirmed.push(promoted);
                    }
                    None => unmatched.push((entity, handle)),
                }
            }
        }

        let leftovers: usize = by_key.values().map(VecDeque::len).sum();
        if leftovers > 0 {
            warn!(kind = %kind, leftovers, "response carried records matching no staged entity");
        }

        result.failed = unmatched.iter().map(|(entity, _)| entity.clone()).collect();
        let restored = Self::roll_back(workspace, kind, unmatched);

        if let Some(metrics) = workspace.metrics() {
            metrics.add_confirmed(kind.slug(), result.confirmed.len());
            let outcome = if restored == 0 { "confirmed" } else { "partial" };
            metrics.inc_submission(kind.slug(), outcome);
        }

        if result.failed.is_empty() {
            info!(kind = %kind, count = result.confirmed.len(), "bulk submission confirmed");
            workspace.publish(Event::SubmissionConfirmed {
                kind: kind.slug().to_string(),
                count: result.confirmed.len(),
            });
        } else {
            let failed = result.failed_labels();
            warn!(
                kind = %kind,
                confirmed = result.confirmed.len(),
                failed = ?failed,
                "bulk submission partially confirmed"
            );
            workspace.publish(Event::SubmissionPartial {
                kind: kind.slug().to_string(),
                confirmed: result.confirmed.len(),
                failed,
            });
        }
        result
    }

    fn roll_back(
        workspace: &mut Workspace,
        kind: EntityKind,
        batch: Vec<(Entity, OptimisticHandle)>,
    ) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let (staging, collection, _) = workspace.parts_mut();
        let entities: Vec<Entity> = batch
            .into_iter()
            .map(|(entity, handle)| {
                rollback(collection, handle);
                entity
            })
            .collect();
        let restored = staging.restore(entities);
        if let Some(metrics) = workspace.metrics() {
            metrics.add_rolled_back(kind.slug(), restored);
        }
        workspace.record_staged_gauge();
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::guard::{DuplicateGuard, KeyExtractor, SchemaKeys};
    use crate::id::{Id, StableId};
    use async_trait::async_trait;
    use roster_events::EventBus;
    use roster_telemetry::Metrics;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Catalog fake answering every bulk call from a script.
    struct FakeCatalog {
        reply: Mutex<Option<Result<Vec<ConfirmedRecord>, CatalogError>>>,
        requests: Mutex<Vec<Vec<Fields>>>,
    }

    impl FakeCatalog {
        fn replying(reply: Result<Vec<ConfirmedRecord>, CatalogError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().expect("requests lock").len()
        }
    }

    #[async_trait]
    impl CatalogService for FakeCatalog {
        async fn bulk_create(
            &self,
            _kind: EntityKind,
            records: &[Fields],
        ) -> Result<Vec<ConfirmedRecord>, CatalogError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(records.to_vec());
            self.reply
                .lock()
                .expect("reply lock")
                .take()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn list(&self, _kind: EntityKind) -> Result<Vec<ConfirmedRecord>, CatalogError> {
            Ok(Vec::new())
        }
    }

    fn sub_unit(name: &str, parent: &str) -> Fields {
        [("name", json!(name)), ("parent", json!(parent))]
            .into_iter()
            .collect()
    }

    fn record(id: &str, fields: Fields) -> ConfirmedRecord {
        ConfirmedRecord {
            id: StableId::new(id),
            fields,
        }
    }

    fn staged_tokens(workspace: &Workspace) -> Vec<Id> {
        workspace
            .staging()
            .iter()
            .map(|entity| entity.id.clone())
            .collect()
    }

    #[tokio::test]
    async fn law_school_is_promoted_without_temporary_remainder() {
        let mut server = sub_unit("LAW SCHOOL", "ACME U");
        server.insert("code", json!("LS"));
        let catalog = FakeCatalog::replying(Ok(vec![record("42", server)]));
        let submitter = BatchSubmitter::new(Arc::clone(&catalog));
        let mut workspace = Workspace::new();
        workspace
            .stage(EntityKind::SubUnit, sub_unit("Law School", "Acme U"))
            .expect("staged");

        let result = submitter
            .submit(&mut workspace, EntityKind::SubUnit)
            .await
            .expect("submission succeeds");

        assert_eq!(result.confirmed.len(), 1);
        assert!(result.failed.is_empty());
        let ids: Vec<_> = workspace.collection().iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec![Id::Stable(StableId::new("42"))]);
        let row = &result.confirmed[0];
        assert_eq!(row.fields.get_str("code"), Some("LS"));
        assert!(!row.is_optimistic);
        assert!(workspace.staging().is_empty());
    }

    #[tokio::test]
    async fn responses_are_matched_by_key_not_position() {
        let catalog = FakeCatalog::replying(Ok(vec![
            record("b-1", sub_unit("B", "P")),
            record("a-1", sub_unit("A", "P")),
        ]));
        let submitter = BatchSubmitter::new(catalog);
        let mut workspace = Workspace::new();
        workspace
            .stage(EntityKind::SubUnit, sub_unit("a", "p"))
            .expect("staged");
        workspace
            .stage(EntityKind::SubUnit, sub_unit("b", "p"))
            .expect("staged");

        let result = submitter
            .submit(&mut workspace, EntityKind::SubUnit)
            .await
            .expect("submission succeeds");
        let pairs: Vec<_> = result
            .confirmed
            .iter()
            .map(|entity| (entity.label(), entity.id.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![("A".to_string(), "a-1".to_string()), ("B".to_string(), "b-1".to_string())]
        );
    }

    #[tokio::test]
    async fn total_failure_restores_collection_and_staging() {
        let catalog = FakeCatalog::replying(Err(CatalogError::Status {
            operation: "catalog.bulk_create",
            status: 500,
            message: "boom".into(),
        }));
        let bus = EventBus::new();
        let submitter = BatchSubmitter::new(catalog);
        let mut workspace = Workspace::new().with_events(bus.clone());
        workspace.load_confirmed(
            EntityKind::SubUnit,
            vec![record("1", sub_unit("EXISTING", "P"))],
        );
        workspace
            .stage(EntityKind::SubUnit, sub_unit("a", "p"))
            .expect("staged");
        workspace
            .stage(EntityKind::SubUnit, sub_unit("b", "p"))
            .expect("staged");

        let before_ids = workspace.collection().id_set();
        let before_staged = staged_tokens(&workspace);
        let err = submitter
            .submit(&mut workspace, EntityKind::SubUnit)
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Remote { restored: 2, .. }));
        assert_eq!(workspace.collection().id_set(), before_ids);
        assert_eq!(staged_tokens(&workspace), before_staged);
        assert!(
            workspace
                .staging()
                .iter()
                .all(|entity| entity.is_staged && !entity.is_optimistic)
        );
        let last = bus
            .subscribe(Some(0))
            .drain_ready()
            .pop()
            .map(|envelope| envelope.event);
        assert!(matches!(last, Some(Event::SubmissionFailed { restored: 2, .. })));
    }

    #[tokio::test]
    async fn partial_failure_keeps_confirmed_and_restores_the_rest() {
        let catalog = FakeCatalog::replying(Ok(vec![record("a-1", sub_unit("A", "P"))]));
        let metrics = Metrics::new().expect("metrics");
        let submitter = BatchSubmitter::new(catalog);
        let mut workspace = Workspace::new().with_metrics(metrics.clone());
        workspace
            .stage(EntityKind::SubUnit, sub_unit("a", "p"))
            .expect("staged");
        workspace
            .stage(EntityKind::SubUnit, sub_unit("b", "p"))
            .expect("staged");

        let result = submitter
            .submit(&mut workspace, EntityKind::SubUnit)
            .await
            .expect("partial success is not an error");

        assert_eq!(result.confirmed.len(), 1);
        assert_eq!(result.failed_labels(), vec!["B".to_string()]);
        assert_eq!(workspace.collection().len(), 1);
        assert_eq!(workspace.staged(EntityKind::SubUnit).len(), 1);
        assert_eq!(metrics.snapshot().staged_records, 1);
        let rendered = metrics.render().expect("render metrics");
        assert!(rendered.contains("outcome=\"partial\""));
    }

    #[tokio::test]
    async fn conflicts_abort_before_sending() {
        let catalog = FakeCatalog::replying(Ok(Vec::new()));
        let submitter = BatchSubmitter::new(Arc::clone(&catalog));
        let mut workspace = Workspace::new();
        workspace
            .stage(EntityKind::SubUnit, sub_unit("a", "p"))
            .expect("staged");
        let token = workspace
            .stage(EntityKind::SubUnit, sub_unit("b", "p"))
            .expect("staged");
        assert!(workspace.edit(token, "name", json!("A")));

        let err = submitter
            .submit(&mut workspace, EntityKind::SubUnit)
            .await
            .unwrap_err();
        match err {
            SubmitError::Conflicts { names, .. } => {
                assert_eq!(names, vec!["A".to_string(), "A".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(catalog.request_count(), 0);
        assert_eq!(workspace.staged(EntityKind::SubUnit).len(), 2);
        assert!(workspace.collection().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let catalog = FakeCatalog::replying(Ok(Vec::new()));
        let submitter = BatchSubmitter::new(Arc::clone(&catalog));
        let mut workspace = Workspace::new();
        let result = submitter
            .submit(&mut workspace, EntityKind::Unit)
            .await
            .expect("no-op");
        assert!(result.is_empty());
        assert_eq!(catalog.request_count(), 0);
    }

    #[tokio::test]
    async fn workspace_stays_usable_while_request_is_in_flight() {
        let catalog = FakeCatalog::replying(Ok(vec![record("9", sub_unit("A", "P"))]));
        let submitter = BatchSubmitter::new(catalog);
        let mut workspace = Workspace::new();
        workspace
            .stage(EntityKind::SubUnit, sub_unit("a", "p"))
            .expect("staged");

        let pending = submitter
            .prepare(&mut workspace, EntityKind::SubUnit)
            .expect("no conflicts")
            .expect("batch present");
        assert_eq!(workspace.collection().optimistic_count(), 1);

        let newer = workspace
            .stage(EntityKind::SubUnit, sub_unit("c", "p"))
            .expect("staged during flight");
        let outcome = submitter.send(&pending).await;
        let result = submitter
            .reconcile(&mut workspace, pending, outcome)
            .expect("reconciled");

        assert_eq!(result.confirmed.len(), 1);
        assert_eq!(workspace.collection().optimistic_count(), 0);
        let staged: HashSet<_> = staged_tokens(&workspace).into_iter().collect();
        assert_eq!(staged, HashSet::from([Id::Temporary(newer)]));
    }

    /// People keyed by mailbox: `+tag` suffixes on the local part are ignored.
    struct MailboxKeys;

    impl KeyExtractor for MailboxKeys {
        fn composite_key(&self, kind: EntityKind, fields: &Fields) -> CompositeKey {
            if kind != EntityKind::Person {
                return SchemaKeys.composite_key(kind, fields);
            }
            let email = fields.text("email");
            let (local, domain) = email.split_once('@').unwrap_or((email.as_str(), ""));
            let local = local.split('+').next().unwrap_or(local);
            CompositeKey::new(kind, [format!("{local}@{domain}")])
        }
    }

    fn person(email: &str, full_name: &str) -> Fields {
        [("email", json!(email)), ("full_name", json!(full_name))]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn custom_key_extractor_drives_staging_and_prepare() {
        let catalog = FakeCatalog::replying(Ok(Vec::new()));
        let submitter = BatchSubmitter::new(Arc::clone(&catalog));
        let mut workspace = Workspace::new().with_guard(DuplicateGuard::new(MailboxKeys));

        workspace
            .stage(EntityKind::Person, person("ada@example.org", "Ada"))
            .expect("staged");
        let err = workspace
            .stage(EntityKind::Person, person("ada+news@Example.org", "Ada L"))
            .unwrap_err();
        assert!(matches!(err, StageError::Duplicate { .. }));

        workspace
            .stage(EntityKind::Person, person("grace+ops@example.org", "Grace"))
            .expect("no confirmed mailbox yet");
        workspace.load_confirmed(
            EntityKind::Person,
            vec![record("p-1", person("grace@example.org", "GRACE"))],
        );

        let err = submitter
            .prepare(&mut workspace, EntityKind::Person)
            .unwrap_err();
        match err {
            SubmitError::Conflicts { names, .. } => assert_eq!(names, vec!["GRACE".to_string()]),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(workspace.staged(EntityKind::Person).len(), 2);
        assert_eq!(catalog.request_count(), 0);

        let default_guard = DuplicateGuard::default();
        assert_ne!(
            default_guard.key_for(EntityKind::Person, &person("grace+ops@example.org", "")),
            default_guard.key_for(EntityKind::Person, &person("grace@example.org", ""))
        );
    }
}
