#![forbid(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(unreachable_pub, clippy::all, clippy::pedantic, clippy::nursery)]

//! Wire DTOs for the Roster catalog and job APIs.
//!
//! The service speaks camelCase JSON and is loose about shapes: ids arrive as
//! numbers or strings, and the job status `records` member may be an array, a
//! single object, a bare message string or missing. Everything is normalised
//! here so the core only ever sees [`ConfirmedRecord`] and [`JobStatus`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use roster_core::{
    ConfirmedRecord, EntityKind, Fields, JobProgress, JobStatus, PollDelta, PollResult, StableId,
};

/// RFC9457-compatible problem document returned on errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    /// URI reference identifying the problem type.
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Parameters that failed validation, if applicable.
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON Pointer to the offending field.
    pub pointer: String,
    /// Human-readable description of the validation failure.
    pub message: String,
}

/// Failure to map a wire payload onto domain types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A catalog record carried none of `stableId`, `confirmedId` or `id`.
    #[error("record is missing its identifier")]
    MissingId {
        /// Position of the record in the response.
        index: usize,
    },
    /// A job record named an unknown kind.
    #[error("record has an unknown kind")]
    UnknownKind {
        /// The rejected kind string.
        value: String,
    },
}

/// Identifier as sent by the server: a JSON number or string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum WireId {
    /// Numeric identifier.
    Number(u64),
    /// String identifier.
    Text(String),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value.trim()),
        }
    }
}

impl From<WireId> for StableId {
    fn from(value: WireId) -> Self {
        Self::new(value.to_string())
    }
}

/// Convert a domain field name (`full_name`) to its wire form (`fullName`).
#[must_use]
pub fn to_wire_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert a wire field name (`fullName`) to its domain form (`full_name`).
///
/// A run of capitals is one word: `profileURL` becomes `profile_url` and
/// `URLPath` becomes `url_path`.
#[must_use]
pub fn to_domain_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (index, &ch) in chars.iter().enumerate() {
        if !ch.is_uppercase() {
            out.push(ch);
            continue;
        }
        let prev = index.checked_sub(1).map(|i| chars[i]);
        let next = chars.get(index + 1);
        let starts_word = match prev {
            Some(prev) if prev.is_lowercase() || prev.is_ascii_digit() => true,
            Some(prev) if prev.is_uppercase() => next.is_some_and(|next| next.is_lowercase()),
            _ => false,
        };
        if starts_word && !out.is_empty() {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

fn pick_id(
    stable_id: Option<WireId>,
    confirmed_id: Option<WireId>,
    id: Option<WireId>,
) -> Option<WireId> {
    stable_id.or(confirmed_id).or(id)
}

fn wire_fields(fields: &Fields) -> BTreeMap<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (to_wire_name(name), value.clone()))
        .collect()
}

fn domain_fields(fields: BTreeMap<String, Value>) -> Fields {
    fields
        .into_iter()
        .map(|(name, value)| (to_domain_name(&name), value))
        .collect()
}

/// Body of `POST /v1/catalog/{kind}/bulk`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkCreateRequest {
    /// Kind slug of every record.
    pub kind: String,
    /// Records to create, field names in wire form.
    pub records: Vec<BTreeMap<String, Value>>,
}

impl BulkCreateRequest {
    /// Build a request from staged field maps.
    #[must_use]
    pub fn new(kind: EntityKind, records: &[Fields]) -> Self {
        Self {
            kind: kind.slug().to_string(),
            records: records.iter().map(wire_fields).collect(),
        }
    }
}

/// A persisted record as returned by list and bulk-create calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    /// Stable identifier, sent by newer endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_id: Option<WireId>,
    /// Server identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_id: Option<WireId>,
    /// Fallback identifier used by some endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    /// Remaining fields, including server-derived ones.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl RecordView {
    /// Map onto a [`ConfirmedRecord`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingId`] when no identifier is present.
    pub fn into_confirmed(self, index: usize) -> Result<ConfirmedRecord, ModelError> {
        let id = pick_id(self.stable_id, self.confirmed_id, self.id)
            .ok_or(ModelError::MissingId { index })?;
        Ok(ConfirmedRecord {
            id: id.into(),
            fields: domain_fields(self.fields),
        })
    }
}

/// Response of list and bulk-create calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordListResponse {
    /// Persisted records; order is not significant.
    #[serde(default)]
    pub records: Vec<RecordView>,
}

impl RecordListResponse {
    /// Map every record onto a [`ConfirmedRecord`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingId`] for the first record without an id.
    pub fn into_confirmed(self) -> Result<Vec<ConfirmedRecord>, ModelError> {
        self.records
            .into_iter()
            .enumerate()
            .map(|(index, record)| record.into_confirmed(index))
            .collect()
    }

    /// Map the records that carry an id and report the positions of those
    /// that do not.
    #[must_use]
    pub fn into_identified(self) -> IdentifiedRecords {
        let mut identified = IdentifiedRecords::default();
        for (index, record) in self.records.into_iter().enumerate() {
            match record.into_confirmed(index) {
                Ok(record) => identified.records.push(record),
                Err(_) => identified.missing_ids.push(index),
            }
        }
        identified
    }
}

/// Outcome of [`RecordListResponse::into_identified`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifiedRecords {
    /// Records that carried an identifier.
    pub records: Vec<ConfirmedRecord>,
    /// Response positions of records without one.
    pub missing_ids: Vec<usize>,
}

/// One per-record entry of a job status response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRecordView {
    /// Stable identifier, sent by newer endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_id: Option<WireId>,
    /// Server identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_id: Option<WireId>,
    /// Fallback identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    /// Kind slug, when the job spans several kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Reported fields.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// The `records` member of a job status response in any of its shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JobRecords {
    /// An array of records.
    Many(Vec<JobRecordView>),
    /// A single record.
    One(JobRecordView),
    /// A status message instead of records.
    Message(String),
}

impl JobRecords {
    fn into_vec(self) -> Vec<JobRecordView> {
        match self {
            Self::Many(records) => records,
            Self::One(record) => vec![record],
            Self::Message(_) => Vec::new(),
        }
    }
}

/// Body of `GET /v1/jobs/{job}/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    /// Records still queued.
    #[serde(default)]
    pub queued_count: u64,
    /// Completion percentage.
    #[serde(default)]
    pub completed_percentage: f64,
    /// Record counts per status label.
    #[serde(default)]
    pub status_summary: BTreeMap<String, u64>,
    /// Per-record results, in whatever shape the server chose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<JobRecords>,
}

impl JobStatusResponse {
    /// Normalise into a [`JobStatus`]. Records without an identifier are
    /// skipped; records without a kind default to `default_kind`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownKind`] when a record names a kind that
    /// does not exist.
    pub fn into_status(self, default_kind: EntityKind) -> Result<JobStatus, ModelError> {
        let deltas = self
            .records
            .map(JobRecords::into_vec)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| {
                let id = pick_id(record.stable_id, record.confirmed_id, record.id)?;
                Some((id, record.kind, record.fields))
            })
            .map(|(id, kind, fields)| {
                let kind = match kind {
                    Some(value) => value
                        .parse::<EntityKind>()
                        .map_err(|err| ModelError::UnknownKind { value: err.value })?,
                    None => default_kind,
                };
                Ok(PollDelta {
                    id: id.into(),
                    kind,
                    fields: domain_fields(fields),
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(JobStatus {
            progress: JobProgress {
                queued_count: self.queued_count,
                completed_percentage: self.completed_percentage.clamp(0.0, 100.0),
                status_summary: self.status_summary,
            },
            result: PollResult { deltas },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::{Id, PrimaryCollection, merge};
    use serde_json::json;

    #[test]
    fn field_names_convert_between_wire_and_domain() {
        assert_eq!(to_wire_name("full_name"), "fullName");
        assert_eq!(to_wire_name("profile_url"), "profileUrl");
        assert_eq!(to_wire_name("name"), "name");
        assert_eq!(to_domain_name("fullName"), "full_name");
        assert_eq!(to_domain_name("profileUrl"), "profile_url");
        assert_eq!(to_domain_name("status"), "status");
        assert_eq!(to_domain_name("profileURL"), "profile_url");
        assert_eq!(to_domain_name("URLPath"), "url_path");
        assert_eq!(to_domain_name("userID"), "user_id");
        assert_eq!(to_domain_name("line2Address"), "line2_address");
    }

    #[test]
    fn bulk_request_uses_kind_slug_and_wire_names() {
        let fields: Fields = [("full_name", json!("ADA")), ("email", json!("a@x.org"))]
            .into_iter()
            .collect();
        let request = BulkCreateRequest::new(EntityKind::Person, &[fields]);
        let value = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(value["kind"], "person");
        assert_eq!(value["records"][0]["fullName"], "ADA");
    }

    #[test]
    fn record_ids_accept_numbers_and_strings() {
        let response: RecordListResponse = serde_json::from_value(json!({
            "records": [
                {"confirmedId": 42, "name": "LAW SCHOOL", "createdAt": "2025-01-01"},
                {"id": "u-7", "name": "ACME U"}
            ]
        }))
        .expect("decode records");
        let records = response.into_confirmed().expect("ids present");
        assert_eq!(records[0].id, StableId::new("42"));
        assert_eq!(records[0].fields.get_str("created_at"), Some("2025-01-01"));
        assert!(!records[0].fields.contains("confirmed_id"));
        assert_eq!(records[1].id, StableId::new("u-7"));
    }

    #[test]
    fn record_without_id_is_rejected() {
        let response: RecordListResponse =
            serde_json::from_value(json!({"records": [{"name": "X"}]})).expect("decode records");
        assert_eq!(
            response.into_confirmed().unwrap_err(),
            ModelError::MissingId { index: 0 }
        );
    }

    #[test]
    fn bulk_records_without_ids_are_reported_not_fatal() {
        let response: RecordListResponse = serde_json::from_value(json!({
            "records": [
                {"confirmedId": 1, "name": "A"},
                {"name": "B"},
                {"stableId": "s-3", "name": "C"}
            ]
        }))
        .expect("decode records");
        let identified = response.into_identified();
        assert_eq!(identified.missing_ids, vec![1]);
        let ids: Vec<_> = identified.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "s-3"]);
    }

    #[test]
    fn stable_id_records_merge_into_the_collection() {
        let response: JobStatusResponse = serde_json::from_value(json!({
            "queuedCount": 1,
            "completedPercentage": 50,
            "records": [{"stableId": "42", "confirmedId": 7, "status": "done"}]
        }))
        .expect("decode status");
        let status = response.into_status(EntityKind::Item).expect("normalise");
        assert_eq!(status.result.deltas.len(), 1);
        assert_eq!(status.result.deltas[0].id, StableId::new("42"));
        assert!(!status.result.deltas[0].fields.contains("stable_id"));

        let mut collection = PrimaryCollection::new();
        assert!(merge(&mut collection, &status.result).changed());
        let id = Id::Stable(StableId::new("42"));
        let entity = collection.get(&id).expect("merged record");
        assert_eq!(entity.fields.get_str("status"), Some("done"));

        assert!(!merge(&mut collection, &status.result).changed());
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn job_records_are_normalised_from_every_shape() {
        let many: JobStatusResponse = serde_json::from_value(json!({
            "queuedCount": 3,
            "completedPercentage": 40,
            "statusSummary": {"done": 2, "queued": 3},
            "records": [{"confirmedId": 1, "status": "done"}, {"status": "orphan"}]
        }))
        .expect("decode array");
        let status = many.into_status(EntityKind::Item).expect("normalise");
        assert_eq!(status.progress.queued_count, 3);
        assert!((status.progress.completed_percentage - 40.0).abs() < f64::EPSILON);
        assert_eq!(status.progress.status_summary.get("done"), Some(&2));
        assert_eq!(status.result.deltas.len(), 1);
        assert_eq!(status.result.deltas[0].kind, EntityKind::Item);

        let one: JobStatusResponse = serde_json::from_value(json!({
            "queuedCount": 0,
            "completedPercentage": 100.0,
            "records": {"id": "9", "kind": "people", "status": "done"}
        }))
        .expect("decode object");
        let status = one.into_status(EntityKind::Item).expect("normalise");
        assert_eq!(status.result.deltas[0].id, StableId::new("9"));
        assert_eq!(status.result.deltas[0].kind, EntityKind::Person);
        assert!(status.progress.is_complete());

        let message: JobStatusResponse = serde_json::from_value(json!({
            "queuedCount": 5,
            "completedPercentage": 0,
            "records": "still processing"
        }))
        .expect("decode message");
        assert!(message.into_status(EntityKind::Item).expect("normalise").result.is_empty());

        let absent: JobStatusResponse =
            serde_json::from_value(json!({"queuedCount": 5})).expect("decode bare");
        assert!(absent.records.is_none());
    }

    #[test]
    fn unknown_job_record_kind_is_an_error() {
        let response: JobStatusResponse = serde_json::from_value(json!({
            "queuedCount": 1,
            "records": [{"id": 1, "kind": "widget"}]
        }))
        .expect("decode");
        assert_eq!(
            response.into_status(EntityKind::Unit).unwrap_err(),
            ModelError::UnknownKind {
                value: "widget".into()
            }
        );
    }

    #[test]
    fn problem_details_roundtrip_uses_type_key() {
        let problem: ProblemDetails = serde_json::from_value(json!({
            "type": "about:blank",
            "title": "conflict",
            "status": 409,
            "detail": "duplicate name"
        }))
        .expect("decode problem");
        assert_eq!(problem.status, 409);
        assert_eq!(problem.detail.as_deref(), Some("duplicate name"));
        assert!(problem.invalid_params.is_none());
    }
}
