#![forbid(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(unreachable_pub, clippy::all, clippy::pedantic, clippy::nursery)]

//! Optimistic staging, bulk submission and job reconciliation for Roster
//! catalogs.
//!
//! Records are staged client-side, checked for duplicate natural keys, shown
//! in the primary collection before the server confirms them, submitted in
//! one bulk call and promoted to server ids by key. Background jobs are polled
//! on a fixed interval and their per-record results merged back into the same
//! collection.
//!
//! Remote access goes through [`CatalogService`] and [`JobStatusSource`];
//! `roster-client` provides the HTTP implementation.

pub mod collection;
pub mod entity;
pub mod error;
pub mod guard;
pub mod id;
pub mod job;
pub mod kind;
pub mod merge;
pub mod optimistic;
pub mod poller;
pub mod service;
pub mod session;
pub mod staging;
pub mod submit;
pub mod workspace;

pub use collection::PrimaryCollection;
pub use entity::{CompositeKey, Entity, Fields};
pub use error::{CatalogError, StageError, SubmitError};
pub use guard::{DuplicateConflict, DuplicateGuard, KeyExtractor, SchemaKeys};
pub use id::{Id, IdClass, IdentityAllocator, StableId, TempToken};
pub use job::{JobProgress, JobStatus, PollDelta, PollResult};
pub use kind::{EntityKind, KindSchema, ParseKindError};
pub use merge::{MergeSummary, merge};
pub use optimistic::{OptimisticHandle, apply_insert, confirm, rollback};
pub use poller::{JobPoller, PollEvent, PollFeed, PollerOptions, PollerState};
pub use service::{CatalogService, ConfirmedRecord, JobStatusSource};
pub use session::{ACTIVE_JOB_KEY, MemorySessionStore, Session, SessionStore};
pub use staging::StagingStore;
pub use submit::{BatchSubmitter, PendingSubmission, SubmitResult};
pub use workspace::{PollApplied, Workspace};
