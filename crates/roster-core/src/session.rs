//! Operator session: key-value session storage plus the owned workspace.
//!
//! # Design
//! - Storage sits behind [`SessionStore`] so a caller can back it with
//!   something other than memory; nothing survives a process restart here.
//! - Signing out clears the store, staging and the collection together.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::info;

use crate::workspace::Workspace;

/// Key under which the active job id is recorded.
pub const ACTIVE_JOB_KEY: &str = "roster.active_job";

/// Minimal key-value storage scoped to one session.
pub trait SessionStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a value.
    fn put(&self, key: &str, value: String);
    /// Delete a value, returning it.
    fn remove(&self, key: &str) -> Option<String>;
    /// Delete every value.
    fn clear(&self);
}

/// In-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().expect("session store mutex poisoned")
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) {
        self.entries().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.entries().remove(key)
    }

    fn clear(&self) {
        self.entries().clear();
    }
}

/// A signed-in operator session.
#[derive(Debug)]
pub struct Session<S> {
    store: S,
    workspace: Workspace,
}

impl<S: SessionStore> Session<S> {
    /// Start a session, discarding anything left in `store`.
    pub fn begin(store: S, workspace: Workspace) -> Self {
        store.clear();
        info!("session started");
        Self { store, workspace }
    }

    /// Session storage.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The session's workspace.
    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Mutable access to the session's workspace.
    pub const fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    /// Remember the job currently being watched and reset its progress.
    pub fn set_active_job(&mut self, job: &str) {
        self.store.put(ACTIVE_JOB_KEY, job.to_string());
        self.workspace.begin_job();
    }

    /// Job currently being watched, if any.
    #[must_use]
    pub fn active_job(&self) -> Option<String> {
        self.store.get(ACTIVE_JOB_KEY)
    }

    /// Forget the active job.
    pub fn clear_active_job(&self) -> Option<String> {
        self.store.remove(ACTIVE_JOB_KEY)
    }

    /// End the session: clear storage, staging and the collection.
    pub fn sign_out(&mut self) {
        self.store.clear();
        self.workspace.reset();
        info!("session signed out");
    }
}
