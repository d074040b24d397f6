//! Sync engine: one merged, reactive view per note title

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::handle::{PollStats, SyncHandle, SyncedNote};
use super::remote::RemoteClient;
use crate::error::{NoteSyncError, Result};
use crate::storage::LocalStore;
use crate::types::{Note, SyncConfig};

/// Keeps notes in sync between the local store and the remote service.
///
/// A title is UNBOUND until the first [`SyncEngine::get_synced`] call, which
/// makes it ACTIVE: the engine forwards local changes into a merged view and
/// polls the remote on a fixed schedule, writing strictly newer remote
/// versions into the local store. Writes go the other way through
/// [`SyncEngine::upsert_synced`].
///
/// Background tasks are spawned on the tokio runtime current at the time of
/// the call. Dropping the engine stops all of them.
pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteClient>,
    config: SyncConfig,
    handles: DashMap<String, SyncHandle>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteClient>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            remote,
            config,
            handles: DashMap::new(),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // Synced operations

    /// Reactive handle on `title`, reflecting the newest known version
    /// whichever side produced it.
    ///
    /// Repeated calls share one merged view and one poller; each call counts
    /// as an observer for [`SyncEngine::release`]. Must be called from within
    /// a tokio runtime.
    pub fn get_synced(&self, title: &str) -> Result<SyncedNote> {
        validate_title(title)?;
        let runtime = current_runtime()?;

        // The vacant entry keeps its shard locked until insert, so two
        // concurrent first calls cannot both start a poller.
        match self.handles.entry(title.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().attach()),
            Entry::Vacant(entry) => {
                let handle = SyncHandle::start(
                    &runtime,
                    title,
                    self.store.clone(),
                    self.remote.clone(),
                    &self.config,
                )?;
                let view = handle.view();
                entry.insert(handle);
                tracing::info!(title, "Started syncing note");
                Ok(view)
            }
        }
    }

    /// Write locally with a fresh stamp, then push to the remote in the
    /// background. Returns the stamped note.
    pub fn upsert_synced(&self, note: &Note) -> Result<Note> {
        let runtime = current_runtime()?;
        let stamped = self.upsert_local(note)?;
        spawn_store(&runtime, self.remote.clone(), stamped.clone());
        Ok(stamped)
    }

    /// Give up one observer of `title`. When the last observer leaves, the
    /// poller stops and the title returns to UNBOUND. Returns true if the
    /// title was torn down.
    pub fn release(&self, title: &str) -> bool {
        let removed = self
            .handles
            .remove_if(title, |_, handle| handle.detach())
            .is_some();
        if removed {
            tracing::info!(title, "Stopped syncing note");
        }
        removed
    }

    /// Stop every poller
    pub fn shutdown(&self) {
        let count = self.handles.len();
        self.handles.clear();
        tracing::info!(count, "Sync engine shut down");
    }

    /// Titles currently ACTIVE
    pub fn active_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        titles.sort();
        titles
    }

    pub fn is_active(&self, title: &str) -> bool {
        self.handles.contains_key(title)
    }

    /// Observers registered for `title` (0 when UNBOUND)
    pub fn observer_count(&self, title: &str) -> usize {
        self.handles.get(title).map(|h| h.observers()).unwrap_or(0)
    }

    /// Poller counters for an ACTIVE title
    pub fn poll_stats(&self, title: &str) -> Option<PollStats> {
        self.handles.get(title).map(|h| h.stats())
    }

    // Local operations

    pub fn get_local(&self, title: &str) -> Result<watch::Receiver<Option<Note>>> {
        self.store.get(title)
    }

    pub fn get_all_local(&self) -> Result<watch::Receiver<Vec<Note>>> {
        self.store.get_all()
    }

    /// Stamp `note` with the current time and write it to the local store.
    /// Open handles for the title see the change through the store.
    pub fn upsert_local(&self, note: &Note) -> Result<Note> {
        let stamped = note.stamp();
        self.store.upsert(&stamped)?;
        tracing::debug!(title = stamped.title(), updated_at = stamped.updated_at(), "Upserted local note");
        Ok(stamped)
    }

    pub fn delete_local(&self, note: &Note) -> Result<()> {
        self.store.delete(note)
    }

    pub fn exists_local(&self, title: &str) -> Result<bool> {
        self.store.exists(title)
    }

    // Remote operations

    /// Push `note` to the remote without waiting. Failures are logged by the
    /// remote client and never retried.
    pub fn upsert_remote(&self, note: &Note) -> Result<JoinHandle<()>> {
        let runtime = current_runtime()?;
        Ok(spawn_store(&runtime, self.remote.clone(), note.clone()))
    }
}

fn spawn_store(runtime: &Handle, remote: Arc<dyn RemoteClient>, note: Note) -> JoinHandle<()> {
    runtime.spawn(async move {
        remote.store(&note).await;
    })
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| NoteSyncError::Runtime(e.to_string()))
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(NoteSyncError::InvalidInput(
            "note title cannot be empty".to_string(),
        ));
    }
    Ok(())
}
