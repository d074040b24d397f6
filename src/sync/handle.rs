//! Per-title sync state: merged view, forwarder and poller

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;

use super::remote::RemoteClient;
use crate::error::{NoteSyncError, Result};
use crate::storage::LocalStore;
use crate::types::{Note, SyncConfig};

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    /// Remote was strictly newer and has been written locally
    Applied,
    /// Remote copy was older or equal to the merged view
    NotNewer,
    /// Remote had nothing (or could not be reached)
    Absent,
    /// Remote answered with a note for a different title
    Mismatched,
    /// Fetch exceeded the configured timeout
    TimedOut,
    /// The local write of a newer remote note failed
    WriteFailed,
}

/// Counters for a title's poller
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStats {
    pub cycles: u64,
    pub remote_hits: u64,
    pub applied: u64,
    pub timeouts: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<PollOutcome>,
}

impl PollStats {
    fn record(&mut self, outcome: PollOutcome) {
        self.cycles += 1;
        match outcome {
            PollOutcome::Applied => {
                self.remote_hits += 1;
                self.applied += 1;
            }
            PollOutcome::NotNewer | PollOutcome::Mismatched | PollOutcome::WriteFailed => {
                self.remote_hits += 1;
            }
            PollOutcome::TimedOut => self.timeouts += 1,
            PollOutcome::Absent => {}
        }
        self.last_cycle_at = Some(Utc::now());
        self.last_outcome = Some(outcome);
    }
}

/// Reactive handle on a synchronized note.
///
/// Always reflects the newest version known locally or remotely. Cloning is
/// cheap; every clone observes the same merged view.
#[derive(Debug, Clone)]
pub struct SyncedNote {
    title: String,
    rx: watch::Receiver<Option<Note>>,
}

impl SyncedNote {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Latest merged value
    pub fn current(&self) -> Option<Note> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return it. Fails once the title has
    /// been released.
    pub async fn changed(&mut self) -> Result<Option<Note>> {
        self.rx.changed().await.map_err(|_| self.released())?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// Wait until the merged value satisfies `predicate`
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&Option<Note>) -> bool,
    ) -> Result<Option<Note>> {
        let result = self.rx.wait_for(predicate).await.map(|value| value.clone());
        result.map_err(|_| self.released())
    }

    /// Raw receiver for callers that compose their own watchers
    pub fn subscribe(&self) -> watch::Receiver<Option<Note>> {
        self.rx.clone()
    }

    /// Stream of merged values, starting with the current one
    pub fn into_stream(self) -> WatchStream<Option<Note>> {
        WatchStream::new(self.rx)
    }

    fn released(&self) -> NoteSyncError {
        NoteSyncError::Runtime(format!("sync for '{}' was released", self.title))
    }
}

/// Engine-owned state for one ACTIVE title. Dropping it stops both tasks.
pub(crate) struct SyncHandle {
    title: String,
    merged: Arc<watch::Sender<Option<Note>>>,
    observers: AtomicUsize,
    stats: Arc<Mutex<PollStats>>,
    forwarder: JoinHandle<()>,
    poller: JoinHandle<()>,
}

impl SyncHandle {
    /// Subscribe to the local store for `title` and start its poller
    pub(crate) fn start(
        runtime: &Handle,
        title: &str,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteClient>,
        config: &SyncConfig,
    ) -> Result<Self> {
        let local = store.get(title)?;
        let (merged, merged_rx) = watch::channel(local.borrow().clone());
        let merged = Arc::new(merged);
        let stats = Arc::new(Mutex::new(PollStats::default()));

        let forwarder = runtime.spawn(forward_local(local, merged.clone()));

        let poller = Poller {
            title: title.to_string(),
            store,
            remote,
            merged: merged_rx,
            stats: stats.clone(),
            fetch_timeout: config.fetch_timeout(),
        };
        let poller = runtime.spawn(poller.run(config.poll_interval()));

        Ok(Self {
            title: title.to_string(),
            merged,
            observers: AtomicUsize::new(1),
            stats,
            forwarder,
            poller,
        })
    }

    pub(crate) fn view(&self) -> SyncedNote {
        SyncedNote {
            title: self.title.clone(),
            rx: self.merged.subscribe(),
        }
    }

    /// Register another observer and hand back a view
    pub(crate) fn attach(&self) -> SyncedNote {
        self.observers.fetch_add(1, Ordering::AcqRel);
        self.view()
    }

    /// Drop one observer. Returns true when it was the last one.
    pub(crate) fn detach(&self) -> bool {
        self.observers.fetch_sub(1, Ordering::AcqRel) <= 1
    }

    pub(crate) fn observers(&self) -> usize {
        self.observers.load(Ordering::Acquire)
    }

    pub(crate) fn stats(&self) -> PollStats {
        self.stats.lock().clone()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.poller.abort();
        self.forwarder.abort();
    }
}

/// Copy every local emission into the merged view
async fn forward_local(
    mut local: watch::Receiver<Option<Note>>,
    merged: Arc<watch::Sender<Option<Note>>>,
) {
    while local.changed().await.is_ok() {
        let value = local.borrow_and_update().clone();
        merged.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

/// Recurring remote check for one title
struct Poller {
    title: String,
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteClient>,
    merged: watch::Receiver<Option<Note>>,
    stats: Arc<Mutex<PollStats>>,
    fetch_timeout: Duration,
}

impl Poller {
    /// Fixed-rate loop: each cycle starts `period` after the previous one
    /// started. Never exits on its own.
    async fn run(self, period: Duration) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let outcome = self.poll_once().await;
            tracing::debug!(title = %self.title, ?outcome, "Poll cycle finished");
            self.stats.lock().record(outcome);
        }
    }

    async fn poll_once(&self) -> PollOutcome {
        let remote = match timeout(self.fetch_timeout, self.remote.fetch(&self.title)).await {
            Ok(Some(note)) => note,
            Ok(None) => return PollOutcome::Absent,
            Err(_) => {
                tracing::warn!(title = %self.title, timeout = ?self.fetch_timeout, "Remote fetch timed out");
                return PollOutcome::TimedOut;
            }
        };

        if remote.title() != self.title {
            tracing::warn!(
                title = %self.title,
                remote_title = remote.title(),
                "Remote returned a different note, ignoring"
            );
            return PollOutcome::Mismatched;
        }

        let is_newer = match self.merged.borrow().as_ref() {
            Some(current) => remote.is_newer_than(current),
            None => true,
        };
        if !is_newer {
            return PollOutcome::NotNewer;
        }

        // Written as-is: the remote timestamp must survive for later merges.
        // The store re-checks against its own row, so a local write that
        // landed after the check above still wins. On success the store
        // re-emits and the forwarder updates the merged view.
        let store = self.store.clone();
        let updated_at = remote.updated_at();
        let written = tokio::task::spawn_blocking(move || store.upsert_if_newer(&remote))
            .await
            .map_err(|e| NoteSyncError::Internal(e.to_string()))
            .and_then(|r| r);

        match written {
            Ok(true) => {
                tracing::info!(title = %self.title, updated_at, "Applied newer remote note");
                PollOutcome::Applied
            }
            Ok(false) => {
                tracing::debug!(title = %self.title, updated_at, "Local note changed first, remote note dropped");
                PollOutcome::NotNewer
            }
            Err(e) => {
                tracing::error!(title = %self.title, error = %e, "Failed to write remote note locally");
                PollOutcome::WriteFailed
            }
        }
    }
}
