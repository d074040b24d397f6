//! Core types for notesync

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{NoteSyncError, Result};

/// A synchronized note.
///
/// The title is the key and never changes once the note exists. Updates
/// produce a new `Note`; the only field the write path touches is
/// `updated_at`, through [`Note::stamp`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "NoteWire")]
pub struct Note {
    title: String,
    content: String,
    updated_at: i64,
}

/// Wire shape accepted from the remote service and the local database
#[derive(Deserialize)]
struct NoteWire {
    title: String,
    content: String,
    #[serde(alias = "updatedAt")]
    updated_at: i64,
}

impl TryFrom<NoteWire> for Note {
    type Error = NoteSyncError;

    fn try_from(wire: NoteWire) -> Result<Self> {
        Note::at(wire.title, wire.content, wire.updated_at)
    }
}

/// Last timestamp handed out by [`Note::stamp`]
static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

impl Note {
    /// Create an unstamped note (`updated_at == 0`)
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        Self::at(title, content, 0)
    }

    /// Create a note carrying an existing timestamp
    pub fn at(title: impl Into<String>, content: impl Into<String>, updated_at: i64) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(NoteSyncError::InvalidInput(
                "note title cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            title,
            content: content.into(),
            updated_at,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Last-modified time in milliseconds since the epoch
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Same note with new content. The timestamp is left for the write path.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            title: self.title.clone(),
            content: content.into(),
            updated_at: self.updated_at,
        }
    }

    /// Copy of this note stamped with the current time.
    ///
    /// Stamps are strictly increasing within a process, so two writes in the
    /// same millisecond still order correctly.
    pub fn stamp(&self) -> Self {
        Self {
            title: self.title.clone(),
            content: self.content.clone(),
            updated_at: next_stamp(),
        }
    }

    /// Whichever note has the larger `updated_at`. Ties keep `a`.
    pub fn newer<'a>(a: &'a Note, b: &'a Note) -> &'a Note {
        if b.updated_at > a.updated_at {
            b
        } else {
            a
        }
    }

    /// Strictly newer than `other`
    pub fn is_newer_than(&self, other: &Note) -> bool {
        self.updated_at > other.updated_at
    }

    /// Encode to the wire format
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the wire format. Malformed input never yields a partial note.
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| NoteSyncError::Decode(e.to_string()))
    }
}

fn next_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let prev = LAST_STAMP
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    now.max(prev + 1)
}

/// Engine timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay between the starts of two poll cycles for a key
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Upper bound on a single remote fetch
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
}

fn default_poll_interval() -> u64 {
    3000
}

fn default_fetch_timeout() -> u64 {
    1000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            fetch_timeout_ms: default_fetch_timeout(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Reject intervals the scheduler cannot run
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(NoteSyncError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(NoteSyncError::Config(
                "fetch timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Remote notes service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Service root, e.g. `https://sharednotes.goto.ucsd.edu`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Transport-level timeout for a single request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://sharednotes.goto.ucsd.edu".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Configuration for the local storage engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database
    pub db_path: String,
    /// Storage mode (local or cloud-safe)
    #[serde(default)]
    pub storage_mode: StorageMode,
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            storage_mode: StorageMode::Local,
        }
    }
}

/// Storage mode for SQLite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    #[default]
    Local,
    CloudSafe,
}

impl std::str::FromStr for StorageMode {
    type Err = NoteSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" | "wal" => Ok(StorageMode::Local),
            "cloud-safe" | "cloudsafe" | "cloud" => Ok(StorageMode::CloudSafe),
            other => Err(NoteSyncError::Config(format!(
                "unknown storage mode: {}",
                other
            ))),
        }
    }
}
