//! notesync - Last-writer-wins note synchronization
//!
//! Keeps titled notes in sync between a local SQLite store and a remote
//! notes service, exposing one reactive handle per title.

pub mod error;
pub mod storage;
pub mod sync;
pub mod types;

pub use error::{NoteSyncError, Result};
pub use storage::{LocalStore, SqliteNoteStore, Storage};
#[cfg(feature = "http")]
pub use sync::HttpRemoteClient;
pub use sync::{RemoteClient, SyncEngine, SyncedNote};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
