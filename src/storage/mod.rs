//! Local storage for notesync
//!
//! Handles SQLite database operations, WAL mode, schema management and the
//! live subscriptions the sync engine builds on.

mod connection;
mod live;
mod migrations;
pub mod queries;

pub use connection::Storage;
pub use live::{LocalStore, SqliteNoteStore};
pub use migrations::{schema_version, SCHEMA_VERSION};
