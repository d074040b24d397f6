//! Live-updating local note store
//!
//! Every write publishes the new value to per-title watchers and to the
//! "all notes" watcher. Publishing happens while the connection lock is
//! still held, so watchers of a title observe writes in the order they were
//! applied to the database.

use dashmap::DashMap;
use rusqlite::Connection;
use tokio::sync::watch;

use super::queries;
use super::Storage;
use crate::error::Result;
use crate::types::Note;

/// Local persistence contract consumed by the sync engine
pub trait LocalStore: Send + Sync {
    /// Live view of one note, starting with its current stored value
    fn get(&self, title: &str) -> Result<watch::Receiver<Option<Note>>>;

    /// Live view of every note, ordered by title
    fn get_all(&self) -> Result<watch::Receiver<Vec<Note>>>;

    /// Write a note exactly as given
    fn upsert(&self, note: &Note) -> Result<()>;

    /// Write a note only if no stored version is as new. The comparison and
    /// the write are one step, so a concurrent newer write is never lost.
    /// Returns whether the note was written.
    fn upsert_if_newer(&self, note: &Note) -> Result<bool>;

    /// Remove a note by its title
    fn delete(&self, note: &Note) -> Result<()>;

    /// Whether a note with this title is stored
    fn exists(&self, title: &str) -> Result<bool>;
}

/// SQLite-backed [`LocalStore`]
pub struct SqliteNoteStore {
    storage: Storage,
    watchers: DashMap<String, watch::Sender<Option<Note>>>,
    all: watch::Sender<Vec<Note>>,
}

impl SqliteNoteStore {
    pub fn new(storage: Storage) -> Self {
        let (all, _) = watch::channel(Vec::new());
        Self {
            storage,
            watchers: DashMap::new(),
            all,
        }
    }

    /// In-memory store, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Storage::open_in_memory()?))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Number of titles with a live watcher
    pub fn watched_titles(&self) -> usize {
        self.watchers.len()
    }

    /// Push the stored state of `title` to its watchers. Must run under the
    /// connection lock.
    fn publish(&self, conn: &Connection, title: &str) -> Result<()> {
        let stale = match self.watchers.get(title) {
            Some(tx) if tx.receiver_count() > 0 => {
                tx.send_replace(queries::get_note(conn, title)?);
                false
            }
            Some(_) => true,
            None => false,
        };
        if stale {
            self.watchers.remove(title);
        }

        if self.all.receiver_count() > 0 {
            self.refresh_all(conn)?;
        }
        Ok(())
    }

    fn refresh_all(&self, conn: &Connection) -> Result<()> {
        let notes = queries::list_notes(conn)?;
        self.all.send_if_modified(|current| {
            if *current == notes {
                false
            } else {
                *current = notes;
                true
            }
        });
        Ok(())
    }
}

impl LocalStore for SqliteNoteStore {
    fn get(&self, title: &str) -> Result<watch::Receiver<Option<Note>>> {
        self.storage.with_connection(|conn| {
            if let Some(tx) = self.watchers.get(title) {
                return Ok(tx.subscribe());
            }
            let (tx, rx) = watch::channel(queries::get_note(conn, title)?);
            self.watchers.insert(title.to_string(), tx);
            Ok(rx)
        })
    }

    fn get_all(&self) -> Result<watch::Receiver<Vec<Note>>> {
        self.storage.with_connection(|conn| {
            self.refresh_all(conn)?;
            Ok(self.all.subscribe())
        })
    }

    fn upsert(&self, note: &Note) -> Result<()> {
        self.storage.with_connection(|conn| {
            queries::upsert_note(conn, note)?;
            self.publish(conn, note.title())
        })
    }

    fn upsert_if_newer(&self, note: &Note) -> Result<bool> {
        self.storage.with_connection(|conn| {
            let written = queries::upsert_note_if_newer(conn, note)?;
            if written {
                self.publish(conn, note.title())?;
            }
            Ok(written)
        })
    }

    fn delete(&self, note: &Note) -> Result<()> {
        self.storage.with_connection(|conn| {
            if queries::delete_note(conn, note.title())? {
                self.publish(conn, note.title())?;
            }
            Ok(())
        })
    }

    fn exists(&self, title: &str) -> Result<bool> {
        self.storage
            .with_connection(|conn| queries::note_exists(conn, title))
    }
}
