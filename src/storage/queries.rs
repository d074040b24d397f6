//! Note queries over a raw SQLite connection

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::types::Note;

fn note_from_row(row: &Row) -> rusqlite::Result<(String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_note((title, content, updated_at): (String, String, i64)) -> Result<Note> {
    Note::at(title, content, updated_at)
}

/// Get a note by title
pub fn get_note(conn: &Connection, title: &str) -> Result<Option<Note>> {
    conn.query_row(
        "SELECT title, content, updated_at FROM notes WHERE title = ?",
        params![title],
        note_from_row,
    )
    .optional()?
    .map(into_note)
    .transpose()
}

/// List all notes ordered by title
pub fn list_notes(conn: &Connection) -> Result<Vec<Note>> {
    let mut stmt = conn.prepare("SELECT title, content, updated_at FROM notes ORDER BY title")?;
    let rows = stmt.query_map([], note_from_row)?;

    let mut notes = Vec::new();
    for row in rows {
        notes.push(into_note(row?)?);
    }
    Ok(notes)
}

/// Insert or replace a note, keyed by title
pub fn upsert_note(conn: &Connection, note: &Note) -> Result<()> {
    conn.execute(
        "INSERT INTO notes (title, content, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(title) DO UPDATE SET
            content = excluded.content,
            updated_at = excluded.updated_at",
        params![note.title(), note.content(), note.updated_at()],
    )?;
    Ok(())
}

/// Insert a note, or replace the stored one only if `note` is strictly
/// newer. Returns whether the row was written.
pub fn upsert_note_if_newer(conn: &Connection, note: &Note) -> Result<bool> {
    let written = conn.execute(
        "INSERT INTO notes (title, content, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(title) DO UPDATE SET
            content = excluded.content,
            updated_at = excluded.updated_at
         WHERE excluded.updated_at > notes.updated_at",
        params![note.title(), note.content(), note.updated_at()],
    )?;
    Ok(written > 0)
}

/// Delete a note. Returns whether a row was removed.
pub fn delete_note(conn: &Connection, title: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM notes WHERE title = ?", params![title])?;
    Ok(removed > 0)
}

/// Check whether a note exists
pub fn note_exists(conn: &Connection, title: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE title = ?)",
        params![title],
        |row| row.get(0),
    )?;
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[test]
    fn test_upsert_and_get() {
        let storage = Storage::open_in_memory().unwrap();
        let note = Note::at("Groceries", "milk", 100).unwrap();

        storage.with_connection(|conn| upsert_note(conn, &note)).unwrap();
        let loaded = storage
            .with_connection(|conn| get_note(conn, "Groceries"))
            .unwrap();
        assert_eq!(loaded, Some(note));
    }

    #[test]
    fn test_upsert_replaces() {
        let storage = Storage::open_in_memory().unwrap();
        let first = Note::at("Groceries", "milk", 100).unwrap();
        let second = Note::at("Groceries", "milk,eggs", 200).unwrap();

        storage
            .with_connection(|conn| {
                upsert_note(conn, &first)?;
                upsert_note(conn, &second)
            })
            .unwrap();

        let notes = storage.with_connection(list_notes).unwrap();
        assert_eq!(notes, vec![second]);
    }

    #[test]
    fn test_list_is_ordered_by_title() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                upsert_note(conn, &Note::at("b", "", 1)?)?;
                upsert_note(conn, &Note::at("c", "", 3)?)?;
                upsert_note(conn, &Note::at("a", "", 2)?)
            })
            .unwrap();

        let titles: Vec<String> = storage
            .with_connection(list_notes)
            .unwrap()
            .iter()
            .map(|n| n.title().to_string())
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_delete_and_exists() {
        let storage = Storage::open_in_memory().unwrap();
        let note = Note::at("Todo", "x", 1).unwrap();

        storage.with_connection(|conn| upsert_note(conn, &note)).unwrap();
        assert!(storage.with_connection(|c| note_exists(c, "Todo")).unwrap());

        assert!(storage.with_connection(|c| delete_note(c, "Todo")).unwrap());
        assert!(!storage.with_connection(|c| delete_note(c, "Todo")).unwrap());
        assert!(!storage.with_connection(|c| note_exists(c, "Todo")).unwrap());
    }

    #[test]
    fn test_upsert_if_newer_inserts_missing() {
        let storage = Storage::open_in_memory().unwrap();
        let note = Note::at("Groceries", "milk", 100).unwrap();

        assert!(storage
            .with_connection(|conn| upsert_note_if_newer(conn, &note))
            .unwrap());
        let loaded = storage
            .with_connection(|conn| get_note(conn, "Groceries"))
            .unwrap();
        assert_eq!(loaded, Some(note));
    }

    #[test]
    fn test_upsert_if_newer_keeps_newer_or_equal_row() {
        let storage = Storage::open_in_memory().unwrap();
        let stored = Note::at("Groceries", "milk", 100).unwrap();
        storage.with_connection(|conn| upsert_note(conn, &stored)).unwrap();

        for candidate in [
            Note::at("Groceries", "older", 50).unwrap(),
            Note::at("Groceries", "tie", 100).unwrap(),
        ] {
            let written = storage
                .with_connection(|conn| upsert_note_if_newer(conn, &candidate))
                .unwrap();
            assert!(!written, "{} should not replace", candidate.content());
        }

        let loaded = storage
            .with_connection(|conn| get_note(conn, "Groceries"))
            .unwrap();
        assert_eq!(loaded, Some(stored));
    }

    #[test]
    fn test_upsert_if_newer_replaces_older_row() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| upsert_note(conn, &Note::at("Groceries", "milk", 100)?))
            .unwrap();

        let newer = Note::at("Groceries", "milk,eggs", 200).unwrap();
        assert!(storage
            .with_connection(|conn| upsert_note_if_newer(conn, &newer))
            .unwrap());
        let loaded = storage
            .with_connection(|conn| get_note(conn, "Groceries"))
            .unwrap();
        assert_eq!(loaded, Some(newer));
    }
}
