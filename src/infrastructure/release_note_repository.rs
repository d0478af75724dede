use crate::domain::models::ReleaseNote;
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::{format_timestamp, timestamp_column};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

const RELEASE_NOTE_COLUMNS: &str = "id, version, title, content, published_at, created_at";

fn map_release_note(row: &Row<'_>) -> rusqlite::Result<ReleaseNote> {
    Ok(ReleaseNote {
        id: row.get(0)?,
        version: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        published_at: timestamp_column(row, 4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

pub fn insert_release_note(connection: &Connection, note: &ReleaseNote) -> Result<(), AppError> {
    connection.execute(
        &format!("INSERT INTO release_notes ({RELEASE_NOTE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            note.id,
            note.version,
            note.title,
            note.content,
            format_timestamp(note.published_at),
            format_timestamp(note.created_at),
        ],
    )?;
    Ok(())
}

pub fn update_release_note(connection: &Connection, note: &ReleaseNote) -> Result<(), AppError> {
    connection.execute(
        "UPDATE release_notes SET version = ?1, title = ?2, content = ?3, published_at = ?4 WHERE id = ?5",
        params![note.version, note.title, note.content, format_timestamp(note.published_at), note.id],
    )?;
    Ok(())
}

pub fn find_release_note(connection: &Connection, note_id: &str) -> Result<Option<ReleaseNote>, AppError> {
    connection
        .query_row(
            &format!("SELECT {RELEASE_NOTE_COLUMNS} FROM release_notes WHERE id = ?1"),
            params![note_id],
            map_release_note,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_release_notes(connection: &Connection) -> Result<Vec<ReleaseNote>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {RELEASE_NOTE_COLUMNS} FROM release_notes ORDER BY published_at DESC, rowid DESC"
    ))?;
    let notes = statement.query_map([], map_release_note)?.collect::<Result<Vec<_>, _>>()?;
    Ok(notes)
}

pub fn latest_release_note(connection: &Connection) -> Result<Option<ReleaseNote>, AppError> {
    connection
        .query_row(
            &format!("SELECT {RELEASE_NOTE_COLUMNS} FROM release_notes ORDER BY published_at DESC, rowid DESC LIMIT 1"),
            [],
            map_release_note,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn unseen_release_notes(connection: &Connection, user_id: &str) -> Result<Vec<ReleaseNote>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {RELEASE_NOTE_COLUMNS} FROM release_notes
         WHERE NOT EXISTS (
           SELECT 1 FROM release_note_seen seen WHERE seen.note_id = release_notes.id AND seen.user_id = ?1
         )
         ORDER BY published_at DESC, rowid DESC"
    ))?;
    let notes = statement
        .query_map(params![user_id], map_release_note)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(notes)
}

pub fn delete_release_note(connection: &Connection, note_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute("DELETE FROM release_notes WHERE id = ?1", params![note_id])?;
    Ok(deleted > 0)
}

pub fn mark_seen(connection: &Connection, note_id: &str, user_id: &str, seen_at: DateTime<Utc>) -> Result<(), AppError> {
    connection.execute(
        "INSERT INTO release_note_seen (note_id, user_id, seen_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (note_id, user_id) DO UPDATE SET seen_at = excluded.seen_at",
        params![note_id, user_id, format_timestamp(seen_at)],
    )?;
    Ok(())
}

pub fn is_seen(connection: &Connection, note_id: &str, user_id: &str) -> Result<bool, AppError> {
    let seen: bool = connection.query_row(
        "SELECT EXISTS (SELECT 1 FROM release_note_seen WHERE note_id = ?1 AND user_id = ?2)",
        params![note_id, user_id],
        |row| row.get(0),
    )?;
    Ok(seen)
}

pub fn reset_seen(connection: &Connection, note_id: &str) -> Result<usize, AppError> {
    let cleared = connection.execute("DELETE FROM release_note_seen WHERE note_id = ?1", params![note_id])?;
    Ok(cleared)
}
