use crate::domain::models::Note;
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::{format_timestamp, timestamp_column};
use rusqlite::{Connection, OptionalExtension, Row, params};

const NOTE_COLUMNS: &str =
    "id, user_id, parent_id, title, content, icon, color, sort_order, is_expanded, is_favorite, created_at, updated_at";

fn map_note(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        user_id: row.get(1)?,
        parent_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        icon: row.get(5)?,
        color: row.get(6)?,
        sort_order: row.get(7)?,
        is_expanded: row.get(8)?,
        is_favorite: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
        updated_at: timestamp_column(row, 11)?,
    })
}

pub fn insert_note(connection: &Connection, note: &Note) -> Result<(), AppError> {
    connection.execute(
        &format!("INSERT INTO notes ({NOTE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
        params![
            note.id,
            note.user_id,
            note.parent_id,
            note.title,
            note.content,
            note.icon,
            note.color,
            note.sort_order,
            note.is_expanded,
            note.is_favorite,
            format_timestamp(note.created_at),
            format_timestamp(note.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_note(connection: &Connection, note: &Note) -> Result<(), AppError> {
    connection.execute(
        "UPDATE notes SET parent_id = ?1, title = ?2, content = ?3, icon = ?4, color = ?5, sort_order = ?6,
                is_expanded = ?7, is_favorite = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            note.parent_id,
            note.title,
            note.content,
            note.icon,
            note.color,
            note.sort_order,
            note.is_expanded,
            note.is_favorite,
            format_timestamp(note.updated_at),
            note.id,
        ],
    )?;
    Ok(())
}

pub fn find_note(connection: &Connection, note_id: &str) -> Result<Option<Note>, AppError> {
    connection
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
            params![note_id],
            map_note,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_notes(connection: &Connection, user_id: &str) -> Result<Vec<Note>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = ?1
         ORDER BY parent_id ASC, sort_order ASC, created_at ASC"
    ))?;
    let notes = statement.query_map(params![user_id], map_note)?.collect::<Result<Vec<_>, _>>()?;
    Ok(notes)
}

pub fn max_sibling_order(connection: &Connection, user_id: &str, parent_id: Option<&str>) -> Result<Option<i64>, AppError> {
    let max: Option<i64> = connection.query_row(
        "SELECT MAX(sort_order) FROM notes WHERE user_id = ?1 AND parent_id IS ?2",
        params![user_id, parent_id],
        |row| row.get(0),
    )?;
    Ok(max)
}

pub fn descendant_ids(connection: &Connection, note_id: &str) -> Result<Vec<String>, AppError> {
    let mut statement = connection.prepare(
        "WITH RECURSIVE descendants(id) AS (
           SELECT id FROM notes WHERE parent_id = ?1
           UNION
           SELECT notes.id FROM notes JOIN descendants ON notes.parent_id = descendants.id
         )
         SELECT id FROM descendants",
    )?;
    let ids = statement
        .query_map(params![note_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn delete_note(connection: &Connection, note_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute("DELETE FROM notes WHERE id = ?1", params![note_id])?;
    Ok(deleted > 0)
}
