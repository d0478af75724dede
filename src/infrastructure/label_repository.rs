use crate::domain::models::Label;
use crate::infrastructure::error::{AppError, is_unique_violation};
use crate::infrastructure::storage::{format_timestamp, timestamp_column};
use rusqlite::{Connection, OptionalExtension, Row, params};

const LABEL_COLUMNS: &str = "id, user_id, name, value, color, sort_order, is_default, created_at";

fn map_label(row: &Row<'_>) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        value: row.get(3)?,
        color: row.get(4)?,
        sort_order: row.get(5)?,
        is_default: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
    })
}

fn duplicate_name(result: rusqlite::Result<usize>, name: &str) -> Result<(), AppError> {
    match result {
        Ok(_) => Ok(()),
        Err(error) if is_unique_violation(&error) => {
            Err(AppError::Conflict(format!("label with name \"{name}\" already exists")))
        }
        Err(error) => Err(error.into()),
    }
}

pub fn insert_label(connection: &Connection, label: &Label) -> Result<(), AppError> {
    let result = connection.execute(
        &format!("INSERT INTO labels ({LABEL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            label.id,
            label.user_id,
            label.name,
            label.value,
            label.color,
            label.sort_order,
            label.is_default,
            format_timestamp(label.created_at),
        ],
    );
    duplicate_name(result, &label.name)
}

pub fn update_label(connection: &Connection, label: &Label) -> Result<(), AppError> {
    let result = connection.execute(
        "UPDATE labels SET name = ?1, value = ?2, color = ?3, sort_order = ?4 WHERE id = ?5 AND user_id = ?6",
        params![label.name, label.value, label.color, label.sort_order, label.id, label.user_id],
    );
    duplicate_name(result, &label.name)
}

pub fn find_label(connection: &Connection, user_id: &str, label_id: &str) -> Result<Option<Label>, AppError> {
    connection
        .query_row(
            &format!("SELECT {LABEL_COLUMNS} FROM labels WHERE id = ?1 AND user_id = ?2"),
            params![label_id, user_id],
            map_label,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_labels(connection: &Connection, user_id: &str) -> Result<Vec<(Label, u32)>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {LABEL_COLUMNS},
                (SELECT COUNT(*) FROM goal_labels gl WHERE gl.label_id = labels.id)
         FROM labels WHERE user_id = ?1
         ORDER BY sort_order ASC, created_at ASC"
    ))?;
    let labels = statement
        .query_map(params![user_id], |row| Ok((map_label(row)?, row.get(8)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(labels)
}

pub fn count_labels(connection: &Connection, user_id: &str) -> Result<u32, AppError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM labels WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_goals_with_label(connection: &Connection, label_id: &str) -> Result<u32, AppError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM goal_labels WHERE label_id = ?1",
        params![label_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn max_sort_order(connection: &Connection, user_id: &str) -> Result<i64, AppError> {
    let max: i64 = connection.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) FROM labels WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(max)
}

pub fn set_sort_order(connection: &Connection, user_id: &str, label_id: &str, sort_order: i64) -> Result<bool, AppError> {
    let updated = connection.execute(
        "UPDATE labels SET sort_order = ?1 WHERE id = ?2 AND user_id = ?3",
        params![sort_order, label_id, user_id],
    )?;
    Ok(updated > 0)
}

pub fn delete_label(connection: &Connection, user_id: &str, label_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute(
        "DELETE FROM labels WHERE id = ?1 AND user_id = ?2",
        params![label_id, user_id],
    )?;
    Ok(deleted > 0)
}

pub fn replace_goal_labels(connection: &Connection, goal_id: &str, label_ids: &[String]) -> Result<(), AppError> {
    connection.execute("DELETE FROM goal_labels WHERE goal_id = ?1", params![goal_id])?;
    let mut statement = connection.prepare("INSERT OR IGNORE INTO goal_labels (goal_id, label_id) VALUES (?1, ?2)")?;
    for label_id in label_ids {
        statement.execute(params![goal_id, label_id])?;
    }
    Ok(())
}

pub fn labels_for_goal(connection: &Connection, goal_id: &str) -> Result<Vec<Label>, AppError> {
    let mut statement = connection.prepare(
        "SELECT l.id, l.user_id, l.name, l.value, l.color, l.sort_order, l.is_default, l.created_at
         FROM labels l JOIN goal_labels gl ON gl.label_id = l.id
         WHERE gl.goal_id = ?1
         ORDER BY l.sort_order ASC, l.created_at ASC",
    )?;
    let labels = statement
        .query_map(params![goal_id], map_label)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(labels)
}
