use crate::domain::models::{Notification, NotificationKind};
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::{enum_column, format_timestamp, optional_timestamp_column, timestamp_column};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, data, read_at, created_at";

fn map_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let raw: String = row.get(5)?;
    let data = serde_json::from_str(&raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(error)))?;
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: enum_column(row, 2, NotificationKind::parse)?,
        title: row.get(3)?,
        body: row.get(4)?,
        data,
        read_at: optional_timestamp_column(row, 6)?,
        created_at: timestamp_column(row, 7)?,
    })
}

pub fn insert_notification(connection: &Connection, notification: &Notification) -> Result<(), AppError> {
    connection.execute(
        &format!("INSERT INTO notifications ({NOTIFICATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            notification.id,
            notification.user_id,
            notification.kind.as_str(),
            notification.title,
            notification.body,
            serde_json::to_string(&notification.data)?,
            notification.read_at.map(format_timestamp),
            format_timestamp(notification.created_at),
        ],
    )?;
    Ok(())
}

pub fn find_notification(connection: &Connection, notification_id: &str) -> Result<Option<Notification>, AppError> {
    connection
        .query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
            params![notification_id],
            map_notification,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_notifications(
    connection: &Connection,
    user_id: &str,
    after: Option<&str>,
    limit: u32,
) -> Result<Vec<Notification>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE user_id = ?1
           AND (?2 IS NULL OR (created_at, rowid) < (SELECT created_at, rowid FROM notifications WHERE id = ?2))
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?3"
    ))?;
    let notifications = statement
        .query_map(params![user_id, after, limit], map_notification)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(notifications)
}

pub fn count_unread(connection: &Connection, user_id: &str) -> Result<u32, AppError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read_at IS NULL",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn mark_read(connection: &Connection, notification_id: &str, read_at: DateTime<Utc>) -> Result<(), AppError> {
    connection.execute(
        "UPDATE notifications SET read_at = ?1 WHERE id = ?2",
        params![format_timestamp(read_at), notification_id],
    )?;
    Ok(())
}
