use crate::domain::models::{Feedback, FeedbackReply};
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::{format_timestamp, optional_timestamp_column, timestamp_column};
use rusqlite::{Connection, OptionalExtension, Row, params};

const FEEDBACK_COLUMNS: &str = "id, user_id, emoji, text, is_archived, archived_at, archived_by, created_at";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackFilter {
    pub is_archived: Option<bool>,
    pub user_id: Option<String>,
}

fn map_feedback(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: row.get(0)?,
        user_id: row.get(1)?,
        emoji: row.get(2)?,
        text: row.get(3)?,
        is_archived: row.get(4)?,
        archived_at: optional_timestamp_column(row, 5)?,
        archived_by: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
    })
}

pub fn insert_feedback(connection: &Connection, feedback: &Feedback) -> Result<(), AppError> {
    connection.execute(
        &format!("INSERT INTO feedback ({FEEDBACK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            feedback.id,
            feedback.user_id,
            feedback.emoji,
            feedback.text,
            feedback.is_archived,
            feedback.archived_at.map(format_timestamp),
            feedback.archived_by,
            format_timestamp(feedback.created_at),
        ],
    )?;
    Ok(())
}

pub fn find_feedback(connection: &Connection, feedback_id: &str) -> Result<Option<Feedback>, AppError> {
    connection
        .query_row(
            &format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = ?1"),
            params![feedback_id],
            map_feedback,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_feedback(connection: &Connection, filter: &FeedbackFilter) -> Result<Vec<Feedback>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback
         WHERE (?1 IS NULL OR is_archived = ?1) AND (?2 IS NULL OR user_id = ?2)
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let feedback = statement
        .query_map(params![filter.is_archived, filter.user_id], map_feedback)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(feedback)
}

pub fn set_archived(connection: &Connection, feedback: &Feedback) -> Result<(), AppError> {
    connection.execute(
        "UPDATE feedback SET is_archived = ?1, archived_at = ?2, archived_by = ?3 WHERE id = ?4",
        params![
            feedback.is_archived,
            feedback.archived_at.map(format_timestamp),
            feedback.archived_by,
            feedback.id,
        ],
    )?;
    Ok(())
}

pub fn delete_feedback(connection: &Connection, feedback_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute("DELETE FROM feedback WHERE id = ?1", params![feedback_id])?;
    Ok(deleted > 0)
}

pub fn insert_reply(connection: &Connection, reply: &FeedbackReply) -> Result<(), AppError> {
    connection.execute(
        "INSERT INTO feedback_replies (id, feedback_id, admin_id, message, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            reply.id,
            reply.feedback_id,
            reply.admin_id,
            reply.message,
            format_timestamp(reply.created_at),
        ],
    )?;
    Ok(())
}

pub fn replies_for(connection: &Connection, feedback_id: &str) -> Result<Vec<FeedbackReply>, AppError> {
    let mut statement = connection.prepare(
        "SELECT id, feedback_id, admin_id, message, created_at FROM feedback_replies
         WHERE feedback_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let replies = statement
        .query_map(params![feedback_id], |row| {
            Ok(FeedbackReply {
                id: row.get(0)?,
                feedback_id: row.get(1)?,
                admin_id: row.get(2)?,
                message: row.get(3)?,
                created_at: timestamp_column(row, 4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(replies)
}
