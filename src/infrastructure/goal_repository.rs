use crate::domain::models::{Goal, GoalStatus};
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::{
    enum_column, format_date, format_timestamp, optional_date_column, timestamp_column,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

const GOAL_COLUMNS: &str =
    "id, user_id, title, description, category, color, target_hours, logged_hours, deadline, status, created_at";

fn map_goal(row: &Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        color: row.get(5)?,
        target_hours: row.get(6)?,
        logged_hours: row.get(7)?,
        deadline: optional_date_column(row, 8)?,
        status: enum_column(row, 9, GoalStatus::parse)?,
        created_at: timestamp_column(row, 10)?,
    })
}

pub fn insert_goal(connection: &Connection, goal: &Goal) -> Result<(), AppError> {
    connection.execute(
        &format!("INSERT INTO goals ({GOAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            goal.id,
            goal.user_id,
            goal.title,
            goal.description,
            goal.category,
            goal.color,
            goal.target_hours,
            goal.logged_hours,
            goal.deadline.map(format_date),
            goal.status.as_str(),
            format_timestamp(goal.created_at),
        ],
    )?;
    Ok(())
}

/// Writes the editable fields. `status` is only written when given, so a
/// completion recorded by a concurrent progress update is kept.
pub fn update_goal(connection: &Connection, goal: &Goal, status: Option<GoalStatus>) -> Result<(), AppError> {
    connection.execute(
        "UPDATE goals
         SET title = ?1, description = ?2, category = ?3, color = ?4, target_hours = ?5,
             deadline = ?6, status = COALESCE(?7, status)
         WHERE id = ?8 AND user_id = ?9",
        params![
            goal.title,
            goal.description,
            goal.category,
            goal.color,
            goal.target_hours,
            goal.deadline.map(format_date),
            status.map(GoalStatus::as_str),
            goal.id,
            goal.user_id,
        ],
    )?;
    Ok(())
}

pub fn find_goal(connection: &Connection, user_id: &str, goal_id: &str) -> Result<Option<Goal>, AppError> {
    connection
        .query_row(
            &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1 AND user_id = ?2"),
            params![goal_id, user_id],
            map_goal,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_goals(
    connection: &Connection,
    user_id: &str,
    status: Option<GoalStatus>,
) -> Result<Vec<Goal>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {GOAL_COLUMNS} FROM goals
         WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC"
    ))?;
    let goals = statement
        .query_map(params![user_id, status.map(GoalStatus::as_str)], map_goal)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(goals)
}

pub fn delete_goal(connection: &Connection, user_id: &str, goal_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute(
        "DELETE FROM goals WHERE id = ?1 AND user_id = ?2",
        params![goal_id, user_id],
    )?;
    Ok(deleted > 0)
}

pub fn count_open_goals(connection: &Connection, user_id: &str) -> Result<u32, AppError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM goals WHERE user_id = ?1 AND status != 'COMPLETED'",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct GoalStatusCounts {
    pub total: u32,
    pub active: u32,
    pub completed: u32,
    pub paused: u32,
}

pub fn goal_status_counts(connection: &Connection, user_id: &str) -> Result<GoalStatusCounts, AppError> {
    let mut statement =
        connection.prepare("SELECT status, COUNT(*) FROM goals WHERE user_id = ?1 GROUP BY status")?;
    let rows = statement
        .query_map(params![user_id], |row| {
            Ok((enum_column(row, 0, GoalStatus::parse)?, row.get::<_, u32>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut counts = GoalStatusCounts::default();
    for (status, count) in rows {
        counts.total += count;
        match status {
            GoalStatus::Active => counts.active = count,
            GoalStatus::Completed => counts.completed = count,
            GoalStatus::Paused => counts.paused = count,
        }
    }
    Ok(counts)
}

/// Credits `delta_minutes` of logged time to the goal in a single statement.
/// Hours are rounded to six places so sums of whole minutes land exactly on
/// the target. A positive delta that reaches the target completes the goal; a
/// negative one never reopens it.
pub fn adjust_logged_minutes(connection: &Connection, goal_id: &str, delta_minutes: i64) -> Result<(), AppError> {
    if delta_minutes == 0 {
        return Ok(());
    }
    connection.execute(
        "UPDATE goals
         SET logged_hours = MAX(0, ROUND(logged_hours + ?1 / 60.0, 6)),
             status = CASE
               WHEN ?1 > 0 AND ROUND(logged_hours + ?1 / 60.0, 6) >= target_hours THEN 'COMPLETED'
               ELSE status
             END
         WHERE id = ?2",
        params![delta_minutes, goal_id],
    )?;
    Ok(())
}
