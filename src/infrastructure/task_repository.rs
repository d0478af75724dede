use crate::domain::models::{Task, TaskStatus};
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::{
    enum_column, format_date, format_timestamp, optional_date_column, optional_timestamp_column,
    timestamp_column,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

const TASK_COLUMNS: &str = "t.id, t.user_id, t.title, t.description, t.category, t.status, t.estimated_minutes,
     t.actual_minutes, t.goal_id, t.schedule_block_id, t.due_date, t.completed_at, t.sort_order, t.created_at";

fn map_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        status: enum_column(row, 5, TaskStatus::parse)?,
        estimated_minutes: row.get(6)?,
        actual_minutes: row.get(7)?,
        goal_id: row.get(8)?,
        schedule_block_id: row.get(9)?,
        due_date: optional_date_column(row, 10)?,
        completed_at: optional_timestamp_column(row, 11)?,
        sort_order: row.get(12)?,
        created_at: timestamp_column(row, 13)?,
    })
}

pub fn insert_task(connection: &Connection, task: &Task) -> Result<(), AppError> {
    connection.execute(
        "INSERT INTO tasks (id, user_id, title, description, category, status, estimated_minutes,
             actual_minutes, goal_id, schedule_block_id, due_date, completed_at, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            task.id,
            task.user_id,
            task.title,
            task.description,
            task.category,
            task.status.as_str(),
            task.estimated_minutes,
            task.actual_minutes,
            task.goal_id,
            task.schedule_block_id,
            task.due_date.map(format_date),
            task.completed_at.map(format_timestamp),
            task.sort_order,
            format_timestamp(task.created_at),
        ],
    )?;
    Ok(())
}

pub fn update_task(connection: &Connection, task: &Task) -> Result<(), AppError> {
    connection.execute(
        "UPDATE tasks
         SET title = ?1, description = ?2, category = ?3, status = ?4, estimated_minutes = ?5,
             actual_minutes = ?6, goal_id = ?7, schedule_block_id = ?8, due_date = ?9,
             completed_at = ?10, sort_order = ?11
         WHERE id = ?12 AND user_id = ?13",
        params![
            task.title,
            task.description,
            task.category,
            task.status.as_str(),
            task.estimated_minutes,
            task.actual_minutes,
            task.goal_id,
            task.schedule_block_id,
            task.due_date.map(format_date),
            task.completed_at.map(format_timestamp),
            task.sort_order,
            task.id,
            task.user_id,
        ],
    )?;
    Ok(())
}

pub fn find_task(connection: &Connection, user_id: &str, task_id: &str) -> Result<Option<Task>, AppError> {
    connection
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1 AND t.user_id = ?2"),
            params![task_id, user_id],
            map_task,
        )
        .optional()
        .map_err(AppError::from)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub goal_id: Option<String>,
    pub schedule_block_id: Option<String>,
    pub day_of_week: Option<u8>,
}

pub fn list_tasks(connection: &Connection, user_id: &str, filter: &TaskFilter) -> Result<Vec<(Task, u32)>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {TASK_COLUMNS},
                (SELECT COALESCE(SUM(e.duration_minutes), 0) FROM time_entries e WHERE e.task_id = t.id)
         FROM tasks t
         LEFT JOIN schedule_blocks b ON b.id = t.schedule_block_id
         WHERE t.user_id = ?1
           AND (?2 IS NULL OR t.status = ?2)
           AND (?3 IS NULL OR t.goal_id = ?3)
           AND (?4 IS NULL OR t.schedule_block_id = ?4)
           AND (?5 IS NULL OR b.day_of_week = ?5)
         ORDER BY t.sort_order ASC, t.created_at DESC"
    ))?;
    let mut tasks = statement
        .query_map(
            params![
                user_id,
                filter.status.map(TaskStatus::as_str),
                filter.goal_id,
                filter.schedule_block_id,
                filter.day_of_week,
            ],
            |row| Ok((map_task(row)?, row.get::<_, u32>(14)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    tasks.sort_by_key(|(task, _)| task.status.rank());
    Ok(tasks)
}

pub fn max_sort_order(connection: &Connection, user_id: &str) -> Result<i64, AppError> {
    let max: i64 = connection.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) FROM tasks WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(max)
}

pub fn set_sort_order(connection: &Connection, user_id: &str, task_id: &str, sort_order: i64) -> Result<bool, AppError> {
    let updated = connection.execute(
        "UPDATE tasks SET sort_order = ?1 WHERE id = ?2 AND user_id = ?3",
        params![sort_order, task_id, user_id],
    )?;
    Ok(updated > 0)
}

pub fn delete_task(connection: &Connection, user_id: &str, task_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute(
        "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
        params![task_id, user_id],
    )?;
    Ok(deleted > 0)
}
