use crate::domain::models::ScheduleBlock;
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::{format_timestamp, timestamp_column};
use rusqlite::{Connection, OptionalExtension, Row, params};

const BLOCK_COLUMNS: &str =
    "id, user_id, title, day_of_week, start_time, end_time, category, color, goal_id, series_id, created_at";

fn map_block(row: &Row<'_>) -> rusqlite::Result<ScheduleBlock> {
    Ok(ScheduleBlock {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        day_of_week: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        category: row.get(6)?,
        color: row.get(7)?,
        goal_id: row.get(8)?,
        series_id: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
    })
}

pub fn insert_block(connection: &Connection, block: &ScheduleBlock) -> Result<(), AppError> {
    connection.execute(
        &format!("INSERT INTO schedule_blocks ({BLOCK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            block.id,
            block.user_id,
            block.title,
            block.day_of_week,
            block.start_time,
            block.end_time,
            block.category,
            block.color,
            block.goal_id,
            block.series_id,
            format_timestamp(block.created_at),
        ],
    )?;
    Ok(())
}

pub fn update_block(connection: &Connection, block: &ScheduleBlock) -> Result<(), AppError> {
    connection.execute(
        "UPDATE schedule_blocks
         SET title = ?1, day_of_week = ?2, start_time = ?3, end_time = ?4, category = ?5,
             color = ?6, goal_id = ?7
         WHERE id = ?8 AND user_id = ?9",
        params![
            block.title,
            block.day_of_week,
            block.start_time,
            block.end_time,
            block.category,
            block.color,
            block.goal_id,
            block.id,
            block.user_id,
        ],
    )?;
    Ok(())
}

pub fn find_block(connection: &Connection, user_id: &str, block_id: &str) -> Result<Option<ScheduleBlock>, AppError> {
    connection
        .query_row(
            &format!("SELECT {BLOCK_COLUMNS} FROM schedule_blocks WHERE id = ?1 AND user_id = ?2"),
            params![block_id, user_id],
            map_block,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_blocks(connection: &Connection, user_id: &str) -> Result<Vec<ScheduleBlock>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {BLOCK_COLUMNS} FROM schedule_blocks WHERE user_id = ?1 ORDER BY day_of_week, start_time"
    ))?;
    let blocks = statement
        .query_map(params![user_id], map_block)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(blocks)
}

pub fn list_series(connection: &Connection, user_id: &str, series_id: &str) -> Result<Vec<ScheduleBlock>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {BLOCK_COLUMNS} FROM schedule_blocks
         WHERE user_id = ?1 AND series_id = ?2
         ORDER BY day_of_week, start_time"
    ))?;
    let blocks = statement
        .query_map(params![user_id, series_id], map_block)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(blocks)
}

pub fn count_blocks(connection: &Connection, user_id: &str) -> Result<u32, AppError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM schedule_blocks WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_block(connection: &Connection, user_id: &str, block_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute(
        "DELETE FROM schedule_blocks WHERE id = ?1 AND user_id = ?2",
        params![block_id, user_id],
    )?;
    Ok(deleted > 0)
}

pub fn delete_series(connection: &Connection, user_id: &str, series_id: &str) -> Result<usize, AppError> {
    let deleted = connection.execute(
        "DELETE FROM schedule_blocks WHERE series_id = ?1 AND user_id = ?2",
        params![series_id, user_id],
    )?;
    Ok(deleted)
}
