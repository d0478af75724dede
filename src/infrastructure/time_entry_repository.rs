use crate::domain::models::{TimeEntry, TimeEntrySource};
use crate::domain::report::{BlockRef, GoalRef, ReportEntry, TaskRef};
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::{date_column, enum_column, format_date, format_timestamp, timestamp_column};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

const ENTRY_COLUMNS: &str = "id, user_id, task_name, duration_minutes, date, day_of_week, started_at, notes,
     goal_id, task_id, schedule_block_id, source, created_at";

fn map_entry(row: &Row<'_>) -> rusqlite::Result<TimeEntry> {
    Ok(TimeEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task_name: row.get(2)?,
        duration_minutes: row.get(3)?,
        date: date_column(row, 4)?,
        day_of_week: row.get(5)?,
        started_at: timestamp_column(row, 6)?,
        notes: row.get(7)?,
        goal_id: row.get(8)?,
        task_id: row.get(9)?,
        schedule_block_id: row.get(10)?,
        source: enum_column(row, 11, TimeEntrySource::parse)?,
        created_at: timestamp_column(row, 12)?,
    })
}

pub fn insert_entry(connection: &Connection, entry: &TimeEntry) -> Result<(), AppError> {
    connection.execute(
        &format!(
            "INSERT INTO time_entries ({ENTRY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        params![
            entry.id,
            entry.user_id,
            entry.task_name,
            entry.duration_minutes,
            format_date(entry.date),
            entry.day_of_week,
            format_timestamp(entry.started_at),
            entry.notes,
            entry.goal_id,
            entry.task_id,
            entry.schedule_block_id,
            entry.source.as_str(),
            format_timestamp(entry.created_at),
        ],
    )?;
    Ok(())
}

pub fn update_entry(connection: &Connection, entry: &TimeEntry) -> Result<(), AppError> {
    connection.execute(
        "UPDATE time_entries
         SET task_name = ?1, duration_minutes = ?2, date = ?3, day_of_week = ?4, started_at = ?5,
             notes = ?6, goal_id = ?7, task_id = ?8, schedule_block_id = ?9
         WHERE id = ?10 AND user_id = ?11",
        params![
            entry.task_name,
            entry.duration_minutes,
            format_date(entry.date),
            entry.day_of_week,
            format_timestamp(entry.started_at),
            entry.notes,
            entry.goal_id,
            entry.task_id,
            entry.schedule_block_id,
            entry.id,
            entry.user_id,
        ],
    )?;
    Ok(())
}

pub fn find_entry(connection: &Connection, user_id: &str, entry_id: &str) -> Result<Option<TimeEntry>, AppError> {
    connection
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM time_entries WHERE id = ?1 AND user_id = ?2"),
            params![entry_id, user_id],
            map_entry,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn delete_entry(connection: &Connection, user_id: &str, entry_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute(
        "DELETE FROM time_entries WHERE id = ?1 AND user_id = ?2",
        params![entry_id, user_id],
    )?;
    Ok(deleted > 0)
}

pub fn list_entries(
    connection: &Connection,
    user_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TimeEntry>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM time_entries
         WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date DESC, started_at DESC"
    ))?;
    let entries = statement
        .query_map(params![user_id, format_date(start), format_date(end)], map_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn recent_entries(connection: &Connection, user_id: &str, limit: u32) -> Result<Vec<TimeEntry>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM time_entries
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2"
    ))?;
    let entries = statement
        .query_map(params![user_id, limit], map_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn count_entries_on(connection: &Connection, user_id: &str, date: NaiveDate) -> Result<u32, AppError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM time_entries WHERE user_id = ?1 AND date = ?2",
        params![user_id, format_date(date)],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_entries_between(
    connection: &Connection,
    user_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<u32, AppError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM time_entries WHERE user_id = ?1 AND date >= ?2 AND date <= ?3",
        params![user_id, format_date(start), format_date(end)],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn sum_minutes_between(
    connection: &Connection,
    user_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<u32, AppError> {
    let total: u32 = connection.query_row(
        "SELECT COALESCE(SUM(duration_minutes), 0) FROM time_entries
         WHERE user_id = ?1 AND date >= ?2 AND date <= ?3",
        params![user_id, format_date(start), format_date(end)],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn tracked_minutes_for_task(connection: &Connection, task_id: &str) -> Result<u32, AppError> {
    let total: u32 = connection.query_row(
        "SELECT COALESCE(SUM(duration_minutes), 0) FROM time_entries
         WHERE task_id = ?1 AND source = 'TRACKER'",
        params![task_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn total_minutes_for_task(connection: &Connection, task_id: &str) -> Result<u32, AppError> {
    let total: u32 = connection.query_row(
        "SELECT COALESCE(SUM(duration_minutes), 0) FROM time_entries WHERE task_id = ?1",
        params![task_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn find_completion_entry(connection: &Connection, task_id: &str) -> Result<Option<TimeEntry>, AppError> {
    connection
        .query_row(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM time_entries
                 WHERE task_id = ?1 AND source = 'COMPLETION'
                 ORDER BY created_at DESC LIMIT 1"
            ),
            params![task_id],
            map_entry,
        )
        .optional()
        .map_err(AppError::from)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportQuery {
    pub user_id: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub goal_ids: Vec<String>,
    pub task_ids: Vec<String>,
    pub category: Option<String>,
    pub limit: Option<u32>,
}

const REPORT_SELECT: &str = "SELECT e.id, e.date, e.started_at, e.task_name, e.duration_minutes, e.notes,
            g.id, g.title, g.color, g.category,
            t.id, t.title, t.category,
            b.id, b.title, b.start_time, b.end_time, b.color
     FROM time_entries e
     LEFT JOIN goals g ON g.id = e.goal_id
     LEFT JOIN tasks t ON t.id = e.task_id
     LEFT JOIN schedule_blocks b ON b.id = e.schedule_block_id";

fn map_report_entry(row: &Row<'_>) -> rusqlite::Result<ReportEntry> {
    let goal = match row.get::<_, Option<String>>(6)? {
        Some(id) => Some(GoalRef {
            id,
            title: row.get(7)?,
            color: row.get(8)?,
            category: row.get(9)?,
        }),
        None => None,
    };
    let task = match row.get::<_, Option<String>>(10)? {
        Some(id) => Some(TaskRef {
            id,
            title: row.get(11)?,
        }),
        None => None,
    };
    let schedule_block = match row.get::<_, Option<String>>(13)? {
        Some(id) => Some(BlockRef {
            id,
            title: row.get(14)?,
            start_time: row.get(15)?,
            end_time: row.get(16)?,
            color: row.get(17)?,
        }),
        None => None,
    };
    Ok(ReportEntry {
        id: row.get(0)?,
        date: date_column(row, 1)?,
        started_at: timestamp_column(row, 2)?,
        task_name: row.get(3)?,
        duration_minutes: row.get(4)?,
        notes: row.get(5)?,
        task_category: if task.is_some() { row.get(12)? } else { None },
        goal,
        task,
        schedule_block,
    })
}

pub fn report_entries(connection: &Connection, query: &ReportQuery) -> Result<Vec<ReportEntry>, AppError> {
    let mut clauses = vec!["e.user_id = ?".to_string()];
    let mut values = vec![query.user_id.clone()];
    if let Some(start) = query.start {
        clauses.push("e.date >= ?".to_string());
        values.push(format_date(start));
    }
    if let Some(end) = query.end {
        clauses.push("e.date <= ?".to_string());
        values.push(format_date(end));
    }
    if !query.goal_ids.is_empty() {
        clauses.push(format!("e.goal_id IN ({})", placeholders(query.goal_ids.len())));
        values.extend(query.goal_ids.iter().cloned());
    }
    if !query.task_ids.is_empty() {
        clauses.push(format!("e.task_id IN ({})", placeholders(query.task_ids.len())));
        values.extend(query.task_ids.iter().cloned());
    }
    if let Some(category) = &query.category {
        clauses.push("COALESCE(g.category, t.category) = ?".to_string());
        values.push(category.clone());
    }

    let mut sql = format!(
        "{REPORT_SELECT} WHERE {} ORDER BY e.date DESC, e.started_at DESC",
        clauses.join(" AND ")
    );
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut statement = connection.prepare(&sql)?;
    let entries = statement
        .query_map(params_from_iter(values.iter()), map_report_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
