use crate::domain::models::Category;
use crate::infrastructure::error::{AppError, is_unique_violation};
use crate::infrastructure::storage::{format_timestamp, timestamp_column};
use rusqlite::{Connection, OptionalExtension, Row, params};

const CATEGORY_COLUMNS: &str = "id, user_id, name, value, color, sort_order, is_default, created_at";

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
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

pub fn insert_category(connection: &Connection, category: &Category) -> Result<(), AppError> {
    let result = connection.execute(
        &format!("INSERT INTO categories ({CATEGORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            category.id,
            category.user_id,
            category.name,
            category.value,
            category.color,
            category.sort_order,
            category.is_default,
            format_timestamp(category.created_at),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(format!(
            "category with name \"{}\" already exists",
            category.name
        ))),
        Err(error) => Err(error.into()),
    }
}

pub fn update_category(connection: &Connection, category: &Category) -> Result<(), AppError> {
    let result = connection.execute(
        "UPDATE categories SET name = ?1, value = ?2, color = ?3, sort_order = ?4 WHERE id = ?5 AND user_id = ?6",
        params![
            category.name,
            category.value,
            category.color,
            category.sort_order,
            category.id,
            category.user_id,
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(format!(
            "category with name \"{}\" already exists",
            category.name
        ))),
        Err(error) => Err(error.into()),
    }
}

pub fn find_category(connection: &Connection, user_id: &str, category_id: &str) -> Result<Option<Category>, AppError> {
    connection
        .query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1 AND user_id = ?2"),
            params![category_id, user_id],
            map_category,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_categories(connection: &Connection, user_id: &str) -> Result<Vec<Category>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE user_id = ?1 ORDER BY sort_order ASC, created_at ASC"
    ))?;
    let categories = statement
        .query_map(params![user_id], map_category)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn count_categories(connection: &Connection, user_id: &str) -> Result<u32, AppError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM categories WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn max_sort_order(connection: &Connection, user_id: &str) -> Result<i64, AppError> {
    let max: i64 = connection.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) FROM categories WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(max)
}

pub fn delete_category(connection: &Connection, user_id: &str, category_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute(
        "DELETE FROM categories WHERE id = ?1 AND user_id = ?2",
        params![category_id, user_id],
    )?;
    Ok(deleted > 0)
}

pub fn rename_category_references(
    connection: &Connection,
    user_id: &str,
    from: &str,
    to: &str,
) -> Result<usize, AppError> {
    let mut renamed = 0;
    for table in ["goals", "schedule_blocks", "tasks"] {
        renamed += connection.execute(
            &format!("UPDATE {table} SET category = ?3 WHERE user_id = ?1 AND category = ?2"),
            params![user_id, from, to],
        )?;
    }
    Ok(renamed)
}

pub fn clear_category_references(connection: &Connection, user_id: &str, value: &str) -> Result<usize, AppError> {
    let mut cleared = 0;
    for table in ["goals", "schedule_blocks", "tasks"] {
        cleared += connection.execute(
            &format!("UPDATE {table} SET category = NULL WHERE user_id = ?1 AND category = ?2"),
            params![user_id, value],
        )?;
    }
    Ok(cleared)
}
