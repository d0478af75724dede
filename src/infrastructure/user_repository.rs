use crate::domain::models::{PlanType, SubscriptionStatus, User, UserRole, UserType};
use crate::infrastructure::error::{AppError, is_unique_violation};
use crate::infrastructure::storage::{
    enum_column, format_timestamp, optional_enum_column, optional_timestamp_column, timestamp_column,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

const USER_COLUMNS: &str = "id, email, name, user_type, plan, subscription_status, subscription_end_date,
     billing_subscription_id, unlimited_access, admin_assigned_plan, invoice_pending, created_at, role";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        user_type: enum_column(row, 3, UserType::parse)?,
        role: enum_column(row, 12, UserRole::parse)?,
        plan: enum_column(row, 4, PlanType::parse)?,
        subscription_status: optional_enum_column(row, 5, SubscriptionStatus::parse)?,
        subscription_end_date: optional_timestamp_column(row, 6)?,
        billing_subscription_id: row.get(7)?,
        unlimited_access: row.get(8)?,
        admin_assigned_plan: optional_enum_column(row, 9, PlanType::parse)?,
        invoice_pending: row.get(10)?,
        created_at: timestamp_column(row, 11)?,
    })
}

pub fn insert_user(connection: &Connection, user: &User) -> Result<(), AppError> {
    let result = connection.execute(
        &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"),
        params![
            user.id,
            user.email,
            user.name,
            user.user_type.as_str(),
            user.plan.as_str(),
            user.subscription_status.map(SubscriptionStatus::as_str),
            user.subscription_end_date.map(format_timestamp),
            user.billing_subscription_id,
            user.unlimited_access,
            user.admin_assigned_plan.map(PlanType::as_str),
            user.invoice_pending,
            format_timestamp(user.created_at),
            user.role.as_str(),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(format!(
            "a user with email {} already exists",
            user.email
        ))),
        Err(error) => Err(error.into()),
    }
}

pub fn find_user(connection: &Connection, user_id: &str) -> Result<Option<User>, AppError> {
    connection
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            map_user,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn find_user_by_email(connection: &Connection, email: &str) -> Result<Option<User>, AppError> {
    connection
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            map_user,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn require_user(connection: &Connection, user_id: &str) -> Result<User, AppError> {
    find_user(connection, user_id)?.ok_or_else(|| AppError::not_found("user"))
}

pub fn update_user(connection: &Connection, user: &User) -> Result<(), AppError> {
    let updated = connection.execute(
        "UPDATE users SET name = ?1, user_type = ?2, role = ?3, plan = ?4, subscription_status = ?5,
                subscription_end_date = ?6, billing_subscription_id = ?7, unlimited_access = ?8,
                admin_assigned_plan = ?9, invoice_pending = ?10
         WHERE id = ?11",
        params![
            user.name,
            user.user_type.as_str(),
            user.role.as_str(),
            user.plan.as_str(),
            user.subscription_status.map(SubscriptionStatus::as_str),
            user.subscription_end_date.map(format_timestamp),
            user.billing_subscription_id,
            user.unlimited_access,
            user.admin_assigned_plan.map(PlanType::as_str),
            user.invoice_pending,
            user.id,
        ],
    )?;
    if updated == 0 {
        return Err(AppError::not_found("user"));
    }
    Ok(())
}

pub fn list_users(connection: &Connection, limit: u32, offset: u32) -> Result<Vec<User>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id ASC LIMIT ?1 OFFSET ?2"
    ))?;
    let users = statement
        .query_map(params![limit, offset], map_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn count_users(connection: &Connection) -> Result<u32, AppError> {
    let count: u32 = connection.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}
