use crate::domain::models::SharedAccess;
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::{format_timestamp, optional_timestamp_column, timestamp_column};
use rusqlite::{Connection, OptionalExtension, Row, params};

const SHARE_COLUMNS: &str =
    "s.id, s.owner_id, s.shared_with_id, s.invite_email, s.invite_token, s.invite_expires, s.is_accepted, s.created_at";

fn map_share(row: &Row<'_>) -> rusqlite::Result<SharedAccess> {
    Ok(SharedAccess {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        shared_with_id: row.get(2)?,
        invite_email: row.get(3)?,
        invite_token: row.get(4)?,
        invite_expires: optional_timestamp_column(row, 5)?,
        is_accepted: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
    })
}

fn query_shares(
    connection: &Connection,
    where_clause: &str,
    values: &[&dyn rusqlite::ToSql],
) -> Result<Vec<SharedAccess>, AppError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {SHARE_COLUMNS} FROM shared_access s WHERE {where_clause} ORDER BY s.created_at DESC"
    ))?;
    let shares = statement
        .query_map(values, map_share)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(shares)
}

fn query_share(
    connection: &Connection,
    where_clause: &str,
    values: &[&dyn rusqlite::ToSql],
) -> Result<Option<SharedAccess>, AppError> {
    connection
        .query_row(
            &format!("SELECT {SHARE_COLUMNS} FROM shared_access s WHERE {where_clause}"),
            values,
            map_share,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn insert_share(connection: &Connection, share: &SharedAccess) -> Result<(), AppError> {
    connection.execute(
        "INSERT INTO shared_access (id, owner_id, shared_with_id, invite_email, invite_token,
             invite_expires, is_accepted, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            share.id,
            share.owner_id,
            share.shared_with_id,
            share.invite_email,
            share.invite_token,
            share.invite_expires.map(format_timestamp),
            share.is_accepted,
            format_timestamp(share.created_at),
        ],
    )?;
    Ok(())
}

pub fn update_share(connection: &Connection, share: &SharedAccess) -> Result<(), AppError> {
    connection.execute(
        "UPDATE shared_access
         SET shared_with_id = ?1, invite_email = ?2, invite_token = ?3, invite_expires = ?4,
             is_accepted = ?5
         WHERE id = ?6",
        params![
            share.shared_with_id,
            share.invite_email,
            share.invite_token,
            share.invite_expires.map(format_timestamp),
            share.is_accepted,
            share.id,
        ],
    )?;
    Ok(())
}

pub fn delete_share(connection: &Connection, share_id: &str) -> Result<bool, AppError> {
    let deleted = connection.execute("DELETE FROM shared_access WHERE id = ?1", params![share_id])?;
    Ok(deleted > 0)
}

pub fn find_share(connection: &Connection, share_id: &str) -> Result<Option<SharedAccess>, AppError> {
    query_share(connection, "s.id = ?1", &[&share_id])
}

pub fn find_by_token(connection: &Connection, token: &str) -> Result<Option<SharedAccess>, AppError> {
    query_share(connection, "s.invite_token = ?1", &[&token])
}

pub fn find_for_owner_and_email(
    connection: &Connection,
    owner_id: &str,
    email: &str,
) -> Result<Option<SharedAccess>, AppError> {
    query_share(
        connection,
        "s.owner_id = ?1
         AND (s.invite_email = ?2
              OR s.shared_with_id IN (SELECT id FROM users WHERE email = ?2))
         ORDER BY s.created_at DESC LIMIT 1",
        &[&owner_id, &email],
    )
}

pub fn list_by_owner(connection: &Connection, owner_id: &str) -> Result<Vec<SharedAccess>, AppError> {
    query_shares(connection, "s.owner_id = ?1", &[&owner_id])
}

pub fn list_pending_for(connection: &Connection, user_id: &str, email: &str) -> Result<Vec<SharedAccess>, AppError> {
    query_shares(
        connection,
        "s.owner_id != ?1 AND s.is_accepted = 0 AND (s.invite_email = ?2 OR s.shared_with_id = ?1)",
        &[&user_id, &email],
    )
}

pub fn list_shared_with(connection: &Connection, user_id: &str) -> Result<Vec<SharedAccess>, AppError> {
    query_shares(connection, "s.shared_with_id = ?1 AND s.is_accepted = 1", &[&user_id])
}

pub fn has_accepted_access(connection: &Connection, owner_id: &str, accessor_id: &str) -> Result<bool, AppError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM shared_access
         WHERE owner_id = ?1 AND shared_with_id = ?2 AND is_accepted = 1",
        params![owner_id, accessor_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
