use crate::application::accounts::require_admin;
use crate::application::state::{AppState, next_id};
use crate::domain::models::ReleaseNote;
use crate::infrastructure::error::AppError;
use crate::infrastructure::release_note_repository::{
    delete_release_note, find_release_note, insert_release_note, is_seen, latest_release_note, list_release_notes,
    mark_seen, reset_seen, unseen_release_notes, update_release_note,
};
use crate::infrastructure::user_repository::require_user;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewReleaseNote {
    pub version: String,
    pub title: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ReleaseNoteChanges {
    pub version: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub reset_seen: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LatestReleaseNote {
    pub note: Option<ReleaseNote>,
    pub seen: bool,
}

pub fn create_release_note_impl(state: &AppState, admin_id: &str, input: NewReleaseNote) -> Result<ReleaseNote, AppError> {
    let connection = state.database().connect()?;
    require_admin(&connection, admin_id)?;
    let now = state.now();
    let note = ReleaseNote {
        id: next_id("rel"),
        version: input.version.trim().to_string(),
        title: input.title.trim().to_string(),
        content: input.content,
        published_at: input.published_at.unwrap_or(now),
        created_at: now,
    };
    note.validate().map_err(AppError::Validation)?;
    insert_release_note(&connection, &note)?;

    state.log_info("create_release_note", &format!("note_id={} version={}", note.id, note.version));
    Ok(note)
}

pub fn update_release_note_impl(
    state: &AppState,
    admin_id: &str,
    note_id: &str,
    changes: ReleaseNoteChanges,
) -> Result<ReleaseNote, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    require_admin(&transaction, admin_id)?;
    let mut note = find_release_note(&transaction, note_id)?.ok_or_else(|| AppError::not_found("release note"))?;
    if let Some(version) = changes.version {
        note.version = version.trim().to_string();
    }
    if let Some(title) = changes.title {
        note.title = title.trim().to_string();
    }
    if let Some(content) = changes.content {
        note.content = content;
    }
    if let Some(published_at) = changes.published_at {
        note.published_at = published_at;
    }
    note.validate().map_err(AppError::Validation)?;
    update_release_note(&transaction, &note)?;
    let cleared = if changes.reset_seen { reset_seen(&transaction, &note.id)? } else { 0 };
    transaction.commit()?;

    state.log_info("update_release_note", &format!("note_id={note_id} cleared_receipts={cleared}"));
    Ok(note)
}

pub fn list_release_notes_impl(state: &AppState) -> Result<Vec<ReleaseNote>, AppError> {
    let connection = state.database().connect()?;
    list_release_notes(&connection)
}

pub fn delete_release_note_impl(state: &AppState, admin_id: &str, note_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    require_admin(&connection, admin_id)?;
    if !delete_release_note(&connection, note_id)? {
        return Err(AppError::not_found("release note"));
    }
    state.log_info("delete_release_note", &format!("note_id={note_id}"));
    Ok(())
}

pub fn latest_release_note_impl(state: &AppState, user_id: &str) -> Result<LatestReleaseNote, AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)?;
    match latest_release_note(&connection)? {
        Some(note) => {
            let seen = is_seen(&connection, &note.id, user_id)?;
            Ok(LatestReleaseNote { note: Some(note), seen })
        }
        None => Ok(LatestReleaseNote { note: None, seen: true }),
    }
}

pub fn mark_release_note_seen_impl(state: &AppState, user_id: &str, note_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)?;
    find_release_note(&connection, note_id)?.ok_or_else(|| AppError::not_found("release note"))?;
    mark_seen(&connection, note_id, user_id, state.now())
}

pub fn unseen_release_notes_impl(state: &AppState, user_id: &str) -> Result<Vec<ReleaseNote>, AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)?;
    unseen_release_notes(&connection, user_id)
}
