use crate::application::state::{AppState, next_id};
use crate::domain::models::Note;
use crate::infrastructure::error::AppError;
use crate::infrastructure::note_repository::{
    delete_note, descendant_ids, find_note, insert_note, list_notes, max_sibling_order, update_note,
};
use crate::infrastructure::user_repository::require_user;
use rusqlite::Connection;
use serde::Deserialize;

const EMPTY_CONTENT: &str = "[]";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewNote {
    pub title: String,
    pub content: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NoteChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub parent_id: Option<String>,
    pub move_to_root: bool,
    pub sort_order: Option<i64>,
    pub is_expanded: Option<bool>,
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NoteMove {
    pub note_id: String,
    pub parent_id: Option<String>,
    pub sort_order: i64,
}

fn owned_note(connection: &Connection, user_id: &str, note_id: &str) -> Result<Note, AppError> {
    let note = find_note(connection, note_id)?.ok_or_else(|| AppError::not_found("note"))?;
    if note.user_id != user_id {
        return Err(AppError::forbidden("you do not have access to this note"));
    }
    Ok(note)
}

/// The parent must belong to the user and must not sit inside the moved note's subtree.
fn check_parent(connection: &Connection, user_id: &str, note_id: Option<&str>, parent_id: &str) -> Result<(), AppError> {
    owned_note(connection, user_id, parent_id)?;
    if let Some(note_id) = note_id {
        if note_id == parent_id || descendant_ids(connection, note_id)?.iter().any(|id| id == parent_id) {
            return Err(AppError::forbidden("cannot move a note to its own descendant"));
        }
    }
    Ok(())
}

pub fn list_notes_impl(state: &AppState, user_id: &str) -> Result<Vec<Note>, AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)?;
    list_notes(&connection, user_id)
}

pub fn get_note_impl(state: &AppState, user_id: &str, note_id: &str) -> Result<Note, AppError> {
    let connection = state.database().connect()?;
    owned_note(&connection, user_id, note_id)
}

pub fn create_note_impl(state: &AppState, user_id: &str, input: NewNote) -> Result<Note, AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)?;
    let parent_id = input.parent_id.filter(|parent_id| !parent_id.trim().is_empty());
    if let Some(parent_id) = &parent_id {
        check_parent(&connection, user_id, None, parent_id)?;
    }

    let now = state.now();
    let sort_order = max_sibling_order(&connection, user_id, parent_id.as_deref())?.map_or(0, |max| max + 1);
    let note = Note {
        id: next_id("note"),
        user_id: user_id.to_string(),
        parent_id,
        title: input.title.trim().to_string(),
        content: input.content.unwrap_or_else(|| EMPTY_CONTENT.to_string()),
        icon: input.icon,
        color: input.color.map(|color| color.trim().to_string()),
        sort_order,
        is_expanded: true,
        is_favorite: false,
        created_at: now,
        updated_at: now,
    };
    note.validate().map_err(AppError::Validation)?;
    insert_note(&connection, &note)?;

    state.log_info("create_note", &format!("user_id={user_id} note_id={} order={sort_order}", note.id));
    Ok(note)
}

pub fn update_note_impl(state: &AppState, user_id: &str, note_id: &str, changes: NoteChanges) -> Result<Note, AppError> {
    let connection = state.database().connect()?;
    let mut note = owned_note(&connection, user_id, note_id)?;

    if changes.move_to_root {
        note.parent_id = None;
    } else if let Some(parent_id) = changes.parent_id {
        check_parent(&connection, user_id, Some(&note.id), &parent_id)?;
        note.parent_id = Some(parent_id);
    }
    if let Some(title) = changes.title {
        note.title = title.trim().to_string();
    }
    if let Some(content) = changes.content {
        note.content = content;
    }
    if let Some(icon) = changes.icon {
        note.icon = Some(icon);
    }
    if let Some(color) = changes.color {
        note.color = Some(color.trim().to_string());
    }
    if let Some(sort_order) = changes.sort_order {
        note.sort_order = sort_order;
    }
    if let Some(is_expanded) = changes.is_expanded {
        note.is_expanded = is_expanded;
    }
    if let Some(is_favorite) = changes.is_favorite {
        note.is_favorite = is_favorite;
    }
    note.updated_at = state.now();
    note.validate().map_err(AppError::Validation)?;
    update_note(&connection, &note)?;

    state.log_info("update_note", &format!("user_id={user_id} note_id={note_id}"));
    Ok(note)
}

pub fn delete_note_impl(state: &AppState, user_id: &str, note_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    let note = owned_note(&connection, user_id, note_id)?;
    delete_note(&connection, &note.id)?;
    state.log_info("delete_note", &format!("user_id={user_id} note_id={note_id}"));
    Ok(())
}

pub fn reorder_notes_impl(state: &AppState, user_id: &str, moves: Vec<NoteMove>) -> Result<(), AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    let now = state.now();
    for item in &moves {
        let mut note = owned_note(&transaction, user_id, &item.note_id)?;
        if let Some(parent_id) = &item.parent_id {
            check_parent(&transaction, user_id, Some(&note.id), parent_id)?;
        }
        note.parent_id = item.parent_id.clone();
        note.sort_order = item.sort_order;
        note.updated_at = now;
        update_note(&transaction, &note)?;
    }
    transaction.commit()?;

    state.log_info("reorder_notes", &format!("user_id={user_id} moved={}", moves.len()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{TempWorkspace, seed_user};
    use crate::domain::models::PlanType;

    fn note(state: &AppState, user_id: &str, title: &str, parent_id: Option<&str>) -> Note {
        create_note_impl(
            state,
            user_id,
            NewNote {
                title: title.to_string(),
                parent_id: parent_id.map(str::to_string),
                ..NewNote::default()
            },
        )
        .expect("create note")
    }

    #[test]
    fn siblings_append_and_children_cascade() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);

        let root = note(&state, &user.id, "Projects", None);
        let second_root = note(&state, &user.id, "Journal", None);
        let child = note(&state, &user.id, "Time Master", Some(&root.id));
        let grandchild = note(&state, &user.id, "Ideas", Some(&child.id));
        assert_eq!(root.sort_order, 0);
        assert_eq!(second_root.sort_order, 1);
        assert_eq!(child.sort_order, 0);
        assert_eq!(root.content, "[]");

        let listed = list_notes_impl(&state, &user.id).expect("list");
        assert_eq!(listed[0].parent_id, None);
        assert_eq!(listed.len(), 4);

        delete_note_impl(&state, &user.id, &root.id).expect("delete");
        let remaining = list_notes_impl(&state, &user.id).expect("list");
        assert_eq!(remaining.len(), 1);
        assert!(matches!(
            get_note_impl(&state, &user.id, &grandchild.id),
            Err(AppError::NotFound { entity: "note" })
        ));
    }

    #[test]
    fn moving_under_own_descendant_is_forbidden() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);
        let root = note(&state, &user.id, "Root", None);
        let child = note(&state, &user.id, "Child", Some(&root.id));
        let grandchild = note(&state, &user.id, "Grandchild", Some(&child.id));

        let into_grandchild = update_note_impl(
            &state,
            &user.id,
            &root.id,
            NoteChanges { parent_id: Some(grandchild.id.clone()), ..NoteChanges::default() },
        );
        assert!(matches!(into_grandchild, Err(AppError::Forbidden { .. })));
        let into_itself = update_note_impl(
            &state,
            &user.id,
            &root.id,
            NoteChanges { parent_id: Some(root.id.clone()), ..NoteChanges::default() },
        );
        assert!(matches!(into_itself, Err(AppError::Forbidden { .. })));

        let moved = update_note_impl(
            &state,
            &user.id,
            &grandchild.id,
            NoteChanges { move_to_root: true, is_favorite: Some(true), ..NoteChanges::default() },
        )
        .expect("move to root");
        assert_eq!(moved.parent_id, None);
        assert!(moved.is_favorite);
    }

    #[test]
    fn reorder_is_all_or_nothing_and_notes_are_private() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let ada = seed_user(&state, "ada@example.com", PlanType::Free);
        let bob = seed_user(&state, "bob@example.com", PlanType::Free);
        let first = note(&state, &ada.id, "First", None);
        let second = note(&state, &ada.id, "Second", None);
        let private = note(&state, &bob.id, "Bob's", None);

        assert!(matches!(
            get_note_impl(&state, &ada.id, &private.id),
            Err(AppError::Forbidden { .. })
        ));

        let result = reorder_notes_impl(
            &state,
            &ada.id,
            vec![
                NoteMove { note_id: second.id.clone(), parent_id: None, sort_order: 0 },
                NoteMove { note_id: private.id.clone(), parent_id: None, sort_order: 1 },
            ],
        );
        assert!(matches!(result, Err(AppError::Forbidden { .. })));
        assert_eq!(get_note_impl(&state, &ada.id, &second.id).expect("second").sort_order, 1);

        reorder_notes_impl(
            &state,
            &ada.id,
            vec![
                NoteMove { note_id: second.id.clone(), parent_id: None, sort_order: 0 },
                NoteMove { note_id: first.id.clone(), parent_id: Some(second.id.clone()), sort_order: 0 },
            ],
        )
        .expect("reorder");
        let moved = get_note_impl(&state, &ada.id, &first.id).expect("first");
        assert_eq!(moved.parent_id.as_deref(), Some(second.id.as_str()));
    }
}
