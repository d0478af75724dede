use crate::application::state::{AppState, next_id};
use crate::domain::models::{Label, value_from_name};
use crate::infrastructure::error::AppError;
use crate::infrastructure::goal_repository::find_goal;
use crate::infrastructure::label_repository::{
    count_goals_with_label, count_labels, delete_label, find_label, insert_label, labels_for_goal, list_labels,
    max_sort_order, replace_goal_labels, set_sort_order, update_label,
};
use crate::infrastructure::user_repository::require_user;
use chrono::{DateTime, Datelike, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const DEFAULT_LABEL_COLOR: &str = "#6B7280";

const DEFAULT_LABELS: [(&str, &str, &str); 7] = [
    ("Q1", "Q1", "#3B82F6"),
    ("Q2", "Q2", "#22C55E"),
    ("Q3", "Q3", "#F97316"),
    ("Q4", "Q4", "#EC4899"),
    ("High Priority", "HIGH_PRIORITY", "#EF4444"),
    ("Personal", "PERSONAL", "#06B6D4"),
    ("Professional", "PROFESSIONAL", "#6366F1"),
];
const YEAR_LABEL_COLOR: &str = "#8B5CF6";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewLabel {
    pub name: String,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelChanges {
    pub name: Option<String>,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LabelView {
    #[serde(flatten)]
    pub label: Label,
    pub goal_count: u32,
}

pub(crate) fn seed_default_labels(connection: &Connection, user_id: &str, now: DateTime<Utc>) -> Result<usize, AppError> {
    if count_labels(connection, user_id)? > 0 {
        return Ok(0);
    }
    let year = now.year().to_string();
    let mut defaults: Vec<(&str, &str, &str)> = DEFAULT_LABELS[..4].to_vec();
    defaults.push((year.as_str(), year.as_str(), YEAR_LABEL_COLOR));
    defaults.extend_from_slice(&DEFAULT_LABELS[4..]);

    for (position, (name, value, color)) in defaults.iter().enumerate() {
        insert_label(
            connection,
            &Label {
                id: next_id("lbl"),
                user_id: user_id.to_string(),
                name: (*name).to_string(),
                value: (*value).to_string(),
                color: (*color).to_string(),
                sort_order: i64::try_from(position).unwrap_or(0) + 1,
                is_default: true,
                created_at: now,
            },
        )?;
    }
    Ok(defaults.len())
}

pub fn create_label_impl(state: &AppState, user_id: &str, input: NewLabel) -> Result<Label, AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)?;

    let name = input.name.trim().to_string();
    let sort_order = match input.sort_order {
        Some(sort_order) => sort_order,
        None => max_sort_order(&connection, user_id)? + 1,
    };
    let label = Label {
        id: next_id("lbl"),
        user_id: user_id.to_string(),
        value: value_from_name(&name),
        name,
        color: input
            .color
            .map(|color| color.trim().to_string())
            .unwrap_or_else(|| DEFAULT_LABEL_COLOR.to_string()),
        sort_order,
        is_default: false,
        created_at: state.now(),
    };
    label.validate().map_err(AppError::Validation)?;
    insert_label(&connection, &label)?;

    state.log_info("create_label", &format!("created label_id={} value={}", label.id, label.value));
    Ok(label)
}

pub fn list_labels_impl(state: &AppState, user_id: &str) -> Result<Vec<LabelView>, AppError> {
    let connection = state.database().connect()?;
    Ok(list_labels(&connection, user_id)?
        .into_iter()
        .map(|(label, goal_count)| LabelView { label, goal_count })
        .collect())
}

pub fn get_label_impl(state: &AppState, user_id: &str, label_id: &str) -> Result<LabelView, AppError> {
    let connection = state.database().connect()?;
    let label = find_label(&connection, user_id, label_id)?.ok_or_else(|| AppError::not_found("label"))?;
    let goal_count = count_goals_with_label(&connection, &label.id)?;
    Ok(LabelView { label, goal_count })
}

pub fn update_label_impl(
    state: &AppState,
    user_id: &str,
    label_id: &str,
    changes: LabelChanges,
) -> Result<Label, AppError> {
    let connection = state.database().connect()?;
    let mut label = find_label(&connection, user_id, label_id)?.ok_or_else(|| AppError::not_found("label"))?;

    if let Some(name) = changes.name {
        label.name = name.trim().to_string();
        label.value = value_from_name(&label.name);
    }
    if let Some(color) = changes.color {
        label.color = color.trim().to_string();
    }
    if let Some(sort_order) = changes.sort_order {
        label.sort_order = sort_order;
    }
    label.validate().map_err(AppError::Validation)?;
    update_label(&connection, &label)?;

    state.log_info("update_label", &format!("updated label_id={label_id} value={}", label.value));
    Ok(label)
}

pub fn delete_label_impl(state: &AppState, user_id: &str, label_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    if !delete_label(&connection, user_id, label_id)? {
        return Err(AppError::not_found("label"));
    }
    state.log_info("delete_label", &format!("deleted label_id={label_id}"));
    Ok(())
}

pub fn reorder_labels_impl(state: &AppState, user_id: &str, label_ids: &[String]) -> Result<Vec<LabelView>, AppError> {
    {
        let mut connection = state.database().connect()?;
        let transaction = connection.transaction()?;
        for (position, label_id) in label_ids.iter().enumerate() {
            let sort_order = i64::try_from(position).unwrap_or(i64::MAX - 1) + 1;
            if !set_sort_order(&transaction, user_id, label_id, sort_order)? {
                return Err(AppError::not_found("label"));
            }
        }
        transaction.commit()?;
    }
    state.log_info("reorder_labels", &format!("reordered {} labels", label_ids.len()));
    list_labels_impl(state, user_id)
}

pub fn assign_labels_impl(
    state: &AppState,
    user_id: &str,
    goal_id: &str,
    label_ids: &[String],
) -> Result<Vec<Label>, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    find_goal(&transaction, user_id, goal_id)?.ok_or_else(|| AppError::not_found("goal"))?;
    for label_id in label_ids {
        find_label(&transaction, user_id, label_id)?.ok_or_else(|| AppError::not_found("label"))?;
    }
    replace_goal_labels(&transaction, goal_id, label_ids)?;
    let labels = labels_for_goal(&transaction, goal_id)?;
    transaction.commit()?;

    state.log_info(
        "assign_labels",
        &format!("goal_id={goal_id} labels={}", labels.len()),
    );
    Ok(labels)
}

pub fn goal_labels_impl(state: &AppState, user_id: &str, goal_id: &str) -> Result<Vec<Label>, AppError> {
    let connection = state.database().connect()?;
    find_goal(&connection, user_id, goal_id)?.ok_or_else(|| AppError::not_found("goal"))?;
    labels_for_goal(&connection, goal_id)
}
