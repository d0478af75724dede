use crate::application::state::{AppState, next_id};
use crate::domain::models::{Category, value_from_name};
use crate::infrastructure::category_repository::{
    clear_category_references, count_categories, delete_category, find_category, insert_category,
    list_categories, max_sort_order, rename_category_references, update_category,
};
use crate::infrastructure::error::AppError;
use crate::infrastructure::user_repository::require_user;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const DEFAULT_CATEGORY_COLOR: &str = "#9CA3AF";

const DEFAULT_CATEGORIES: [(&str, &str, &str); 12] = [
    ("Learning", "LEARNING", "#3B82F6"),
    ("Work", "WORK", "#22D3EE"),
    ("Health", "HEALTH", "#22C55E"),
    ("Creative", "CREATIVE", "#EC4899"),
    ("Deep Work", "DEEP_WORK", "#FFD700"),
    ("Exercise", "EXERCISE", "#F97316"),
    ("Side Project", "SIDE_PROJECT", "#EC4899"),
    ("DSA", "DSA", "#FFD700"),
    ("Meeting", "MEETING", "#8B5CF6"),
    ("Admin", "ADMIN", "#9CA3AF"),
    ("Break", "BREAK", "#D1D5DB"),
    ("Other", "OTHER", "#9CA3AF"),
];

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeletedCategory {
    pub category: Category,
    pub was_in_use: bool,
    pub usage_count: usize,
}

pub(crate) fn seed_default_categories(
    connection: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    if count_categories(connection, user_id)? > 0 {
        return Ok(0);
    }
    for (position, (name, value, color)) in DEFAULT_CATEGORIES.iter().enumerate() {
        insert_category(
            connection,
            &Category {
                id: next_id("cat"),
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
    Ok(DEFAULT_CATEGORIES.len())
}

pub fn seed_default_categories_impl(state: &AppState, user_id: &str) -> Result<usize, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    require_user(&transaction, user_id)?;
    let seeded = seed_default_categories(&transaction, user_id, state.now())?;
    transaction.commit()?;
    if seeded > 0 {
        state.log_info("seed_categories", &format!("seeded {seeded} categories for user_id={user_id}"));
    }
    Ok(seeded)
}

pub fn create_category_impl(state: &AppState, user_id: &str, input: NewCategory) -> Result<Category, AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)?;

    let name = input.name.trim().to_string();
    let sort_order = match input.sort_order {
        Some(sort_order) => sort_order,
        None => max_sort_order(&connection, user_id)? + 1,
    };
    let category = Category {
        id: next_id("cat"),
        user_id: user_id.to_string(),
        value: value_from_name(&name),
        name,
        color: input
            .color
            .map(|color| color.trim().to_string())
            .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
        sort_order,
        is_default: false,
        created_at: state.now(),
    };
    category.validate().map_err(AppError::Validation)?;
    insert_category(&connection, &category)?;

    state.log_info(
        "create_category",
        &format!("created category_id={} value={}", category.id, category.value),
    );
    Ok(category)
}

pub fn list_categories_impl(state: &AppState, user_id: &str) -> Result<Vec<Category>, AppError> {
    let connection = state.database().connect()?;
    list_categories(&connection, user_id)
}

pub fn update_category_impl(
    state: &AppState,
    user_id: &str,
    category_id: &str,
    changes: CategoryChanges,
) -> Result<Category, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    let mut category =
        find_category(&transaction, user_id, category_id)?.ok_or_else(|| AppError::not_found("category"))?;
    let previous_value = category.value.clone();

    if let Some(name) = changes.name {
        category.name = name.trim().to_string();
        category.value = value_from_name(&category.name);
    }
    if let Some(color) = changes.color {
        category.color = color.trim().to_string();
    }
    if let Some(sort_order) = changes.sort_order {
        category.sort_order = sort_order;
    }
    category.validate().map_err(AppError::Validation)?;
    update_category(&transaction, &category)?;
    let moved = if category.value != previous_value {
        rename_category_references(&transaction, user_id, &previous_value, &category.value)?
    } else {
        0
    };
    transaction.commit()?;

    state.log_info(
        "update_category",
        &format!("updated category_id={category_id} value={} moved_references={moved}", category.value),
    );
    Ok(category)
}

pub fn delete_category_impl(state: &AppState, user_id: &str, category_id: &str) -> Result<DeletedCategory, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    let category =
        find_category(&transaction, user_id, category_id)?.ok_or_else(|| AppError::not_found("category"))?;
    delete_category(&transaction, user_id, category_id)?;
    let usage_count = clear_category_references(&transaction, user_id, &category.value)?;
    transaction.commit()?;

    state.log_info(
        "delete_category",
        &format!("deleted category_id={category_id} cleared_references={usage_count}"),
    );
    Ok(DeletedCategory {
        category,
        was_in_use: usage_count > 0,
        usage_count,
    })
}
