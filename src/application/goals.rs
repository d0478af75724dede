use crate::application::accounts::{authorize_mutation, plan_tier};
use crate::application::state::{AppState, next_id};
use crate::domain::entitlements::{ResourceKind, check_capacity};
use crate::domain::models::{Goal, GoalStatus};
use crate::infrastructure::error::AppError;
use crate::infrastructure::goal_repository::{
    GoalStatusCounts, count_open_goals, delete_goal, find_goal, goal_status_counts, insert_goal, list_goals,
    update_goal,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DEFAULT_GOAL_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewGoal {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub target_hours: f64,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GoalChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub target_hours: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub status: Option<GoalStatus>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    Overdue,
    Completed,
    InProgress,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GoalProgress {
    pub id: String,
    pub title: String,
    pub color: String,
    pub logged_hours: f64,
    pub target_hours: f64,
    pub progress: u32,
    pub deadline: Option<NaiveDate>,
    pub days_left: Option<i64>,
    pub status: ProgressStatus,
}

impl GoalProgress {
    pub fn of(goal: &Goal, today: NaiveDate) -> Self {
        let ratio = if goal.target_hours > 0.0 {
            goal.logged_hours / goal.target_hours * 100.0
        } else {
            0.0
        };
        let remaining_days = goal.deadline.map(|deadline| (deadline - today).num_days());
        let status = if remaining_days.is_some_and(|days| days < 0) {
            ProgressStatus::Overdue
        } else if ratio >= 100.0 {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        };

        Self {
            id: goal.id.clone(),
            title: goal.title.clone(),
            color: goal.color.clone(),
            logged_hours: goal.logged_hours,
            target_hours: goal.target_hours,
            progress: ratio.round().clamp(0.0, 100.0) as u32,
            deadline: goal.deadline,
            days_left: remaining_days.map(|days| days.max(0)),
            status,
        }
    }
}

pub fn create_goal_impl(state: &AppState, user_id: &str, input: NewGoal) -> Result<Goal, AppError> {
    let connection = state.database().connect()?;
    let user = authorize_mutation(&connection, user_id)?;
    let open_goals = count_open_goals(&connection, &user.id)?;
    check_capacity(plan_tier(state, &user), ResourceKind::Goals, open_goals)?;

    let goal = Goal {
        id: next_id("goal"),
        user_id: user.id,
        title: input.title.trim().to_string(),
        description: non_empty(input.description),
        category: non_empty(input.category),
        color: input
            .color
            .map(|color| color.trim().to_string())
            .unwrap_or_else(|| DEFAULT_GOAL_COLOR.to_string()),
        target_hours: input.target_hours,
        logged_hours: 0.0,
        deadline: input.deadline,
        status: GoalStatus::Active,
        created_at: state.now(),
    };
    goal.validate().map_err(AppError::Validation)?;
    insert_goal(&connection, &goal)?;

    state.log_info("create_goal", &format!("created goal_id={}", goal.id));
    Ok(goal)
}

pub fn list_goals_impl(state: &AppState, user_id: &str, status: Option<GoalStatus>) -> Result<Vec<Goal>, AppError> {
    let connection = state.database().connect()?;
    list_goals(&connection, user_id, status)
}

pub fn get_goal_impl(state: &AppState, user_id: &str, goal_id: &str) -> Result<Goal, AppError> {
    let connection = state.database().connect()?;
    find_goal(&connection, user_id, goal_id)?.ok_or_else(|| AppError::not_found("goal"))
}

pub fn update_goal_impl(
    state: &AppState,
    user_id: &str,
    goal_id: &str,
    changes: GoalChanges,
) -> Result<Goal, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    authorize_mutation(&transaction, user_id)?;
    let mut goal = find_goal(&transaction, user_id, goal_id)?.ok_or_else(|| AppError::not_found("goal"))?;

    if let Some(title) = changes.title {
        goal.title = title.trim().to_string();
    }
    if let Some(description) = changes.description {
        goal.description = non_empty(Some(description));
    }
    if let Some(category) = changes.category {
        goal.category = non_empty(Some(category));
    }
    if let Some(color) = changes.color {
        goal.color = color.trim().to_string();
    }
    if let Some(target_hours) = changes.target_hours {
        goal.target_hours = target_hours;
    }
    if let Some(deadline) = changes.deadline {
        goal.deadline = Some(deadline);
    }
    if let Some(status) = changes.status {
        goal.status = status;
    }
    goal.validate().map_err(AppError::Validation)?;
    update_goal(&transaction, &goal, changes.status)?;
    let goal = find_goal(&transaction, user_id, goal_id)?.ok_or_else(|| AppError::not_found("goal"))?;
    transaction.commit()?;

    state.log_info("update_goal", &format!("updated goal_id={goal_id}"));
    Ok(goal)
}

pub fn delete_goal_impl(state: &AppState, user_id: &str, goal_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    authorize_mutation(&connection, user_id)?;
    if !delete_goal(&connection, user_id, goal_id)? {
        return Err(AppError::not_found("goal"));
    }
    state.log_info("delete_goal", &format!("deleted goal_id={goal_id}"));
    Ok(())
}

pub fn goal_stats_impl(state: &AppState, user_id: &str) -> Result<GoalStatusCounts, AppError> {
    let connection = state.database().connect()?;
    goal_status_counts(&connection, user_id)
}

pub fn goal_progress_impl(state: &AppState, user_id: &str) -> Result<Vec<GoalProgress>, AppError> {
    let connection = state.database().connect()?;
    let mut goals = list_goals(&connection, user_id, Some(GoalStatus::Active))?;
    goals.sort_by_key(|goal| (goal.deadline.is_none(), goal.deadline));
    let today = state.today();
    Ok(goals.iter().map(|goal| GoalProgress::of(goal, today)).collect())
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
