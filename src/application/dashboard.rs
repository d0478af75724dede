use crate::application::state::AppState;
use crate::application::time_entries::current_week;
use crate::domain::activity::{
    MonthlyReport, WeeklyReport, WeeklySummary, month_bounds, monthly_report, week_end, weekly_report,
    weekly_summary,
};
use crate::domain::report::{ReportEntry, format_duration};
use crate::infrastructure::error::AppError;
use crate::infrastructure::goal_repository::goal_status_counts;
use crate::infrastructure::time_entry_repository::{
    ReportQuery, count_entries_on, report_entries, sum_minutes_between,
};
use crate::infrastructure::user_repository::require_user;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub today_minutes: u32,
    pub today_formatted: String,
    pub weekly_minutes: u32,
    pub weekly_formatted: String,
    pub active_goals: u32,
    pub tasks_logged: u32,
}

pub fn dashboard_stats_impl(state: &AppState, user_id: &str) -> Result<DashboardStats, AppError> {
    let connection = state.database().connect()?;
    let user = require_user(&connection, user_id)?;
    let today = state.today();
    let (week_start, week_end) = current_week(today);

    let today_minutes = sum_minutes_between(&connection, &user.id, today, today)?;
    let weekly_minutes = sum_minutes_between(&connection, &user.id, week_start, week_end)?;
    let active_goals = goal_status_counts(&connection, &user.id)?.active;
    let tasks_logged = count_entries_on(&connection, &user.id, today)?;

    Ok(DashboardStats {
        today_minutes,
        today_formatted: format_duration(today_minutes),
        weekly_minutes,
        weekly_formatted: format_duration(weekly_minutes),
        active_goals,
        tasks_logged,
    })
}

pub fn weekly_report_impl(
    state: &AppState,
    user_id: &str,
    week_start: Option<NaiveDate>,
) -> Result<WeeklyReport, AppError> {
    let start = week_start.unwrap_or_else(|| current_week(state.today()).0);
    let entries = entries_between(state, user_id, start, week_end(start))?;
    Ok(weekly_report(&entries, start))
}

pub fn weekly_summary_impl(state: &AppState, user_id: &str, week_start: NaiveDate) -> Result<WeeklySummary, AppError> {
    let entries = entries_between(state, user_id, week_start, week_end(week_start))?;
    Ok(weekly_summary(&entries, week_start))
}

pub fn monthly_report_impl(state: &AppState, user_id: &str, year: i32, month: u32) -> Result<MonthlyReport, AppError> {
    let (start, end) =
        month_bounds(year, month).ok_or_else(|| AppError::Validation(format!("invalid month: {year}-{month}")))?;
    let entries = entries_between(state, user_id, start, end)?;
    Ok(monthly_report(&entries, year, month))
}

fn entries_between(
    state: &AppState,
    user_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<ReportEntry>, AppError> {
    let connection = state.database().connect()?;
    let user = require_user(&connection, user_id)?;
    report_entries(
        &connection,
        &ReportQuery {
            user_id: user.id,
            start: Some(start),
            end: Some(end),
            ..ReportQuery::default()
        },
    )
}
