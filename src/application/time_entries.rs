use crate::application::accounts::{authorize_mutation, plan_tier};
use crate::application::goals::non_empty;
use crate::application::state::{AppState, next_id};
use crate::domain::entitlements::{ResourceKind, check_capacity};
use crate::domain::models::{TimeEntry, TimeEntrySource, day_of_week};
use crate::domain::report::{format_duration, minutes_to_hours};
use crate::infrastructure::error::AppError;
use crate::infrastructure::goal_repository::{adjust_logged_minutes, find_goal};
use crate::infrastructure::schedule_repository::find_block;
use crate::infrastructure::task_repository::find_task;
use crate::infrastructure::time_entry_repository::{
    count_entries_between, count_entries_on, delete_entry, find_entry, insert_entry, list_entries,
    recent_entries, sum_minutes_between, update_entry,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const DEFAULT_RECENT_LIMIT: u32 = 5;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewTimeEntry {
    pub task_name: String,
    pub duration_minutes: u32,
    pub date: Option<NaiveDate>,
    pub started_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub goal_id: Option<String>,
    pub task_id: Option<String>,
    pub schedule_block_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeEntryChanges {
    pub task_name: Option<String>,
    pub duration_minutes: Option<u32>,
    pub date: Option<NaiveDate>,
    pub started_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub goal_id: Option<String>,
    pub task_id: Option<String>,
    pub schedule_block_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodTotal {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_minutes: u32,
    pub total_formatted: String,
    pub total_hours: f64,
    pub entries_count: u32,
}

pub fn create_time_entry_impl(state: &AppState, user_id: &str, input: NewTimeEntry) -> Result<TimeEntry, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    let user = authorize_mutation(&transaction, user_id)?;

    let date = input.date.unwrap_or_else(|| state.today());
    let entries_that_day = count_entries_on(&transaction, &user.id, date)?;
    check_capacity(plan_tier(state, &user), ResourceKind::TasksPerDay, entries_that_day)?;

    let goal_id = non_empty(input.goal_id);
    let task_id = non_empty(input.task_id);
    let schedule_block_id = non_empty(input.schedule_block_id);
    ensure_owned_relations(
        &transaction,
        &user.id,
        goal_id.as_deref(),
        task_id.as_deref(),
        schedule_block_id.as_deref(),
    )?;

    let now = state.now();
    let entry = TimeEntry {
        id: next_id("ent"),
        user_id: user.id,
        task_name: input.task_name.trim().to_string(),
        duration_minutes: input.duration_minutes,
        date,
        day_of_week: day_of_week(date),
        started_at: input
            .started_at
            .unwrap_or_else(|| default_started_at(state, date, input.duration_minutes)),
        notes: non_empty(input.notes),
        goal_id,
        task_id,
        schedule_block_id,
        source: TimeEntrySource::Tracker,
        created_at: now,
    };
    entry.validate().map_err(AppError::Validation)?;
    insert_entry(&transaction, &entry)?;
    if let Some(goal_id) = &entry.goal_id {
        adjust_logged_minutes(&transaction, goal_id, i64::from(entry.duration_minutes))?;
    }
    transaction.commit()?;

    state.log_info(
        "create_time_entry",
        &format!("created entry_id={} minutes={}", entry.id, entry.duration_minutes),
    );
    Ok(entry)
}

pub fn list_time_entries_impl(
    state: &AppState,
    user_id: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<TimeEntry>, AppError> {
    if end_date < start_date {
        return Err(AppError::Validation("end_date must not be before start_date".to_string()));
    }
    let connection = state.database().connect()?;
    let mut entries = list_entries(&connection, user_id, start_date, end_date)?;
    entries.reverse();
    Ok(entries)
}

pub fn week_time_entries_impl(
    state: &AppState,
    user_id: &str,
    week_start: NaiveDate,
) -> Result<Vec<TimeEntry>, AppError> {
    list_time_entries_impl(state, user_id, week_start, week_start + Duration::days(6))
}

pub fn recent_time_entries_impl(state: &AppState, user_id: &str, limit: Option<u32>) -> Result<Vec<TimeEntry>, AppError> {
    let connection = state.database().connect()?;
    recent_entries(&connection, user_id, limit.unwrap_or(DEFAULT_RECENT_LIMIT))
}

/// Moves progress when the goal or duration changes: the old goal loses the old
/// duration and the new goal gains the new one, in the same transaction.
pub fn update_time_entry_impl(
    state: &AppState,
    user_id: &str,
    entry_id: &str,
    changes: TimeEntryChanges,
) -> Result<TimeEntry, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    authorize_mutation(&transaction, user_id)?;
    let previous =
        find_entry(&transaction, user_id, entry_id)?.ok_or_else(|| AppError::not_found("time entry"))?;

    let mut entry = previous.clone();
    if let Some(task_name) = changes.task_name {
        entry.task_name = task_name.trim().to_string();
    }
    if let Some(duration_minutes) = changes.duration_minutes {
        entry.duration_minutes = duration_minutes;
    }
    if let Some(date) = changes.date {
        entry.date = date;
        entry.day_of_week = day_of_week(date);
    }
    if let Some(started_at) = changes.started_at {
        entry.started_at = started_at;
    }
    if let Some(notes) = changes.notes {
        entry.notes = non_empty(Some(notes));
    }
    if let Some(goal_id) = changes.goal_id {
        entry.goal_id = non_empty(Some(goal_id));
    }
    if let Some(task_id) = changes.task_id {
        entry.task_id = non_empty(Some(task_id));
    }
    if let Some(schedule_block_id) = changes.schedule_block_id {
        entry.schedule_block_id = non_empty(Some(schedule_block_id));
    }
    entry.validate().map_err(AppError::Validation)?;
    ensure_owned_relations(
        &transaction,
        user_id,
        entry.goal_id.as_deref(),
        entry.task_id.as_deref(),
        entry.schedule_block_id.as_deref(),
    )?;
    update_entry(&transaction, &entry)?;

    if previous.goal_id != entry.goal_id || previous.duration_minutes != entry.duration_minutes {
        if let Some(goal_id) = &previous.goal_id {
            adjust_logged_minutes(&transaction, goal_id, -i64::from(previous.duration_minutes))?;
        }
        if let Some(goal_id) = &entry.goal_id {
            adjust_logged_minutes(&transaction, goal_id, i64::from(entry.duration_minutes))?;
        }
    }
    transaction.commit()?;

    state.log_info("update_time_entry", &format!("updated entry_id={entry_id}"));
    Ok(entry)
}

pub fn delete_time_entry_impl(state: &AppState, user_id: &str, entry_id: &str) -> Result<(), AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    authorize_mutation(&transaction, user_id)?;
    let entry = find_entry(&transaction, user_id, entry_id)?.ok_or_else(|| AppError::not_found("time entry"))?;
    if let Some(goal_id) = &entry.goal_id {
        adjust_logged_minutes(&transaction, goal_id, -i64::from(entry.duration_minutes))?;
    }
    delete_entry(&transaction, user_id, entry_id)?;
    transaction.commit()?;

    state.log_info("delete_time_entry", &format!("deleted entry_id={entry_id}"));
    Ok(())
}

pub fn today_total_impl(state: &AppState, user_id: &str) -> Result<PeriodTotal, AppError> {
    let today = state.today();
    period_total(state, user_id, today, today)
}

pub fn week_total_impl(state: &AppState, user_id: &str) -> Result<PeriodTotal, AppError> {
    let (start, end) = current_week(state.today());
    period_total(state, user_id, start, end)
}

pub(crate) fn current_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    (start, start + Duration::days(6))
}

fn period_total(state: &AppState, user_id: &str, start: NaiveDate, end: NaiveDate) -> Result<PeriodTotal, AppError> {
    let connection = state.database().connect()?;
    let total_minutes = sum_minutes_between(&connection, user_id, start, end)?;
    let entries_count = count_entries_between(&connection, user_id, start, end)?;
    Ok(PeriodTotal {
        start_date: start,
        end_date: end,
        total_minutes,
        total_formatted: format_duration(total_minutes),
        total_hours: minutes_to_hours(total_minutes),
        entries_count,
    })
}

pub(crate) fn default_started_at(state: &AppState, date: NaiveDate, duration_minutes: u32) -> DateTime<Utc> {
    let midnight = state.start_of_day(date);
    if date != state.today() {
        return midnight;
    }
    let started = state.now() - Duration::minutes(i64::from(duration_minutes));
    started.max(midnight)
}

pub(crate) fn ensure_owned_relations(
    connection: &Connection,
    user_id: &str,
    goal_id: Option<&str>,
    task_id: Option<&str>,
    schedule_block_id: Option<&str>,
) -> Result<(), AppError> {
    if let Some(goal_id) = goal_id {
        if find_goal(connection, user_id, goal_id)?.is_none() {
            return Err(AppError::forbidden("goal not found or access denied"));
        }
    }
    if let Some(task_id) = task_id {
        if find_task(connection, user_id, task_id)?.is_none() {
            return Err(AppError::forbidden("task not found or access denied"));
        }
    }
    if let Some(schedule_block_id) = schedule_block_id {
        if find_block(connection, user_id, schedule_block_id)?.is_none() {
            return Err(AppError::forbidden("schedule block not found or access denied"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::goals::{NewGoal, create_goal_impl, get_goal_impl};
    use crate::application::test_support::{TempWorkspace, fixed_now, seed_user};
    use crate::domain::entitlements::PlanTier;
    use crate::domain::models::{Goal, GoalStatus, PlanType, User};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn entry(name: &str, minutes: u32) -> NewTimeEntry {
        NewTimeEntry {
            task_name: name.to_string(),
            duration_minutes: minutes,
            ..NewTimeEntry::default()
        }
    }

    fn goal(state: &AppState, user: &User, target_hours: f64) -> Goal {
        create_goal_impl(
            state,
            &user.id,
            NewGoal {
                title: "Rust".to_string(),
                target_hours,
                ..NewGoal::default()
            },
        )
        .expect("create goal")
    }

    #[test]
    fn create_defaults_to_today_and_credits_goal() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);
        let goal = goal(&state, &user, 10.0);

        let created = create_time_entry_impl(
            &state,
            &user.id,
            NewTimeEntry {
                goal_id: Some(goal.id.clone()),
                ..entry("Reading", 90)
            },
        )
        .expect("create entry");

        assert_eq!(created.date, date("2026-03-10"));
        assert_eq!(created.day_of_week, 2);
        assert_eq!(created.started_at, fixed_now() - Duration::minutes(90));
        assert_eq!(created.source, TimeEntrySource::Tracker);
        let goal = get_goal_impl(&state, &user.id, &goal.id).expect("goal");
        assert!((goal.logged_hours - 1.5).abs() < 1e-9);
    }

    #[test]
    fn free_plan_allows_three_entries_per_day() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);

        for index in 0..3 {
            create_time_entry_impl(&state, &user.id, entry(&format!("Task {index}"), 30)).expect("create");
        }
        match create_time_entry_impl(&state, &user.id, entry("Fourth", 30)) {
            Err(AppError::CapacityExceeded(exceeded)) => {
                assert_eq!(exceeded.tier, PlanTier::Free);
                assert_eq!(exceeded.resource, ResourceKind::TasksPerDay);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }

        let tomorrow = NewTimeEntry {
            date: Some(date("2026-03-11")),
            ..entry("Tomorrow", 30)
        };
        let created = create_time_entry_impl(&state, &user.id, tomorrow).expect("other day has room");
        assert_eq!(created.started_at, state.start_of_day(date("2026-03-11")));
    }

    #[test]
    fn linking_another_users_goal_is_forbidden() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let owner = seed_user(&state, "ada@example.com", PlanType::Free);
        let intruder = seed_user(&state, "eve@example.com", PlanType::Free);
        let goal = goal(&state, &owner, 10.0);

        let result = create_time_entry_impl(
            &state,
            &intruder.id,
            NewTimeEntry {
                goal_id: Some(goal.id),
                ..entry("Sneaky", 30)
            },
        );
        assert!(matches!(result, Err(AppError::Forbidden { code: "FORBIDDEN", .. })));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);
        let result = create_time_entry_impl(&state, &user.id, entry("Nothing", 0));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn update_moves_progress_between_goals_and_delete_reverts_it() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        let first = goal(&state, &user, 10.0);
        let second = goal(&state, &user, 1.0);

        let created = create_time_entry_impl(
            &state,
            &user.id,
            NewTimeEntry {
                goal_id: Some(first.id.clone()),
                ..entry("Reading", 60)
            },
        )
        .expect("create entry");

        update_time_entry_impl(
            &state,
            &user.id,
            &created.id,
            TimeEntryChanges {
                goal_id: Some(second.id.clone()),
                duration_minutes: Some(75),
                ..TimeEntryChanges::default()
            },
        )
        .expect("update entry");

        let first = get_goal_impl(&state, &user.id, &first.id).expect("first goal");
        let second = get_goal_impl(&state, &user.id, &second.id).expect("second goal");
        assert!(first.logged_hours.abs() < 1e-9);
        assert!((second.logged_hours - 1.25).abs() < 1e-9);
        assert_eq!(second.status, GoalStatus::Completed);

        delete_time_entry_impl(&state, &user.id, &created.id).expect("delete entry");
        let second = get_goal_impl(&state, &user.id, &second.id).expect("second goal");
        assert!(second.logged_hours.abs() < 1e-9);
        assert_eq!(second.status, GoalStatus::Completed);

        let missing = delete_time_entry_impl(&state, &user.id, &created.id);
        assert!(matches!(missing, Err(AppError::NotFound { entity: "time entry" })));
    }

    #[test]
    fn six_ten_minute_entries_complete_a_one_hour_goal() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        let goal = goal(&state, &user, 1.0);

        for index in 0..6 {
            let input = NewTimeEntry {
                goal_id: Some(goal.id.clone()),
                ..entry(&format!("Sprint {index}"), 10)
            };
            create_time_entry_impl(&state, &user.id, input).expect("create entry");
        }

        let goal = get_goal_impl(&state, &user.id, &goal.id).expect("goal");
        assert_eq!(goal.logged_hours, 1.0);
        assert_eq!(goal.status, GoalStatus::Completed);
    }

    #[test]
    fn totals_cover_today_and_monday_based_week() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        for (day, minutes) in [("2026-03-08", 500), ("2026-03-09", 60), ("2026-03-10", 45), ("2026-03-15", 30)] {
            let input = NewTimeEntry {
                date: Some(date(day)),
                ..entry("Work", minutes)
            };
            create_time_entry_impl(&state, &user.id, input).expect("create entry");
        }

        let today = today_total_impl(&state, &user.id).expect("today");
        assert_eq!((today.total_minutes, today.entries_count), (45, 1));
        assert_eq!(today.total_formatted, "45m");

        let week = week_total_impl(&state, &user.id).expect("week");
        assert_eq!(week.start_date, date("2026-03-09"));
        assert_eq!(week.end_date, date("2026-03-15"));
        assert_eq!((week.total_minutes, week.entries_count), (135, 3));

        let listed = list_time_entries_impl(&state, &user.id, date("2026-03-08"), date("2026-03-10"))
            .expect("list entries");
        assert_eq!(
            listed.iter().map(|entry| entry.duration_minutes).collect::<Vec<_>>(),
            vec![500, 60, 45]
        );
    }

    #[test]
    fn recent_and_weekly_listings() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        for (day, name) in [("2026-03-01", "Old"), ("2026-03-09", "Monday"), ("2026-03-12", "Thursday")] {
            let input = NewTimeEntry {
                date: Some(date(day)),
                ..entry(name, 20)
            };
            create_time_entry_impl(&state, &user.id, input).expect("create entry");
        }

        let week = week_time_entries_impl(&state, &user.id, date("2026-03-09")).expect("week");
        assert_eq!(
            week.iter().map(|entry| entry.task_name.as_str()).collect::<Vec<_>>(),
            vec!["Monday", "Thursday"]
        );

        let recent = recent_time_entries_impl(&state, &user.id, Some(2)).expect("recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent_time_entries_impl(&state, &user.id, None).expect("recent").len(), 3);
    }

    #[test]
    fn current_week_starts_on_monday_even_on_sunday() {
        assert_eq!(
            current_week(date("2026-03-15")),
            (date("2026-03-09"), date("2026-03-15"))
        );
        assert_eq!(
            current_week(date("2026-03-09")),
            (date("2026-03-09"), date("2026-03-15"))
        );
    }
}
