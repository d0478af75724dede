use crate::application::accounts::{authorize_mutation, plan_tier};
use crate::application::goals::non_empty;
use crate::application::state::{AppState, next_id};
use crate::application::time_entries::ensure_owned_relations;
use crate::domain::entitlements::{ResourceKind, check_capacity};
use crate::domain::models::{ScheduleBlock, validate_day_of_week, validate_hhmm};
use crate::domain::schedule::{TimeRange, find_conflict, find_series_conflict, has_conflict, weekly_schedule};
use crate::infrastructure::error::AppError;
use crate::infrastructure::schedule_repository::{
    count_blocks, delete_block, delete_series, find_block, insert_block, list_blocks, list_series, update_block,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const CONFLICT_MESSAGE: &str = "time slot conflicts with an existing schedule block";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewScheduleBlock {
    pub title: String,
    pub days_of_week: Vec<u8>,
    pub start_time: String,
    pub end_time: String,
    pub category: Option<String>,
    pub color: Option<String>,
    pub goal_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateScope {
    #[default]
    Single,
    Series,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleBlockChanges {
    pub title: Option<String>,
    pub day_of_week: Option<u8>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub goal_id: Option<String>,
    pub scope: UpdateScope,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WeekdayBlocks {
    pub day_of_week: u8,
    pub blocks: Vec<ScheduleBlock>,
}

pub fn create_block_impl(
    state: &AppState,
    user_id: &str,
    input: NewScheduleBlock,
) -> Result<Vec<ScheduleBlock>, AppError> {
    let days = input.days_of_week.iter().copied().collect::<BTreeSet<_>>();
    if days.is_empty() {
        return Err(AppError::Validation("at least one day_of_week is required".to_string()));
    }
    let start_time = normalize_time(&input.start_time, "schedule_block.start_time")?;
    let end_time = normalize_time(&input.end_time, "schedule_block.end_time")?;
    let range = TimeRange::parse(&start_time, &end_time).map_err(AppError::Validation)?;

    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    let user = authorize_mutation(&transaction, user_id)?;
    let goal_id = non_empty(input.goal_id);
    ensure_owned_relations(&transaction, &user.id, goal_id.as_deref(), None, None)?;

    let tier = plan_tier(state, &user);
    let existing_count = count_blocks(&transaction, &user.id)?;
    let existing = list_blocks(&transaction, &user.id)?;
    let series_id = (days.len() > 1).then(|| next_id("ser"));
    let now = state.now();

    let mut created = Vec::with_capacity(days.len());
    for (offset, day) in days.into_iter().enumerate() {
        validate_day_of_week(day, "schedule_block.day_of_week").map_err(AppError::Validation)?;
        let current = existing_count.saturating_add(u32::try_from(offset).unwrap_or(u32::MAX));
        check_capacity(tier, ResourceKind::Schedules, current)?;
        if let Some(clash) = find_conflict(&existing, day, range, None) {
            return Err(conflict_with(clash));
        }

        let block = ScheduleBlock {
            id: next_id("blk"),
            user_id: user.id.clone(),
            title: input.title.trim().to_string(),
            day_of_week: day,
            start_time: start_time.clone(),
            end_time: end_time.clone(),
            category: non_empty(input.category.clone()),
            color: non_empty(input.color.clone()),
            goal_id: goal_id.clone(),
            series_id: series_id.clone(),
            created_at: now,
        };
        block.validate().map_err(AppError::Validation)?;
        insert_block(&transaction, &block)?;
        created.push(block);
    }
    transaction.commit()?;

    state.log_info(
        "create_schedule_block",
        &format!(
            "created {} block(s) series_id={}",
            created.len(),
            series_id.as_deref().unwrap_or("-")
        ),
    );
    Ok(created)
}

pub fn list_blocks_impl(state: &AppState, user_id: &str) -> Result<Vec<ScheduleBlock>, AppError> {
    let connection = state.database().connect()?;
    list_blocks(&connection, user_id)
}

pub fn weekly_schedule_impl(state: &AppState, user_id: &str) -> Result<Vec<WeekdayBlocks>, AppError> {
    let blocks = list_blocks_impl(state, user_id)?;
    Ok(weekly_schedule(&blocks)
        .into_iter()
        .zip(0u8..)
        .map(|(blocks, day_of_week)| WeekdayBlocks { day_of_week, blocks })
        .collect())
}

pub fn check_conflict_impl(
    state: &AppState,
    user_id: &str,
    day_of_week: u8,
    start_time: &str,
    end_time: &str,
    exclude_id: Option<&str>,
) -> Result<bool, AppError> {
    validate_day_of_week(day_of_week, "day_of_week").map_err(AppError::Validation)?;
    let range = TimeRange::parse(start_time, end_time).map_err(AppError::Validation)?;
    let blocks = list_blocks_impl(state, user_id)?;
    Ok(has_conflict(&blocks, day_of_week, range, exclude_id))
}

/// With `UpdateScope::Series` every sibling takes the changes (never the day),
/// and each is checked against its own day before anything is written.
/// Returns the updated blocks.
pub fn update_block_impl(
    state: &AppState,
    user_id: &str,
    block_id: &str,
    changes: ScheduleBlockChanges,
) -> Result<Vec<ScheduleBlock>, AppError> {
    let start_time = changes
        .start_time
        .as_deref()
        .map(|value| normalize_time(value, "schedule_block.start_time"))
        .transpose()?;
    let end_time = changes
        .end_time
        .as_deref()
        .map(|value| normalize_time(value, "schedule_block.end_time"))
        .transpose()?;

    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    authorize_mutation(&transaction, user_id)?;
    let block =
        find_block(&transaction, user_id, block_id)?.ok_or_else(|| AppError::not_found("schedule block"))?;
    if let Some(goal_id) = changes.goal_id.as_deref().filter(|value| !value.trim().is_empty()) {
        ensure_owned_relations(&transaction, user_id, Some(goal_id.trim()), None, None)?;
    }
    let all_blocks = list_blocks(&transaction, user_id)?;

    let updated = match (changes.scope, block.series_id.clone()) {
        (UpdateScope::Series, Some(series_id)) => {
            let series = list_series(&transaction, user_id, &series_id)?;
            if start_time.is_some() || end_time.is_some() {
                let clash = find_series_conflict(&series, &all_blocks, start_time.as_deref(), end_time.as_deref())
                    .map_err(AppError::Validation)?;
                if clash.is_some() {
                    return Err(AppError::Conflict(format!("{CONFLICT_MESSAGE} in this series")));
                }
            }
            series
                .into_iter()
                .map(|sibling| {
                    apply_changes(sibling, &changes, start_time.as_deref(), end_time.as_deref(), false)
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        _ => {
            let time_changed =
                start_time.is_some() || end_time.is_some() || changes.day_of_week.is_some();
            let next = apply_changes(block, &changes, start_time.as_deref(), end_time.as_deref(), true)?;
            if time_changed {
                let range = TimeRange::of_block(&next)
                    .ok_or_else(|| AppError::Validation("schedule block has an invalid time range".to_string()))?;
                if let Some(clash) = find_conflict(&all_blocks, next.day_of_week, range, Some(&next.id)) {
                    return Err(conflict_with(clash));
                }
            }
            vec![next]
        }
    };

    for block in &updated {
        update_block(&transaction, block)?;
    }
    transaction.commit()?;

    state.log_info(
        "update_schedule_block",
        &format!("updated block_id={block_id} affected={}", updated.len()),
    );
    Ok(updated)
}

pub fn delete_block_impl(
    state: &AppState,
    user_id: &str,
    block_id: &str,
    scope: UpdateScope,
) -> Result<usize, AppError> {
    let connection = state.database().connect()?;
    authorize_mutation(&connection, user_id)?;
    let block = find_block(&connection, user_id, block_id)?.ok_or_else(|| AppError::not_found("schedule block"))?;
    let deleted = match (scope, block.series_id.as_deref()) {
        (UpdateScope::Series, Some(series_id)) => delete_series(&connection, user_id, series_id)?,
        _ => usize::from(delete_block(&connection, user_id, block_id)?),
    };
    state.log_info("delete_schedule_block", &format!("deleted block_id={block_id} count={deleted}"));
    Ok(deleted)
}

fn apply_changes(
    mut block: ScheduleBlock,
    changes: &ScheduleBlockChanges,
    start_time: Option<&str>,
    end_time: Option<&str>,
    allow_day_change: bool,
) -> Result<ScheduleBlock, AppError> {
    if let Some(title) = &changes.title {
        block.title = title.trim().to_string();
    }
    if allow_day_change {
        if let Some(day_of_week) = changes.day_of_week {
            block.day_of_week = day_of_week;
        }
    }
    if let Some(start_time) = start_time {
        block.start_time = start_time.to_string();
    }
    if let Some(end_time) = end_time {
        block.end_time = end_time.to_string();
    }
    if let Some(category) = &changes.category {
        block.category = non_empty(Some(category.clone()));
    }
    if let Some(color) = &changes.color {
        block.color = non_empty(Some(color.clone()));
    }
    if let Some(goal_id) = &changes.goal_id {
        block.goal_id = non_empty(Some(goal_id.clone()));
    }
    block.validate().map_err(AppError::Validation)?;
    Ok(block)
}

/// Accepts `H:MM` or `HH:MM` and stores the zero-padded form so text ordering matches time ordering.
fn normalize_time(value: &str, field_name: &str) -> Result<String, AppError> {
    let minutes = validate_hhmm(value, field_name).map_err(AppError::Validation)?;
    Ok(format!("{:02}:{:02}", minutes / 60, minutes % 60))
}

fn conflict_with(block: &ScheduleBlock) -> AppError {
    AppError::Conflict(format!(
        "{CONFLICT_MESSAGE} ({} {}-{})",
        block.title, block.start_time, block.end_time
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{TempWorkspace, seed_user};
    use crate::domain::entitlements::PlanTier;
    use crate::domain::models::PlanType;

    fn new_block(title: &str, days: &[u8], start: &str, end: &str) -> NewScheduleBlock {
        NewScheduleBlock {
            title: title.to_string(),
            days_of_week: days.to_vec(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            ..NewScheduleBlock::default()
        }
    }

    #[test]
    fn overlapping_block_is_rejected_but_touching_is_fine() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        create_block_impl(&state, &user.id, new_block("Standup", &[1], "09:00", "10:00")).expect("create");

        let clash = create_block_impl(&state, &user.id, new_block("Overlap", &[1], "09:30", "10:30"));
        assert!(matches!(clash, Err(AppError::Conflict(_))));

        let touching = create_block_impl(&state, &user.id, new_block("Next", &[1], "10:00", "11:00"));
        assert!(touching.is_ok());
        let other_day = create_block_impl(&state, &user.id, new_block("Tuesday", &[2], "09:30", "10:30"));
        assert!(other_day.is_ok());

        assert!(check_conflict_impl(&state, &user.id, 1, "09:30", "10:30", None).expect("check"));
        assert!(!check_conflict_impl(&state, &user.id, 1, "11:00", "12:00", None).expect("check"));
    }

    #[test]
    fn multi_day_create_links_a_series_and_normalizes_times() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);

        let created =
            create_block_impl(&state, &user.id, new_block("Gym", &[5, 1, 3, 1], "7:00", "8:30")).expect("create");
        assert_eq!(created.len(), 3);
        assert_eq!(
            created.iter().map(|block| block.day_of_week).collect::<Vec<_>>(),
            vec![1, 3, 5]
        );
        assert!(created[0].series_id.is_some());
        assert!(created.iter().all(|block| block.series_id == created[0].series_id));
        assert_eq!(created[0].start_time, "07:00");

        let single = create_block_impl(&state, &user.id, new_block("Solo", &[0], "07:00", "08:00")).expect("create");
        assert_eq!(single[0].series_id, None);
    }

    #[test]
    fn free_plan_caps_blocks_at_five_including_series_members() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);
        create_block_impl(&state, &user.id, new_block("Week", &[1, 2, 3, 4], "09:00", "10:00")).expect("create");

        match create_block_impl(&state, &user.id, new_block("Weekend", &[0, 6], "09:00", "10:00")) {
            Err(AppError::CapacityExceeded(exceeded)) => {
                assert_eq!(exceeded.tier, PlanTier::Free);
                assert_eq!(exceeded.resource, ResourceKind::Schedules);
                assert_eq!(exceeded.limit, 5);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }
        assert_eq!(list_blocks_impl(&state, &user.id).expect("list").len(), 4);
    }

    #[test]
    fn invalid_ranges_are_validation_errors() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);

        for (days, start, end) in [(&[1u8][..], "10:00", "09:00"), (&[7u8][..], "09:00", "10:00"), (&[][..], "09:00", "10:00")] {
            let result = create_block_impl(&state, &user.id, new_block("Bad", days, start, end));
            assert!(matches!(result, Err(AppError::Validation(_))), "{days:?} {start}-{end}");
        }
        let bad_time = create_block_impl(&state, &user.id, new_block("Bad", &[1], "24:00", "25:00"));
        assert!(matches!(bad_time, Err(AppError::Validation(_))));
    }

    #[test]
    fn single_update_checks_conflicts_excluding_itself() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        let morning = create_block_impl(&state, &user.id, new_block("Morning", &[1], "09:00", "10:00"))
            .expect("create")
            .remove(0);
        create_block_impl(&state, &user.id, new_block("Lunch", &[1], "12:00", "13:00")).expect("create");

        let stretched = update_block_impl(
            &state,
            &user.id,
            &morning.id,
            ScheduleBlockChanges {
                end_time: Some("11:00".to_string()),
                ..ScheduleBlockChanges::default()
            },
        )
        .expect("stretch within free time");
        assert_eq!(stretched[0].end_time, "11:00");

        let clash = update_block_impl(
            &state,
            &user.id,
            &morning.id,
            ScheduleBlockChanges {
                end_time: Some("12:30".to_string()),
                ..ScheduleBlockChanges::default()
            },
        );
        assert!(matches!(clash, Err(AppError::Conflict(_))));

        let moved = update_block_impl(
            &state,
            &user.id,
            &morning.id,
            ScheduleBlockChanges {
                day_of_week: Some(4),
                title: Some("Thursday morning".to_string()),
                ..ScheduleBlockChanges::default()
            },
        )
        .expect("move day");
        assert_eq!(moved[0].day_of_week, 4);
    }

    #[test]
    fn series_update_is_all_or_nothing_and_keeps_days() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        let series = create_block_impl(&state, &user.id, new_block("Focus", &[1, 3], "09:00", "10:00")).expect("create");
        create_block_impl(&state, &user.id, new_block("Dentist", &[3], "10:30", "11:30")).expect("create");

        let clash = update_block_impl(
            &state,
            &user.id,
            &series[0].id,
            ScheduleBlockChanges {
                end_time: Some("11:00".to_string()),
                scope: UpdateScope::Series,
                ..ScheduleBlockChanges::default()
            },
        );
        assert!(matches!(clash, Err(AppError::Conflict(_))));
        let untouched = list_blocks_impl(&state, &user.id).expect("list");
        assert!(untouched
            .iter()
            .filter(|block| block.series_id == series[0].series_id)
            .all(|block| block.end_time == "10:00"));

        let updated = update_block_impl(
            &state,
            &user.id,
            &series[0].id,
            ScheduleBlockChanges {
                end_time: Some("10:30".to_string()),
                day_of_week: Some(6),
                title: Some("Deep focus".to_string()),
                scope: UpdateScope::Series,
                ..ScheduleBlockChanges::default()
            },
        )
        .expect("series update");
        assert_eq!(updated.len(), 2);
        assert_eq!(
            updated.iter().map(|block| block.day_of_week).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert!(updated.iter().all(|block| block.end_time == "10:30" && block.title == "Deep focus"));
    }

    #[test]
    fn delete_single_or_whole_series() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        let series =
            create_block_impl(&state, &user.id, new_block("Run", &[1, 3, 5], "06:00", "07:00")).expect("create");

        assert_eq!(delete_block_impl(&state, &user.id, &series[0].id, UpdateScope::Single).expect("delete"), 1);
        assert_eq!(delete_block_impl(&state, &user.id, &series[1].id, UpdateScope::Series).expect("delete"), 2);
        assert!(list_blocks_impl(&state, &user.id).expect("list").is_empty());

        let missing = delete_block_impl(&state, &user.id, &series[2].id, UpdateScope::Single);
        assert!(matches!(missing, Err(AppError::NotFound { entity: "schedule block" })));
    }

    #[test]
    fn weekly_view_has_seven_days_sorted_by_start() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        create_block_impl(&state, &user.id, new_block("Late", &[2], "15:00", "16:00")).expect("create");
        create_block_impl(&state, &user.id, new_block("Early", &[2], "08:00", "09:00")).expect("create");

        let week = weekly_schedule_impl(&state, &user.id).expect("week");
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].day_of_week, 0);
        let tuesday = week[2].blocks.iter().map(|block| block.title.as_str()).collect::<Vec<_>>();
        assert_eq!(tuesday, vec!["Early", "Late"]);
        assert!(week[1].blocks.is_empty());
    }
}
