use crate::application::accounts::{authorize_mutation, plan_tier};
use crate::application::goals::non_empty;
use crate::application::state::{AppState, next_id};
use crate::application::time_entries::{default_started_at, ensure_owned_relations};
use crate::domain::entitlements::{ResourceKind, check_capacity};
use crate::domain::models::{Task, TaskStatus, TimeEntry, TimeEntrySource, day_of_week};
use crate::infrastructure::error::AppError;
use crate::infrastructure::goal_repository::adjust_logged_minutes;
use crate::infrastructure::task_repository::{
    TaskFilter, delete_task, find_task, insert_task, list_tasks, max_sort_order, set_sort_order, update_task,
};
use crate::infrastructure::time_entry_repository::{
    count_entries_on, delete_entry, find_completion_entry, insert_entry, total_minutes_for_task,
    tracked_minutes_for_task,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const COMPLETION_NOTE: &str = "Logged from task completion";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
    pub estimated_minutes: Option<u32>,
    pub goal_id: Option<String>,
    pub schedule_block_id: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
    pub estimated_minutes: Option<u32>,
    pub goal_id: Option<String>,
    pub schedule_block_id: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CompleteTask {
    pub actual_minutes: u32,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub tracked_minutes: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskCompletion {
    pub task: Task,
    pub time_entry: Option<TimeEntry>,
    pub already_tracked_minutes: u32,
    pub remaining_minutes: u32,
    pub total_minutes: u32,
}

pub fn create_task_impl(state: &AppState, user_id: &str, input: NewTask) -> Result<Task, AppError> {
    let connection = state.database().connect()?;
    let user = authorize_mutation(&connection, user_id)?;
    let goal_id = non_empty(input.goal_id);
    let schedule_block_id = non_empty(input.schedule_block_id);
    ensure_owned_relations(&connection, &user.id, goal_id.as_deref(), None, schedule_block_id.as_deref())?;

    let task = Task {
        id: next_id("tsk"),
        sort_order: max_sort_order(&connection, &user.id)? + 1,
        user_id: user.id,
        title: input.title.trim().to_string(),
        description: non_empty(input.description),
        category: non_empty(input.category),
        status: input.status.unwrap_or(TaskStatus::Backlog),
        estimated_minutes: input.estimated_minutes,
        actual_minutes: None,
        goal_id,
        schedule_block_id,
        due_date: input.due_date,
        completed_at: None,
        created_at: state.now(),
    };
    task.validate().map_err(AppError::Validation)?;
    insert_task(&connection, &task)?;

    state.log_info("create_task", &format!("created task_id={}", task.id));
    Ok(task)
}

pub fn list_tasks_impl(state: &AppState, user_id: &str, filter: &TaskFilter) -> Result<Vec<TaskView>, AppError> {
    let connection = state.database().connect()?;
    let tasks = list_tasks(&connection, user_id, filter)?;
    Ok(tasks
        .into_iter()
        .map(|(task, tracked_minutes)| TaskView { task, tracked_minutes })
        .collect())
}

pub fn get_task_impl(state: &AppState, user_id: &str, task_id: &str) -> Result<TaskView, AppError> {
    let connection = state.database().connect()?;
    let task = find_task(&connection, user_id, task_id)?.ok_or_else(|| AppError::not_found("task"))?;
    let tracked_minutes = total_minutes_for_task(&connection, &task.id)?;
    Ok(TaskView { task, tracked_minutes })
}

pub fn update_task_impl(
    state: &AppState,
    user_id: &str,
    task_id: &str,
    changes: TaskChanges,
) -> Result<Task, AppError> {
    let connection = state.database().connect()?;
    authorize_mutation(&connection, user_id)?;
    let mut task = find_task(&connection, user_id, task_id)?.ok_or_else(|| AppError::not_found("task"))?;

    if let Some(title) = changes.title {
        task.title = title.trim().to_string();
    }
    if let Some(description) = changes.description {
        task.description = non_empty(Some(description));
    }
    if let Some(category) = changes.category {
        task.category = non_empty(Some(category));
    }
    if let Some(status) = changes.status {
        task.status = status;
    }
    if let Some(estimated_minutes) = changes.estimated_minutes {
        task.estimated_minutes = Some(estimated_minutes);
    }
    if let Some(goal_id) = changes.goal_id {
        task.goal_id = non_empty(Some(goal_id));
    }
    if let Some(schedule_block_id) = changes.schedule_block_id {
        task.schedule_block_id = non_empty(Some(schedule_block_id));
    }
    if let Some(due_date) = changes.due_date {
        task.due_date = Some(due_date);
    }
    task.validate().map_err(AppError::Validation)?;
    ensure_owned_relations(
        &connection,
        user_id,
        task.goal_id.as_deref(),
        None,
        task.schedule_block_id.as_deref(),
    )?;
    update_task(&connection, &task)?;

    state.log_info("update_task", &format!("updated task_id={task_id}"));
    Ok(task)
}

/// Marks the task done. Only the part of `actual_minutes` not already tracked
/// becomes a COMPLETION entry, and only that part counts toward the goal.
pub fn complete_task_impl(
    state: &AppState,
    user_id: &str,
    task_id: &str,
    input: CompleteTask,
) -> Result<TaskCompletion, AppError> {
    if input.actual_minutes == 0 {
        return Err(AppError::Validation("actual_minutes must be > 0".to_string()));
    }

    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    let user = authorize_mutation(&transaction, user_id)?;
    let mut task = find_task(&transaction, user_id, task_id)?.ok_or_else(|| AppError::not_found("task"))?;
    if task.status == TaskStatus::Done {
        return Err(AppError::Conflict("task is already completed".to_string()));
    }

    let date = input.date.unwrap_or_else(|| state.today());
    let already_tracked_minutes = tracked_minutes_for_task(&transaction, &task.id)?;
    let remaining_minutes = input.actual_minutes.saturating_sub(already_tracked_minutes);
    let entries_that_day = count_entries_on(&transaction, &user.id, date)?;
    check_capacity(plan_tier(state, &user), ResourceKind::TasksPerDay, entries_that_day)?;

    let now = state.now();
    let time_entry = if remaining_minutes > 0 {
        let entry = TimeEntry {
            id: next_id("ent"),
            user_id: user.id.clone(),
            task_name: task.title.clone(),
            duration_minutes: remaining_minutes,
            date,
            day_of_week: day_of_week(date),
            started_at: default_started_at(state, date, remaining_minutes),
            notes: Some(non_empty(input.notes).unwrap_or_else(|| COMPLETION_NOTE.to_string())),
            goal_id: task.goal_id.clone(),
            task_id: Some(task.id.clone()),
            schedule_block_id: task.schedule_block_id.clone(),
            source: TimeEntrySource::Completion,
            created_at: now,
        };
        insert_entry(&transaction, &entry)?;
        if let Some(goal_id) = &task.goal_id {
            adjust_logged_minutes(&transaction, goal_id, i64::from(remaining_minutes))?;
        }
        Some(entry)
    } else {
        None
    };

    task.status = TaskStatus::Done;
    task.actual_minutes = Some(input.actual_minutes);
    task.completed_at = Some(now);
    update_task(&transaction, &task)?;
    transaction.commit()?;

    state.log_info(
        "complete_task",
        &format!(
            "completed task_id={task_id} tracked={already_tracked_minutes} logged={remaining_minutes}"
        ),
    );
    Ok(TaskCompletion {
        task,
        time_entry,
        already_tracked_minutes,
        remaining_minutes,
        total_minutes: input.actual_minutes,
    })
}

/// Reopens a task: the latest COMPLETION entry is removed and its hours are
/// taken back from the goal. Tracked entries stay.
pub fn restore_task_impl(state: &AppState, user_id: &str, task_id: &str) -> Result<Task, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    authorize_mutation(&transaction, user_id)?;
    let mut task = find_task(&transaction, user_id, task_id)?.ok_or_else(|| AppError::not_found("task"))?;
    if task.status != TaskStatus::Done {
        return Err(AppError::Conflict("task is not completed".to_string()));
    }

    task.status = TaskStatus::Todo;
    task.actual_minutes = None;
    task.completed_at = None;
    update_task(&transaction, &task)?;

    if let Some(completion) = find_completion_entry(&transaction, &task.id)? {
        if let Some(goal_id) = &completion.goal_id {
            adjust_logged_minutes(&transaction, goal_id, -i64::from(completion.duration_minutes))?;
        }
        delete_entry(&transaction, user_id, &completion.id)?;
    }
    transaction.commit()?;

    state.log_info("restore_task", &format!("restored task_id={task_id}"));
    Ok(task)
}

pub fn reorder_tasks_impl(state: &AppState, user_id: &str, task_ids: &[String]) -> Result<usize, AppError> {
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    authorize_mutation(&transaction, user_id)?;
    let mut updated = 0;
    for (position, task_id) in task_ids.iter().enumerate() {
        let sort_order = i64::try_from(position).unwrap_or(i64::MAX);
        if set_sort_order(&transaction, user_id, task_id, sort_order)? {
            updated += 1;
        }
    }
    transaction.commit()?;

    state.log_info("reorder_tasks", &format!("reordered {updated} tasks"));
    Ok(updated)
}

pub fn delete_task_impl(state: &AppState, user_id: &str, task_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    authorize_mutation(&connection, user_id)?;
    if !delete_task(&connection, user_id, task_id)? {
        return Err(AppError::not_found("task"));
    }
    state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::goals::{NewGoal, create_goal_impl, get_goal_impl};
    use crate::application::schedule::{NewScheduleBlock, create_block_impl};
    use crate::application::test_support::{TempWorkspace, seed_user};
    use crate::application::time_entries::{NewTimeEntry, create_time_entry_impl};
    use crate::domain::models::{Goal, PlanType, User};

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            ..NewTask::default()
        }
    }

    fn goal(state: &AppState, user: &User) -> Goal {
        create_goal_impl(
            state,
            &user.id,
            NewGoal {
                title: "Ship".to_string(),
                target_hours: 10.0,
                ..NewGoal::default()
            },
        )
        .expect("create goal")
    }

    #[test]
    fn create_defaults_to_backlog_and_appends() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);

        let first = create_task_impl(&state, &user.id, new_task("First")).expect("create");
        let second = create_task_impl(&state, &user.id, new_task("Second")).expect("create");
        assert_eq!(first.status, TaskStatus::Backlog);
        assert_eq!((first.sort_order, second.sort_order), (0, 1));

        let blank = create_task_impl(&state, &user.id, new_task("  "));
        assert!(matches!(blank, Err(AppError::Validation(_))));
    }

    #[test]
    fn relations_owned_by_someone_else_are_forbidden() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let owner = seed_user(&state, "ada@example.com", PlanType::Free);
        let other = seed_user(&state, "eve@example.com", PlanType::Free);
        let goal = goal(&state, &owner);

        let result = create_task_impl(
            &state,
            &other.id,
            NewTask {
                goal_id: Some(goal.id.clone()),
                ..new_task("Borrowed")
            },
        );
        assert!(matches!(result, Err(AppError::Forbidden { .. })));

        let task = create_task_impl(&state, &other.id, new_task("Mine")).expect("create");
        let update = update_task_impl(
            &state,
            &other.id,
            &task.id,
            TaskChanges {
                goal_id: Some(goal.id),
                ..TaskChanges::default()
            },
        );
        assert!(matches!(update, Err(AppError::Forbidden { .. })));
    }

    #[test]
    fn list_orders_by_status_then_position_with_tracked_minutes() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        let done = create_task_impl(
            &state,
            &user.id,
            NewTask {
                status: Some(TaskStatus::Done),
                ..new_task("Done")
            },
        )
        .expect("create");
        let backlog = create_task_impl(&state, &user.id, new_task("Backlog")).expect("create");
        let active = create_task_impl(
            &state,
            &user.id,
            NewTask {
                status: Some(TaskStatus::InProgress),
                ..new_task("Active")
            },
        )
        .expect("create");
        create_time_entry_impl(
            &state,
            &user.id,
            NewTimeEntry {
                task_name: "Active".to_string(),
                duration_minutes: 25,
                task_id: Some(active.id.clone()),
                ..NewTimeEntry::default()
            },
        )
        .expect("track time");

        let listed = list_tasks_impl(&state, &user.id, &TaskFilter::default()).expect("list");
        let ids = listed.iter().map(|view| view.task.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids, vec![active.id.clone(), backlog.id.clone(), done.id]);
        assert_eq!(listed[0].tracked_minutes, 25);

        let filtered = list_tasks_impl(
            &state,
            &user.id,
            &TaskFilter {
                status: Some(TaskStatus::Backlog),
                ..TaskFilter::default()
            },
        )
        .expect("list");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].task.id, backlog.id);

        let fetched = get_task_impl(&state, &user.id, &active.id).expect("get");
        assert_eq!(fetched.tracked_minutes, 25);
    }

    #[test]
    fn day_filter_follows_the_linked_block() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        let block = create_block_impl(
            &state,
            &user.id,
            NewScheduleBlock {
                title: "Deep work".to_string(),
                days_of_week: vec![3],
                start_time: "09:00".to_string(),
                end_time: "11:00".to_string(),
                ..NewScheduleBlock::default()
            },
        )
        .expect("create block")
        .remove(0);
        let linked = create_task_impl(
            &state,
            &user.id,
            NewTask {
                schedule_block_id: Some(block.id),
                ..new_task("Wednesday work")
            },
        )
        .expect("create");
        create_task_impl(&state, &user.id, new_task("Floating")).expect("create");

        let wednesday = list_tasks_impl(
            &state,
            &user.id,
            &TaskFilter {
                day_of_week: Some(3),
                ..TaskFilter::default()
            },
        )
        .expect("list");
        assert_eq!(wednesday.len(), 1);
        assert_eq!(wednesday[0].task.id, linked.id);
    }

    #[test]
    fn complete_logs_only_untracked_remainder_and_restore_reverts_it() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        let goal = goal(&state, &user);
        let task = create_task_impl(
            &state,
            &user.id,
            NewTask {
                goal_id: Some(goal.id.clone()),
                ..new_task("Write chapter")
            },
        )
        .expect("create task");
        create_time_entry_impl(
            &state,
            &user.id,
            NewTimeEntry {
                task_name: "Write chapter".to_string(),
                duration_minutes: 30,
                goal_id: Some(goal.id.clone()),
                task_id: Some(task.id.clone()),
                ..NewTimeEntry::default()
            },
        )
        .expect("track time");

        let completion = complete_task_impl(
            &state,
            &user.id,
            &task.id,
            CompleteTask {
                actual_minutes: 90,
                ..CompleteTask::default()
            },
        )
        .expect("complete");
        assert_eq!(completion.already_tracked_minutes, 30);
        assert_eq!(completion.remaining_minutes, 60);
        assert_eq!(completion.task.status, TaskStatus::Done);
        assert_eq!(completion.task.actual_minutes, Some(90));
        let entry = completion.time_entry.expect("completion entry");
        assert_eq!(entry.source, TimeEntrySource::Completion);
        assert_eq!(entry.notes.as_deref(), Some(COMPLETION_NOTE));
        assert_eq!(entry.goal_id.as_deref(), Some(goal.id.as_str()));
        let logged = get_goal_impl(&state, &user.id, &goal.id).expect("goal").logged_hours;
        assert!((logged - 1.5).abs() < 1e-9);

        let again = complete_task_impl(
            &state,
            &user.id,
            &task.id,
            CompleteTask {
                actual_minutes: 90,
                ..CompleteTask::default()
            },
        );
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let restored = restore_task_impl(&state, &user.id, &task.id).expect("restore");
        assert_eq!(restored.status, TaskStatus::Todo);
        assert_eq!(restored.actual_minutes, None);
        assert_eq!(restored.completed_at, None);
        let logged = get_goal_impl(&state, &user.id, &goal.id).expect("goal").logged_hours;
        assert!((logged - 0.5).abs() < 1e-9);
        assert_eq!(get_task_impl(&state, &user.id, &task.id).expect("get").tracked_minutes, 30);

        let reopened_twice = restore_task_impl(&state, &user.id, &task.id);
        assert!(matches!(reopened_twice, Err(AppError::Conflict(_))));
    }

    #[test]
    fn complete_with_everything_tracked_creates_no_entry() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Pro);
        let task = create_task_impl(&state, &user.id, new_task("Quick fix")).expect("create task");
        create_time_entry_impl(
            &state,
            &user.id,
            NewTimeEntry {
                task_name: "Quick fix".to_string(),
                duration_minutes: 45,
                task_id: Some(task.id.clone()),
                ..NewTimeEntry::default()
            },
        )
        .expect("track time");

        let completion = complete_task_impl(
            &state,
            &user.id,
            &task.id,
            CompleteTask {
                actual_minutes: 30,
                ..CompleteTask::default()
            },
        )
        .expect("complete");
        assert_eq!(completion.remaining_minutes, 0);
        assert!(completion.time_entry.is_none());
    }

    #[test]
    fn complete_counts_against_daily_capacity() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);
        for index in 0..3 {
            create_time_entry_impl(
                &state,
                &user.id,
                NewTimeEntry {
                    task_name: format!("Task {index}"),
                    duration_minutes: 10,
                    ..NewTimeEntry::default()
                },
            )
            .expect("track time");
        }
        let task = create_task_impl(&state, &user.id, new_task("Over the limit")).expect("create task");
        let result = complete_task_impl(
            &state,
            &user.id,
            &task.id,
            CompleteTask {
                actual_minutes: 20,
                ..CompleteTask::default()
            },
        );
        assert!(matches!(result, Err(AppError::CapacityExceeded(_))));
        let task = get_task_impl(&state, &user.id, &task.id).expect("get");
        assert_eq!(task.task.status, TaskStatus::Backlog);
    }

    #[test]
    fn reorder_assigns_positions_and_delete_removes() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);
        let first = create_task_impl(&state, &user.id, new_task("First")).expect("create");
        let second = create_task_impl(&state, &user.id, new_task("Second")).expect("create");

        let updated = reorder_tasks_impl(
            &state,
            &user.id,
            &[second.id.clone(), first.id.clone(), "tsk-unknown".to_string()],
        )
        .expect("reorder");
        assert_eq!(updated, 2);
        let listed = list_tasks_impl(&state, &user.id, &TaskFilter::default()).expect("list");
        assert_eq!(listed[0].task.id, second.id);
        assert_eq!(listed[0].task.sort_order, 0);

        delete_task_impl(&state, &user.id, &first.id).expect("delete");
        let missing = delete_task_impl(&state, &user.id, &first.id);
        assert!(matches!(missing, Err(AppError::NotFound { entity: "task" })));
    }
}
