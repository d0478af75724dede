pub mod application;
pub mod domain;
pub mod infrastructure;

use application::accounts::{
    NewUser, apply_billing_event_impl, assign_plan_impl, check_plan_limit_impl, create_user_impl, get_user_impl,
    get_user_limits_impl, grant_free_access_impl, list_users_impl, promote_to_admin_impl, revoke_free_access_impl,
    update_profile_impl,
};
use application::bootstrap::{BootstrapResult, bootstrap_workspace};
use application::categories::{
    CategoryChanges, NewCategory, create_category_impl, delete_category_impl, list_categories_impl,
    update_category_impl,
};
use application::dashboard::{dashboard_stats_impl, monthly_report_impl, weekly_report_impl, weekly_summary_impl};
use application::feedback::{
    NewFeedback, archive_feedback_impl, create_feedback_impl, delete_feedback_impl, get_feedback_impl,
    list_feedback_impl, reply_feedback_impl,
};
use application::goals::{
    create_goal_impl, delete_goal_impl, goal_progress_impl, goal_stats_impl, list_goals_impl, update_goal_impl,
};
use application::labels::{
    NewLabel, assign_labels_impl, create_label_impl, delete_label_impl, goal_labels_impl, list_labels_impl,
    reorder_labels_impl, update_label_impl,
};
use application::notes::{
    create_note_impl, delete_note_impl, get_note_impl, list_notes_impl, reorder_notes_impl, update_note_impl,
};
use application::notifications::{list_notifications_impl, mark_notification_read_impl};
use application::release_notes::{
    create_release_note_impl, delete_release_note_impl, latest_release_note_impl, list_release_notes_impl,
    mark_release_note_seen_impl, unseen_release_notes_impl, update_release_note_impl,
};
use application::reports::{ReportRequest, export_report_csv_impl, generate_report_impl};
use application::schedule::{
    UpdateScope, check_conflict_impl, create_block_impl, delete_block_impl, list_blocks_impl, update_block_impl,
    weekly_schedule_impl,
};
use application::sharing::{
    accept_by_token_impl, accept_invite_impl, decline_invite_impl, invite_impl, my_shares_impl,
    pending_invites_impl, remove_my_access_impl, revoke_access_impl, shared_with_me_impl,
};
use application::state::AppState;
use application::tasks::{
    CompleteTask, complete_task_impl, create_task_impl, delete_task_impl, list_tasks_impl, reorder_tasks_impl,
    restore_task_impl, update_task_impl,
};
use application::time_entries::{
    create_time_entry_impl, delete_time_entry_impl, list_time_entries_impl, recent_time_entries_impl,
    today_total_impl, update_time_entry_impl, week_time_entries_impl, week_total_impl,
};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use domain::entitlements::{BillingEvent, ResourceKind};
use domain::models::{GoalStatus, PlanType, SubscriptionStatus, TaskStatus};
use infrastructure::error::AppError;
use infrastructure::feedback_repository::FeedbackFilter;
use infrastructure::logging::init_logging;
use infrastructure::report_export::ExportMeta;
use infrastructure::task_repository::TaskFilter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "timemaster", version, about = "Goals, time tracking, schedules, reports and sharing")]
pub struct Cli {
    /// Workspace holding config/, state/ and logs/
    #[arg(long, env = "TIMEMASTER_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Append JSON log lines to logs/timemaster.log instead of stderr
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the workspace layout, default config and database
    Init,
    /// Create a user with the default categories and labels
    AddUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_plan)]
        plan: Option<PlanType>,
        #[arg(long)]
        unlimited: bool,
    },
    /// Show tier, limits, usage and standing, or check one resource
    Limits {
        user_id: String,
        #[arg(long, value_enum)]
        check: Option<ResourceArg>,
    },
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Goal(GoalCommand),
    #[command(subcommand)]
    Entry(EntryCommand),
    #[command(subcommand)]
    Block(BlockCommand),
    #[command(subcommand)]
    Task(TaskCommand),
    #[command(subcommand)]
    Category(CategoryCommand),
    #[command(subcommand)]
    Label(LabelCommand),
    /// Aggregate time entries into a report
    Report(ReportArgs),
    /// Daily activity, goal breakdown and top activities for one week
    Weekly {
        user_id: String,
        /// Defaults to the current Monday
        #[arg(long)]
        week_start: Option<NaiveDate>,
        /// Per-category and per-day minutes instead of the full report
        #[arg(long, requires = "week_start")]
        summary: bool,
    },
    Monthly {
        user_id: String,
        year: i32,
        month: u32,
    },
    Dashboard {
        user_id: String,
    },
    #[command(subcommand)]
    Share(ShareCommand),
    #[command(subcommand)]
    Feedback(FeedbackCommand),
    #[command(subcommand)]
    Notifications(NotificationCommand),
    #[command(subcommand)]
    Release(ReleaseCommand),
    #[command(subcommand)]
    Note(NoteCommand),
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    Show { user_id: String },
    Rename { user_id: String, name: String },
    List {
        admin_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    GrantFree { admin_id: String, user_id: String },
    RevokeFree { admin_id: String, user_id: String },
    /// Set or clear the plan an admin assigns on top of billing
    AssignPlan {
        admin_id: String,
        user_id: String,
        #[arg(long, value_parser = parse_plan)]
        plan: Option<PlanType>,
    },
    Promote { caller_id: String, user_id: String },
    /// Apply a billing provider outcome
    Billing {
        user_id: String,
        #[arg(value_enum)]
        event: BillingArg,
        #[arg(long)]
        subscription_id: Option<String>,
        #[arg(long, value_parser = parse_subscription_status)]
        status: Option<SubscriptionStatus>,
        #[arg(long)]
        cancel_at: Option<DateTime<Utc>>,
        #[arg(long)]
        open: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BillingArg {
    CheckoutCompleted,
    SubscriptionChanged,
    PaymentFailed,
    InvoicePaid,
    InvoiceFinalized,
}

#[derive(Debug, Subcommand)]
enum GoalCommand {
    /// Create a goal from a JSON payload
    Create { user_id: String, data: String },
    List {
        user_id: String,
        #[arg(long, value_parser = parse_goal_status)]
        status: Option<GoalStatus>,
    },
    Update { user_id: String, goal_id: String, data: String },
    Delete { user_id: String, goal_id: String },
    Stats { user_id: String },
    Progress { user_id: String },
    /// Show a goal's labels, or replace them with the given ids
    Labels {
        user_id: String,
        goal_id: String,
        #[arg(long = "set")]
        label_ids: Option<Vec<String>>,
    },
}

#[derive(Debug, Subcommand)]
enum EntryCommand {
    /// Log a time entry from a JSON payload
    Log { user_id: String, data: String },
    List {
        user_id: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    Week { user_id: String, week_start: NaiveDate },
    Recent {
        user_id: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    Update { user_id: String, entry_id: String, data: String },
    Delete { user_id: String, entry_id: String },
    Today { user_id: String },
    WeekTotal { user_id: String },
}

#[derive(Debug, Subcommand)]
enum BlockCommand {
    /// Create blocks from a JSON payload; several days make a series
    Create { user_id: String, data: String },
    List { user_id: String },
    Week { user_id: String },
    Check {
        user_id: String,
        day_of_week: u8,
        start: String,
        end: String,
        #[arg(long)]
        exclude: Option<String>,
    },
    Update { user_id: String, block_id: String, data: String },
    Delete {
        user_id: String,
        block_id: String,
        #[arg(long)]
        series: bool,
    },
}

#[derive(Debug, Subcommand)]
enum TaskCommand {
    Create { user_id: String, data: String },
    List {
        user_id: String,
        #[arg(long, value_parser = parse_task_status)]
        status: Option<TaskStatus>,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        block: Option<String>,
    },
    Update { user_id: String, task_id: String, data: String },
    Complete {
        user_id: String,
        task_id: String,
        #[arg(long)]
        minutes: u32,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    Restore { user_id: String, task_id: String },
    Delete { user_id: String, task_id: String },
    Reorder { user_id: String, task_ids: Vec<String> },
}

#[derive(Debug, Subcommand)]
enum CategoryCommand {
    List { user_id: String },
    Create {
        user_id: String,
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    Update {
        user_id: String,
        category_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        sort_order: Option<i64>,
    },
    Delete { user_id: String, category_id: String },
}

#[derive(Debug, Subcommand)]
enum LabelCommand {
    List { user_id: String },
    Create {
        user_id: String,
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    Update { user_id: String, label_id: String, data: String },
    Delete { user_id: String, label_id: String },
    Reorder { user_id: String, label_ids: Vec<String> },
}

#[derive(Debug, Subcommand)]
enum ShareCommand {
    /// Invite someone to view your data
    Invite { owner_id: String, email: String },
    Accept { user_id: String, share_id: String },
    AcceptToken { user_id: String, token: String },
    Decline { user_id: String, share_id: String },
    Revoke { owner_id: String, share_id: String },
    Leave { user_id: String, share_id: String },
    Pending { user_id: String },
    Mine { owner_id: String },
    WithMe { user_id: String },
}

#[derive(Debug, Subcommand)]
enum FeedbackCommand {
    Send {
        user_id: String,
        #[arg(long)]
        emoji: Option<u8>,
        #[arg(long)]
        text: Option<String>,
    },
    List {
        admin_id: String,
        #[arg(long)]
        archived: Option<bool>,
        #[arg(long)]
        user: Option<String>,
    },
    Show { user_id: String, feedback_id: String },
    Archive {
        admin_id: String,
        feedback_id: String,
        #[arg(long)]
        undo: bool,
    },
    Delete { admin_id: String, feedback_id: String },
    Reply { admin_id: String, feedback_id: String, message: String },
}

#[derive(Debug, Subcommand)]
enum NotificationCommand {
    List {
        user_id: String,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    Read { user_id: String, notification_id: String },
}

#[derive(Debug, Subcommand)]
enum ReleaseCommand {
    Create { admin_id: String, data: String },
    Update { admin_id: String, note_id: String, data: String },
    List,
    Delete { admin_id: String, note_id: String },
    Latest { user_id: String },
    Seen { user_id: String, note_id: String },
    Unseen { user_id: String },
}

#[derive(Debug, Subcommand)]
enum NoteCommand {
    List { user_id: String },
    Show { user_id: String, note_id: String },
    Create { user_id: String, data: String },
    Update { user_id: String, note_id: String, data: String },
    Delete { user_id: String, note_id: String },
    /// Apply a JSON array of {noteId, parentId, sortOrder} moves
    Reorder { user_id: String, data: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResourceArg {
    Goals,
    Schedules,
    TasksPerDay,
}

impl From<ResourceArg> for ResourceKind {
    fn from(value: ResourceArg) -> Self {
        match value {
            ResourceArg::Goals => Self::Goals,
            ResourceArg::Schedules => Self::Schedules,
            ResourceArg::TasksPerDay => Self::TasksPerDay,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, clap::Args)]
struct ReportArgs {
    user_id: String,
    #[arg(long)]
    start: NaiveDate,
    #[arg(long)]
    end: NaiveDate,
    /// detailed, summary, day_by_task, day_total or schedule
    #[arg(long)]
    view: Option<String>,
    #[arg(long)]
    group_by: Option<String>,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long = "goal")]
    goal_ids: Vec<String>,
    #[arg(long = "task")]
    task_ids: Vec<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    hourly_rate: Option<f64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    client: Option<String>,
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    database_path: String,
    log_path: String,
}

fn parse_plan(value: &str) -> Result<PlanType, String> {
    PlanType::parse(value).ok_or_else(|| format!("unknown plan '{value}', expected free, basic or pro"))
}

fn parse_subscription_status(value: &str) -> Result<SubscriptionStatus, String> {
    SubscriptionStatus::parse(value).ok_or_else(|| format!("unknown subscription status '{value}'"))
}

fn parse_goal_status(value: &str) -> Result<GoalStatus, String> {
    GoalStatus::parse(value).ok_or_else(|| format!("unknown goal status '{value}', expected active, completed or paused"))
}

fn parse_task_status(value: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(value).ok_or_else(|| format!("unknown task status '{value}'"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn respond<T: Serialize>(state: &AppState, command: &str, result: Result<T, AppError>) -> Result<(), String> {
    let value = result.map_err(|error| state.command_error(command, &error))?;
    print_json(&value)
}

fn done(state: &AppState, command: &str, result: Result<(), AppError>) -> Result<(), String> {
    result.map_err(|error| state.command_error(command, &error))?;
    println!("ok");
    Ok(())
}

fn payload<T: DeserializeOwned>(raw: &str) -> Result<T, AppError> {
    Ok(serde_json::from_str(raw)?)
}

fn init(workspace: &BootstrapResult) -> Result<(), String> {
    print_json(&BootstrapResponse {
        workspace_root: workspace.workspace_root.display().to_string(),
        database_path: workspace.database_path.display().to_string(),
        log_path: workspace.log_path.display().to_string(),
    })
}

fn add_user(state: &AppState, email: String, name: String, plan: Option<PlanType>, unlimited: bool) -> Result<(), String> {
    let input = NewUser {
        email,
        name,
        plan,
        unlimited_access: unlimited,
        ..NewUser::default()
    };
    respond(state, "add_user", create_user_impl(state, input))
}

fn limits(state: &AppState, user_id: &str, check: Option<ResourceArg>) -> Result<(), String> {
    match check {
        Some(resource) => done(state, "limits", check_plan_limit_impl(state, user_id, resource.into())),
        None => respond(state, "limits", get_user_limits_impl(state, user_id)),
    }
}

fn billing_event(
    event: BillingArg,
    subscription_id: Option<String>,
    status: Option<SubscriptionStatus>,
    cancel_at: Option<DateTime<Utc>>,
    open: bool,
) -> Result<BillingEvent, AppError> {
    Ok(match event {
        BillingArg::CheckoutCompleted => BillingEvent::CheckoutCompleted {
            subscription_id: subscription_id
                .ok_or_else(|| AppError::Validation("--subscription-id is required".to_string()))?,
        },
        BillingArg::SubscriptionChanged => BillingEvent::SubscriptionChanged {
            status: status.ok_or_else(|| AppError::Validation("--status is required".to_string()))?,
            cancel_at,
        },
        BillingArg::PaymentFailed => BillingEvent::PaymentFailed,
        BillingArg::InvoicePaid => BillingEvent::InvoicePaid,
        BillingArg::InvoiceFinalized => BillingEvent::InvoiceFinalized { open },
    })
}

fn user(state: &AppState, command: UserCommand) -> Result<(), String> {
    match command {
        UserCommand::Show { user_id } => respond(state, "user_show", get_user_impl(state, &user_id)),
        UserCommand::Rename { user_id, name } => {
            respond(state, "update_profile", update_profile_impl(state, &user_id, &name))
        }
        UserCommand::List { admin_id, page, limit } => {
            respond(state, "list_users", list_users_impl(state, &admin_id, page, limit))
        }
        UserCommand::GrantFree { admin_id, user_id } => {
            respond(state, "grant_free_access", grant_free_access_impl(state, &admin_id, &user_id))
        }
        UserCommand::RevokeFree { admin_id, user_id } => {
            respond(state, "revoke_free_access", revoke_free_access_impl(state, &admin_id, &user_id))
        }
        UserCommand::AssignPlan { admin_id, user_id, plan } => {
            respond(state, "assign_plan", assign_plan_impl(state, &admin_id, &user_id, plan))
        }
        UserCommand::Promote { caller_id, user_id } => {
            respond(state, "promote_to_admin", promote_to_admin_impl(state, &caller_id, &user_id))
        }
        UserCommand::Billing {
            user_id,
            event,
            subscription_id,
            status,
            cancel_at,
            open,
        } => respond(
            state,
            "apply_billing_event",
            billing_event(event, subscription_id, status, cancel_at, open)
                .and_then(|event| apply_billing_event_impl(state, &user_id, &event)),
        ),
    }
}

fn goal(state: &AppState, command: GoalCommand) -> Result<(), String> {
    match command {
        GoalCommand::Create { user_id, data } => respond(
            state,
            "create_goal",
            payload(&data).and_then(|input| create_goal_impl(state, &user_id, input)),
        ),
        GoalCommand::List { user_id, status } => respond(state, "list_goals", list_goals_impl(state, &user_id, status)),
        GoalCommand::Update { user_id, goal_id, data } => respond(
            state,
            "update_goal",
            payload(&data).and_then(|changes| update_goal_impl(state, &user_id, &goal_id, changes)),
        ),
        GoalCommand::Delete { user_id, goal_id } => done(state, "delete_goal", delete_goal_impl(state, &user_id, &goal_id)),
        GoalCommand::Stats { user_id } => respond(state, "goal_stats", goal_stats_impl(state, &user_id)),
        GoalCommand::Progress { user_id } => respond(state, "goal_progress", goal_progress_impl(state, &user_id)),
        GoalCommand::Labels { user_id, goal_id, label_ids } => match label_ids {
            Some(label_ids) => respond(state, "assign_labels", assign_labels_impl(state, &user_id, &goal_id, &label_ids)),
            None => respond(state, "goal_labels", goal_labels_impl(state, &user_id, &goal_id)),
        },
    }
}

fn entry(state: &AppState, command: EntryCommand) -> Result<(), String> {
    match command {
        EntryCommand::Log { user_id, data } => respond(
            state,
            "create_time_entry",
            payload(&data).and_then(|input| create_time_entry_impl(state, &user_id, input)),
        ),
        EntryCommand::List { user_id, start, end } => {
            respond(state, "list_time_entries", list_time_entries_impl(state, &user_id, start, end))
        }
        EntryCommand::Week { user_id, week_start } => {
            respond(state, "week_time_entries", week_time_entries_impl(state, &user_id, week_start))
        }
        EntryCommand::Recent { user_id, limit } => {
            respond(state, "recent_time_entries", recent_time_entries_impl(state, &user_id, limit))
        }
        EntryCommand::Update { user_id, entry_id, data } => respond(
            state,
            "update_time_entry",
            payload(&data).and_then(|changes| update_time_entry_impl(state, &user_id, &entry_id, changes)),
        ),
        EntryCommand::Delete { user_id, entry_id } => {
            done(state, "delete_time_entry", delete_time_entry_impl(state, &user_id, &entry_id))
        }
        EntryCommand::Today { user_id } => respond(state, "today_total", today_total_impl(state, &user_id)),
        EntryCommand::WeekTotal { user_id } => respond(state, "week_total", week_total_impl(state, &user_id)),
    }
}

fn block(state: &AppState, command: BlockCommand) -> Result<(), String> {
    match command {
        BlockCommand::Create { user_id, data } => respond(
            state,
            "create_block",
            payload(&data).and_then(|input| create_block_impl(state, &user_id, input)),
        ),
        BlockCommand::List { user_id } => respond(state, "list_blocks", list_blocks_impl(state, &user_id)),
        BlockCommand::Week { user_id } => respond(state, "weekly_schedule", weekly_schedule_impl(state, &user_id)),
        BlockCommand::Check {
            user_id,
            day_of_week,
            start,
            end,
            exclude,
        } => respond(
            state,
            "check_conflict",
            check_conflict_impl(state, &user_id, day_of_week, &start, &end, exclude.as_deref()),
        ),
        BlockCommand::Update { user_id, block_id, data } => respond(
            state,
            "update_block",
            payload(&data).and_then(|changes| update_block_impl(state, &user_id, &block_id, changes)),
        ),
        BlockCommand::Delete { user_id, block_id, series } => {
            let scope = if series { UpdateScope::Series } else { UpdateScope::Single };
            respond(state, "delete_block", delete_block_impl(state, &user_id, &block_id, scope))
        }
    }
}

fn task(state: &AppState, command: TaskCommand) -> Result<(), String> {
    match command {
        TaskCommand::Create { user_id, data } => respond(
            state,
            "create_task",
            payload(&data).and_then(|input| create_task_impl(state, &user_id, input)),
        ),
        TaskCommand::List {
            user_id,
            status,
            goal,
            block,
        } => {
            let filter = TaskFilter {
                status,
                goal_id: goal,
                schedule_block_id: block,
                day_of_week: None,
            };
            respond(state, "list_tasks", list_tasks_impl(state, &user_id, &filter))
        }
        TaskCommand::Update { user_id, task_id, data } => respond(
            state,
            "update_task",
            payload(&data).and_then(|changes| update_task_impl(state, &user_id, &task_id, changes)),
        ),
        TaskCommand::Complete {
            user_id,
            task_id,
            minutes,
            date,
            notes,
        } => {
            let input = CompleteTask {
                actual_minutes: minutes,
                date,
                notes,
            };
            respond(state, "complete_task", complete_task_impl(state, &user_id, &task_id, input))
        }
        TaskCommand::Restore { user_id, task_id } => {
            respond(state, "restore_task", restore_task_impl(state, &user_id, &task_id))
        }
        TaskCommand::Delete { user_id, task_id } => done(state, "delete_task", delete_task_impl(state, &user_id, &task_id)),
        TaskCommand::Reorder { user_id, task_ids } => {
            respond(state, "reorder_tasks", reorder_tasks_impl(state, &user_id, &task_ids))
        }
    }
}

fn category(state: &AppState, command: CategoryCommand) -> Result<(), String> {
    match command {
        CategoryCommand::List { user_id } => respond(state, "list_categories", list_categories_impl(state, &user_id)),
        CategoryCommand::Create { user_id, name, color } => {
            let input = NewCategory {
                name,
                color,
                ..NewCategory::default()
            };
            respond(state, "create_category", create_category_impl(state, &user_id, input))
        }
        CategoryCommand::Update {
            user_id,
            category_id,
            name,
            color,
            sort_order,
        } => {
            let changes = CategoryChanges { name, color, sort_order };
            respond(state, "update_category", update_category_impl(state, &user_id, &category_id, changes))
        }
        CategoryCommand::Delete { user_id, category_id } => {
            respond(state, "delete_category", delete_category_impl(state, &user_id, &category_id))
        }
    }
}

fn label(state: &AppState, command: LabelCommand) -> Result<(), String> {
    match command {
        LabelCommand::List { user_id } => respond(state, "list_labels", list_labels_impl(state, &user_id)),
        LabelCommand::Create { user_id, name, color } => {
            let input = NewLabel {
                name,
                color,
                sort_order: None,
            };
            respond(state, "create_label", create_label_impl(state, &user_id, input))
        }
        LabelCommand::Update { user_id, label_id, data } => respond(
            state,
            "update_label",
            payload(&data).and_then(|changes| update_label_impl(state, &user_id, &label_id, changes)),
        ),
        LabelCommand::Delete { user_id, label_id } => done(state, "delete_label", delete_label_impl(state, &user_id, &label_id)),
        LabelCommand::Reorder { user_id, label_ids } => {
            respond(state, "reorder_labels", reorder_labels_impl(state, &user_id, &label_ids))
        }
    }
}

fn report(state: &AppState, args: ReportArgs) -> Result<(), String> {
    let request = ReportRequest {
        start_date: Some(args.start),
        end_date: Some(args.end),
        view_type: args.view,
        group_by: args.group_by,
        goal_ids: args.goal_ids,
        task_ids: args.task_ids,
        category: args.category,
        sort_by: args.sort_by,
        hourly_rate: args.hourly_rate,
    };
    match args.format {
        OutputFormat::Json => respond(state, "report", generate_report_impl(state, &args.user_id, &request)),
        OutputFormat::Csv => {
            let meta = ExportMeta {
                title: args.title,
                client_name: args.client,
                project_name: args.project,
                notes: args.notes,
            };
            let csv = export_report_csv_impl(state, &args.user_id, &request, &meta)
                .map_err(|error| state.command_error("report", &error))?;
            print!("{csv}");
            Ok(())
        }
    }
}

fn weekly(state: &AppState, user_id: &str, week_start: Option<NaiveDate>, summary: bool) -> Result<(), String> {
    match week_start.filter(|_| summary) {
        Some(week_start) => respond(state, "weekly_summary", weekly_summary_impl(state, user_id, week_start)),
        None => respond(state, "weekly_report", weekly_report_impl(state, user_id, week_start)),
    }
}

async fn share(state: &AppState, command: ShareCommand) -> Result<(), String> {
    match command {
        ShareCommand::Invite { owner_id, email } => respond(state, "invite", invite_impl(state, &owner_id, &email).await),
        ShareCommand::Accept { user_id, share_id } => {
            respond(state, "accept_invite", accept_invite_impl(state, &user_id, &share_id).await)
        }
        ShareCommand::AcceptToken { user_id, token } => {
            respond(state, "accept_by_token", accept_by_token_impl(state, &user_id, &token).await)
        }
        ShareCommand::Decline { user_id, share_id } => {
            done(state, "decline_invite", decline_invite_impl(state, &user_id, &share_id))
        }
        ShareCommand::Revoke { owner_id, share_id } => {
            done(state, "revoke_access", revoke_access_impl(state, &owner_id, &share_id))
        }
        ShareCommand::Leave { user_id, share_id } => {
            done(state, "remove_my_access", remove_my_access_impl(state, &user_id, &share_id))
        }
        ShareCommand::Pending { user_id } => respond(state, "pending_invites", pending_invites_impl(state, &user_id)),
        ShareCommand::Mine { owner_id } => respond(state, "my_shares", my_shares_impl(state, &owner_id)),
        ShareCommand::WithMe { user_id } => respond(state, "shared_with_me", shared_with_me_impl(state, &user_id)),
    }
}

fn feedback(state: &AppState, command: FeedbackCommand) -> Result<(), String> {
    match command {
        FeedbackCommand::Send { user_id, emoji, text } => respond(
            state,
            "create_feedback",
            create_feedback_impl(state, &user_id, NewFeedback { emoji, text }),
        ),
        FeedbackCommand::List { admin_id, archived, user } => {
            let filter = FeedbackFilter {
                is_archived: archived,
                user_id: user,
            };
            respond(state, "list_feedback", list_feedback_impl(state, &admin_id, filter))
        }
        FeedbackCommand::Show { user_id, feedback_id } => {
            respond(state, "get_feedback", get_feedback_impl(state, &user_id, &feedback_id))
        }
        FeedbackCommand::Archive {
            admin_id,
            feedback_id,
            undo,
        } => respond(
            state,
            "archive_feedback",
            archive_feedback_impl(state, &admin_id, &feedback_id, !undo),
        ),
        FeedbackCommand::Delete { admin_id, feedback_id } => {
            done(state, "delete_feedback", delete_feedback_impl(state, &admin_id, &feedback_id))
        }
        FeedbackCommand::Reply {
            admin_id,
            feedback_id,
            message,
        } => respond(
            state,
            "reply_feedback",
            reply_feedback_impl(state, &admin_id, &feedback_id, &message),
        ),
    }
}

fn notifications(state: &AppState, command: NotificationCommand) -> Result<(), String> {
    match command {
        NotificationCommand::List { user_id, cursor, limit } => respond(
            state,
            "list_notifications",
            list_notifications_impl(state, &user_id, cursor.as_deref(), limit),
        ),
        NotificationCommand::Read {
            user_id,
            notification_id,
        } => respond(
            state,
            "mark_notification_read",
            mark_notification_read_impl(state, &user_id, &notification_id),
        ),
    }
}

fn release(state: &AppState, command: ReleaseCommand) -> Result<(), String> {
    match command {
        ReleaseCommand::Create { admin_id, data } => respond(
            state,
            "create_release_note",
            payload(&data).and_then(|input| create_release_note_impl(state, &admin_id, input)),
        ),
        ReleaseCommand::Update { admin_id, note_id, data } => respond(
            state,
            "update_release_note",
            payload(&data).and_then(|changes| update_release_note_impl(state, &admin_id, &note_id, changes)),
        ),
        ReleaseCommand::List => respond(state, "list_release_notes", list_release_notes_impl(state)),
        ReleaseCommand::Delete { admin_id, note_id } => {
            done(state, "delete_release_note", delete_release_note_impl(state, &admin_id, &note_id))
        }
        ReleaseCommand::Latest { user_id } => respond(state, "latest_release_note", latest_release_note_impl(state, &user_id)),
        ReleaseCommand::Seen { user_id, note_id } => {
            done(state, "mark_release_note_seen", mark_release_note_seen_impl(state, &user_id, &note_id))
        }
        ReleaseCommand::Unseen { user_id } => {
            respond(state, "unseen_release_notes", unseen_release_notes_impl(state, &user_id))
        }
    }
}

fn note(state: &AppState, command: NoteCommand) -> Result<(), String> {
    match command {
        NoteCommand::List { user_id } => respond(state, "list_notes", list_notes_impl(state, &user_id)),
        NoteCommand::Show { user_id, note_id } => respond(state, "get_note", get_note_impl(state, &user_id, &note_id)),
        NoteCommand::Create { user_id, data } => respond(
            state,
            "create_note",
            payload(&data).and_then(|input| create_note_impl(state, &user_id, input)),
        ),
        NoteCommand::Update { user_id, note_id, data } => respond(
            state,
            "update_note",
            payload(&data).and_then(|changes| update_note_impl(state, &user_id, &note_id, changes)),
        ),
        NoteCommand::Delete { user_id, note_id } => done(state, "delete_note", delete_note_impl(state, &user_id, &note_id)),
        NoteCommand::Reorder { user_id, data } => done(
            state,
            "reorder_notes",
            payload(&data).and_then(|moves| reorder_notes_impl(state, &user_id, moves)),
        ),
    }
}

pub async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let workspace = bootstrap_workspace(&cli.workspace).map_err(|error| error.to_string())?;
    let json_log_path = cli.log_json.then_some(workspace.log_path.as_path());
    init_logging(&cli.log_level, json_log_path).map_err(|error| error.to_string())?;

    let state = AppState::new(cli.workspace).map_err(|error| error.to_string())?;
    match cli.command {
        Command::Init => init(&workspace),
        Command::AddUser {
            email,
            name,
            plan,
            unlimited,
        } => add_user(&state, email, name, plan, unlimited),
        Command::Limits { user_id, check } => limits(&state, &user_id, check),
        Command::User(command) => user(&state, command),
        Command::Goal(command) => goal(&state, command),
        Command::Entry(command) => entry(&state, command),
        Command::Block(command) => block(&state, command),
        Command::Task(command) => task(&state, command),
        Command::Category(command) => category(&state, command),
        Command::Label(command) => label(&state, command),
        Command::Report(args) => report(&state, args),
        Command::Weekly {
            user_id,
            week_start,
            summary,
        } => weekly(&state, &user_id, week_start, summary),
        Command::Monthly { user_id, year, month } => {
            respond(&state, "monthly_report", monthly_report_impl(&state, &user_id, year, month))
        }
        Command::Dashboard { user_id } => respond(&state, "dashboard_stats", dashboard_stats_impl(&state, &user_id)),
        Command::Share(command) => share(&state, command).await,
        Command::Feedback(command) => feedback(&state, command),
        Command::Notifications(command) => notifications(&state, command),
        Command::Release(command) => release(&state, command),
        Command::Note(command) => note(&state, command),
    }
}
