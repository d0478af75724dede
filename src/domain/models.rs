use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Internal,
    External,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "INTERNAL",
            Self::External => "EXTERNAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INTERNAL" => Some(Self::Internal),
            "EXTERNAL" => Some(Self::External),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User,
    Admin,
    SuperAdmin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USER" => Some(Self::User),
            "ADMIN" => Some(Self::Admin),
            "SUPER_ADMIN" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    pub fn is_admin(self) -> bool {
        self >= Self::Admin
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    Free,
    Basic,
    Pro,
}

impl PlanType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Basic => "BASIC",
            Self::Pro => "PRO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FREE" => Some(Self::Free),
            "BASIC" => Some(Self::Basic),
            "PRO" => Some(Self::Pro),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Paused,
    Unpaid,
    Canceled,
    Incomplete,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Paused => "paused",
            Self::Unpaid => "unpaid",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "trialing" => Some(Self::Trialing),
            "past_due" => Some(Self::PastDue),
            "paused" => Some(Self::Paused),
            "unpaid" => Some(Self::Unpaid),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "incomplete" => Some(Self::Incomplete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub user_type: UserType,
    pub role: UserRole,
    pub plan: PlanType,
    pub subscription_status: Option<SubscriptionStatus>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub billing_subscription_id: Option<String>,
    pub unlimited_access: bool,
    pub admin_assigned_plan: Option<PlanType>,
    pub invoice_pending: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "user.id")?;
        validate_email(&self.email, "user.email")?;
        validate_non_empty(&self.name, "user.name")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStatus {
    Active,
    Completed,
    Paused,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Paused => "PAUSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "COMPLETED" => Some(Self::Completed),
            "PAUSED" => Some(Self::Paused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub color: String,
    pub target_hours: f64,
    pub logged_hours: f64,
    pub deadline: Option<NaiveDate>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "goal.id")?;
        validate_non_empty(&self.title, "goal.title")?;
        validate_color(&self.color, "goal.color")?;
        if !self.target_hours.is_finite() || self.target_hours <= 0.0 {
            return Err("goal.target_hours must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Backlog,
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BACKLOG" => Some(Self::Backlog),
            "TODO" => Some(Self::Todo),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            Self::InProgress => 0,
            Self::Todo => 1,
            Self::Backlog => 2,
            Self::Done => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: TaskStatus,
    pub estimated_minutes: Option<u32>,
    pub actual_minutes: Option<u32>,
    pub goal_id: Option<String>,
    pub schedule_block_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.title, "task.title")?;
        if self.estimated_minutes == Some(0) {
            return Err("task.estimated_minutes must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeEntrySource {
    Tracker,
    Completion,
}

impl TimeEntrySource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tracker => "TRACKER",
            Self::Completion => "COMPLETION",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRACKER" => Some(Self::Tracker),
            "COMPLETION" => Some(Self::Completion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeEntry {
    pub id: String,
    pub user_id: String,
    pub task_name: String,
    pub duration_minutes: u32,
    pub date: NaiveDate,
    pub day_of_week: u8,
    pub started_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub goal_id: Option<String>,
    pub task_id: Option<String>,
    pub schedule_block_id: Option<String>,
    pub source: TimeEntrySource,
    pub created_at: DateTime<Utc>,
}

impl TimeEntry {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "time_entry.id")?;
        validate_non_empty(&self.task_name, "time_entry.task_name")?;
        if self.duration_minutes == 0 {
            return Err("time_entry.duration_minutes must be > 0".to_string());
        }
        if self.day_of_week != day_of_week(self.date) {
            return Err("time_entry.day_of_week must match time_entry.date".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleBlock {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
    pub category: Option<String>,
    pub color: Option<String>,
    pub goal_id: Option<String>,
    pub series_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "schedule_block.id")?;
        validate_non_empty(&self.title, "schedule_block.title")?;
        validate_day_of_week(self.day_of_week, "schedule_block.day_of_week")?;
        let start = parse_hhmm_minutes(&self.start_time)
            .ok_or_else(|| "schedule_block.start_time must be HH:MM".to_string())?;
        let end = parse_hhmm_minutes(&self.end_time)
            .ok_or_else(|| "schedule_block.end_time must be HH:MM".to_string())?;
        if end <= start {
            return Err("schedule_block.end_time must be after schedule_block.start_time".to_string());
        }
        if let Some(color) = &self.color {
            validate_color(color, "schedule_block.color")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedAccess {
    pub id: String,
    pub owner_id: String,
    pub shared_with_id: Option<String>,
    pub invite_email: Option<String>,
    pub invite_token: Option<String>,
    pub invite_expires: Option<DateTime<Utc>>,
    pub is_accepted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub value: String,
    pub color: String,
    pub sort_order: i64,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "category.name")?;
        validate_non_empty(&self.value, "category.value")?;
        validate_color(&self.color, "category.color")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Label {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub value: String,
    pub color: String,
    pub sort_order: i64,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Label {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "label.name")?;
        validate_non_empty(&self.value, "label.value")?;
        validate_color(&self.color, "label.color")
    }
}

pub const FEEDBACK_REPLY_MAX_CHARS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feedback {
    pub id: String,
    pub user_id: String,
    pub emoji: Option<u8>,
    pub text: Option<String>,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "feedback.id")?;
        if self.emoji.is_some_and(|emoji| emoji > 3) {
            return Err("feedback.emoji must be between 0 and 3".to_string());
        }
        if self.emoji.is_none() && self.text.as_deref().is_none_or(|text| text.trim().is_empty()) {
            return Err("feedback needs an emoji or text".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackReply {
    pub id: String,
    pub feedback_id: String,
    pub admin_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    FeedbackReply,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FeedbackReply => "FEEDBACK_REPLY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FEEDBACK_REPLY" => Some(Self::FeedbackReply),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseNote {
    pub id: String,
    pub version: String,
    pub title: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReleaseNote {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.version, "release_note.version")?;
        validate_non_empty(&self.title, "release_note.title")?;
        validate_non_empty(&self.content, "release_note.content")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub content: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub sort_order: i64,
    pub is_expanded: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "note.title")?;
        if let Some(color) = &self.color {
            validate_color(color, "note.color")?;
        }
        if self.parent_id.as_deref() == Some(self.id.as_str()) {
            return Err("note.parent_id cannot reference the note itself".to_string());
        }
        Ok(())
    }
}

/// Derives the stable category or label key from a display name: "Deep work!" -> "DEEP_WORK".
pub fn value_from_name(name: &str) -> String {
    let mut value = String::with_capacity(name.len());
    for character in name.trim().chars() {
        if character.is_ascii_alphanumeric() {
            value.push(character.to_ascii_uppercase());
        } else if !value.ends_with('_') {
            value.push('_');
        }
    }
    value.trim_matches('_').to_string()
}

pub fn day_of_week(date: NaiveDate) -> u8 {
    // num_days_from_sunday is always 0..=6
    u8::try_from(date.weekday().num_days_from_sunday()).unwrap_or(0)
}

pub fn parse_hhmm_minutes(value: &str) -> Option<u32> {
    let (hour_str, minute_str) = value.trim().split_once(':')?;
    if hour_str.is_empty() || hour_str.len() > 2 || minute_str.len() != 2 {
        return None;
    }
    if !hour_str.chars().chain(minute_str.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hour = hour_str.parse::<u32>().ok()?;
    let minute = minute_str.parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

pub(crate) fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_hhmm(value: &str, field_name: &str) -> Result<u32, String> {
    parse_hhmm_minutes(value).ok_or_else(|| format!("{field_name} must be HH:MM"))
}

pub(crate) fn validate_day_of_week(value: u8, field_name: &str) -> Result<(), String> {
    if value > 6 {
        return Err(format!("{field_name} must be between 0 and 6"));
    }
    Ok(())
}

fn validate_email(value: &str, field_name: &str) -> Result<(), String> {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return Err(format!("{field_name} must be an email address"));
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(format!("{field_name} must be an email address"));
    }
    Ok(())
}

fn validate_color(value: &str, field_name: &str) -> Result<(), String> {
    let Some(hex) = value.strip_prefix('#') else {
        return Err(format!("{field_name} must be a #RRGGBB color"));
    };
    if hex.len() != 6 || !hex.chars().all(|character| character.is_ascii_hexdigit()) {
        return Err(format!("{field_name} must be a #RRGGBB color"));
    }
    Ok(())
}
