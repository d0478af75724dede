use crate::domain::models::{Goal, GoalStatus, SharedAccess, User};
use crate::domain::report::{GoalRef, ReportEntry, TaskRef};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

pub const INVITE_EXPIRY_DAYS: i64 = 7;
pub const PUBLIC_ACCESS_TYPE: &str = "VIEW_ONLY";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareState {
    None,
    Pending,
    Expired,
    Accepted,
}

impl ShareState {
    pub fn of(grant: Option<&SharedAccess>, now: DateTime<Utc>) -> Self {
        match grant {
            None => Self::None,
            Some(grant) if grant.is_accepted => Self::Accepted,
            Some(grant) if is_expired(grant, now) => Self::Expired,
            Some(_) => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceError {
    Expired,
    NotRecipient,
}

impl AcceptanceError {
    pub fn message(self) -> &'static str {
        match self {
            Self::Expired => "invitation has expired",
            Self::NotRecipient => "this invitation is not for you",
        }
    }
}

pub fn invite_expiry(now: DateTime<Utc>, expiry_days: i64) -> DateTime<Utc> {
    now + Duration::days(expiry_days)
}

pub fn is_expired(grant: &SharedAccess, now: DateTime<Utc>) -> bool {
    grant.invite_expires.is_some_and(|expires| expires < now)
}

pub fn check_token_usable(grant: &SharedAccess, now: DateTime<Utc>) -> Result<(), AcceptanceError> {
    if is_expired(grant, now) {
        return Err(AcceptanceError::Expired);
    }
    Ok(())
}

/// The caller may accept when the recorded invite email equals theirs exactly,
/// or when the grant is already addressed to their account.
pub fn authorize_acceptance(
    grant: &SharedAccess,
    user_id: &str,
    user_email: &str,
    now: DateTime<Utc>,
) -> Result<(), AcceptanceError> {
    check_token_usable(grant, now)?;
    let email_matches = grant.invite_email.as_deref() == Some(user_email);
    let addressed_to_user = grant.shared_with_id.as_deref() == Some(user_id);
    if email_matches || addressed_to_user {
        Ok(())
    } else {
        Err(AcceptanceError::NotRecipient)
    }
}

pub fn accepted(grant: &SharedAccess, user_id: &str) -> SharedAccess {
    SharedAccess {
        shared_with_id: Some(user_id.to_string()),
        invite_email: None,
        invite_token: None,
        invite_expires: None,
        is_accepted: true,
        ..grant.clone()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicShareInfo {
    pub owner: UserSummary,
    pub share_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub access_type: &'static str,
}

impl PublicShareInfo {
    pub fn new(grant: &SharedAccess, owner: UserSummary) -> Self {
        Self {
            owner,
            share_id: grant.id.clone(),
            created_at: grant.created_at,
            expires_at: grant.invite_expires,
            access_type: PUBLIC_ACCESS_TYPE,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SharedGoalView {
    pub id: String,
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

impl From<&Goal> for SharedGoalView {
    fn from(goal: &Goal) -> Self {
        Self {
            id: goal.id.clone(),
            title: goal.title.clone(),
            description: goal.description.clone(),
            category: goal.category.clone(),
            color: goal.color.clone(),
            target_hours: goal.target_hours,
            logged_hours: goal.logged_hours,
            deadline: goal.deadline,
            status: goal.status,
            created_at: goal.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SharedTimeEntryView {
    pub id: String,
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub task_name: String,
    pub duration_minutes: u32,
    pub notes: Option<String>,
    pub goal: Option<GoalRef>,
    pub task: Option<TaskRef>,
}

impl From<&ReportEntry> for SharedTimeEntryView {
    fn from(entry: &ReportEntry) -> Self {
        Self {
            id: entry.id.clone(),
            date: entry.date,
            started_at: entry.started_at,
            task_name: entry.task_name.clone(),
            duration_minutes: entry.duration_minutes,
            notes: entry.notes.clone(),
            goal: entry.goal.clone(),
            task: entry.task.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn pending(email: &str, expires: &str) -> SharedAccess {
        SharedAccess {
            id: "shr-1".to_string(),
            owner_id: "usr-owner".to_string(),
            shared_with_id: None,
            invite_email: Some(email.to_string()),
            invite_token: Some("token-1".to_string()),
            invite_expires: Some(at(expires)),
            is_accepted: false,
            created_at: at("2026-01-01T00:00:00Z"),
        }
    }

    #[test]
    fn state_tracks_acceptance_and_expiry() {
        let now = at("2026-01-05T00:00:00Z");
        assert_eq!(ShareState::of(None, now), ShareState::None);

        let grant = pending("bob@example.com", "2026-01-08T00:00:00Z");
        assert_eq!(ShareState::of(Some(&grant), now), ShareState::Pending);
        assert_eq!(
            ShareState::of(Some(&grant), at("2026-01-09T00:00:00Z")),
            ShareState::Expired
        );

        let linked = accepted(&grant, "usr-bob");
        assert_eq!(ShareState::of(Some(&linked), at("2027-01-01T00:00:00Z")), ShareState::Accepted);
        assert_eq!(linked.invite_token, None);
        assert_eq!(linked.invite_email, None);
        assert_eq!(linked.shared_with_id.as_deref(), Some("usr-bob"));
    }

    #[test]
    fn acceptance_requires_exact_email_or_addressed_id() {
        let now = at("2026-01-02T00:00:00Z");
        let grant = pending("bob@example.com", "2026-01-08T00:00:00Z");
        assert_eq!(authorize_acceptance(&grant, "usr-bob", "bob@example.com", now), Ok(()));
        assert_eq!(
            authorize_acceptance(&grant, "usr-eve", "eve@example.com", now),
            Err(AcceptanceError::NotRecipient)
        );

        let mut addressed = grant.clone();
        addressed.shared_with_id = Some("usr-bob".to_string());
        addressed.invite_email = Some("old@example.com".to_string());
        assert_eq!(authorize_acceptance(&addressed, "usr-bob", "bob@example.com", now), Ok(()));
    }

    #[test]
    fn expired_invitation_cannot_be_accepted() {
        let grant = pending("bob@example.com", "2026-01-08T00:00:00Z");
        let later = at("2026-01-08T00:00:01Z");
        assert_eq!(
            authorize_acceptance(&grant, "usr-bob", "bob@example.com", later),
            Err(AcceptanceError::Expired)
        );
        assert!(check_token_usable(&grant, at("2026-01-08T00:00:00Z")).is_ok());
    }

    #[test]
    fn invite_expiry_is_seven_days_out() {
        let now = at("2026-03-01T12:00:00Z");
        assert_eq!(invite_expiry(now, INVITE_EXPIRY_DAYS), at("2026-03-08T12:00:00Z"));
    }
}
