use crate::application::state::{AppState, next_id};
use crate::domain::models::{ScheduleBlock, SharedAccess, User};
use crate::domain::sharing::{
    PublicShareInfo, SharedGoalView, SharedTimeEntryView, ShareState, UserSummary, accepted, authorize_acceptance,
    check_token_usable, invite_expiry,
};
use crate::infrastructure::email_client::{ShareAccepted, ShareInvitation, accept_link};
use crate::infrastructure::error::AppError;
use crate::infrastructure::goal_repository::list_goals;
use crate::infrastructure::schedule_repository::list_blocks;
use crate::infrastructure::share_repository::{
    delete_share, find_by_token, find_for_owner_and_email, find_share, has_accepted_access, insert_share,
    list_by_owner, list_pending_for, list_shared_with, update_share,
};
use crate::infrastructure::time_entry_repository::{ReportQuery, report_entries};
use crate::infrastructure::user_repository::{find_user, find_user_by_email, require_user};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InviteOutcome {
    #[serde(flatten)]
    pub share: SharedAccess,
    pub invite_link: String,
    pub email_sent: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OwnedShare {
    #[serde(flatten)]
    pub share: SharedAccess,
    pub shared_with: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReceivedShare {
    #[serde(flatten)]
    pub share: SharedAccess,
    pub owner: UserSummary,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SharedUserData {
    pub goals: Vec<SharedGoalView>,
    pub recent_entries: Vec<SharedTimeEntryView>,
    pub schedule_blocks: Vec<ScheduleBlock>,
}

/// Records a pending grant for `email` and emails the invitation. Delivery
/// failures are logged and surface only as `email_sent = false`.
pub async fn invite_impl(state: &AppState, owner_id: &str, email: &str) -> Result<InviteOutcome, AppError> {
    let (share, owner, is_existing_user) = record_invitation(state, owner_id, email)?;
    let token = share.invite_token.clone().unwrap_or_default();
    let invite_link = accept_link(&state.email_config().app_url, &token)?.to_string();

    let invitation = ShareInvitation {
        to_email: share.invite_email.clone().unwrap_or_default(),
        inviter_name: owner.name.clone(),
        inviter_email: owner.email.clone(),
        invite_token: token,
        is_existing_user,
        expiry_days: state.settings().invite_expiry_days,
    };
    let email_sent = match state.email_sender().send_share_invitation(&invitation).await {
        Ok(()) => true,
        Err(error) => {
            state.log_warn(
                "invite",
                &format!("invitation email for share_id={} not sent: {error}", share.id),
            );
            false
        }
    };

    Ok(InviteOutcome {
        share,
        invite_link,
        email_sent,
    })
}

fn record_invitation(state: &AppState, owner_id: &str, email: &str) -> Result<(SharedAccess, User, bool), AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }

    let now = state.now();
    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    let owner = require_user(&transaction, owner_id)?;
    if owner.email == email {
        return Err(AppError::Validation("you cannot share with yourself".to_string()));
    }

    let existing = find_for_owner_and_email(&transaction, &owner.id, &email)?;
    match ShareState::of(existing.as_ref(), now) {
        ShareState::Pending | ShareState::Accepted => {
            return Err(AppError::Conflict(
                "user already has access or pending invitation".to_string(),
            ));
        }
        ShareState::Expired => {
            if let Some(stale) = &existing {
                delete_share(&transaction, &stale.id)?;
            }
        }
        ShareState::None => {}
    }

    let invitee = find_user_by_email(&transaction, &email)?;
    let share = SharedAccess {
        id: next_id("shr"),
        owner_id: owner.id.clone(),
        shared_with_id: invitee.as_ref().map(|user| user.id.clone()),
        invite_email: Some(email),
        invite_token: Some(Uuid::new_v4().to_string()),
        invite_expires: Some(invite_expiry(now, state.settings().invite_expiry_days)),
        is_accepted: false,
        created_at: now,
    };
    insert_share(&transaction, &share)?;
    transaction.commit()?;

    state.log_info(
        "invite",
        &format!("created share_id={} existing_user={}", share.id, invitee.is_some()),
    );
    Ok((share, owner, invitee.is_some()))
}

pub async fn accept_by_token_impl(state: &AppState, user_id: &str, token: &str) -> Result<SharedAccess, AppError> {
    let (share, owner, user) = {
        let connection = state.database().connect()?;
        let grant = find_by_token(&connection, token.trim())?.ok_or_else(|| AppError::not_found("invitation"))?;
        accept_grant(state, &connection, user_id, &grant)?
    };
    notify_owner(state, &owner, &user).await;
    Ok(share)
}

pub async fn accept_invite_impl(state: &AppState, user_id: &str, share_id: &str) -> Result<SharedAccess, AppError> {
    let (share, owner, user) = {
        let connection = state.database().connect()?;
        let grant = find_share(&connection, share_id)?
            .filter(|grant| !grant.is_accepted)
            .ok_or_else(|| AppError::not_found("invitation"))?;
        accept_grant(state, &connection, user_id, &grant)?
    };
    notify_owner(state, &owner, &user).await;
    Ok(share)
}

fn accept_grant(
    state: &AppState,
    connection: &Connection,
    user_id: &str,
    grant: &SharedAccess,
) -> Result<(SharedAccess, User, User), AppError> {
    let user = require_user(connection, user_id)?;
    authorize_acceptance(grant, &user.id, &user.email, state.now())?;
    let share = accepted(grant, &user.id);
    update_share(connection, &share)?;
    let owner = require_user(connection, &share.owner_id)?;

    state.log_info("accept_invite", &format!("accepted share_id={}", share.id));
    Ok((share, owner, user))
}

async fn notify_owner(state: &AppState, owner: &User, accepter: &User) {
    let notice = ShareAccepted {
        to_email: owner.email.clone(),
        accepter_name: accepter.name.clone(),
        accepter_email: accepter.email.clone(),
    };
    if let Err(error) = state.email_sender().send_share_accepted(&notice).await {
        state.log_warn("accept_invite", &format!("acceptance notice not sent: {error}"));
    }
}

pub fn decline_invite_impl(state: &AppState, user_id: &str, share_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    let user = require_user(&connection, user_id)?;
    let grant = find_share(&connection, share_id)?
        .filter(|grant| {
            !grant.is_accepted
                && (grant.shared_with_id.as_deref() == Some(user.id.as_str())
                    || grant.invite_email.as_deref() == Some(user.email.as_str()))
        })
        .ok_or_else(|| AppError::not_found("invitation"))?;
    delete_share(&connection, &grant.id)?;

    state.log_info("decline_invite", &format!("declined share_id={share_id}"));
    Ok(())
}

pub fn revoke_access_impl(state: &AppState, owner_id: &str, share_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    let grant = find_share(&connection, share_id)?
        .filter(|grant| grant.owner_id == owner_id)
        .ok_or_else(|| AppError::not_found("share"))?;
    delete_share(&connection, &grant.id)?;

    state.log_info("revoke_access", &format!("revoked share_id={share_id}"));
    Ok(())
}

pub fn remove_my_access_impl(state: &AppState, user_id: &str, share_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    let grant = find_share(&connection, share_id)?
        .filter(|grant| grant.shared_with_id.as_deref() == Some(user_id))
        .ok_or_else(|| AppError::not_found("share"))?;
    delete_share(&connection, &grant.id)?;

    state.log_info("remove_my_access", &format!("removed share_id={share_id}"));
    Ok(())
}

pub fn pending_invites_impl(state: &AppState, user_id: &str) -> Result<Vec<ReceivedShare>, AppError> {
    let connection = state.database().connect()?;
    let user = require_user(&connection, user_id)?;
    let now = state.now();
    list_pending_for(&connection, &user.id, &user.email)?
        .into_iter()
        .filter(|grant| ShareState::of(Some(grant), now) == ShareState::Pending)
        .map(|grant| with_owner(&connection, grant))
        .collect()
}

pub fn my_shares_impl(state: &AppState, owner_id: &str) -> Result<Vec<OwnedShare>, AppError> {
    let connection = state.database().connect()?;
    let owner = require_user(&connection, owner_id)?;
    list_by_owner(&connection, &owner.id)?
        .into_iter()
        .map(|share| -> Result<OwnedShare, AppError> {
            let shared_with = match &share.shared_with_id {
                Some(id) => find_user(&connection, id)?.as_ref().map(UserSummary::from),
                None => None,
            };
            Ok(OwnedShare { share, shared_with })
        })
        .collect()
}

pub fn shared_with_me_impl(state: &AppState, user_id: &str) -> Result<Vec<ReceivedShare>, AppError> {
    let connection = state.database().connect()?;
    list_shared_with(&connection, user_id)?
        .into_iter()
        .map(|grant| with_owner(&connection, grant))
        .collect()
}

fn with_owner(connection: &Connection, share: SharedAccess) -> Result<ReceivedShare, AppError> {
    let owner = require_user(connection, &share.owner_id)?;
    Ok(ReceivedShare {
        owner: UserSummary::from(&owner),
        share,
    })
}

pub fn shared_user_data_impl(state: &AppState, accessor_id: &str, owner_id: &str) -> Result<SharedUserData, AppError> {
    let connection = state.database().connect()?;
    ensure_accepted_access(&connection, owner_id, accessor_id)?;
    let recent = ReportQuery {
        user_id: owner_id.to_string(),
        limit: Some(state.settings().recent_entries_limit),
        ..ReportQuery::default()
    };
    Ok(SharedUserData {
        goals: shared_goals(&connection, owner_id)?,
        recent_entries: shared_entries(&connection, &recent)?,
        schedule_blocks: list_blocks(&connection, owner_id)?,
    })
}

pub fn shared_user_goals_impl(
    state: &AppState,
    accessor_id: &str,
    owner_id: &str,
) -> Result<Vec<SharedGoalView>, AppError> {
    let connection = state.database().connect()?;
    ensure_accepted_access(&connection, owner_id, accessor_id)?;
    shared_goals(&connection, owner_id)
}

pub fn shared_user_entries_impl(
    state: &AppState,
    accessor_id: &str,
    owner_id: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<SharedTimeEntryView>, AppError> {
    let connection = state.database().connect()?;
    ensure_accepted_access(&connection, owner_id, accessor_id)?;
    shared_entries(&connection, &range_query(owner_id, start_date, end_date)?)
}

fn ensure_accepted_access(connection: &Connection, owner_id: &str, accessor_id: &str) -> Result<(), AppError> {
    if has_accepted_access(connection, owner_id, accessor_id)? {
        Ok(())
    } else {
        Err(AppError::forbidden("you do not have access to this user's data"))
    }
}

pub fn public_share_info_impl(state: &AppState, token: &str) -> Result<PublicShareInfo, AppError> {
    let connection = state.database().connect()?;
    let grant = verify_public_token(state, &connection, token)?;
    let owner = require_user(&connection, &grant.owner_id)?;
    Ok(PublicShareInfo::new(&grant, UserSummary::from(&owner)))
}

pub fn public_goals_impl(state: &AppState, token: &str) -> Result<Vec<SharedGoalView>, AppError> {
    let connection = state.database().connect()?;
    let grant = verify_public_token(state, &connection, token)?;
    shared_goals(&connection, &grant.owner_id)
}

pub fn public_entries_impl(
    state: &AppState,
    token: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<SharedTimeEntryView>, AppError> {
    let connection = state.database().connect()?;
    let grant = verify_public_token(state, &connection, token)?;
    shared_entries(&connection, &range_query(&grant.owner_id, start_date, end_date)?)
}

fn verify_public_token(state: &AppState, connection: &Connection, token: &str) -> Result<SharedAccess, AppError> {
    let grant = find_by_token(connection, token.trim())?.ok_or_else(|| AppError::not_found("share link"))?;
    check_token_usable(&grant, state.now())?;
    Ok(grant)
}

fn range_query(owner_id: &str, start_date: NaiveDate, end_date: NaiveDate) -> Result<ReportQuery, AppError> {
    if end_date < start_date {
        return Err(AppError::Validation("end_date must not be before start_date".to_string()));
    }
    Ok(ReportQuery {
        user_id: owner_id.to_string(),
        start: Some(start_date),
        end: Some(end_date),
        ..ReportQuery::default()
    })
}

fn shared_goals(connection: &Connection, owner_id: &str) -> Result<Vec<SharedGoalView>, AppError> {
    Ok(list_goals(connection, owner_id, None)?
        .iter()
        .map(SharedGoalView::from)
        .collect())
}

fn shared_entries(connection: &Connection, query: &ReportQuery) -> Result<Vec<SharedTimeEntryView>, AppError> {
    Ok(report_entries(connection, query)?
        .iter()
        .map(SharedTimeEntryView::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::goals::{NewGoal, create_goal_impl};
    use crate::application::state::NowProvider;
    use crate::application::test_support::{
        FailingEmailSender, RecordingEmailSender, TempWorkspace, fixed_now, seed_user,
    };
    use crate::application::time_entries::{NewTimeEntry, create_time_entry_impl};
    use crate::domain::models::PlanType;
    use chrono::Duration;
    use std::sync::Arc;

    fn recording_state(workspace: &TempWorkspace) -> (AppState, Arc<RecordingEmailSender>) {
        let sender = Arc::new(RecordingEmailSender::default());
        let state = workspace.app_state().with_email_sender(sender.clone());
        (state, sender)
    }

    fn later_state(workspace: &TempWorkspace, days: i64) -> AppState {
        let now_provider: NowProvider = Arc::new(move || fixed_now() + Duration::days(days));
        workspace.app_state().with_now_provider(now_provider)
    }

    #[tokio::test]
    async fn invite_then_accept_links_the_recipient_and_notifies_the_owner() {
        let workspace = TempWorkspace::new();
        let (state, sender) = recording_state(&workspace);
        let owner = seed_user(&state, "ada@example.com", PlanType::Free);
        let guest = seed_user(&state, "bob@example.com", PlanType::Free);

        let outcome = invite_impl(&state, &owner.id, "  Bob@Example.com ").await.expect("invite");
        assert!(outcome.email_sent);
        assert!(!outcome.share.is_accepted);
        assert_eq!(outcome.share.shared_with_id.as_deref(), Some(guest.id.as_str()));
        assert_eq!(outcome.share.invite_email.as_deref(), Some("bob@example.com"));
        assert_eq!(outcome.share.invite_expires, Some(fixed_now() + Duration::days(7)));
        let token = outcome.share.invite_token.clone().expect("token issued");
        assert_eq!(
            outcome.invite_link,
            format!("http://localhost:3000/share/accept?token={token}")
        );

        let invitations = sender.invitations();
        assert_eq!(invitations.len(), 1);
        assert!(invitations[0].is_existing_user);
        assert_eq!(invitations[0].inviter_name, "ada");

        let pending = pending_invites_impl(&state, &guest.id).expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].owner.email, "ada@example.com");

        let share = accept_by_token_impl(&state, &guest.id, &token).await.expect("accept");
        assert!(share.is_accepted);
        assert_eq!(share.invite_token, None);
        assert_eq!(share.invite_email, None);
        assert_eq!(share.invite_expires, None);

        let accepted = sender.accepted();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].to_email, "ada@example.com");
        assert_eq!(accepted[0].accepter_email, "bob@example.com");

        assert!(pending_invites_impl(&state, &guest.id).expect("pending").is_empty());
        let received = shared_with_me_impl(&state, &guest.id).expect("shared with me");
        assert_eq!(received.len(), 1);
        let owned = my_shares_impl(&state, &owner.id).expect("my shares");
        assert_eq!(
            owned[0].shared_with.as_ref().map(|user| user.email.as_str()),
            Some("bob@example.com")
        );
    }

    #[tokio::test]
    async fn duplicate_and_self_invites_are_rejected() {
        let workspace = TempWorkspace::new();
        let (state, _sender) = recording_state(&workspace);
        let owner = seed_user(&state, "ada@example.com", PlanType::Free);

        let own = invite_impl(&state, &owner.id, "ADA@example.com").await;
        assert!(matches!(own, Err(AppError::Validation(_))));

        invite_impl(&state, &owner.id, "new@example.com").await.expect("invite");
        let again = invite_impl(&state, &owner.id, "new@example.com").await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn expired_invitation_is_replaced_and_cannot_be_accepted() {
        let workspace = TempWorkspace::new();
        let (state, _sender) = recording_state(&workspace);
        let owner = seed_user(&state, "ada@example.com", PlanType::Free);
        let first = invite_impl(&state, &owner.id, "carol@example.com").await.expect("invite");
        let stale_token = first.share.invite_token.clone().expect("token");

        let later = later_state(&workspace, 8);
        let carol = seed_user(&later, "carol@example.com", PlanType::Free);
        let expired = accept_by_token_impl(&later, &carol.id, &stale_token).await;
        assert!(matches!(expired, Err(AppError::Forbidden { .. })));
        assert!(matches!(
            public_share_info_impl(&later, &stale_token),
            Err(AppError::Forbidden { .. })
        ));
        assert!(pending_invites_impl(&later, &carol.id).expect("pending").is_empty());

        let second = invite_impl(&later, &owner.id, "carol@example.com").await.expect("re-invite");
        assert_ne!(second.share.id, first.share.id);
        assert!(matches!(
            accept_by_token_impl(&later, &carol.id, &stale_token).await,
            Err(AppError::NotFound { entity: "invitation" })
        ));
        let share = accept_invite_impl(&later, &carol.id, &second.share.id).await.expect("accept by id");
        assert!(share.is_accepted);
    }

    #[tokio::test]
    async fn only_the_recipient_may_accept() {
        let workspace = TempWorkspace::new();
        let (state, _sender) = recording_state(&workspace);
        let owner = seed_user(&state, "ada@example.com", PlanType::Free);
        let intruder = seed_user(&state, "eve@example.com", PlanType::Free);
        let outcome = invite_impl(&state, &owner.id, "bob@example.com").await.expect("invite");
        let token = outcome.share.invite_token.expect("token");

        let result = accept_by_token_impl(&state, &intruder.id, &token).await;
        assert!(matches!(result, Err(AppError::Forbidden { code: "FORBIDDEN", .. })));
        let unknown = accept_by_token_impl(&state, &intruder.id, "no-such-token").await;
        assert!(matches!(unknown, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn failed_email_still_records_the_invitation() {
        let workspace = TempWorkspace::new();
        let state = workspace
            .app_state()
            .with_email_sender(Arc::new(FailingEmailSender));
        let owner = seed_user(&state, "ada@example.com", PlanType::Free);
        let guest = seed_user(&state, "bob@example.com", PlanType::Free);

        let outcome = invite_impl(&state, &owner.id, "bob@example.com").await.expect("invite");
        assert!(!outcome.email_sent);
        let token = outcome.share.invite_token.expect("token");
        let share = accept_by_token_impl(&state, &guest.id, &token).await.expect("accept");
        assert!(share.is_accepted);
    }

    #[tokio::test]
    async fn shared_data_requires_an_accepted_grant() {
        let workspace = TempWorkspace::new();
        let (state, _sender) = recording_state(&workspace);
        let owner = seed_user(&state, "ada@example.com", PlanType::Pro);
        let guest = seed_user(&state, "bob@example.com", PlanType::Free);
        create_goal_impl(
            &state,
            &owner.id,
            NewGoal {
                title: "Rust".to_string(),
                target_hours: 10.0,
                ..NewGoal::default()
            },
        )
        .expect("create goal");
        for index in 0..25 {
            create_time_entry_impl(
                &state,
                &owner.id,
                NewTimeEntry {
                    task_name: format!("Session {index}"),
                    duration_minutes: 30,
                    ..NewTimeEntry::default()
                },
            )
            .expect("create entry");
        }

        let outcome = invite_impl(&state, &owner.id, "bob@example.com").await.expect("invite");
        let token = outcome.share.invite_token.clone().expect("token");
        assert!(matches!(
            shared_user_data_impl(&state, &guest.id, &owner.id),
            Err(AppError::Forbidden { .. })
        ));

        let info = public_share_info_impl(&state, &token).expect("public info");
        assert_eq!(info.owner.email, "ada@example.com");
        assert_eq!(info.access_type, "VIEW_ONLY");
        assert_eq!(public_goals_impl(&state, &token).expect("public goals").len(), 1);
        let today = state.today();
        assert_eq!(
            public_entries_impl(&state, &token, today, today).expect("public entries").len(),
            25
        );

        accept_by_token_impl(&state, &guest.id, &token).await.expect("accept");
        let data = shared_user_data_impl(&state, &guest.id, &owner.id).expect("shared data");
        assert_eq!(data.goals.len(), 1);
        assert_eq!(
            shared_user_goals_impl(&state, &guest.id, &owner.id).expect("goals")[0].title,
            "Rust"
        );
        assert_eq!(data.recent_entries.len(), 20);
        assert!(data.schedule_blocks.is_empty());
        assert_eq!(
            shared_user_entries_impl(&state, &guest.id, &owner.id, today, today)
                .expect("entries")
                .len(),
            25
        );
        assert!(matches!(
            public_goals_impl(&state, &token),
            Err(AppError::NotFound { entity: "share link" })
        ));
    }

    #[tokio::test]
    async fn decline_revoke_and_remove_delete_the_grant() {
        let workspace = TempWorkspace::new();
        let (state, _sender) = recording_state(&workspace);
        let owner = seed_user(&state, "ada@example.com", PlanType::Free);
        let guest = seed_user(&state, "bob@example.com", PlanType::Free);

        let first = invite_impl(&state, &owner.id, "bob@example.com").await.expect("invite");
        assert!(matches!(
            decline_invite_impl(&state, &owner.id, &first.share.id),
            Err(AppError::NotFound { .. })
        ));
        decline_invite_impl(&state, &guest.id, &first.share.id).expect("decline");
        assert!(my_shares_impl(&state, &owner.id).expect("my shares").is_empty());

        let second = invite_impl(&state, &owner.id, "bob@example.com").await.expect("invite again");
        accept_invite_impl(&state, &guest.id, &second.share.id).await.expect("accept");
        assert!(matches!(
            revoke_access_impl(&state, &guest.id, &second.share.id),
            Err(AppError::NotFound { entity: "share" })
        ));
        remove_my_access_impl(&state, &guest.id, &second.share.id).expect("remove");
        assert!(shared_with_me_impl(&state, &guest.id).expect("shared").is_empty());

        let third = invite_impl(&state, &owner.id, "bob@example.com").await.expect("third invite");
        revoke_access_impl(&state, &owner.id, &third.share.id).expect("revoke");
        assert!(pending_invites_impl(&state, &guest.id).expect("pending").is_empty());
    }
}
