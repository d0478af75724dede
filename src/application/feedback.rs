use crate::application::accounts::require_admin;
use crate::application::notifications::notify_feedback_reply;
use crate::application::state::{AppState, next_id};
use crate::domain::models::{FEEDBACK_REPLY_MAX_CHARS, Feedback, FeedbackReply};
use crate::infrastructure::error::AppError;
use crate::infrastructure::feedback_repository::{
    FeedbackFilter, delete_feedback, find_feedback, insert_feedback, insert_reply, list_feedback, replies_for,
    set_archived,
};
use crate::infrastructure::user_repository::require_user;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct NewFeedback {
    pub emoji: Option<u8>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeedbackDetail {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub replies: Vec<FeedbackReply>,
}

pub fn create_feedback_impl(state: &AppState, user_id: &str, input: NewFeedback) -> Result<Feedback, AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)?;
    let feedback = Feedback {
        id: next_id("fbk"),
        user_id: user_id.to_string(),
        emoji: input.emoji,
        text: input.text.map(|text| text.trim().to_string()).filter(|text| !text.is_empty()),
        is_archived: false,
        archived_at: None,
        archived_by: None,
        created_at: state.now(),
    };
    feedback.validate().map_err(AppError::Validation)?;
    insert_feedback(&connection, &feedback)?;

    state.log_info("create_feedback", &format!("user_id={user_id} feedback_id={}", feedback.id));
    Ok(feedback)
}

pub fn list_feedback_impl(state: &AppState, admin_id: &str, filter: FeedbackFilter) -> Result<Vec<Feedback>, AppError> {
    let connection = state.database().connect()?;
    require_admin(&connection, admin_id)?;
    list_feedback(&connection, &filter)
}

pub fn get_feedback_impl(state: &AppState, user_id: &str, feedback_id: &str) -> Result<FeedbackDetail, AppError> {
    let connection = state.database().connect()?;
    let caller = require_user(&connection, user_id)?;
    let feedback = find_feedback(&connection, feedback_id)?.ok_or_else(|| AppError::not_found("feedback"))?;
    if feedback.user_id != caller.id && !caller.role.is_admin() {
        return Err(AppError::forbidden("you do not have access to this feedback"));
    }
    let replies = replies_for(&connection, &feedback.id)?;
    Ok(FeedbackDetail { feedback, replies })
}

pub fn archive_feedback_impl(
    state: &AppState,
    admin_id: &str,
    feedback_id: &str,
    archived: bool,
) -> Result<Feedback, AppError> {
    let connection = state.database().connect()?;
    require_admin(&connection, admin_id)?;
    let mut feedback = find_feedback(&connection, feedback_id)?.ok_or_else(|| AppError::not_found("feedback"))?;
    feedback.is_archived = archived;
    feedback.archived_at = archived.then(|| state.now());
    feedback.archived_by = archived.then(|| admin_id.to_string());
    set_archived(&connection, &feedback)?;

    state.log_info(
        "archive_feedback",
        &format!("admin_id={admin_id} feedback_id={feedback_id} archived={archived}"),
    );
    Ok(feedback)
}

pub fn delete_feedback_impl(state: &AppState, admin_id: &str, feedback_id: &str) -> Result<(), AppError> {
    let connection = state.database().connect()?;
    require_admin(&connection, admin_id)?;
    if !delete_feedback(&connection, feedback_id)? {
        return Err(AppError::not_found("feedback"));
    }
    state.log_info("delete_feedback", &format!("admin_id={admin_id} feedback_id={feedback_id}"));
    Ok(())
}

pub fn reply_feedback_impl(
    state: &AppState,
    admin_id: &str,
    feedback_id: &str,
    message: &str,
) -> Result<FeedbackReply, AppError> {
    let message = message.trim();
    let length = message.chars().count();
    if length == 0 || length > FEEDBACK_REPLY_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "reply must be between 1 and {FEEDBACK_REPLY_MAX_CHARS} characters"
        )));
    }

    let mut connection = state.database().connect()?;
    let transaction = connection.transaction()?;
    require_admin(&transaction, admin_id)?;
    let feedback = find_feedback(&transaction, feedback_id)?.ok_or_else(|| AppError::not_found("feedback"))?;
    let reply = FeedbackReply {
        id: next_id("rep"),
        feedback_id: feedback.id.clone(),
        admin_id: admin_id.to_string(),
        message: message.to_string(),
        created_at: state.now(),
    };
    insert_reply(&transaction, &reply)?;
    let notification = notify_feedback_reply(
        &transaction,
        &feedback.user_id,
        &feedback.id,
        &reply.id,
        &reply.message,
        reply.created_at,
    )?;
    transaction.commit()?;

    state.log_info(
        "reply_feedback",
        &format!(
            "admin_id={admin_id} feedback_id={feedback_id} notification_id={}",
            notification.id
        ),
    );
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::notifications::list_notifications_impl;
    use crate::application::test_support::{TempWorkspace, seed_user, seed_user_with};
    use crate::domain::models::{PlanType, UserRole};

    #[test]
    fn feedback_needs_content_and_a_valid_emoji() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);

        let empty = create_feedback_impl(&state, &user.id, NewFeedback { emoji: None, text: Some("  ".to_string()) });
        assert!(matches!(empty, Err(AppError::Validation(_))));
        let bad_emoji = create_feedback_impl(&state, &user.id, NewFeedback { emoji: Some(4), text: None });
        assert!(matches!(bad_emoji, Err(AppError::Validation(_))));

        let created = create_feedback_impl(&state, &user.id, NewFeedback { emoji: Some(0), text: None }).expect("create");
        assert_eq!(created.text, None);
        assert!(!created.is_archived);
    }

    #[test]
    fn admins_filter_archive_and_delete_feedback() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let admin = seed_user_with(&state, "admin@example.com", |user| user.role = Some(UserRole::Admin));
        let ada = seed_user(&state, "ada@example.com", PlanType::Free);
        let bob = seed_user(&state, "bob@example.com", PlanType::Free);
        let first = create_feedback_impl(&state, &ada.id, NewFeedback { emoji: Some(1), text: None }).expect("first");
        create_feedback_impl(&state, &bob.id, NewFeedback { emoji: None, text: Some("slow".to_string()) })
            .expect("second");

        assert!(matches!(
            list_feedback_impl(&state, &ada.id, FeedbackFilter::default()),
            Err(AppError::Forbidden { .. })
        ));

        let archived = archive_feedback_impl(&state, &admin.id, &first.id, true).expect("archive");
        assert_eq!(archived.archived_by.as_deref(), Some(admin.id.as_str()));
        assert_eq!(archived.archived_at, Some(state.now()));

        let open = list_feedback_impl(&state, &admin.id, FeedbackFilter { is_archived: Some(false), user_id: None })
            .expect("open");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].user_id, bob.id);
        let by_ada = list_feedback_impl(&state, &admin.id, FeedbackFilter { is_archived: None, user_id: Some(ada.id.clone()) })
            .expect("by user");
        assert_eq!(by_ada.len(), 1);

        let restored = archive_feedback_impl(&state, &admin.id, &first.id, false).expect("unarchive");
        assert_eq!(restored.archived_at, None);
        assert_eq!(restored.archived_by, None);

        delete_feedback_impl(&state, &admin.id, &first.id).expect("delete");
        assert!(matches!(
            delete_feedback_impl(&state, &admin.id, &first.id),
            Err(AppError::NotFound { entity: "feedback" })
        ));
    }

    #[test]
    fn reply_notifies_the_author() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let admin = seed_user_with(&state, "admin@example.com", |user| user.role = Some(UserRole::Admin));
        let ada = seed_user(&state, "ada@example.com", PlanType::Free);
        let bob = seed_user(&state, "bob@example.com", PlanType::Free);
        let feedback =
            create_feedback_impl(&state, &ada.id, NewFeedback { emoji: None, text: Some("more themes".to_string()) })
                .expect("create");

        assert!(matches!(
            reply_feedback_impl(&state, &admin.id, &feedback.id, "   "),
            Err(AppError::Validation(_))
        ));
        let too_long = "x".repeat(FEEDBACK_REPLY_MAX_CHARS + 1);
        assert!(matches!(
            reply_feedback_impl(&state, &admin.id, &feedback.id, &too_long),
            Err(AppError::Validation(_))
        ));

        let reply = reply_feedback_impl(&state, &admin.id, &feedback.id, "Thanks, noted!").expect("reply");
        let page = list_notifications_impl(&state, &ada.id, None, None).expect("notifications");
        assert_eq!(page.unread_count, 1);
        assert_eq!(page.items[0].body, "Thanks, noted!");
        assert_eq!(page.items[0].data["responseId"], reply.id.as_str());

        let detail = get_feedback_impl(&state, &ada.id, &feedback.id).expect("author view");
        assert_eq!(detail.replies, vec![reply]);
        assert!(matches!(
            get_feedback_impl(&state, &bob.id, &feedback.id),
            Err(AppError::Forbidden { .. })
        ));
    }
}
