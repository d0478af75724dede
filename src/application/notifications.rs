use crate::application::state::{AppState, next_id};
use crate::domain::models::{Notification, NotificationKind};
use crate::infrastructure::error::AppError;
use crate::infrastructure::notification_repository::{
    count_unread, find_notification, insert_notification, list_notifications, mark_read,
};
use crate::infrastructure::user_repository::require_user;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 50;
const PREVIEW_CHARS: usize = 140;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub unread_count: u32,
}

pub(crate) fn notify_feedback_reply(
    connection: &Connection,
    user_id: &str,
    feedback_id: &str,
    reply_id: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<Notification, AppError> {
    let notification = Notification {
        id: next_id("ntf"),
        user_id: user_id.to_string(),
        kind: NotificationKind::FeedbackReply,
        title: "New reply to your feedback".to_string(),
        body: message.chars().take(PREVIEW_CHARS).collect(),
        data: json!({ "feedbackId": feedback_id, "responseId": reply_id }),
        read_at: None,
        created_at: now,
    };
    insert_notification(connection, &notification)?;
    Ok(notification)
}

/// `cursor` is the last id of the previous page; the next page starts strictly after it.
pub fn list_notifications_impl(
    state: &AppState,
    user_id: &str,
    cursor: Option<&str>,
    limit: Option<u32>,
) -> Result<NotificationPage, AppError> {
    let connection = state.database().connect()?;
    require_user(&connection, user_id)?;
    if let Some(cursor) = cursor {
        let owned = find_notification(&connection, cursor)?.is_some_and(|notification| notification.user_id == user_id);
        if !owned {
            return Err(AppError::not_found("notification"));
        }
    }

    let take = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let mut items = list_notifications(&connection, user_id, cursor, take + 1)?;
    let has_more = items.len() > take as usize;
    items.truncate(take as usize);
    let next_cursor = if has_more {
        items.last().map(|notification| notification.id.clone())
    } else {
        None
    };

    Ok(NotificationPage {
        items,
        next_cursor,
        has_more,
        unread_count: count_unread(&connection, user_id)?,
    })
}

pub fn mark_notification_read_impl(
    state: &AppState,
    user_id: &str,
    notification_id: &str,
) -> Result<Notification, AppError> {
    let connection = state.database().connect()?;
    let mut notification =
        find_notification(&connection, notification_id)?.ok_or_else(|| AppError::not_found("notification"))?;
    if notification.user_id != user_id {
        return Err(AppError::forbidden("you cannot update this notification"));
    }
    let read_at = state.now();
    mark_read(&connection, &notification.id, read_at)?;
    notification.read_at = Some(read_at);

    state.log_info("mark_notification_read", &format!("user_id={user_id} notification_id={notification_id}"));
    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{TempWorkspace, seed_user};
    use crate::domain::models::PlanType;

    fn seed_notifications(state: &AppState, user_id: &str, count: usize) -> Vec<Notification> {
        let connection = state.database().connect().expect("connect");
        (0..count)
            .map(|index| {
                notify_feedback_reply(
                    &connection,
                    user_id,
                    "fbk-1",
                    &format!("rep-{index}"),
                    &format!("reply {index}"),
                    state.now(),
                )
                .expect("notify")
            })
            .collect()
    }

    #[test]
    fn pages_walk_every_notification_once() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);
        let created = seed_notifications(&state, &user.id, 5);

        let first = list_notifications_impl(&state, &user.id, None, Some(2)).expect("first page");
        assert!(first.has_more);
        assert_eq!(first.unread_count, 5);
        assert_eq!(first.items[0].id, created[4].id);

        let second = list_notifications_impl(&state, &user.id, first.next_cursor.as_deref(), Some(2)).expect("second");
        let third = list_notifications_impl(&state, &user.id, second.next_cursor.as_deref(), Some(2)).expect("third");
        assert!(!third.has_more);
        assert_eq!(third.next_cursor, None);

        let mut seen: Vec<String> = [first.items, second.items, third.items]
            .into_iter()
            .flatten()
            .map(|notification| notification.id)
            .collect();
        assert_eq!(seen.len(), 5);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn page_size_is_clamped() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let user = seed_user(&state, "ada@example.com", PlanType::Free);
        seed_notifications(&state, &user.id, 3);

        let page = list_notifications_impl(&state, &user.id, None, Some(0)).expect("page");
        assert_eq!(page.items.len(), 1);
        assert!(page.has_more);

        let stranger = seed_user(&state, "bob@example.com", PlanType::Free);
        let foreign_cursor = list_notifications_impl(&state, &stranger.id, Some(&page.items[0].id), None);
        assert!(matches!(foreign_cursor, Err(AppError::NotFound { entity: "notification" })));
    }

    #[test]
    fn only_the_owner_marks_read_and_preview_is_truncated() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        let owner = seed_user(&state, "ada@example.com", PlanType::Free);
        let other = seed_user(&state, "bob@example.com", PlanType::Free);
        let connection = state.database().connect().expect("connect");
        let long_message = "é".repeat(300);
        let notification =
            notify_feedback_reply(&connection, &owner.id, "fbk-1", "rep-1", &long_message, state.now()).expect("notify");
        assert_eq!(notification.body.chars().count(), 140);
        assert_eq!(notification.data["feedbackId"], "fbk-1");

        let denied = mark_notification_read_impl(&state, &other.id, &notification.id);
        assert!(matches!(denied, Err(AppError::Forbidden { .. })));

        let read = mark_notification_read_impl(&state, &owner.id, &notification.id).expect("mark read");
        assert_eq!(read.read_at, Some(state.now()));
        let page = list_notifications_impl(&state, &owner.id, None, None).expect("page");
        assert_eq!(page.unread_count, 0);
    }
}
