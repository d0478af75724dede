use crate::application::accounts::{NewUser, create_user_impl};
use crate::application::state::{AppState, NowProvider};
use crate::domain::models::{PlanType, User};
use crate::infrastructure::config::EmailConfig;
use crate::infrastructure::email_client::{EmailSender, ShareAccepted, ShareInvitation};
use crate::infrastructure::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

pub(crate) struct TempWorkspace {
    path: PathBuf,
}

impl TempWorkspace {
    pub(crate) fn new() -> Self {
        let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "timemaster-application-tests-{}-{}",
            std::process::id(),
            sequence
        ));
        fs::create_dir_all(&path).expect("create temp workspace");
        Self { path }
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn app_state(&self) -> AppState {
        let now_provider: NowProvider = Arc::new(fixed_now);
        AppState::with_email_config(self.path.clone(), test_email_config())
            .expect("initialize app state")
            .with_now_provider(now_provider)
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Tuesday 2026-03-10 09:00 UTC.
pub(crate) fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-10T09:00:00Z")
        .expect("valid datetime")
        .with_timezone(&Utc)
}

pub(crate) fn test_email_config() -> EmailConfig {
    EmailConfig {
        api_key: None,
        from: "Time Master <test@example.com>".to_string(),
        app_url: "http://localhost:3000".to_string(),
    }
}

pub(crate) fn seed_user(state: &AppState, email: &str, plan: PlanType) -> User {
    seed_user_with(state, email, |user| user.plan = Some(plan))
}

pub(crate) fn seed_user_with<F>(state: &AppState, email: &str, configure: F) -> User
where
    F: FnOnce(&mut NewUser),
{
    let mut input = NewUser {
        email: email.to_string(),
        name: email.split('@').next().unwrap_or("user").to_string(),
        ..NewUser::default()
    };
    configure(&mut input);
    create_user_impl(state, input).expect("create user")
}

#[derive(Debug, Default)]
pub(crate) struct RecordingEmailSender {
    invitations: Mutex<Vec<ShareInvitation>>,
    accepted: Mutex<Vec<ShareAccepted>>,
}

impl RecordingEmailSender {
    pub(crate) fn invitations(&self) -> Vec<ShareInvitation> {
        self.invitations.lock().expect("invitations lock").clone()
    }

    pub(crate) fn accepted(&self) -> Vec<ShareAccepted> {
        self.accepted.lock().expect("accepted lock").clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_share_invitation(&self, invitation: &ShareInvitation) -> Result<(), AppError> {
        self.invitations
            .lock()
            .expect("invitations lock")
            .push(invitation.clone());
        Ok(())
    }

    async fn send_share_accepted(&self, notice: &ShareAccepted) -> Result<(), AppError> {
        self.accepted.lock().expect("accepted lock").push(notice.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FailingEmailSender;

#[async_trait]
impl EmailSender for FailingEmailSender {
    async fn send_share_invitation(&self, _invitation: &ShareInvitation) -> Result<(), AppError> {
        Err(AppError::Email("http 500".to_string()))
    }

    async fn send_share_accepted(&self, _notice: &ShareAccepted) -> Result<(), AppError> {
        Err(AppError::Email("http 500".to_string()))
    }
}
