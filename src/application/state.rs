use crate::application::bootstrap::bootstrap_workspace;
use crate::infrastructure::config::{AppSettings, EmailConfig, load_email_config_from_env};
use crate::infrastructure::email_client::{EmailSender, email_sender_from_config};
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::Database;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    database: Database,
    settings: AppSettings,
    time_zone: Tz,
    email_config: EmailConfig,
    email_sender: Arc<dyn EmailSender>,
    now_provider: NowProvider,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, AppError> {
        Self::with_email_config(workspace_root, load_email_config_from_env())
    }

    pub fn with_email_config(workspace_root: PathBuf, email_config: EmailConfig) -> Result<Self, AppError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let time_zone = bootstrap.settings.time_zone()?;
        let email_sender = email_sender_from_config(email_config.clone());

        Ok(Self {
            database: Database::new(&bootstrap.database_path),
            settings: bootstrap.settings,
            time_zone,
            email_config,
            email_sender,
            now_provider: Arc::new(Utc::now),
        })
    }

    pub fn with_email_sender(mut self, email_sender: Arc<dyn EmailSender>) -> Self {
        self.email_sender = email_sender;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn email_config(&self) -> &EmailConfig {
        &self.email_config
    }

    pub fn email_sender(&self) -> Arc<dyn EmailSender> {
        Arc::clone(&self.email_sender)
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.time_zone).date_naive()
    }

    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        self.time_zone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc())
    }

    pub fn command_error(&self, command: &str, error: &AppError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, "{message}");
    }

    pub fn log_warn(&self, command: &str, message: &str) {
        tracing::warn!(command, "{message}");
    }

    pub fn log_error(&self, command: &str, message: &str) {
        tracing::error!(command, "{message}");
    }
}
