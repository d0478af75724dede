use crate::infrastructure::error::AppError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_EMAIL_FROM: &str = "Time Master <onboarding@resend.dev>";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub schema: u8,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_invite_expiry_days")]
    pub invite_expiry_days: i64,
    #[serde(default = "default_recent_entries_limit")]
    pub recent_entries_limit: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema: 1,
            app_name: default_app_name(),
            timezone: default_timezone(),
            currency: default_currency(),
            invite_expiry_days: default_invite_expiry_days(),
            recent_entries_limit: default_recent_entries_limit(),
        }
    }
}

impl AppSettings {
    pub fn time_zone(&self) -> Result<Tz, AppError> {
        self.timezone.trim().parse::<Tz>().map_err(|error| {
            AppError::InvalidConfig(format!("invalid timezone '{}': {error}", self.timezone))
        })
    }

    fn validate(&self) -> Result<(), AppError> {
        self.time_zone()?;
        if self.currency.trim().is_empty() {
            return Err(AppError::InvalidConfig("currency must not be empty".to_string()));
        }
        if self.invite_expiry_days <= 0 {
            return Err(AppError::InvalidConfig("inviteExpiryDays must be > 0".to_string()));
        }
        if self.recent_entries_limit == 0 {
            return Err(AppError::InvalidConfig("recentEntriesLimit must be > 0".to_string()));
        }
        Ok(())
    }
}

fn default_app_name() -> String {
    "Time Master".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_invite_expiry_days() -> i64 {
    crate::domain::sharing::INVITE_EXPIRY_DAYS
}

fn default_recent_entries_limit() -> u32 {
    20
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), AppError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppSettings::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, AppError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| AppError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(AppError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_settings(config_dir: &Path) -> Result<AppSettings, AppError> {
    let path = config_dir.join(APP_JSON);
    let settings: AppSettings = serde_json::from_value(read_config(&path)?)?;
    settings.validate()?;
    Ok(settings)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub from: String,
    pub app_url: String,
}

pub fn load_email_config_from_env() -> EmailConfig {
    load_email_config_from_lookup(|key| std::env::var(key).ok())
}

pub fn load_email_config_from_lookup<F>(lookup: F) -> EmailConfig
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = optional_lookup_value(&lookup, &["TIMEMASTER_RESEND_API_KEY", "RESEND_API_KEY"]);
    let from = optional_lookup_value(&lookup, &["TIMEMASTER_EMAIL_FROM", "EMAIL_FROM"])
        .unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string());
    let app_url = optional_lookup_value(&lookup, &["TIMEMASTER_APP_URL", "APP_URL"])
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_APP_URL.to_string());
    EmailConfig {
        api_key,
        from,
        app_url,
    }
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static NEXT_DIR: AtomicU64 = AtomicU64::new(1);

    struct TempDir {
        path: PathBuf,
    }

    impl TempDir {
        fn new() -> Self {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock after epoch")
                .as_nanos();
            let sequence = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("timemaster-config-{nanos}-{sequence}"));
            fs::create_dir_all(&path).expect("create temp dir");
            Self { path }
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn default_app_json_round_trips_through_loader() {
        let dir = TempDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let settings = load_settings(&dir.path).expect("load defaults");
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.time_zone().expect("utc"), chrono_tz::UTC);
    }

    #[test]
    fn existing_app_json_is_not_overwritten() {
        let dir = TempDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema": 1, "timezone": "Europe/Berlin", "currency": "EUR"}"#,
        )
        .expect("write config");
        ensure_default_configs(&dir.path).expect("ensure defaults");
        let settings = load_settings(&dir.path).expect("load");
        assert_eq!(settings.timezone, "Europe/Berlin");
        assert_eq!(settings.currency, "EUR");
        assert_eq!(settings.invite_expiry_days, 7);
    }

    #[test]
    fn unsupported_schema_and_bad_timezone_are_rejected() {
        let dir = TempDir::new();
        fs::write(dir.path.join(APP_JSON), r#"{"schema": 2}"#).expect("write config");
        assert!(matches!(load_settings(&dir.path), Err(AppError::InvalidConfig(_))));

        fs::write(dir.path.join(APP_JSON), r#"{"schema": 1, "timezone": "Mars/Olympus"}"#)
            .expect("write config");
        assert!(matches!(load_settings(&dir.path), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn email_config_prefers_prefixed_keys_and_trims_url() {
        let config = load_email_config_from_lookup(|key| match key {
            "TIMEMASTER_RESEND_API_KEY" => Some(" re_prefixed ".to_string()),
            "RESEND_API_KEY" => Some("re_plain".to_string()),
            "APP_URL" => Some("https://app.example.com/".to_string()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("re_prefixed"));
        assert_eq!(config.app_url, "https://app.example.com");
        assert_eq!(config.from, DEFAULT_EMAIL_FROM);
    }

    #[test]
    fn missing_api_key_disables_email() {
        let config = load_email_config_from_lookup(|key| match key {
            "RESEND_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.api_key, None);
        assert_eq!(config.app_url, DEFAULT_APP_URL);
    }
}
