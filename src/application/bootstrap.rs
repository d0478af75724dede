use crate::infrastructure::config::{AppSettings, ensure_default_configs, load_settings};
use crate::infrastructure::error::AppError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATABASE_FILE: &str = "timemaster.sqlite";
pub const LOG_FILE: &str = "timemaster.log";

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub database_path: PathBuf,
    pub log_path: PathBuf,
    pub settings: AppSettings,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, AppError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join(DATABASE_FILE);

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    let settings = load_settings(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        database_path,
        log_path: logs_dir.join(LOG_FILE),
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::TempWorkspace;

    #[test]
    fn bootstrap_creates_layout_and_default_settings() {
        let workspace = TempWorkspace::new();
        let result = bootstrap_workspace(workspace.path()).expect("bootstrap");

        assert!(result.config_dir.join("app.json").exists());
        assert!(result.database_path.exists());
        assert_eq!(result.log_path, workspace.path().join("logs").join(LOG_FILE));
        assert_eq!(result.settings, AppSettings::default());

        let again = bootstrap_workspace(workspace.path()).expect("bootstrap is idempotent");
        assert_eq!(again.database_path, result.database_path);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let workspace = TempWorkspace::new();
        let config_dir = workspace.path().join("config");
        fs::create_dir_all(&config_dir).expect("config dir");
        fs::write(config_dir.join("app.json"), "{\"schema\": 2}\n").expect("write config");

        let result = bootstrap_workspace(workspace.path());
        assert!(matches!(result, Err(AppError::InvalidConfig(_))));
    }
}
