use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;

static DEFAULT_DB_NAME: &str = "taskminder.sqlite3";
static ENV_DATA_DIR: &str = "TASKMINDER_DATA_DIR";
static ENV_EARLY_MINUTES: &str = "TASKMINDER_EARLY_MINUTES";

/// Lead time of the early reminder when nothing overrides it.
pub const DEFAULT_EARLY_MINUTES: i64 = 10;
/// One year; larger offsets are rejected.
pub const MAX_EARLY_MINUTES: i64 = 365 * 24 * 60;

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("dev", "taskminder", "taskminder"));

/// How reminders are derived from a task's due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSettings {
    /// How long before the due date the early reminder fires.
    pub early_offset: Duration,
    /// Whether the process may register exact alarms at all.
    pub exact_alarms: bool,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            early_offset: Duration::minutes(DEFAULT_EARLY_MINUTES),
            exact_alarms: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    data_dir: PathBuf,
    db_path: PathBuf,
    reminders: ReminderSettings,
}

impl AppConfig {
    /// Construct [`AppConfig`] by resolving the data directory using the provided override,
    /// environment variables, and platform defaults.
    pub fn discover(data_dir_override: Option<PathBuf>) -> Result<Self> {
        let data_dir = resolve_data_dir(data_dir_override)?;
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory at {}", data_dir.display())
            })?;
        }
        let mut config = Self::from_data_dir(data_dir)?;
        if let Some(minutes) = early_minutes_from_env()? {
            config.reminders.early_offset = Duration::minutes(minutes);
        }
        Ok(config)
    }

    /// Construct [`AppConfig`] directly from a resolved data directory.
    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        let db_path = data_dir.join(DEFAULT_DB_NAME);
        Ok(Self {
            data_dir,
            db_path,
            reminders: ReminderSettings::default(),
        })
    }

    pub fn with_early_offset(mut self, offset: Duration) -> Self {
        self.reminders.early_offset = offset;
        self
    }

    pub fn with_exact_alarms(mut self, allowed: bool) -> Self {
        self.reminders.exact_alarms = allowed;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn reminders(&self) -> ReminderSettings {
        self.reminders
    }
}

fn early_minutes_from_env() -> Result<Option<i64>> {
    match env::var(ENV_EARLY_MINUTES) {
        Ok(raw) => parse_early_minutes(&raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_early_minutes(raw: &str) -> Result<i64> {
    let minutes: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a whole number of minutes", ENV_EARLY_MINUTES))?;
    if minutes < 0 {
        return Err(anyhow!(
            "{} cannot be negative (got {})",
            ENV_EARLY_MINUTES,
            minutes
        ));
    }
    if minutes > MAX_EARLY_MINUTES {
        return Err(anyhow!(
            "{} cannot exceed {} (got {})",
            ENV_EARLY_MINUTES,
            MAX_EARLY_MINUTES,
            minutes
        ));
    }
    Ok(minutes)
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir_override {
        return Ok(dir);
    }

    if let Ok(env_dir) = env::var(ENV_DATA_DIR) {
        return Ok(PathBuf::from(env_dir));
    }

    if cfg!(debug_assertions) {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let dev_dir = manifest_dir.join("..").join("..").join("tmp").join("dev-taskminder");
        return Ok(dev_dir);
    }

    if let Some(project) = &*PROJECT_DIRS {
        return Ok(project.data_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".taskminder"));
    }

    Ok(env::current_dir()?.join(".taskminder"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn from_data_dir_places_database_inside() {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::from_data_dir(dir.path().to_path_buf()).expect("config");
        assert_eq!(config.db_path(), dir.path().join("taskminder.sqlite3"));
        assert_eq!(config.reminders(), ReminderSettings::default());
    }

    #[test]
    fn discover_prefers_explicit_override() {
        let dir = TempDir::new().expect("temp dir");
        let nested = dir.path().join("nested");
        let config = AppConfig::discover(Some(nested.clone())).expect("discover");
        assert_eq!(config.data_dir(), nested.as_path());
        assert!(nested.exists());
    }

    #[test]
    fn early_offset_override_sticks() {
        let dir = TempDir::new().expect("temp dir");
        let config = AppConfig::from_data_dir(dir.path().to_path_buf())
            .expect("config")
            .with_early_offset(Duration::minutes(30))
            .with_exact_alarms(false);
        assert_eq!(config.reminders().early_offset, Duration::minutes(30));
        assert!(!config.reminders().exact_alarms);
    }

    #[test]
    fn parses_early_minutes() {
        assert_eq!(parse_early_minutes(" 15 ").unwrap(), 15);
        assert!(parse_early_minutes("-5").is_err());
        assert!(parse_early_minutes("soon").is_err());
        assert_eq!(parse_early_minutes("525600").unwrap(), MAX_EARLY_MINUTES);
        assert!(parse_early_minutes("525601").is_err());
        assert!(parse_early_minutes("1000000000000").is_err());
        assert!(parse_early_minutes("100000000000000000").is_err());
    }
}
