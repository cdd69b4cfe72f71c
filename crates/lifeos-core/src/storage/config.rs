//! TOML-based application configuration.
//!
//! Stores:
//! - Notion credentials, database id and property names
//! - Google OAuth client and the target task list
//! - Sync cadence and remote-failure policy
//! - Logging level and directory
//!
//! Configuration is stored at `~/.config/lifeos/config.toml`. Secrets may
//! instead come from the environment (`NOTION_API_KEY`, `NOTION_ACTION_DB_ID`,
//! `GCAL_TASKLIST_ID`, `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;

/// Notion database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub database_id: String,
    #[serde(default = "default_notion_api_base")]
    pub api_base: String,
    #[serde(default = "default_notion_version")]
    pub version: String,
    #[serde(default = "default_title_property")]
    pub title_property: String,
    #[serde(default = "default_done_property")]
    pub done_property: String,
    #[serde(default = "default_do_date_property")]
    pub do_date_property: String,
    #[serde(default = "default_status_property")]
    pub status_property: String,
    /// Status select value an action must have to be synced.
    #[serde(default = "default_active_status")]
    pub active_status: String,
}

/// Google Tasks settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub tasklist_id: String,
    #[serde(default = "default_google_api_base")]
    pub api_base: String,
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

/// What to use as "current actions" when the Notion query fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFetchFallback {
    /// Reuse the retained snapshot, so nothing looks changed.
    LastKnown,
    /// Abandon the cycle without touching either side.
    SkipCycle,
}

/// What to use as "current tasks" when the Google Tasks listing fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFetchFallback {
    /// Treat the list as empty.
    Empty,
    /// Abandon the cycle without touching either side.
    SkipCycle,
}

/// Sync cadence and failure policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Pause applied when a cycle would start at 23:59.
    #[serde(default = "default_blackout_pause_secs")]
    pub blackout_pause_secs: u64,
    #[serde(default = "default_action_fallback")]
    pub on_action_fetch_error: ActionFetchFallback,
    #[serde(default = "default_task_fallback")]
    pub on_task_fetch_error: TaskFetchFallback,
    #[serde(default = "default_true")]
    pub persist_snapshot: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for per-day log files. Defaults to `<data_dir>/log`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/lifeos/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// Default functions
fn default_notion_api_base() -> String {
    "https://api.notion.com".into()
}
fn default_notion_version() -> String {
    "2022-06-28".into()
}
fn default_title_property() -> String {
    "⭐Action⭐".into()
}
fn default_done_property() -> String {
    "Done".into()
}
fn default_do_date_property() -> String {
    "Do Date".into()
}
fn default_status_property() -> String {
    "Status".into()
}
fn default_active_status() -> String {
    "Active".into()
}
fn default_google_api_base() -> String {
    "https://tasks.googleapis.com/tasks/v1".into()
}
fn default_redirect_port() -> u16 {
    19821
}
fn default_interval_secs() -> u64 {
    60
}
fn default_blackout_pause_secs() -> u64 {
    300
}
fn default_action_fallback() -> ActionFetchFallback {
    ActionFetchFallback::LastKnown
}
fn default_task_fallback() -> TaskFetchFallback {
    TaskFetchFallback::Empty
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            database_id: String::new(),
            api_base: default_notion_api_base(),
            version: default_notion_version(),
            title_property: default_title_property(),
            done_property: default_done_property(),
            do_date_property: default_do_date_property(),
            status_property: default_status_property(),
            active_status: default_active_status(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            tasklist_id: String::new(),
            api_base: default_google_api_base(),
            redirect_port: default_redirect_port(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            blackout_pause_secs: default_blackout_pause_secs(),
            on_action_fetch_error: default_action_fallback(),
            on_task_fetch_error: default_task_fallback(),
            persist_snapshot: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn blackout_pause(&self) -> Duration {
        Duration::from_secs(self.blackout_pause_secs)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("not a leaf key".to_string()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `<data_dir>/config.toml`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default path, writing a default file if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from a specific path, writing a default file if none exists.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Load from disk and apply environment overrides.
    pub fn load_effective() -> Result<Self, ConfigError> {
        let mut cfg = Self::load()?;
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Persist to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Override secrets and ids with non-empty values from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let pick = |name: &str, slot: &mut String| {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        };
        pick("NOTION_API_KEY", &mut self.notion.api_key);
        pick("NOTION_ACTION_DB_ID", &mut self.notion.database_id);
        pick("GCAL_TASKLIST_ID", &mut self.google.tasklist_id);
        pick("GOOGLE_CLIENT_ID", &mut self.google.client_id);
        pick("GOOGLE_CLIENT_SECRET", &mut self.google.client_secret);
    }

    /// Check that everything a sync cycle needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("notion.api_key", &self.notion.api_key),
            ("notion.database_id", &self.notion.database_id),
            ("google.client_id", &self.google.client_id),
            ("google.client_secret", &self.google.client_secret),
            ("google.tasklist_id", &self.google.tasklist_id),
        ];
        if let Some((key, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::MissingKey((*key).to_string()));
        }
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync.interval_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Directory for per-day log files.
    pub fn log_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.logging.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(data_dir()?.join("log")),
        }
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}
