//! Worker configuration.
//!
//! Loaded from `config.toml`; every section and field is optional and falls
//! back to its default.

use crate::error::{Result, TodoError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub reminders: ReminderConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

/// Where persisted data lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Key-value store file (None = `data_dir()/storage.json`).
    pub state_file: Option<PathBuf>,
    /// Pending alarms file (None = `data_dir()/alarms.json`).
    pub alarm_file: Option<PathBuf>,
}

impl StorageConfig {
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(crate::app_dirs::storage_file)
    }

    #[must_use]
    pub fn alarm_path(&self) -> PathBuf {
        self.alarm_file
            .clone()
            .unwrap_or_else(crate::app_dirs::alarms_file)
    }
}

/// Reminder scheduling behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Period of the catch-up sweep, which also bounds its matching window.
    pub sweep_interval_secs: u64,
    /// Attempts at re-creating alarms on startup.
    pub init_max_attempts: u32,
    /// Delay between initialization attempts.
    pub init_retry_delay_ms: u64,
    /// How long a foreground request waits for the worker.
    pub message_timeout_ms: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            init_max_attempts: 3,
            init_retry_delay_ms: 1000,
            message_timeout_ms: 5000,
        }
    }
}

impl ReminderConfig {
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    #[must_use]
    pub fn init_retry_delay(&self) -> Duration {
        Duration::from_millis(self.init_retry_delay_ms)
    }

    #[must_use]
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }
}

/// Notification behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Congratulate when a todo flips to completed.
    pub completion_notifications: bool,
    /// Keep reminder notifications on screen until dismissed.
    pub reminder_requires_interaction: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            completion_notifications: true,
            reminder_requires_interaction: true,
        }
    }
}

/// Diagnostics output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Also write daily-rotated log files under `data_dir()/logs`.
    pub log_to_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "easy_todo=info".to_owned(),
            log_to_file: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| TodoError::Config(e.to_string()))
    }

    /// Load from `path` when it exists, otherwise defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| TodoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// `config_dir()/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }
}
