//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate locations.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data | `~/Library/Application Support/easy-todo/` | `~/.local/share/easy-todo/` |
//! | Config | `~/Library/Application Support/easy-todo/` | `~/.config/easy-todo/` |
//!
//! Overrides for tests and custom deployments:
//! - `EASY_TODO_DATA_DIR` overrides [`data_dir`]
//! - `EASY_TODO_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

const APP_DIR_NAME: &str = "easy-todo";

/// Persistent data root: the storage file, alarms and logs.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("EASY_TODO_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("/tmp/easy-todo-data"))
}

/// Directory holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("EASY_TODO_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("/tmp/easy-todo-config"))
}

/// Main config file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Key-value store file (`data_dir()/storage.json`).
#[must_use]
pub fn storage_file() -> PathBuf {
    data_dir().join("storage.json")
}

/// Pending alarms (`data_dir()/alarms.json`).
#[must_use]
pub fn alarms_file() -> PathBuf {
    data_dir().join("alarms.json")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
