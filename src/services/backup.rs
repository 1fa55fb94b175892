//! Full backups: todo state plus templates, with integrity metadata.

use crate::error::Result;
use crate::model::TodoState;
use crate::services::template::{TEMPLATES_KEY, TemplateService, TodoTemplate};
use crate::storage::StorageService;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

/// Backup format version.
pub const BACKUP_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    pub user_agent: String,
}

impl DeviceInfo {
    fn current() -> Self {
        Self {
            platform: std::env::consts::OS.to_owned(),
            user_agent: format!("easy-todo/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub version: String,
    pub timestamp: i64,
    pub device_info: DeviceInfo,
    /// BLAKE3 hex digest of this metadata serialized with an empty checksum.
    pub checksum: String,
}

impl BackupMetadata {
    fn new(timestamp: i64) -> Result<Self> {
        let mut metadata = Self {
            version: BACKUP_VERSION.to_owned(),
            timestamp,
            device_info: DeviceInfo::current(),
            checksum: String::new(),
        };
        metadata.checksum = metadata.compute_checksum()?;
        Ok(metadata)
    }

    fn compute_checksum(&self) -> Result<String> {
        let unsigned = Self {
            checksum: String::new(),
            ..self.clone()
        };
        let json = serde_json::to_string(&unsigned)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Whether `checksum` matches the rest of the metadata.
    #[must_use]
    pub fn checksum_matches(&self) -> bool {
        self.compute_checksum()
            .is_ok_and(|expected| expected == self.checksum)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub metadata: BackupMetadata,
    pub state: TodoState,
    #[serde(default)]
    pub templates: Vec<TodoTemplate>,
}

#[derive(Clone)]
pub struct BackupService {
    storage: StorageService,
    templates: TemplateService,
}

impl BackupService {
    pub fn new(storage: StorageService) -> Self {
        let templates = TemplateService::new(storage.clone());
        Self { storage, templates }
    }

    /// Serialize state and templates into a pretty-printed backup document.
    pub async fn create_backup(&self) -> Result<String> {
        let backup = Backup {
            metadata: BackupMetadata::new(self.storage.clock().now_ms())?,
            state: self.storage.get_state().await?,
            templates: self.templates.get_templates().await?,
        };
        Ok(serde_json::to_string_pretty(&backup)?)
    }

    /// Restore a backup document.
    ///
    /// Returns `false` without touching storage when the document is not a
    /// valid backup or either write fails.
    pub async fn restore_backup(&self, content: &str) -> bool {
        let backup = match parse_backup(content) {
            Ok(backup) => backup,
            Err(reason) => {
                error!("backup restore rejected: {reason}");
                return false;
            }
        };
        if !backup.metadata.checksum_matches() {
            warn!("backup metadata checksum mismatch; restoring anyway");
        }

        // Templates first; state last, so nothing is broadcast on failure.
        let store = self.storage.store();
        let previous_templates = match store.get(TEMPLATES_KEY).await {
            Ok(previous) => previous,
            Err(e) => {
                error!("backup restore failed reading templates: {e}");
                return false;
            }
        };
        if let Err(e) = self.templates.set_templates(&backup.templates).await {
            error!("backup restore failed writing templates: {e}");
            return false;
        }
        if let Err(e) = self.storage.set_state(&backup.state).await {
            error!("backup restore failed writing state: {e}");
            let rollback = match previous_templates {
                Some(value) => store.set(TEMPLATES_KEY, value).await,
                None => store.remove(TEMPLATES_KEY).await,
            };
            if let Err(e) = rollback {
                error!("failed to roll back templates after restore failure: {e}");
            }
            return false;
        }
        info!(
            "restored backup from {} ({} todos, {} templates)",
            backup.metadata.timestamp,
            backup.state.todos.len(),
            backup.templates.len()
        );
        true
    }
}

fn parse_backup(content: &str) -> std::result::Result<Backup, String> {
    let value: Value = serde_json::from_str(content).map_err(|e| format!("not JSON: {e}"))?;
    let has_version = value
        .pointer("/metadata/version")
        .and_then(Value::as_str)
        .is_some_and(|v| !v.is_empty());
    if !has_version {
        return Err("missing metadata.version".to_owned());
    }
    if !value.pointer("/state/todos").is_some_and(Value::is_array) {
        return Err("state.todos is not an array".to_owned());
    }
    serde_json::from_value(value).map_err(|e| format!("malformed backup: {e}"))
}
