//! Key-value persistence.
//!
//! [`KeyValueStore`] is the seam for the host's local storage area. Two
//! implementations ship with the crate:
//!
//! - [`MemoryStore`] keeps values in a map (tests, ephemeral sessions)
//! - [`FileStore`] keeps every key in one JSON object file, written atomically
//!   (temp file → fsync → rename) so a crash never leaves a torn file
//!
//! [`StorageService`] builds the todo state accessor on top of either one.

pub mod state;

pub use state::{ExportEnvelope, STORAGE_KEY, StateChange, StorageService};

use crate::error::{Result, TodoError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// Abstraction over a string-keyed JSON store.
///
/// Each call is atomic on its own; nothing spans calls.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a key. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>> {
        self.values
            .lock()
            .map_err(|_| TodoError::Storage("memory store lock poisoned".to_owned()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.lock()?.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write of the file within this process.
    io_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(TodoError::Storage(format!(
                    "cannot read store '{}': {e}",
                    self.path.display()
                )));
            }
        };

        if bytes.is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(TodoError::Storage(format!(
                "store '{}' is not a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(TodoError::Storage(format!(
                "cannot parse store '{}': {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_all(&self, map: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_vec_pretty(map)?;
        write_atomic(&self.path, &json).await
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.io_lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.io_lock.lock().await;
        let mut map = self.read_all().await?;
        map.insert(key.to_owned(), value);
        self.write_all(&map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.io_lock.lock().await;
        let mut map = self.read_all().await?;
        if map.remove(key).is_some() {
            self.write_all(&map).await?;
        }
        Ok(())
    }
}

/// Write bytes atomically (temp file → fsync → rename).
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            TodoError::Storage(format!(
                "cannot create directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let mut file = tokio::fs::File::create(&tmp_path).await.map_err(|e| {
        TodoError::Storage(format!(
            "cannot create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;
    file.write_all(bytes)
        .await
        .map_err(|e| TodoError::Storage(format!("cannot write temp file: {e}")))?;
    file.sync_all()
        .await
        .map_err(|e| TodoError::Storage(format!("cannot sync temp file: {e}")))?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
        TodoError::Storage(format!(
            "cannot rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}
