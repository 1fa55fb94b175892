//! Todo state accessor.
//!
//! The whole [`TodoState`] lives under [`STORAGE_KEY`] and is read and written
//! wholesale. Writes are atomic per call only: two interleaved
//! `get_state → mutate → set_state` sequences can drop each other's changes
//! (last writer wins).

use crate::clock::SharedClock;
use crate::error::Result;
use crate::model::{SettingsPatch, Todo, TodoFilter, TodoState};
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error};

/// Storage key of the state blob.
pub const STORAGE_KEY: &str = "easy-todo-state";

/// Version written into export files.
pub const EXPORT_VERSION: &str = "1.0";

/// Capacity of the state-change broadcast channel.
const CHANGE_CAPACITY: usize = 64;

/// Export/import file layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub version: String,
    pub timestamp: i64,
    pub data: TodoState,
}

/// Emitted after every successful `set_state`.
#[derive(Debug, Clone)]
pub struct StateChange {
    /// State before the write, `None` when nothing (or nothing parseable) was stored.
    pub old: Option<TodoState>,
    pub new: TodoState,
}

/// Accessor for the persisted todo state.
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn KeyValueStore>,
    clock: SharedClock,
    changes: broadcast::Sender<StateChange>,
}

impl StorageService {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: SharedClock) -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            store,
            clock,
            changes,
        }
    }

    /// Underlying key-value store, shared with services that own other keys.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Subscribe to state writes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Persisted state, or the default state when nothing is stored.
    pub async fn get_state(&self) -> Result<TodoState> {
        match self.store.get(STORAGE_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(TodoState::default()),
        }
    }

    /// Replace the persisted state.
    pub async fn set_state(&self, state: &TodoState) -> Result<()> {
        let old = match self.store.get(STORAGE_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).ok(),
            _ => None,
        };

        self.store
            .set(STORAGE_KEY, serde_json::to_value(state)?)
            .await?;

        // No subscribers is fine.
        let _ = self.changes.send(StateChange {
            old,
            new: state.clone(),
        });
        Ok(())
    }

    pub async fn add_todo(&self, todo: Todo) -> Result<()> {
        let mut state = self.get_state().await?;
        state.todos.push(todo);
        self.set_state(&state).await
    }

    /// Replace the todo with the same id. Unknown ids are ignored.
    pub async fn update_todo(&self, todo: Todo) -> Result<()> {
        let mut state = self.get_state().await?;
        let Some(slot) = state.todo_mut(&todo.id) else {
            debug!("update_todo: no todo with id {}", todo.id);
            return Ok(());
        };
        *slot = todo;
        self.set_state(&state).await
    }

    pub async fn delete_todo(&self, todo_id: &str) -> Result<()> {
        let mut state = self.get_state().await?;
        state.todos.retain(|t| t.id != todo_id);
        self.set_state(&state).await
    }

    /// Merge the set fields of `filter` into the persisted filter.
    pub async fn update_filter(&self, filter: TodoFilter) -> Result<()> {
        let mut state = self.get_state().await?;
        state.filter.merge(filter);
        self.set_state(&state).await
    }

    /// Merge the set fields of `patch` into the persisted settings.
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<()> {
        let mut state = self.get_state().await?;
        state.settings.merge(patch);
        self.set_state(&state).await
    }

    /// Serialize the state into the export envelope (pretty JSON).
    pub async fn export_data(&self) -> Result<String> {
        let envelope = ExportEnvelope {
            version: EXPORT_VERSION.to_owned(),
            timestamp: self.clock.now_ms(),
            data: self.get_state().await?,
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Replace the state with an export envelope's data.
    ///
    /// Returns `false` and leaves the state untouched when the input cannot
    /// be parsed or written.
    pub async fn import_data(&self, json: &str) -> bool {
        let envelope: ExportEnvelope = match serde_json::from_str(json) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("data import failed: {e}");
                return false;
            }
        };

        match self.set_state(&envelope.data).await {
            Ok(()) => {
                debug!(
                    "imported {} todos from export version {}",
                    envelope.data.todos.len(),
                    envelope.version
                );
                true
            }
            Err(e) => {
                error!("data import failed: {e}");
                false
            }
        }
    }

    /// Remove the state key entirely.
    pub async fn clear_all_data(&self) -> Result<()> {
        self.store.remove(STORAGE_KEY).await
    }
}
