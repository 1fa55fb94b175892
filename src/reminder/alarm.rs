//! Platform alarm facility.
//!
//! Alarms are named one-shot triggers at an absolute epoch-millisecond time.
//! Todo reminders use the name `todo-<id>`.
//!
//! [`AlarmRegistry`] is the in-process facility used by the worker binary. It
//! persists pending alarms to a JSON file so they survive restarts, and a
//! runner task delivers due alarms on an mpsc channel.

use crate::clock::SharedClock;
use crate::error::{Result, TodoError};
use crate::storage::write_atomic;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prefix of every todo reminder alarm.
pub const ALARM_PREFIX: &str = "todo-";

/// Upper bound on one runner sleep, so wall-clock jumps are noticed.
const MAX_RUNNER_SLEEP: Duration = Duration::from_secs(30);

/// Alarm name for a todo id.
#[must_use]
pub fn alarm_name(todo_id: &str) -> String {
    format!("{ALARM_PREFIX}{todo_id}")
}

/// Todo id encoded in an alarm name, `None` for foreign alarms.
#[must_use]
pub fn todo_id_from_alarm(name: &str) -> Option<&str> {
    name.strip_prefix(ALARM_PREFIX).filter(|id| !id.is_empty())
}

/// A pending (or just fired) alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub name: String,
    /// Epoch milliseconds.
    pub scheduled_time: i64,
}

/// Named one-shot alarms.
#[async_trait]
pub trait AlarmFacility: Send + Sync {
    /// Create or replace the alarm `name` firing at `when`.
    async fn create(&self, name: &str, when: i64) -> Result<()>;

    /// Remove an alarm. Returns whether one existed.
    async fn clear(&self, name: &str) -> Result<bool>;

    /// Every pending alarm.
    async fn get_all(&self) -> Result<Vec<Alarm>>;
}

/// In-process alarm facility with optional file persistence.
pub struct AlarmRegistry {
    alarms: Mutex<BTreeMap<String, i64>>,
    path: Option<PathBuf>,
    changed: Notify,
}

impl AlarmRegistry {
    /// Registry kept only in memory.
    pub fn in_memory() -> Self {
        Self {
            alarms: Mutex::new(BTreeMap::new()),
            path: None,
            changed: Notify::new(),
        }
    }

    /// Registry persisted at `path`, loading any alarms already there.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let alarms = load_alarms(&path).await?;
        if !alarms.is_empty() {
            info!(
                "loaded {} pending alarm(s) from {}",
                alarms.len(),
                path.display()
            );
        }
        Ok(Self {
            alarms: Mutex::new(alarms),
            path: Some(path),
            changed: Notify::new(),
        })
    }

    /// Remove and return every alarm due at `now`, earliest first.
    pub async fn fire_due(&self, now: i64) -> Result<Vec<Alarm>> {
        let mut alarms = self.alarms.lock().await;
        let due: Vec<String> = alarms
            .iter()
            .filter(|(_, when)| **when <= now)
            .map(|(name, _)| name.clone())
            .collect();
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let mut fired: Vec<Alarm> = due
            .into_iter()
            .filter_map(|name| {
                alarms.remove(&name).map(|scheduled_time| Alarm {
                    name,
                    scheduled_time,
                })
            })
            .collect();
        fired.sort_by_key(|a| a.scheduled_time);
        // Fired alarms are delivered even if the file keeps a stale copy.
        if let Err(e) = self.persist(&alarms).await {
            warn!("fired {} alarm(s) but could not persist: {e}", fired.len());
        }
        Ok(fired)
    }

    /// Earliest pending alarm time.
    pub async fn next_due(&self) -> Option<i64> {
        self.alarms.lock().await.values().min().copied()
    }

    /// Spawn the runner that delivers due alarms on `fired_tx`.
    ///
    /// The runner stops when `cancel` fires or the receiver is dropped.
    pub fn spawn_runner(
        self: &Arc<Self>,
        clock: SharedClock,
        fired_tx: mpsc::Sender<Alarm>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let wait = match registry.next_due().await {
                    Some(when) => {
                        let delta = when.saturating_sub(clock.now_ms()).max(0);
                        Duration::from_millis(u64::try_from(delta).unwrap_or(0))
                            .min(MAX_RUNNER_SLEEP)
                    }
                    None => MAX_RUNNER_SLEEP,
                };

                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = registry.changed.notified() => continue,
                    () = tokio::time::sleep(wait) => {}
                }

                let fired = match registry.fire_due(clock.now_ms()).await {
                    Ok(fired) => fired,
                    Err(e) => {
                        warn!("alarm runner failed to collect due alarms: {e}");
                        continue;
                    }
                };
                for alarm in fired {
                    debug!("alarm fired: {}", alarm.name);
                    if fired_tx.send(alarm).await.is_err() {
                        debug!("alarm receiver dropped; stopping runner");
                        return;
                    }
                }
            }
            debug!("alarm runner stopped");
        })
    }

    async fn persist(&self, alarms: &BTreeMap<String, i64>) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let snapshot: Vec<Alarm> = alarms
            .iter()
            .map(|(name, when)| Alarm {
                name: name.clone(),
                scheduled_time: *when,
            })
            .collect();
        let json = serde_json::to_vec_pretty(&snapshot)?;
        write_atomic(path, &json)
            .await
            .map_err(|e| TodoError::Alarm(format!("failed to persist alarms: {e}")))
    }
}

#[async_trait]
impl AlarmFacility for AlarmRegistry {
    async fn create(&self, name: &str, when: i64) -> Result<()> {
        if name.is_empty() {
            return Err(TodoError::Alarm("alarm name must not be empty".to_owned()));
        }
        let mut alarms = self.alarms.lock().await;
        alarms.insert(name.to_owned(), when);
        self.persist(&alarms).await?;
        drop(alarms);
        self.changed.notify_one();
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<bool> {
        let mut alarms = self.alarms.lock().await;
        let existed = alarms.remove(name).is_some();
        if existed {
            self.persist(&alarms).await?;
            drop(alarms);
            self.changed.notify_one();
        }
        Ok(existed)
    }

    async fn get_all(&self) -> Result<Vec<Alarm>> {
        Ok(self
            .alarms
            .lock()
            .await
            .iter()
            .map(|(name, when)| Alarm {
                name: name.clone(),
                scheduled_time: *when,
            })
            .collect())
    }
}

async fn load_alarms(path: &Path) -> Result<BTreeMap<String, i64>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(TodoError::Alarm(format!(
                "failed to read alarms file '{}': {e}",
                path.display()
            )));
        }
    };
    if bytes.is_empty() {
        return Ok(BTreeMap::new());
    }
    let alarms: Vec<Alarm> = serde_json::from_slice(&bytes).map_err(|e| {
        TodoError::Alarm(format!(
            "failed to parse alarms file '{}': {e}",
            path.display()
        ))
    })?;
    Ok(alarms
        .into_iter()
        .map(|a| (a.name, a.scheduled_time))
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::{Clock, ManualClock};

    #[test]
    fn alarm_names_round_trip_todo_ids() {
        assert_eq!(alarm_name("abc"), "todo-abc");
        assert_eq!(todo_id_from_alarm("todo-abc"), Some("abc"));
        assert_eq!(todo_id_from_alarm("todo-"), None);
        assert_eq!(todo_id_from_alarm("backup-daily"), None);
    }

    #[tokio::test]
    async fn create_replaces_and_clear_reports_existence() {
        let registry = AlarmRegistry::in_memory();
        registry.create("todo-a", 100).await.unwrap();
        registry.create("todo-a", 200).await.unwrap();
        registry.create("todo-b", 50).await.unwrap();

        let all = registry.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(registry.next_due().await, Some(50));

        assert!(registry.clear("todo-b").await.unwrap());
        assert!(!registry.clear("todo-b").await.unwrap());
        assert_eq!(registry.next_due().await, Some(200));
    }

    #[tokio::test]
    async fn fire_due_removes_only_due_alarms_in_time_order() {
        let registry = AlarmRegistry::in_memory();
        registry.create("todo-late", 300).await.unwrap();
        registry.create("todo-b", 200).await.unwrap();
        registry.create("todo-a", 100).await.unwrap();

        let fired = registry.fire_due(250).await.unwrap();
        let names: Vec<&str> = fired.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["todo-a", "todo-b"]);
        assert!(registry.fire_due(250).await.unwrap().is_empty());
        assert_eq!(registry.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn alarms_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("alarms.json");

        let registry = AlarmRegistry::open(&path).await.unwrap();
        registry.create("todo-a", 1_000).await.unwrap();
        registry.create("todo-b", 2_000).await.unwrap();
        registry.fire_due(1_500).await.unwrap();
        drop(registry);

        let reopened = AlarmRegistry::open(&path).await.unwrap();
        let all = reopened.get_all().await.unwrap();
        assert_eq!(
            all,
            vec![Alarm {
                name: "todo-b".into(),
                scheduled_time: 2_000
            }]
        );
    }

    #[tokio::test]
    async fn due_alarms_are_delivered_when_persisting_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("alarms.json");

        let registry = AlarmRegistry::open(&path).await.unwrap();
        registry.create("todo-a", 1_000).await.unwrap();
        registry.create("todo-b", 5_000).await.unwrap();

        // A directory in place of the file makes every rename fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let fired = registry.fire_due(2_000).await.unwrap();
        assert_eq!(
            fired,
            vec![Alarm {
                name: "todo-a".into(),
                scheduled_time: 1_000
            }]
        );
        assert_eq!(registry.next_due().await, Some(5_000));
    }

    #[tokio::test]
    async fn corrupt_alarm_file_is_an_alarm_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("alarms.json");
        std::fs::write(&path, "[{").unwrap();
        let err = AlarmRegistry::open(&path).await.err().unwrap();
        assert_eq!(err.code(), "ALARM_ERROR");
    }

    #[tokio::test]
    async fn runner_delivers_due_alarm() {
        let clock = ManualClock::new(10_000);
        let registry = Arc::new(AlarmRegistry::in_memory());
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = registry.spawn_runner(Arc::new(clock.clone()), tx, cancel.clone());

        registry
            .create("todo-x", clock.now_ms() + 20)
            .await
            .unwrap();
        clock.advance(20);

        let alarm = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("alarm should fire")
            .expect("channel open");
        assert_eq!(alarm.name, "todo-x");

        cancel.cancel();
        handle.await.unwrap();
    }
}
