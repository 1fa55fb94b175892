//! Reminder scheduling.
//!
//! The coordinator decides how a todo reminder is delivered:
//!
//! 1. instant already reached → notify right away
//! 2. primary transport (the background worker's platform alarms) accepts it
//! 3. otherwise an in-process timer, lost when the process exits

use crate::clock::SharedClock;
use crate::error::{Result, TodoError};
use crate::model::{Todo, reminder_instant};
use crate::notification::NotificationPresenter;
use crate::notification::text::reminder_text;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the coordinator needs to know about a todo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub id: String,
    pub title: String,
    pub due_date: Option<i64>,
    /// Minutes before the due date.
    pub reminder_lead_time: Option<u32>,
}

impl ReminderRequest {
    pub fn from_todo(todo: &Todo) -> Self {
        Self {
            id: todo.id.clone(),
            title: todo.title.clone(),
            due_date: todo.due_date,
            reminder_lead_time: todo.reminder_lead_time,
        }
    }

    /// Check required fields, returning `(reminder_instant, lead_minutes)`.
    pub fn validate(&self) -> Result<(i64, u32)> {
        if self.id.is_empty() {
            return Err(TodoError::Validation("reminder requires a todo id".into()));
        }
        if self.title.trim().is_empty() {
            return Err(TodoError::Validation("reminder requires a title".into()));
        }
        let due = match self.due_date {
            Some(due) if due > 0 => due,
            _ => return Err(TodoError::Validation("reminder requires a due date".into())),
        };
        let Some(lead) = self.reminder_lead_time else {
            return Err(TodoError::Validation(
                "reminder requires a lead time".into(),
            ));
        };
        Ok((reminder_instant(due, lead), lead))
    }
}

/// Which mechanism holds a scheduled reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleChannel {
    Platform,
    LocalTimer,
}

/// Result of [`ReminderCoordinator::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled(ScheduleChannel),
    /// The instant had already been reached; the notification was shown.
    FiredImmediately,
}

/// Primary delivery path for reminders.
#[async_trait]
pub trait ReminderTransport: Send + Sync {
    async fn schedule(&self, request: &ReminderRequest) -> Result<()>;
    async fn cancel(&self, todo_id: &str) -> Result<()>;
}

struct LocalTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

type TimerMap = Arc<Mutex<HashMap<String, LocalTimer>>>;

/// Schedules and cancels todo reminders.
#[derive(Clone)]
pub struct ReminderCoordinator {
    transport: Option<Arc<dyn ReminderTransport>>,
    presenter: NotificationPresenter,
    clock: SharedClock,
    timers: TimerMap,
    generation: Arc<AtomicU64>,
}

impl ReminderCoordinator {
    pub fn new(
        transport: Option<Arc<dyn ReminderTransport>>,
        presenter: NotificationPresenter,
        clock: SharedClock,
    ) -> Self {
        Self {
            transport,
            presenter,
            clock,
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule the reminder described by `request`.
    ///
    /// Fails only on validation; an unavailable transport degrades to a
    /// local timer.
    pub async fn schedule(&self, request: &ReminderRequest) -> Result<ScheduleOutcome> {
        let (instant, lead) = request.validate()?;
        let now = self.clock.now_ms();

        if instant <= now {
            debug!("reminder for {} is due now; notifying", request.id);
            self.presenter
                .show_todo_reminder(&request.title, &reminder_text(lead))
                .await;
            return Ok(ScheduleOutcome::FiredImmediately);
        }

        if let Some(transport) = &self.transport {
            match transport.schedule(request).await {
                Ok(()) => {
                    debug!("reminder for {} scheduled at {instant}", request.id);
                    // A previous fallback for this todo is superseded.
                    self.abort_local_timer(&request.id);
                    return Ok(ScheduleOutcome::Scheduled(ScheduleChannel::Platform));
                }
                Err(e) => warn!(
                    "platform scheduling failed for {}, using local timer: {e}",
                    request.id
                ),
            }
        }

        self.start_local_timer(request, instant, lead, now);
        Ok(ScheduleOutcome::Scheduled(ScheduleChannel::LocalTimer))
    }

    /// Cancel any pending reminder for `todo_id`. Never fails.
    pub async fn cancel(&self, todo_id: &str) {
        if let Some(transport) = &self.transport
            && let Err(e) = transport.cancel(todo_id).await
        {
            warn!("failed to cancel platform reminder for {todo_id}: {e}");
        }
        if self.abort_local_timer(todo_id) {
            debug!("local reminder timer for {todo_id} cancelled");
        }
    }

    /// Whether a local fallback timer is pending for `todo_id`.
    #[must_use]
    pub fn has_local_timer(&self, todo_id: &str) -> bool {
        self.timers
            .lock()
            .map(|timers| timers.contains_key(todo_id))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn local_timer_count(&self) -> usize {
        self.timers.lock().map(|timers| timers.len()).unwrap_or(0)
    }

    fn start_local_timer(&self, request: &ReminderRequest, instant: i64, lead: u32, now: i64) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let delay = Duration::from_millis(u64::try_from(instant - now).unwrap_or(0));
        let todo_id = request.id.clone();
        let title = request.title.clone();
        let presenter = self.presenter.clone();
        let timers = Arc::clone(&self.timers);

        // Registered under the lock so the task cannot finish before it is tracked.
        let Ok(mut guard) = self.timers.lock() else {
            warn!("reminder timer map poisoned; no local timer for {todo_id}");
            return;
        };
        let handle = tokio::spawn({
            let todo_id = todo_id.clone();
            async move {
                tokio::time::sleep(delay).await;
                presenter
                    .show_todo_reminder(&title, &reminder_text(lead))
                    .await;
                if let Ok(mut timers) = timers.lock()
                    && timers
                        .get(&todo_id)
                        .is_some_and(|t| t.generation == generation)
                {
                    timers.remove(&todo_id);
                }
            }
        });
        if let Some(previous) = guard.insert(todo_id.clone(), LocalTimer { generation, handle }) {
            previous.handle.abort();
        }
        drop(guard);
        info!("local reminder timer set for {todo_id} in {delay:?}");
    }

    fn abort_local_timer(&self, todo_id: &str) -> bool {
        let removed = self
            .timers
            .lock()
            .ok()
            .and_then(|mut timers| timers.remove(todo_id));
        match removed {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }
}
