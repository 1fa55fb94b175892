//! Background worker.
//!
//! Owns the platform alarm facility and is the only context that outlives
//! the foreground. It answers the messaging protocol, turns alarm fires into
//! reminders, runs a periodic catch-up sweep and congratulates on completed
//! todos. Everything runs sequentially inside one tokio task.

use crate::config::AppConfig;
use crate::error::{Result, TodoError};
use crate::host::channel::MessageReceiver;
use crate::host::contract::{CancelPayload, MessageResponse, Request, SchedulePayload};
use crate::model::{TodoState, reminder_instant};
use crate::notification::NotificationPresenter;
use crate::notification::text::reminder_text;
use crate::reminder::{
    ALARM_PREFIX, Alarm, AlarmFacility, alarm_name, due_reminders, todo_id_from_alarm,
};
use crate::storage::{StateChange, StorageService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shortest period the sweep timer accepts.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Tunables for the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub sweep_interval: Duration,
    pub init_max_attempts: u32,
    pub init_retry_delay: Duration,
    pub completion_notifications: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl WorkerSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sweep_interval: config.reminders.sweep_interval(),
            init_max_attempts: config.reminders.init_max_attempts,
            init_retry_delay: config.reminders.init_retry_delay(),
            completion_notifications: config.notifications.completion_notifications,
        }
    }
}

/// Event sources the worker listens to.
pub struct WorkerChannels {
    pub requests: MessageReceiver,
    pub alarms: mpsc::Receiver<Alarm>,
    pub changes: broadcast::Receiver<StateChange>,
}

pub struct BackgroundWorker {
    storage: StorageService,
    alarms: Arc<dyn AlarmFacility>,
    presenter: NotificationPresenter,
    settings: WorkerSettings,
    initialized: bool,
    last_seen: Option<TodoState>,
}

impl BackgroundWorker {
    pub fn new(
        storage: StorageService,
        alarms: Arc<dyn AlarmFacility>,
        presenter: NotificationPresenter,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            storage,
            alarms,
            presenter,
            settings,
            initialized: false,
            last_seen: None,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Rebuild the `todo-` alarms from persisted state.
    ///
    /// Retries up to the configured number of attempts; after one success
    /// later calls return immediately.
    pub async fn initialize_alarms(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let max_attempts = self.settings.init_max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=max_attempts {
            match self.rebuild_alarms().await {
                Ok(created) => {
                    self.initialized = true;
                    info!("alarms initialized: {created} reminder(s) scheduled");
                    return Ok(());
                }
                Err(e) => {
                    warn!("alarm initialization attempt {attempt}/{max_attempts} failed: {e}");
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.settings.init_retry_delay).await;
                    }
                }
            }
        }

        error!("alarm initialization failed after {max_attempts} attempt(s)");
        Err(last_error.unwrap_or_else(|| TodoError::Alarm("initialization failed".to_owned())))
    }

    async fn rebuild_alarms(&self) -> Result<usize> {
        for alarm in self.alarms.get_all().await? {
            if alarm.name.starts_with(ALARM_PREFIX) {
                self.alarms.clear(&alarm.name).await?;
            }
        }

        let state = self.storage.get_state().await?;
        let now = self.storage.clock().now_ms();
        let mut created = 0;
        for todo in state.todos.iter().filter(|t| !t.completed && !t.reminded) {
            let (Some(due), Some(instant)) = (todo.due_date, todo.reminder_instant()) else {
                continue;
            };
            if due > now && instant > now {
                self.alarms.create(&alarm_name(&todo.id), instant).await?;
                created += 1;
            }
        }
        Ok(created)
    }

    /// Answer one protocol request.
    pub async fn handle_request(&mut self, request: Request) -> MessageResponse {
        if let Err(e) = self.initialize_alarms().await {
            return MessageResponse::error(format!("alarm initialization failed: {e}"));
        }

        let kind = request.kind();
        let result = match request {
            Request::ScheduleNotification(payload) => self.schedule_alarm(payload).await,
            Request::CancelNotification(payload) => self.cancel_alarm(payload).await,
        };
        match result {
            Ok(()) => MessageResponse::ok(),
            Err(e) => {
                warn!("{kind} failed: {e}");
                MessageResponse::error(e.to_string())
            }
        }
    }

    async fn schedule_alarm(&self, payload: SchedulePayload) -> Result<()> {
        let (Some(id), Some(due), Some(lead)) = (
            payload.id.filter(|id| !id.is_empty()),
            payload.due_date,
            payload.reminder_lead_time,
        ) else {
            return Err(TodoError::Validation(
                "missing required fields: id, dueDate, reminderLeadTime".to_owned(),
            ));
        };
        let instant = reminder_instant(due, lead);
        self.alarms.create(&alarm_name(&id), instant).await?;
        debug!("alarm for todo {id} set at {instant}");
        Ok(())
    }

    async fn cancel_alarm(&self, payload: CancelPayload) -> Result<()> {
        let Some(todo_id) = payload.todo_id.filter(|id| !id.is_empty()) else {
            return Err(TodoError::Validation("missing todoId".to_owned()));
        };
        if self.alarms.clear(&alarm_name(&todo_id)).await? {
            debug!("alarm for todo {todo_id} cleared");
        }
        Ok(())
    }

    /// Present the reminder for a fired alarm and mark the todo reminded.
    pub async fn handle_alarm(&self, alarm: &Alarm) -> Result<()> {
        let Some(todo_id) = todo_id_from_alarm(&alarm.name) else {
            debug!("ignoring foreign alarm {}", alarm.name);
            return Ok(());
        };

        let mut state = self.storage.get_state().await?;
        let default_lead = state.settings.reminder_lead_time;
        let Some(todo) = state.todo_mut(todo_id) else {
            warn!("alarm {} fired for missing todo", alarm.name);
            return Ok(());
        };
        if todo.completed || todo.reminded {
            debug!("alarm {} fired for a todo that needs no reminder", alarm.name);
            return Ok(());
        }

        let lead = todo.reminder_lead_time.unwrap_or(default_lead);
        let title = todo.title.clone();
        todo.reminded = true;

        self.presenter
            .show_todo_reminder(&title, &reminder_text(lead))
            .await;
        self.storage.set_state(&state).await
    }

    /// Catch up on reminders whose instant is within one sweep interval of now.
    ///
    /// Returns how many reminders were presented.
    pub async fn sweep(&self) -> Result<usize> {
        let mut state = self.storage.get_state().await?;
        let now = self.storage.clock().now_ms();
        let window_ms = i64::try_from(self.sweep_period().as_millis()).unwrap_or(i64::MAX);

        let due = due_reminders(&state, now, window_ms);
        if due.is_empty() {
            return Ok(0);
        }

        for reminder in &due {
            self.presenter
                .show_todo_reminder(&reminder.title, &reminder_text(reminder.lead_minutes))
                .await;
            if let Some(todo) = state.todo_mut(&reminder.todo_id) {
                todo.reminded = true;
            }
        }
        self.storage.set_state(&state).await?;

        // A reminder caught early still has its alarm pending.
        for reminder in &due {
            if let Err(e) = self.alarms.clear(&alarm_name(&reminder.todo_id)).await {
                warn!("failed to clear alarm for swept todo {}: {e}", reminder.todo_id);
            }
        }
        debug!("sweep presented {} reminder(s)", due.len());
        Ok(due.len())
    }

    /// Congratulate on todos that went from incomplete to completed.
    ///
    /// Returns how many completion notifications were shown.
    pub async fn on_state_change(&self, change: &StateChange) -> usize {
        if !self.settings.completion_notifications {
            return 0;
        }
        let Some(old) = change.old.as_ref() else {
            return 0;
        };

        let mut shown = 0;
        for todo in change.new.todos.iter().filter(|t| t.completed) {
            if old.todo(&todo.id).is_some_and(|before| !before.completed) {
                self.presenter.show_completion(&todo.title).await;
                shown += 1;
            }
        }
        shown
    }

    /// Compare `state` with the last state this worker saw and congratulate
    /// on new completions. The first observation only records the baseline.
    ///
    /// Writes from other processes reach the worker only this way.
    pub async fn observe_state(&mut self, state: TodoState) -> usize {
        let change = StateChange {
            old: self.last_seen.take(),
            new: state,
        };
        let shown = self.on_state_change(&change).await;
        self.last_seen = Some(change.new);
        shown
    }

    fn sweep_period(&self) -> Duration {
        self.settings.sweep_interval.max(MIN_SWEEP_INTERVAL)
    }

    async fn refresh_observed_state(&mut self) {
        match self.storage.get_state().await {
            Ok(state) => {
                self.observe_state(state).await;
            }
            Err(e) => warn!("failed to re-read state: {e}"),
        }
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self, channels: WorkerChannels, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(channels, cancel))
    }

    /// Process events until `cancel` fires or every source has closed.
    ///
    /// The first sweep runs immediately.
    pub async fn run(mut self, mut channels: WorkerChannels, cancel: CancellationToken) {
        info!("background worker started");
        if let Err(e) = self.initialize_alarms().await {
            error!("startup alarm initialization failed: {e}");
        }

        self.refresh_observed_state().await;

        let mut interval = tokio::time::interval(self.sweep_period());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut requests_open = true;
        let mut alarms_open = true;
        let mut changes_open = true;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!("reminder sweep failed: {e}");
                    }
                    self.refresh_observed_state().await;
                }
                pending = channels.requests.recv(), if requests_open => match pending {
                    Some(pending) => {
                        let response = self.handle_request(pending.request.clone()).await;
                        pending.respond(response);
                    }
                    None => {
                        debug!("all message clients dropped");
                        requests_open = false;
                    }
                },
                alarm = channels.alarms.recv(), if alarms_open => match alarm {
                    Some(alarm) => {
                        if let Err(e) = self.handle_alarm(&alarm).await {
                            error!("failed to handle alarm {}: {e}", alarm.name);
                        }
                    }
                    None => {
                        debug!("alarm source closed");
                        alarms_open = false;
                    }
                },
                change = channels.changes.recv(), if changes_open => match change {
                    // Re-read instead of trusting the payload: a queued change
                    // can be older than what the last sweep tick observed.
                    Ok(_) => self.refresh_observed_state().await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("state change listener lagged; {n} change(s) dropped");
                        self.refresh_observed_state().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        changes_open = false;
                    }
                },
            }
        }
        info!("background worker stopped");
    }
}
