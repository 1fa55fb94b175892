//! System notification presenter.
//!
//! [`NotificationPresenter`] walks an ordered list of
//! [`NotificationBackend`]s (extension-level first, web-style second) and
//! delivers through the first one that is available, permitted and
//! succeeds. When every backend declines, the notification is written to the
//! log instead. Presentation is fire-and-forget: it never waits on the user
//! and never returns an error.

pub mod text;

use crate::error::{Result, TodoError};
use crate::host::contract::HostEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A notification to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    /// Keep the notification on screen until dismissed.
    pub require_interaction: bool,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            require_interaction: false,
        }
    }

    #[must_use]
    pub fn with_require_interaction(mut self, require: bool) -> Self {
        self.require_interaction = require;
        self
    }
}

/// Permission state of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not asked yet.
    Default,
}

/// One way of putting a notification in front of the user.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    /// Stable backend identifier used in logs and [`Delivery`].
    fn name(&self) -> &'static str;

    /// Whether the facility exists in this environment at all.
    fn is_available(&self) -> bool;

    /// Current permission state.
    async fn permission(&self) -> Permission {
        Permission::Granted
    }

    /// Ask the user for permission. Defaults to reporting the current state.
    async fn request_permission(&self) -> Permission {
        self.permission().await
    }

    /// Display the notification.
    async fn show(&self, notification: &Notification) -> Result<()>;
}

/// Where a notification ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Backend(&'static str),
    /// No backend delivered; written to the log.
    Logged,
}

/// Ordered fallback chain of notification backends.
#[derive(Clone)]
pub struct NotificationPresenter {
    backends: Vec<Arc<dyn NotificationBackend>>,
    reminder_requires_interaction: bool,
}

impl NotificationPresenter {
    /// Create a presenter trying `backends` in order.
    pub fn new(backends: Vec<Arc<dyn NotificationBackend>>) -> Self {
        Self {
            backends,
            reminder_requires_interaction: true,
        }
    }

    /// Presenter with no backends: every notification goes to the log.
    pub fn log_only() -> Self {
        Self::new(Vec::new())
    }

    #[must_use]
    pub fn with_reminder_interaction(mut self, require: bool) -> Self {
        self.reminder_requires_interaction = require;
        self
    }

    /// Deliver `notification` through the first willing backend.
    pub async fn present(&self, notification: &Notification) -> Delivery {
        for backend in &self.backends {
            if !backend.is_available() {
                debug!("notification backend {} unavailable", backend.name());
                continue;
            }

            if !ensure_permission(backend.as_ref()).await {
                warn!(
                    "notification permission not granted for {}",
                    backend.name()
                );
                continue;
            }

            match backend.show(notification).await {
                Ok(()) => return Delivery::Backend(backend.name()),
                Err(e) => warn!("notification via {} failed: {e}", backend.name()),
            }
        }

        info!(
            "notification: {} - {}",
            notification.title, notification.message
        );
        Delivery::Logged
    }

    /// Reminder that `title` is due in `time_text`.
    pub async fn show_todo_reminder(&self, title: &str, time_text: &str) -> Delivery {
        let notification = Notification::new(
            text::REMINDER_TITLE,
            text::reminder_message(title, time_text),
        )
        .with_require_interaction(self.reminder_requires_interaction);
        self.present(&notification).await
    }

    /// Congratulation for finishing `title`.
    pub async fn show_completion(&self, title: &str) -> Delivery {
        let notification =
            Notification::new(text::COMPLETION_TITLE, text::completion_message(title));
        self.present(&notification).await
    }
}

async fn ensure_permission(backend: &dyn NotificationBackend) -> bool {
    match backend.permission().await {
        Permission::Granted => true,
        Permission::Denied => false,
        Permission::Default => backend.request_permission().await == Permission::Granted,
    }
}

/// Extension-level backend: hands notifications to the host shell as events.
pub struct HostEventBackend {
    event_tx: mpsc::UnboundedSender<HostEvent>,
}

impl HostEventBackend {
    pub fn new(event_tx: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { event_tx }
    }
}

#[async_trait]
impl NotificationBackend for HostEventBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn is_available(&self) -> bool {
        !self.event_tx.is_closed()
    }

    async fn show(&self, notification: &Notification) -> Result<()> {
        self.event_tx
            .send(HostEvent::notification(notification))
            .map_err(|e| TodoError::Channel(format!("host event channel closed: {e}")))
    }
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::test_support::RecordingBackend;
    use super::*;

    #[tokio::test]
    async fn first_available_backend_wins() {
        let primary = RecordingBackend::new();
        let secondary = RecordingBackend::new();
        let presenter = NotificationPresenter::new(vec![primary.clone(), secondary.clone()]);

        let delivery = presenter.present(&Notification::new("t", "m")).await;
        assert_eq!(delivery, Delivery::Backend("recording"));
        assert_eq!(primary.count(), 1);
        assert_eq!(secondary.count(), 0);
    }

    #[tokio::test]
    async fn unavailable_and_failing_backends_fall_through() {
        let missing = Arc::new(RecordingBackend {
            available: false,
            ..Arc::into_inner(RecordingBackend::new()).unwrap()
        });
        let broken = Arc::new(RecordingBackend {
            fail: true,
            ..Arc::into_inner(RecordingBackend::new()).unwrap()
        });
        let working = RecordingBackend::new();
        let presenter =
            NotificationPresenter::new(vec![missing.clone(), broken.clone(), working.clone()]);

        presenter.present(&Notification::new("t", "m")).await;
        assert_eq!(missing.count(), 0);
        assert_eq!(broken.count(), 0);
        assert_eq!(working.count(), 1);
    }

    #[tokio::test]
    async fn default_permission_is_requested_once() {
        let web = RecordingBackend::new();
        *web.permission.lock().unwrap() = Permission::Default;
        let presenter = NotificationPresenter::new(vec![web.clone()]);

        presenter.present(&Notification::new("t", "m")).await;
        assert_eq!(web.count(), 1);
        assert_eq!(web.permission().await, Permission::Granted);
    }

    #[tokio::test]
    async fn refused_permission_falls_back_to_log() {
        let web = Arc::new(RecordingBackend {
            grant_on_request: false,
            ..Arc::into_inner(RecordingBackend::new()).unwrap()
        });
        *web.permission.lock().unwrap() = Permission::Default;
        let presenter = NotificationPresenter::new(vec![web.clone()]);

        let delivery = presenter.present(&Notification::new("t", "m")).await;
        assert_eq!(delivery, Delivery::Logged);
        assert_eq!(web.count(), 0);
    }

    #[tokio::test]
    async fn log_only_presenter_never_fails() {
        let presenter = NotificationPresenter::log_only();
        assert_eq!(presenter.show_completion("x").await, Delivery::Logged);
    }

    #[tokio::test]
    async fn reminder_helper_requires_interaction() {
        let backend = RecordingBackend::new();
        let presenter = NotificationPresenter::new(vec![backend.clone()]);
        presenter.show_todo_reminder("Pay rent", "in 1 hour").await;

        let shown = backend.shown.lock().unwrap();
        assert_eq!(shown[0].title, text::REMINDER_TITLE);
        assert!(shown[0].require_interaction);
        assert!(shown[0].message.contains("Pay rent"));
    }

    #[tokio::test]
    async fn host_backend_forwards_events_until_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let backend = HostEventBackend::new(tx);
        assert!(backend.is_available());
        backend
            .show(&Notification::new("Title", "Body").with_require_interaction(true))
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "notification");
        assert_eq!(json["title"], "Title");
        assert_eq!(json["requireInteraction"], true);

        drop(rx);
        assert!(!backend.is_available());
    }
}
