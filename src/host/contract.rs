//! Messages exchanged between the foreground and the background worker.
//!
//! Requests are `{ "type": ..., "payload": ... }` objects; every request is
//! answered with a [`MessageResponse`]. Payload fields are optional on the
//! wire so that an incomplete request is answered with `success: false`
//! rather than rejected as unparseable.

use crate::notification::Notification;
use crate::reminder::ReminderRequest;
use serde::{Deserialize, Serialize};

/// A request sent to the background worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    /// Register the platform alarm for a todo reminder.
    ScheduleNotification(SchedulePayload),
    /// Clear the platform alarm for a todo.
    CancelNotification(CancelPayload),
}

impl Request {
    /// Wire name of the request type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ScheduleNotification(_) => "SCHEDULE_NOTIFICATION",
            Self::CancelNotification(_) => "CANCEL_NOTIFICATION",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_lead_time: Option<u32>,
}

impl From<&ReminderRequest> for SchedulePayload {
    fn from(request: &ReminderRequest) -> Self {
        Self {
            id: Some(request.id.clone()),
            title: Some(request.title.clone()),
            due_date: request.due_date,
            reminder_lead_time: request.reminder_lead_time,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todo_id: Option<String>,
}

/// Answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Unsolicited message from the worker to its host shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// Display a system notification.
    Notification {
        title: String,
        message: String,
        #[serde(rename = "requireInteraction")]
        require_interaction: bool,
    },
}

impl HostEvent {
    #[must_use]
    pub fn notification(notification: &Notification) -> Self {
        Self::Notification {
            title: notification.title.clone(),
            message: notification.message.clone(),
            require_interaction: notification.require_interaction,
        }
    }
}
