//! Request/response channel to the background worker.
//!
//! Each request carries a oneshot sender for its answer. The client side
//! implements [`ReminderTransport`] so the reminder coordinator can schedule
//! through the worker's platform alarms.

use crate::error::{Result, TodoError};
use crate::host::contract::{CancelPayload, MessageResponse, Request, SchedulePayload};
use crate::reminder::{ReminderRequest, ReminderTransport};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A request waiting for the worker's answer.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: Request,
    respond_to: oneshot::Sender<MessageResponse>,
}

impl PendingRequest {
    /// Send the answer. A caller that gave up waiting is ignored.
    pub fn respond(self, response: MessageResponse) {
        let _ = self.respond_to.send(response);
    }
}

/// Sending half, cloned into every foreground context.
#[derive(Debug, Clone)]
pub struct MessageClient {
    request_tx: mpsc::Sender<PendingRequest>,
    timeout: Duration,
}

/// Receiving half, owned by the worker.
#[derive(Debug)]
pub struct MessageReceiver {
    request_rx: mpsc::Receiver<PendingRequest>,
}

impl MessageReceiver {
    /// Next request, `None` once every client is gone.
    pub async fn recv(&mut self) -> Option<PendingRequest> {
        self.request_rx.recv().await
    }
}

/// Create a connected client/receiver pair.
#[must_use]
pub fn message_channel(capacity: usize, timeout: Duration) -> (MessageClient, MessageReceiver) {
    let (request_tx, request_rx) = mpsc::channel(capacity.max(1));
    (
        MessageClient {
            request_tx,
            timeout,
        },
        MessageReceiver { request_rx },
    )
}

impl MessageClient {
    /// Send a request and wait for the answer.
    ///
    /// Fails when no worker is listening or it does not answer in time.
    pub async fn send(&self, request: Request) -> Result<MessageResponse> {
        let (respond_to, response_rx) = oneshot::channel();
        let kind = request.kind();
        self.request_tx
            .send(PendingRequest {
                request,
                respond_to,
            })
            .await
            .map_err(|_| TodoError::Channel(format!("no receiver for {kind} request")))?;

        match tokio::time::timeout(self.timeout, response_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TodoError::Channel(format!(
                "{kind} request dropped without response"
            ))),
            Err(_) => Err(TodoError::Channel(format!(
                "{kind} request timed out after {:?}",
                self.timeout
            ))),
        }
    }

    async fn send_expecting_success(&self, request: Request) -> Result<()> {
        let response = self.send(request).await?;
        if response.success {
            Ok(())
        } else {
            Err(TodoError::Channel(
                response
                    .error
                    .unwrap_or_else(|| "request failed".to_owned()),
            ))
        }
    }
}

#[async_trait]
impl ReminderTransport for MessageClient {
    async fn schedule(&self, request: &ReminderRequest) -> Result<()> {
        self.send_expecting_success(Request::ScheduleNotification(SchedulePayload::from(
            request,
        )))
        .await
    }

    async fn cancel(&self, todo_id: &str) -> Result<()> {
        self.send_expecting_success(Request::CancelNotification(CancelPayload {
            todo_id: Some(todo_id.to_owned()),
        }))
        .await
    }
}
