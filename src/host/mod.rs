//! Messaging between foreground contexts, the background worker and the host shell.

pub mod channel;
pub mod contract;
pub mod stdio;

pub use channel::{MessageClient, MessageReceiver, PendingRequest, message_channel};
pub use contract::{CancelPayload, HostEvent, MessageResponse, Request, SchedulePayload};
