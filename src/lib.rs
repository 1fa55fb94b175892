//! Easy Todo: task management core with local persistence and reminders.
//!
//! # Architecture
//!
//! - **Storage**: the whole [`TodoState`] under one key of a
//!   [`KeyValueStore`](storage::KeyValueStore)
//! - **Services**: todo, tag, template, backup and analytics operations
//! - **Reminders**: the [`ReminderCoordinator`] schedules through the
//!   background worker's platform alarms, falling back to in-process timers
//! - **Background worker**: answers the messaging protocol, fires alarms,
//!   sweeps for missed reminders every minute
//! - **Notifications**: an ordered chain of backends ending in the log

pub mod app_dirs;
pub mod background;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod model;
pub mod notification;
pub mod reminder;
pub mod services;
pub mod storage;

pub use config::AppConfig;
pub use error::{Result, TodoError};
pub use model::{Priority, Settings, TagInfo, Todo, TodoFilter, TodoState};
pub use reminder::{ReminderCoordinator, ScheduleOutcome};
pub use storage::StorageService;
