//! Todo reminders: platform alarms, fallback timers and the periodic sweep.

pub mod alarm;
pub mod coordinator;
pub mod sweep;

pub use alarm::{ALARM_PREFIX, Alarm, AlarmFacility, AlarmRegistry, alarm_name, todo_id_from_alarm};
pub use coordinator::{
    ReminderCoordinator, ReminderRequest, ReminderTransport, ScheduleChannel, ScheduleOutcome,
};
pub use sweep::{DueReminder, due_reminders};
