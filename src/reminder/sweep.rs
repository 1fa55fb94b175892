//! Periodic catch-up scan for reminders the alarm path missed.

use crate::model::{TodoState, reminder_instant};

/// A todo whose reminder should be presented by the current sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub todo_id: String,
    pub title: String,
    pub lead_minutes: u32,
}

/// Lead time the sweep uses for a todo: its own, else the settings default
/// when reminders are enabled globally.
fn effective_lead(state: &TodoState, own: Option<u32>) -> Option<u32> {
    own.or_else(|| {
        state
            .settings
            .reminder_enabled
            .then_some(state.settings.reminder_lead_time)
    })
}

/// Incomplete, not yet reminded todos whose reminder instant lies within
/// `window_ms` of `now` in either direction.
#[must_use]
pub fn due_reminders(state: &TodoState, now: i64, window_ms: i64) -> Vec<DueReminder> {
    state
        .todos
        .iter()
        .filter(|todo| !todo.completed && !todo.reminded)
        .filter_map(|todo| {
            let due = todo.due_date?;
            let lead = effective_lead(state, todo.reminder_lead_time)?;
            let instant = reminder_instant(due, lead);
            (now.abs_diff(instant) <= window_ms.unsigned_abs()).then(|| DueReminder {
                todo_id: todo.id.clone(),
                title: todo.title.clone(),
                lead_minutes: lead,
            })
        })
        .collect()
}
