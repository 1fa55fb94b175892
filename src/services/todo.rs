//! Todo CRUD with reminder bookkeeping.

use crate::error::{Result, TodoError};
use crate::model::{Priority, Todo, TodoFilter, reminder_instant};
use crate::reminder::{ReminderCoordinator, ReminderRequest, ScheduleOutcome};
use crate::storage::StorageService;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Fields for a new todo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<i64>,
    pub reminder_lead_time: Option<u32>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
}

/// Partial update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub due_date: Option<Option<i64>>,
    pub reminder_lead_time: Option<Option<u32>>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub reminded: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoStatistics {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
}

#[derive(Clone)]
pub struct TodoService {
    storage: StorageService,
    reminders: ReminderCoordinator,
}

impl TodoService {
    pub fn new(storage: StorageService, reminders: ReminderCoordinator) -> Self {
        Self { storage, reminders }
    }

    /// Create and persist a todo, scheduling its reminder first.
    ///
    /// Nothing is stored when validation or scheduling fails.
    pub async fn create_todo(&self, new: NewTodo) -> Result<Todo> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(TodoError::Validation("title is required".to_owned()));
        }
        let now = self.storage.clock().now_ms();
        validate_timing(new.due_date, new.reminder_lead_time, now)?;

        let mut todo = Todo {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_owned(),
            description: new.description.filter(|d| !d.trim().is_empty()),
            completed: false,
            created_at: now,
            updated_at: now,
            due_date: new.due_date,
            reminder_lead_time: new.reminder_lead_time,
            priority: new.priority.unwrap_or_default(),
            tags: dedup_tags(new.tags),
            reminded: false,
        };

        let scheduled = todo.reminder_instant().is_some();
        if scheduled {
            let outcome = self
                .reminders
                .schedule(&ReminderRequest::from_todo(&todo))
                .await?;
            todo.reminded = outcome == ScheduleOutcome::FiredImmediately;
        }

        if let Err(e) = self.storage.add_todo(todo.clone()).await {
            if scheduled {
                self.reminders.cancel(&todo.id).await;
            }
            return Err(e);
        }
        info!("todo {} created", todo.id);
        Ok(todo)
    }

    /// Todos passing `filter`, in stored order.
    pub async fn get_todos(&self, filter: &TodoFilter) -> Result<Vec<Todo>> {
        let state = self.storage.get_state().await?;
        Ok(state
            .todos
            .into_iter()
            .filter(|todo| filter.matches(todo))
            .collect())
    }

    pub async fn get_todo(&self, id: &str) -> Result<Option<Todo>> {
        Ok(self.storage.get_state().await?.todo(id).cloned())
    }

    /// Apply `patch` to a todo and return the updated todo.
    ///
    /// A changed due date or lead time is validated like at creation, the old
    /// reminder is cancelled and, when both are still set, a new one is
    /// scheduled. `reminded` is reset unless the patch sets it.
    pub async fn update_todo(&self, id: &str, patch: TodoPatch) -> Result<Todo> {
        let state = self.storage.get_state().await?;
        let Some(current) = state.todo(id) else {
            return Err(TodoError::NotFound(format!("todo {id}")));
        };
        let now = self.storage.clock().now_ms();
        let mut todo = current.clone();

        if let Some(title) = patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(TodoError::Validation("title is required".to_owned()));
            }
            todo.title = title.to_owned();
        }
        if let Some(description) = patch.description {
            todo.description = description;
        }
        if let Some(priority) = patch.priority {
            todo.priority = priority;
        }
        if let Some(tags) = patch.tags {
            todo.tags = dedup_tags(tags);
        }
        if let Some(due_date) = patch.due_date {
            todo.due_date = due_date;
        }
        if let Some(lead) = patch.reminder_lead_time {
            todo.reminder_lead_time = lead;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }

        let timing_changed = todo.due_date != current.due_date
            || todo.reminder_lead_time != current.reminder_lead_time;
        if timing_changed {
            if let Some(due) = todo.due_date
                && todo.due_date != current.due_date
                && due < now
            {
                return Err(TodoError::Validation(
                    "due date cannot be in the past".to_owned(),
                ));
            }
            if todo.reminder_instant().is_some_and(|at| at < now) {
                return Err(TodoError::Validation(
                    "reminder time cannot be in the past".to_owned(),
                ));
            }
            todo.reminded = false;
        }
        if let Some(reminded) = patch.reminded {
            todo.reminded = reminded;
        }

        let completion_changed = todo.completed != current.completed;
        if timing_changed || completion_changed {
            if current.reminder_instant().is_some() {
                self.reminders.cancel(id).await;
            }
            let still_ahead = timing_changed || todo.reminder_instant().is_some_and(|at| at > now);
            if todo.awaits_reminder() && still_ahead {
                let outcome = self
                    .reminders
                    .schedule(&ReminderRequest::from_todo(&todo))
                    .await?;
                if outcome == ScheduleOutcome::FiredImmediately {
                    todo.reminded = true;
                }
            }
        }

        todo.updated_at = now;
        self.storage.update_todo(todo.clone()).await?;
        debug!("todo {id} updated");
        Ok(todo)
    }

    /// Cancel the reminder and remove the todo. Unknown ids are ignored.
    pub async fn delete_todo(&self, id: &str) -> Result<()> {
        self.reminders.cancel(id).await;
        self.storage.delete_todo(id).await?;
        info!("todo {id} deleted");
        Ok(())
    }

    /// Flip `completed`. Completing cancels the reminder; reopening
    /// reschedules one that is still in the future and not yet shown.
    pub async fn toggle_todo_status(&self, id: &str) -> Result<Todo> {
        let mut state = self.storage.get_state().await?;
        let now = self.storage.clock().now_ms();
        let Some(todo) = state.todo_mut(id) else {
            return Err(TodoError::NotFound(format!("todo {id}")));
        };
        todo.completed = !todo.completed;
        todo.updated_at = now;
        let todo = todo.clone();

        if todo.completed {
            if todo.reminder_instant().is_some() {
                self.reminders.cancel(id).await;
            }
        } else if todo.awaits_reminder() && todo.reminder_instant().is_some_and(|at| at > now) {
            self.reminders
                .schedule(&ReminderRequest::from_todo(&todo))
                .await?;
        }

        self.storage.set_state(&state).await?;
        Ok(todo)
    }

    pub async fn get_statistics(&self) -> Result<TodoStatistics> {
        let state = self.storage.get_state().await?;
        let total = state.todos.len();
        let completed = state.todos.iter().filter(|t| t.completed).count();
        Ok(TodoStatistics {
            total,
            completed,
            active: total - completed,
        })
    }

    pub async fn get_todos_by_tag(&self, tag_id: &str) -> Result<Vec<Todo>> {
        let state = self.storage.get_state().await?;
        Ok(state
            .todos
            .into_iter()
            .filter(|todo| todo.has_tag(tag_id))
            .collect())
    }

    /// Replace a todo's tag list.
    pub async fn update_todo_tags(&self, id: &str, tags: Vec<String>) -> Result<()> {
        let mut state = self.storage.get_state().await?;
        let now = self.storage.clock().now_ms();
        let Some(todo) = state.todo_mut(id) else {
            return Err(TodoError::NotFound(format!("todo {id}")));
        };
        todo.tags = dedup_tags(tags);
        todo.updated_at = now;
        self.storage.set_state(&state).await
    }

    /// Persist `todos` as the new list, in the given order.
    pub async fn update_todos_order(&self, todos: Vec<Todo>) -> Result<()> {
        let mut state = self.storage.get_state().await?;
        state.todos = todos;
        self.storage.set_state(&state).await
    }
}

/// Due date (when given) and reminder instant must not lie in the past.
fn validate_timing(due_date: Option<i64>, lead: Option<u32>, now: i64) -> Result<()> {
    let Some(due) = due_date else {
        return Ok(());
    };
    if due < now {
        return Err(TodoError::Validation(
            "due date cannot be in the past".to_owned(),
        ));
    }
    if let Some(lead) = lead
        && reminder_instant(due, lead) < now
    {
        return Err(TodoError::Validation(
            "reminder time cannot be in the past".to_owned(),
        ));
    }
    Ok(())
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}
