//! Completion and distribution statistics over all todos.

use crate::error::Result;
use crate::model::{Priority, Todo};
use crate::storage::StorageService;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    /// Percentage of completed todos, 0 when there are none.
    pub completion_rate: f64,
    /// Always carries `high`, `medium` and `low`.
    pub tasks_by_priority: BTreeMap<String, usize>,
    pub tasks_by_tag: BTreeMap<String, usize>,
    /// Mean `updatedAt − createdAt` of completed todos, in milliseconds.
    pub average_completion_time: f64,
    /// Todos created per UTC day (`YYYY-MM-DD`).
    pub tasks_by_date: BTreeMap<String, usize>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub active_tasks: usize,
}

impl AnalyticsData {
    #[must_use]
    pub fn from_todos(todos: &[Todo]) -> Self {
        let total = todos.len();
        let completed: Vec<&Todo> = todos.iter().filter(|t| t.completed).collect();

        let mut tasks_by_priority: BTreeMap<String, usize> = [Priority::High, Priority::Medium, Priority::Low]
            .into_iter()
            .map(|p| (p.as_str().to_owned(), 0))
            .collect();
        let mut tasks_by_tag = BTreeMap::new();
        let mut tasks_by_date = BTreeMap::new();
        for todo in todos {
            *tasks_by_priority
                .entry(todo.priority.as_str().to_owned())
                .or_default() += 1;
            for tag in &todo.tags {
                *tasks_by_tag.entry(tag.clone()).or_default() += 1;
            }
            *tasks_by_date.entry(utc_date(todo.created_at)).or_default() += 1;
        }

        let completion_rate = if total > 0 {
            completed.len() as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let average_completion_time = if completed.is_empty() {
            0.0
        } else {
            let sum: i64 = completed
                .iter()
                .map(|t| t.updated_at.saturating_sub(t.created_at))
                .sum();
            sum as f64 / completed.len() as f64
        };

        Self {
            completion_rate,
            tasks_by_priority,
            tasks_by_tag,
            average_completion_time,
            tasks_by_date,
            total_tasks: total,
            completed_tasks: completed.len(),
            active_tasks: total - completed.len(),
        }
    }
}

fn utc_date(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "invalid".to_owned())
}

#[derive(Clone)]
pub struct AnalyticsService {
    storage: StorageService,
}

impl AnalyticsService {
    pub fn new(storage: StorageService) -> Self {
        Self { storage }
    }

    pub async fn get_analytics(&self) -> Result<AnalyticsData> {
        let state = self.storage.get_state().await?;
        Ok(AnalyticsData::from_todos(&state.todos))
    }
}
