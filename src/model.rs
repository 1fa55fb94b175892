//! Persisted data model.
//!
//! Field names serialize in camelCase so the stored blob and export files
//! keep the same JSON shape as every other client of the state key.

use serde::{Deserialize, Serialize};

/// Milliseconds per minute of reminder lead time.
pub const MS_PER_MINUTE: i64 = 60 * 1000;

/// Default reminder lead time in minutes.
pub const DEFAULT_REMINDER_LEAD_TIME: u32 = 60;

/// Todo priority.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A single todo item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    /// Minutes before `due_date` at which the reminder fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_lead_time: Option<u32>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    /// One-shot flag set once a reminder has been presented.
    #[serde(default)]
    pub reminded: bool,
}

impl Todo {
    /// Reminder instant for this todo, when both due date and lead time are set.
    #[must_use]
    pub fn reminder_instant(&self) -> Option<i64> {
        match (self.due_date, self.reminder_lead_time) {
            (Some(due), Some(lead)) => Some(reminder_instant(due, lead)),
            _ => None,
        }
    }

    /// Whether a reminder could still fire for this todo.
    #[must_use]
    pub fn awaits_reminder(&self) -> bool {
        !self.completed && !self.reminded && self.reminder_instant().is_some()
    }

    #[must_use]
    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tags.iter().any(|t| t == tag_id)
    }
}

/// `due − lead·60000`.
#[must_use]
pub fn reminder_instant(due_date: i64, lead_minutes: u32) -> i64 {
    due_date.saturating_sub(i64::from(lead_minutes).saturating_mul(MS_PER_MINUTE))
}

/// A tag that todos reference by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInfo {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(alias = "createAt")]
    pub created_at: i64,
}

/// Status selector for filtering.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

/// Ad-hoc query over todos. Every `None` field matches everything.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Tag ids; a todo matches when it carries any of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl TodoFilter {
    /// Returns true when `todo` passes every set criterion.
    #[must_use]
    pub fn matches(&self, todo: &Todo) -> bool {
        match self.status.unwrap_or_default() {
            StatusFilter::All => {}
            StatusFilter::Active if todo.completed => return false,
            StatusFilter::Completed if !todo.completed => return false,
            _ => {}
        }

        if let Some(priority) = self.priority
            && todo.priority != priority
        {
            return false;
        }

        if let Some(tags) = self.tags.as_ref()
            && !tags.is_empty()
            && !tags.iter().any(|tag| todo.has_tag(tag))
        {
            return false;
        }

        if let Some(search) = self.search_text.as_deref()
            && !search.is_empty()
        {
            let needle = search.to_lowercase();
            let title_match = todo.title.to_lowercase().contains(&needle);
            let desc_match = todo
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !title_match && !desc_match {
                return false;
            }
        }

        true
    }
}

/// Filter persisted with the state (the last one the user picked).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl FilterState {
    /// Overlay the set fields of `patch`.
    pub fn merge(&mut self, patch: TodoFilter) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if patch.priority.is_some() {
            self.priority = patch.priority;
        }
        if patch.search_text.is_some() {
            self.search_text = patch.search_text;
        }
        if patch.tags.is_some() {
            self.tags = patch.tags;
        }
    }

    /// The persisted filter as a query.
    #[must_use]
    pub fn to_query(&self) -> TodoFilter {
        TodoFilter {
            search_text: self.search_text.clone(),
            status: Some(self.status),
            priority: self.priority,
            tags: self.tags.clone(),
        }
    }
}

/// UI language preference.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

/// User settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub language: Language,
    #[serde(default = "default_reminder_enabled")]
    pub reminder_enabled: bool,
    /// Default lead time in minutes for todos without their own.
    #[serde(default = "default_reminder_lead_time")]
    pub reminder_lead_time: u32,
}

fn default_reminder_enabled() -> bool {
    true
}

fn default_reminder_lead_time() -> u32 {
    DEFAULT_REMINDER_LEAD_TIME
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            reminder_enabled: default_reminder_enabled(),
            reminder_lead_time: default_reminder_lead_time(),
        }
    }
}

/// Partial settings update.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub language: Option<Language>,
    pub reminder_enabled: Option<bool>,
    pub reminder_lead_time: Option<u32>,
}

impl Settings {
    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(enabled) = patch.reminder_enabled {
            self.reminder_enabled = enabled;
        }
        if let Some(lead) = patch.reminder_lead_time {
            self.reminder_lead_time = lead;
        }
    }
}

/// Aggregate root persisted under a single storage key.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoState {
    #[serde(default)]
    pub todos: Vec<Todo>,
    #[serde(default)]
    pub tags: Vec<TagInfo>,
    #[serde(default)]
    pub filter: FilterState,
    #[serde(default)]
    pub settings: Settings,
}

impl TodoState {
    pub fn todo(&self, id: &str) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    pub fn todo_mut(&mut self, id: &str) -> Option<&mut Todo> {
        self.todos.iter_mut().find(|t| t.id == id)
    }

    pub fn tag(&self, id: &str) -> Option<&TagInfo> {
        self.tags.iter().find(|t| t.id == id)
    }

    /// Number of todos referencing `tag_id`.
    #[must_use]
    pub fn tag_usage(&self, tag_id: &str) -> usize {
        self.todos.iter().filter(|t| t.has_tag(tag_id)).count()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn todo(id: &str, completed: bool, tags: &[&str]) -> Todo {
        Todo {
            id: id.to_owned(),
            title: format!("Todo {id}"),
            description: None,
            completed,
            created_at: 0,
            updated_at: 0,
            due_date: None,
            reminder_lead_time: None,
            priority: Priority::Medium,
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            reminded: false,
        }
    }

    #[test]
    fn reminder_instant_subtracts_lead_minutes() {
        assert_eq!(reminder_instant(3_600_000, 60), 0);
        assert_eq!(reminder_instant(10_000, 0), 10_000);

        let mut t = todo("a", false, &[]);
        assert_eq!(t.reminder_instant(), None);
        t.due_date = Some(7_200_000);
        assert_eq!(t.reminder_instant(), None);
        t.reminder_lead_time = Some(30);
        assert_eq!(t.reminder_instant(), Some(5_400_000));
    }

    #[test]
    fn status_and_tag_filter_selects_active_work_todo() {
        let todos = [
            todo("done-work", true, &["work"]),
            todo("active-work", false, &["work"]),
            todo("active-plain", false, &[]),
        ];
        let filter = TodoFilter {
            status: Some(StatusFilter::Active),
            tags: Some(vec!["work".to_owned()]),
            ..TodoFilter::default()
        };
        let hits: Vec<&str> = todos
            .iter()
            .filter(|t| filter.matches(t))
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(hits, vec!["active-work"]);
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let mut t = todo("a", false, &[]);
        t.title = "Buy Milk".into();
        t.description = Some("From the CORNER shop".into());

        let by_title = TodoFilter {
            search_text: Some("milk".into()),
            ..TodoFilter::default()
        };
        let by_desc = TodoFilter {
            search_text: Some("corner".into()),
            ..TodoFilter::default()
        };
        let miss = TodoFilter {
            search_text: Some("bread".into()),
            ..TodoFilter::default()
        };
        assert!(by_title.matches(&t));
        assert!(by_desc.matches(&t));
        assert!(!miss.matches(&t));
    }

    #[test]
    fn empty_tag_list_matches_everything() {
        let filter = TodoFilter {
            tags: Some(Vec::new()),
            ..TodoFilter::default()
        };
        assert!(filter.matches(&todo("a", false, &[])));
    }

    #[test]
    fn state_defaults_fill_missing_fields() {
        let state: TodoState = serde_json::from_str(r#"{"todos":[]}"#).unwrap();
        assert_eq!(state.filter.status, StatusFilter::All);
        assert_eq!(state.settings.language, Language::Zh);
        assert!(state.settings.reminder_enabled);
        assert_eq!(state.settings.reminder_lead_time, 60);
    }

    #[test]
    fn tag_accepts_legacy_create_at_field() {
        let tag: TagInfo =
            serde_json::from_str(r##"{"id":"t","name":"work","color":"#fff","createAt":5}"##)
                .unwrap();
        assert_eq!(tag.created_at, 5);
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["createdAt"], 5);
    }

    #[test]
    fn todo_serializes_camel_case_and_omits_unset_options() {
        let mut t = todo("a", false, &[]);
        t.due_date = Some(10);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["dueDate"], 10);
        assert!(json.get("reminderLeadTime").is_none());
        assert!(json.get("description").is_none());
        assert_eq!(json["priority"], "medium");
    }

    #[test]
    fn filter_state_merge_overrides_only_set_fields() {
        let mut filter = FilterState {
            status: StatusFilter::Completed,
            priority: Some(Priority::High),
            ..FilterState::default()
        };
        filter.merge(TodoFilter {
            search_text: Some("x".into()),
            ..TodoFilter::default()
        });
        assert_eq!(filter.status, StatusFilter::Completed);
        assert_eq!(filter.priority, Some(Priority::High));
        assert_eq!(filter.search_text.as_deref(), Some("x"));
    }
}
