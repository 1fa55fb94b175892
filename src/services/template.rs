//! Reusable todo templates, stored under their own key.

use crate::error::Result;
use crate::model::{Priority, Todo};
use crate::storage::StorageService;
use serde::{Deserialize, Serialize};

/// Storage key of the template list.
pub const TEMPLATES_KEY: &str = "todo-templates";

/// Suffix appended to the name of a duplicated template.
const COPY_SUFFIX: &str = " (copy)";

/// Todo fields a template pre-fills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateTodo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_lead_time: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub todo: TemplateTodo,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub todo: Option<TemplateTodo>,
}

#[derive(Clone)]
pub struct TemplateService {
    storage: StorageService,
}

impl TemplateService {
    pub fn new(storage: StorageService) -> Self {
        Self { storage }
    }

    /// Saved templates, empty when none were stored.
    pub async fn get_templates(&self) -> Result<Vec<TodoTemplate>> {
        match self.storage.store().get(TEMPLATES_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the stored template list.
    pub async fn set_templates(&self, templates: &[TodoTemplate]) -> Result<()> {
        self.storage
            .store()
            .set(TEMPLATES_KEY, serde_json::to_value(templates)?)
            .await
    }

    pub async fn save_template(
        &self,
        name: &str,
        description: Option<String>,
        todo: TemplateTodo,
    ) -> Result<TodoTemplate> {
        let mut templates = self.get_templates().await?;
        let now = self.storage.clock().now_ms();
        let template = TodoTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_owned(),
            description,
            todo,
            created_at: now,
            updated_at: now,
        };
        templates.push(template.clone());
        self.set_templates(&templates).await?;
        Ok(template)
    }

    pub async fn delete_template(&self, id: &str) -> Result<()> {
        let mut templates = self.get_templates().await?;
        templates.retain(|t| t.id != id);
        self.set_templates(&templates).await
    }

    /// A fresh, unsaved todo pre-filled from the template.
    pub async fn create_todo_from_template(&self, id: &str) -> Result<Option<Todo>> {
        let templates = self.get_templates().await?;
        let Some(template) = templates.into_iter().find(|t| t.id == id) else {
            return Ok(None);
        };
        let now = self.storage.clock().now_ms();
        let fields = template.todo;
        Ok(Some(Todo {
            id: uuid::Uuid::new_v4().to_string(),
            title: fields.title.unwrap_or_default(),
            description: fields.description,
            completed: false,
            created_at: now,
            updated_at: now,
            due_date: fields.due_date,
            reminder_lead_time: fields.reminder_lead_time,
            priority: fields.priority.unwrap_or_default(),
            tags: fields.tags.unwrap_or_default(),
            reminded: false,
        }))
    }

    pub async fn update_template(
        &self,
        id: &str,
        patch: TemplatePatch,
    ) -> Result<Option<TodoTemplate>> {
        let mut templates = self.get_templates().await?;
        let now = self.storage.clock().now_ms();
        let Some(template) = templates.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            template.name = name;
        }
        if let Some(description) = patch.description {
            template.description = description;
        }
        if let Some(todo) = patch.todo {
            template.todo = todo;
        }
        template.updated_at = now;
        let updated = template.clone();
        self.set_templates(&templates).await?;
        Ok(Some(updated))
    }

    /// Copy a template under a new id with `" (copy)"` appended to its name.
    pub async fn duplicate_template(&self, id: &str) -> Result<Option<TodoTemplate>> {
        let mut templates = self.get_templates().await?;
        let Some(original) = templates.iter().find(|t| t.id == id) else {
            return Ok(None);
        };
        let now = self.storage.clock().now_ms();
        let copy = TodoTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name: format!("{}{COPY_SUFFIX}", original.name),
            created_at: now,
            updated_at: now,
            ..original.clone()
        };
        templates.push(copy.clone());
        self.set_templates(&templates).await?;
        Ok(Some(copy))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn service() -> (TemplateService, ManualClock) {
        let clock = ManualClock::new(100);
        let storage = StorageService::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
        (TemplateService::new(storage), clock)
    }

    fn weekly_review() -> TemplateTodo {
        TemplateTodo {
            title: Some("Weekly review".into()),
            priority: Some(Priority::High),
            tags: Some(vec!["work".into()]),
            reminder_lead_time: Some(30),
            ..TemplateTodo::default()
        }
    }

    #[tokio::test]
    async fn saved_templates_instantiate_fresh_todos() {
        let (templates, clock) = service();
        let saved = templates
            .save_template("Review", None, weekly_review())
            .await
            .unwrap();
        clock.set(500);

        let todo = templates
            .create_todo_from_template(&saved.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(todo.id, saved.id);
        assert_eq!(todo.title, "Weekly review");
        assert_eq!(todo.priority, Priority::High);
        assert_eq!(todo.created_at, 500);
        assert!(!todo.completed && !todo.reminded);

        assert!(
            templates
                .create_todo_from_template("missing")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn empty_template_defaults_to_medium_priority() {
        let (templates, _) = service();
        let saved = templates
            .save_template("Blank", None, TemplateTodo::default())
            .await
            .unwrap();
        let todo = templates
            .create_todo_from_template(&saved.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(todo.priority, Priority::Medium);
        assert!(todo.title.is_empty());
        assert!(todo.tags.is_empty());
    }

    #[tokio::test]
    async fn duplicate_appends_copy_suffix() {
        let (templates, _) = service();
        let saved = templates
            .save_template("Review", Some("every friday".into()), weekly_review())
            .await
            .unwrap();
        let copy = templates
            .duplicate_template(&saved.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(copy.name, "Review (copy)");
        assert_eq!(copy.todo, saved.todo);
        assert_ne!(copy.id, saved.id);
        assert_eq!(templates.get_templates().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let (templates, clock) = service();
        let saved = templates
            .save_template("Review", None, weekly_review())
            .await
            .unwrap();
        clock.set(900);
        let updated = templates
            .update_template(
                &saved.id,
                TemplatePatch {
                    name: Some("Friday review".into()),
                    ..TemplatePatch::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Friday review");
        assert_eq!(updated.updated_at, 900);
        assert_eq!(updated.created_at, 100);

        assert!(
            templates
                .update_template("missing", TemplatePatch::default())
                .await
                .unwrap()
                .is_none()
        );

        templates.delete_template(&saved.id).await.unwrap();
        assert!(templates.get_templates().await.unwrap().is_empty());
    }
}
