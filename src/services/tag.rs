//! Tags and their attachment to todos.

use crate::error::{Result, TodoError};
use crate::model::TagInfo;
use crate::storage::StorageService;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Palette for tags created without a colour.
pub const DEFAULT_COLORS: [&str; 8] = [
    "#4a90e2", "#27ae60", "#e74c3c", "#f1c40f", "#9b59b6", "#e67e22", "#1abc9c", "#34495e",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// How many todos reference a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsage {
    pub used: bool,
    pub count: usize,
}

#[derive(Clone)]
pub struct TagService {
    storage: StorageService,
}

impl TagService {
    pub fn new(storage: StorageService) -> Self {
        Self { storage }
    }

    pub async fn get_all_tags(&self) -> Result<Vec<TagInfo>> {
        Ok(self.storage.get_state().await?.tags)
    }

    /// Create a tag. `None` or an empty colour picks one from [`DEFAULT_COLORS`].
    pub async fn create_tag(&self, name: &str, color: Option<&str>) -> Result<TagInfo> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TodoError::Validation("tag name is required".to_owned()));
        }
        let mut state = self.storage.get_state().await?;
        if state.tags.iter().any(|tag| tag.name == name) {
            return Err(TodoError::Conflict(format!("tag '{name}' already exists")));
        }

        let color = match color.map(str::trim) {
            Some(color) if !color.is_empty() => color.to_owned(),
            _ => next_color(&state.tags),
        };
        let tag = TagInfo {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_owned(),
            color,
            created_at: self.storage.clock().now_ms(),
        };
        state.tags.push(tag.clone());
        self.storage.set_state(&state).await?;
        info!("tag {} created", tag.id);
        Ok(tag)
    }

    /// Rename or recolour a tag. The id never changes.
    pub async fn update_tag(&self, tag_id: &str, patch: TagPatch) -> Result<TagInfo> {
        let name = match patch.name.as_deref().map(str::trim) {
            Some("") => return Err(TodoError::Validation("tag name is required".to_owned())),
            Some(name) => Some(name.to_owned()),
            None => None,
        };

        let mut state = self.storage.get_state().await?;
        if let Some(name) = name.as_deref()
            && state
                .tags
                .iter()
                .any(|tag| tag.name == name && tag.id != tag_id)
        {
            return Err(TodoError::Conflict(format!("tag '{name}' already exists")));
        }
        let Some(tag) = state.tags.iter_mut().find(|tag| tag.id == tag_id) else {
            return Err(TodoError::NotFound(format!("tag {tag_id}")));
        };

        if let Some(name) = name {
            tag.name = name;
        }
        if let Some(color) = patch.color {
            tag.color = color;
        }
        let updated = tag.clone();
        self.storage.set_state(&state).await?;
        Ok(updated)
    }

    /// Delete a tag no todo references.
    pub async fn delete_tag(&self, tag_id: &str) -> Result<()> {
        let mut state = self.storage.get_state().await?;
        let count = state.tag_usage(tag_id);
        if count > 0 {
            return Err(TodoError::TagInUse {
                tag_id: tag_id.to_owned(),
                count,
            });
        }
        state.tags.retain(|tag| tag.id != tag_id);
        self.storage.set_state(&state).await?;
        info!("tag {tag_id} deleted");
        Ok(())
    }

    /// Attach an existing tag to a todo. Already attached is a no-op.
    pub async fn add_tag_to_todo(&self, todo_id: &str, tag_id: &str) -> Result<()> {
        let state = self.storage.get_state().await?;
        let Some(todo) = state.todo(todo_id) else {
            return Err(TodoError::NotFound(format!("todo {todo_id}")));
        };
        if state.tag(tag_id).is_none() {
            return Err(TodoError::NotFound(format!("tag {tag_id}")));
        }
        if todo.has_tag(tag_id) {
            return Ok(());
        }
        let mut todo = todo.clone();
        todo.tags.push(tag_id.to_owned());
        self.storage.update_todo(todo).await
    }

    pub async fn remove_tag_from_todo(&self, todo_id: &str, tag_id: &str) -> Result<()> {
        let state = self.storage.get_state().await?;
        let Some(todo) = state.todo(todo_id) else {
            return Err(TodoError::NotFound(format!("todo {todo_id}")));
        };
        let mut todo = todo.clone();
        todo.tags.retain(|id| id != tag_id);
        self.storage.update_todo(todo).await
    }

    pub async fn has_any_tags(&self) -> Result<bool> {
        Ok(!self.storage.get_state().await?.tags.is_empty())
    }

    pub async fn is_tag_used(&self, tag_id: &str) -> Result<TagUsage> {
        let count = self.storage.get_state().await?.tag_usage(tag_id);
        Ok(TagUsage {
            used: count > 0,
            count,
        })
    }
}

/// First palette colour no tag uses yet, else a random palette colour.
fn next_color(existing: &[TagInfo]) -> String {
    DEFAULT_COLORS
        .iter()
        .find(|color| !existing.iter().any(|tag| tag.color == **color))
        .or_else(|| DEFAULT_COLORS.choose(&mut rand::thread_rng()))
        .map_or_else(|| DEFAULT_COLORS[0].to_owned(), |color| (*color).to_owned())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{Priority, Todo};
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn service() -> (TagService, StorageService) {
        let storage = StorageService::new(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(7)));
        (TagService::new(storage.clone()), storage)
    }

    fn todo(id: &str) -> Todo {
        Todo {
            id: id.into(),
            title: id.into(),
            description: None,
            completed: false,
            created_at: 0,
            updated_at: 0,
            due_date: None,
            reminder_lead_time: None,
            priority: Priority::Low,
            tags: Vec::new(),
            reminded: false,
        }
    }

    #[tokio::test]
    async fn colours_come_from_palette_in_order() {
        let (tags, _) = service();
        let first = tags.create_tag("work", None).await.unwrap();
        let second = tags.create_tag("home", Some("")).await.unwrap();
        let custom = tags.create_tag("misc", Some("#000000")).await.unwrap();
        assert_eq!(first.color, DEFAULT_COLORS[0]);
        assert_eq!(second.color, DEFAULT_COLORS[1]);
        assert_eq!(custom.color, "#000000");
        assert_eq!(first.created_at, 7);
    }

    #[test]
    fn exhausted_palette_still_yields_palette_colour() {
        let existing: Vec<TagInfo> = DEFAULT_COLORS
            .iter()
            .enumerate()
            .map(|(i, color)| TagInfo {
                id: i.to_string(),
                name: i.to_string(),
                color: (*color).to_owned(),
                created_at: 0,
            })
            .collect();
        let color = next_color(&existing);
        assert!(DEFAULT_COLORS.contains(&color.as_str()));
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let (tags, _) = service();
        let work = tags.create_tag("work", None).await.unwrap();
        let home = tags.create_tag("home", None).await.unwrap();

        let err = tags.create_tag("work", None).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let err = tags
            .update_tag(
                &home.id,
                TagPatch {
                    name: Some("work".into()),
                    ..TagPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        // Renaming to its own name is fine.
        let same = tags
            .update_tag(
                &work.id,
                TagPatch {
                    name: Some("work".into()),
                    color: Some("#111111".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(same.id, work.id);
        assert_eq!(same.color, "#111111");
    }

    #[tokio::test]
    async fn rename_is_trimmed_before_uniqueness_check() {
        let (tags, _) = service();
        tags.create_tag("work", None).await.unwrap();
        let home = tags.create_tag("home", None).await.unwrap();

        let err = tags
            .update_tag(
                &home.id,
                TagPatch {
                    name: Some("work ".into()),
                    ..TagPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let err = tags
            .update_tag(
                &home.id,
                TagPatch {
                    name: Some("   ".into()),
                    ..TagPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TodoError::Validation(_)));

        let renamed = tags
            .update_tag(
                &home.id,
                TagPatch {
                    name: Some("  house ".into()),
                    ..TagPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "house");
        let names: Vec<String> = tags
            .get_all_tags()
            .await
            .unwrap()
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        assert_eq!(names, vec!["work", "house"]);
    }

    #[tokio::test]
    async fn used_tag_cannot_be_deleted() {
        let (tags, storage) = service();
        let work = tags.create_tag("work", None).await.unwrap();
        storage.add_todo(todo("a")).await.unwrap();
        tags.add_tag_to_todo("a", &work.id).await.unwrap();
        tags.add_tag_to_todo("a", &work.id).await.unwrap();

        assert_eq!(
            tags.is_tag_used(&work.id).await.unwrap(),
            TagUsage {
                used: true,
                count: 1
            }
        );
        let err = tags.delete_tag(&work.id).await.unwrap_err();
        assert!(matches!(err, TodoError::TagInUse { count: 1, .. }));
        assert_eq!(tags.get_all_tags().await.unwrap().len(), 1);
        assert_eq!(storage.get_state().await.unwrap().todos[0].tags, vec![work.id.clone()]);

        tags.remove_tag_from_todo("a", &work.id).await.unwrap();
        tags.delete_tag(&work.id).await.unwrap();
        assert!(!tags.has_any_tags().await.unwrap());
    }

    #[tokio::test]
    async fn attaching_requires_existing_todo_and_tag() {
        let (tags, storage) = service();
        storage.add_todo(todo("a")).await.unwrap();
        let work = tags.create_tag("work", None).await.unwrap();

        let err = tags.add_tag_to_todo("missing", &work.id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        let err = tags.add_tag_to_todo("a", "no-such-tag").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
