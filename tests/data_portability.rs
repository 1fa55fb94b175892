//! File-backed persistence, export/import and backup across store instances.

use easy_todo::TodoError;
use easy_todo::clock::ManualClock;
use easy_todo::model::{Priority, StatusFilter, TodoFilter};
use easy_todo::notification::NotificationPresenter;
use easy_todo::reminder::ReminderCoordinator;
use easy_todo::services::{
    BackupService, NewTodo, TagService, TemplateService, TemplateTodo, TodoService,
};
use easy_todo::storage::{FileStore, StorageService};
use std::path::Path;
use std::sync::Arc;

const NOW: i64 = 1_700_000_000_000;

struct App {
    storage: StorageService,
    todos: TodoService,
    tags: TagService,
}

fn open(dir: &Path) -> App {
    let clock = Arc::new(ManualClock::new(NOW));
    let storage = StorageService::new(
        Arc::new(FileStore::new(dir.join("storage.json"))),
        clock.clone(),
    );
    let reminders = ReminderCoordinator::new(None, NotificationPresenter::log_only(), clock);
    App {
        todos: TodoService::new(storage.clone(), reminders),
        tags: TagService::new(storage.clone()),
        storage,
    }
}

fn todo(title: &str, priority: Priority) -> NewTodo {
    NewTodo {
        title: title.into(),
        priority: Some(priority),
        ..NewTodo::default()
    }
}

#[tokio::test]
async fn state_survives_reopening_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = open(dir.path());
    let work = app.tags.create_tag("work", None).await.expect("tag");
    let created = app
        .todos
        .create_todo(NewTodo {
            tags: vec![work.id.clone()],
            ..todo("Write report", Priority::High)
        })
        .await
        .expect("create");

    let reopened = open(dir.path());
    let stored = reopened
        .todos
        .get_todo(&created.id)
        .await
        .expect("read")
        .expect("todo persisted");
    assert_eq!(stored.title, "Write report");
    assert_eq!(stored.tags, vec![work.id.clone()]);
    assert_eq!(reopened.tags.get_all_tags().await.expect("tags").len(), 1);
}

#[tokio::test]
async fn referenced_tag_cannot_be_deleted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = open(dir.path());
    let home = app.tags.create_tag("home", None).await.expect("tag");
    let first = app
        .todos
        .create_todo(todo("Fix sink", Priority::Medium))
        .await
        .expect("create");
    let second = app
        .todos
        .create_todo(todo("Mow lawn", Priority::Low))
        .await
        .expect("create");
    app.tags
        .add_tag_to_todo(&first.id, &home.id)
        .await
        .expect("attach");
    app.tags
        .add_tag_to_todo(&second.id, &home.id)
        .await
        .expect("attach");

    let err = app.tags.delete_tag(&home.id).await.expect_err("in use");
    assert!(matches!(err, TodoError::TagInUse { count: 2, .. }));
    assert_eq!(app.tags.get_all_tags().await.expect("tags").len(), 1);
}

#[tokio::test]
async fn filters_combine_status_and_search() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = open(dir.path());
    let milk = app
        .todos
        .create_todo(todo("Buy milk", Priority::Medium))
        .await
        .expect("create");
    let oat = app
        .todos
        .create_todo(todo("Buy oat milk", Priority::Low))
        .await
        .expect("create");
    app.todos
        .create_todo(todo("Call bank", Priority::High))
        .await
        .expect("create");
    app.todos.toggle_todo_status(&oat.id).await.expect("toggle");

    let active_milk = app
        .todos
        .get_todos(&TodoFilter {
            search_text: Some("MILK".into()),
            status: Some(StatusFilter::Active),
            ..TodoFilter::default()
        })
        .await
        .expect("query");
    assert_eq!(active_milk.len(), 1);
    assert_eq!(active_milk[0].id, milk.id);

    let stats = app.todos.get_statistics().await.expect("stats");
    assert_eq!((stats.total, stats.completed, stats.active), (3, 1, 2));
}

#[tokio::test]
async fn export_imports_into_a_fresh_store() {
    let source_dir = tempfile::tempdir().expect("tempdir");
    let source = open(source_dir.path());
    source
        .todos
        .create_todo(todo("Plan trip", Priority::High))
        .await
        .expect("create");
    let exported = source.storage.export_data().await.expect("export");

    let target_dir = tempfile::tempdir().expect("tempdir");
    let target = open(target_dir.path());
    assert!(!target.storage.import_data("{\"version\":").await);
    assert!(target.storage.get_state().await.expect("state").todos.is_empty());

    assert!(target.storage.import_data(&exported).await);
    assert_eq!(
        target.storage.get_state().await.expect("state"),
        source.storage.get_state().await.expect("state")
    );
}

#[tokio::test]
async fn backup_restores_state_and_templates() {
    let source_dir = tempfile::tempdir().expect("tempdir");
    let source = open(source_dir.path());
    source
        .todos
        .create_todo(todo("Renew passport", Priority::High))
        .await
        .expect("create");
    TemplateService::new(source.storage.clone())
        .save_template(
            "Errand",
            None,
            TemplateTodo {
                title: Some("Errand".into()),
                ..TemplateTodo::default()
            },
        )
        .await
        .expect("template");
    let backup = BackupService::new(source.storage.clone())
        .create_backup()
        .await
        .expect("backup");

    let target_dir = tempfile::tempdir().expect("tempdir");
    let target = open(target_dir.path());
    let restore = BackupService::new(target.storage.clone());
    assert!(!restore.restore_backup("{\"state\":{\"todos\":[]}}").await);
    assert!(restore.restore_backup(&backup).await);

    let state = target.storage.get_state().await.expect("state");
    assert_eq!(state.todos.len(), 1);
    assert_eq!(state.todos[0].title, "Renew passport");
    let templates = TemplateService::new(target.storage.clone())
        .get_templates()
        .await
        .expect("templates");
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].name, "Errand");
}
