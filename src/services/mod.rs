//! Foreground services over the persisted state.

pub mod analytics;
pub mod backup;
pub mod tag;
pub mod template;
pub mod todo;

pub use analytics::{AnalyticsData, AnalyticsService};
pub use backup::{Backup, BackupService};
pub use tag::{TagPatch, TagService, TagUsage};
pub use template::{TemplatePatch, TemplateService, TemplateTodo, TodoTemplate};
pub use todo::{NewTodo, TodoPatch, TodoService, TodoStatistics};
