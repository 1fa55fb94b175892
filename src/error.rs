//! Error types for the todo core.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that is
//! accessible via [`TodoError::code()`]. Callers that surface errors across
//! the message protocol rely on these rather than on Display output.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Caller supplied invalid data (empty title, past due date, ...).
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";

    /// A todo, tag or template with the given id does not exist.
    pub const NOT_FOUND: &str = "NOT_FOUND";

    /// The operation would break a uniqueness rule.
    pub const CONFLICT: &str = "CONFLICT";

    /// A tag cannot be deleted while todos reference it.
    pub const TAG_IN_USE: &str = "TAG_IN_USE";

    /// Reading or writing the key-value store failed.
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";

    /// The platform alarm facility failed.
    pub const ALARM_ERROR: &str = "ALARM_ERROR";

    /// Message channel between contexts failed.
    pub const CHANNEL_ERROR: &str = "CHANNEL_ERROR";

    /// Configuration could not be loaded or saved.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Underlying I/O failure.
    pub const IO_ERROR: &str = "IO_ERROR";

    /// JSON (de)serialization failure.
    pub const JSON_ERROR: &str = "JSON_ERROR";
}

/// Top-level error type for the todo core.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// Invalid input rejected before any state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// Entity lookup failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness conflict (duplicate tag name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Tag deletion refused because todos still reference it.
    #[error("tag {tag_id} is used by {count} todo(s) and cannot be deleted")]
    TagInUse {
        /// Tag that was requested for deletion.
        tag_id: String,
        /// Number of todos referencing it.
        count: usize,
    },

    /// Key-value store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Platform alarm failure.
    #[error("alarm error: {0}")]
    Alarm(String),

    /// Message channel send/receive failure.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TodoError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => error_codes::VALIDATION_FAILED,
            Self::NotFound(_) => error_codes::NOT_FOUND,
            Self::Conflict(_) => error_codes::CONFLICT,
            Self::TagInUse { .. } => error_codes::TAG_IN_USE,
            Self::Storage(_) => error_codes::STORAGE_ERROR,
            Self::Alarm(_) => error_codes::ALARM_ERROR,
            Self::Channel(_) => error_codes::CHANNEL_ERROR,
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Io(_) => error_codes::IO_ERROR,
            Self::Json(_) => error_codes::JSON_ERROR,
        }
    }

    /// Returns true for errors caused by caller input rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Conflict(_) | Self::TagInUse { .. }
        )
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TodoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_in_use_message_names_count() {
        let err = TodoError::TagInUse {
            tag_id: "work".into(),
            count: 2,
        };
        let display = err.to_string();
        assert!(display.contains("work"));
        assert!(display.contains("2 todo(s)"));
        assert_eq!(err.code(), "TAG_IN_USE");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TodoError = io.into();
        assert_eq!(err.code(), error_codes::IO_ERROR);
        assert!(!err.is_validation());
    }

    #[test]
    fn validation_family() {
        assert!(TodoError::Validation("empty title".into()).is_validation());
        assert!(TodoError::Conflict("dup".into()).is_validation());
        assert!(!TodoError::Storage("disk".into()).is_validation());
    }

    #[test]
    fn all_codes_are_screaming_snake_case() {
        let errors = vec![
            TodoError::Validation("x".into()),
            TodoError::NotFound("x".into()),
            TodoError::Conflict("x".into()),
            TodoError::Storage("x".into()),
            TodoError::Alarm("x".into()),
            TodoError::Channel("x".into()),
            TodoError::Config("x".into()),
        ];
        for err in &errors {
            let code = err.code();
            assert!(
                code.chars().all(|c| c.is_ascii_uppercase() || c == '_'),
                "code {code:?} is not SCREAMING_SNAKE_CASE"
            );
        }
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TodoError>();
    }
}
