use thiserror::Error;

/// Rejected field declarations. Raised once, when a [`FieldConfigs`] is built.
///
/// [`FieldConfigs`]: crate::config::FieldConfigs
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("field declared more than once: {name}")]
    DuplicateField { name: String },

    #[error("field {field} depends on undeclared field {parent}")]
    UnknownParent { field: String, parent: String },

    #[error("field {field} lists parent {parent} more than once")]
    DuplicateParent { field: String, parent: String },

    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("invalid field declarations: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by an async option loader.
///
/// The store logs it and degrades the field's options to an empty list.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("option loader failed: {message}")]
    Failed { message: String },

    #[error("option loader returned malformed data: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl LoadError {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}
