//! Preview error handling

use thiserror::Error;

use domain_revenue::RevenueError;

/// Preview error types
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Invalid input: {0}")]
    Input(#[from] serde_json::Error),

    #[error("Invalid input field {field}: {message}")]
    Field { field: String, message: String },

    #[error(transparent)]
    Revenue(#[from] RevenueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PreviewError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        PreviewError::Field {
            field: field.into(),
            message: message.into(),
        }
    }
}
