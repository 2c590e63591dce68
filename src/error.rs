//! Error types surfaced to API callers

use thiserror::Error;

/// Errors returned by request-level operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Required canonical columns absent after alias resolution.
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Rejected input: bad file type, empty filename, unparsable upload.
    #[error("{0}")]
    Validation(String),

    /// Unknown dataset or star identity.
    #[error("{0}")]
    NotFound(String),

    /// Classifier inference failed; no prediction column was written.
    #[error("Prediction failed: {0}")]
    Classifier(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller is at fault (as opposed to the server).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AppError::Classifier(_) | AppError::Internal(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
