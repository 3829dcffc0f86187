//! Error types for the document layer.

use thiserror::Error;

/// Structured error types for document construction and editing.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document key failed validation.
    #[error("invalid document key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// A path supplied to an editing call does not resolve to a live
    /// node.
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    /// The node at a path is not of the type the editing call requires.
    #[error("type mismatch at {path}: expected {expected}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The document is already attached.
    #[error("document is already attached")]
    AlreadyAttached,
}

impl DocumentError {
    /// Whether this error indicates invalid caller input.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            DocumentError::InvalidKey { .. }
                | DocumentError::PathNotFound { .. }
                | DocumentError::TypeMismatch { .. }
        )
    }

    /// Whether this error indicates a wrong attachment state.
    pub fn is_state_error(&self) -> bool {
        matches!(self, DocumentError::AlreadyAttached)
    }
}

impl From<DocumentError> for crate::Error {
    fn from(err: DocumentError) -> Self {
        crate::Error::Document(err)
    }
}
