//! Error types for CRDT operations.

use thiserror::Error;

use crate::time::Timestamp;

/// Structured error types for applying operations to the value model.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CrdtError {
    /// The operation's parent container was never created locally.
    #[error("operation parent not found: {parent}")]
    MissingParent { parent: Timestamp },

    /// The operation's target element was never created locally.
    #[error("operation target not found: {target}")]
    MissingTarget { target: Timestamp },

    /// The operation does not apply to the node type it addressed.
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// An index-based access fell outside the live elements.
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A text position does not resolve against the current block layout.
    #[error("unresolvable text position: {position}")]
    InvalidPosition { position: String },
}

impl CrdtError {
    /// Whether this error means the operation referenced state that was
    /// never observed locally. The merge layer skips such operations
    /// instead of failing the whole change.
    pub fn is_missing_reference(&self) -> bool {
        matches!(
            self,
            CrdtError::MissingParent { .. } | CrdtError::MissingTarget { .. }
        )
    }

    /// Whether this is a type error.
    pub fn is_type_error(&self) -> bool {
        matches!(self, CrdtError::TypeMismatch { .. })
    }
}

impl From<CrdtError> for crate::Error {
    fn from(err: CrdtError) -> Self {
        crate::Error::Crdt(err)
    }
}
