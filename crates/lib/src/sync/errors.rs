//! Error types for synchronization.

use thiserror::Error;

/// Structured error types for the sync protocol and background loop.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SyncError {
    /// The transport failed to reach the server.
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    /// The server does not know the document.
    #[error("document {key} is not registered on the server")]
    UnknownDocument { key: String },

    /// The server does not consider this replica attached.
    #[error("replica is not attached to document {key}")]
    UnknownActor { key: String },

    /// The background loop has already shut down.
    #[error("sync loop is no longer running")]
    LoopStopped,
}

impl SyncError {
    pub fn transport(reason: impl Into<String>) -> Self {
        SyncError::Transport {
            reason: reason.into(),
        }
    }

    /// Whether this error is a (possibly transient) transport failure.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, SyncError::Transport { .. })
    }

    /// Whether the server rejected the request as unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(
            self,
            SyncError::UnknownDocument { .. } | SyncError::UnknownActor { .. }
        )
    }
}

impl From<SyncError> for crate::Error {
    fn from(err: SyncError) -> Self {
        crate::Error::Sync(err)
    }
}
