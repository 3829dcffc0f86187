//! Tandem is a local-first document engine. A [`Document`] holds a
//! JSON-like value (objects, arrays, rich text, counters, and scalar
//! leaves) that any number of replicas edit independently and without
//! coordination; the conflict-free replicated data types underneath
//! guarantee that replicas that have seen the same set of changes hold
//! the same value, whatever the delivery order.
//!
//! Replication is push-pull against a sequencing server: attach a
//! document with [`SyncHandle::attach`] and a background task exchanges
//! changes on a fixed cadence. Documents are editable before, during,
//! and after attachment; offline edits queue up and replay.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tandem::{Document, DocumentKey, SyncHandle, SyncOptions, SyncServer};
//!
//! # #[tokio::main]
//! # async fn main() -> tandem::Result<()> {
//! let server = Arc::new(SyncServer::new());
//! let doc = Document::new(DocumentKey::new("tasks")?);
//! let handle = SyncHandle::attach(doc, server, SyncOptions::default()).await?;
//!
//! let doc = handle.document();
//! let _ = doc.lock().await.update(|edit| {
//!     edit.set("$", "title", "groceries")?;
//!     edit.set("$", "done", 0i64)
//! })?;
//! handle.sync_now().await?;
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod crdt;
pub mod document;
mod gc;
pub mod presence;
pub mod sync;
pub mod time;

pub use change::{Change, Operation};
pub use crdt::CrdtError;
pub use document::{
    ChangeOrigin, DocEvent, DocStatus, Document, DocumentError, DocumentKey, EditContext, Input,
    SubscriptionId,
};
pub use presence::Presence;
pub use sync::{
    ConnectionStatus, DocumentTransport, SyncError, SyncHandle, SyncOptions, SyncServer,
    SyncStatus,
};
pub use time::{ActorId, Timestamp};

/// Result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type aggregating the per-module errors.
///
/// Each module defines its own structured error enum; this type exists
/// so callers can use one `Result` across the whole API. Match on the
/// variant to get the module-specific detail.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation could not be applied to the value model.
    #[error(transparent)]
    Crdt(CrdtError),

    /// Document construction or editing failed.
    #[error(transparent)]
    Document(DocumentError),

    /// Synchronization failed.
    #[error(transparent)]
    Sync(SyncError),

    /// Serializing or deserializing a protocol message failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// The module this error originated in.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Crdt(_) => "crdt",
            Error::Document(_) => "document",
            Error::Sync(_) => "sync",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Whether this error indicates invalid caller input.
    pub fn is_validation_error(&self) -> bool {
        match self {
            Error::Document(err) => err.is_validation_error(),
            Error::Crdt(err) => !err.is_missing_reference(),
            _ => false,
        }
    }

    /// Whether this error is a (possibly transient) transport failure.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Sync(err) if err.is_transport_error())
    }
}
