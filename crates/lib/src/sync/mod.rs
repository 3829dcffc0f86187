//! Push-pull synchronization.
//!
//! Attaching a document hands it to a background task that exchanges
//! changes with a server on a fixed cadence: pull everything sequenced
//! since the last cycle, merge it, then push the local pending queue.
//! The server only sequences and stores; all merging happens on the
//! replicas, so any interleaving of cycles converges.

mod background;
mod errors;
mod protocol;
mod server;
mod state;
mod transport;

pub use errors::SyncError;
pub use protocol::{
    AttachRequest, AttachResponse, PullRequest, PullResponse, PushRequest, PushResponse,
    SequencedChange,
};
pub use server::SyncServer;
pub use state::{ConnectionStatus, SyncStatus};
pub use transport::DocumentTransport;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{info_span, Instrument};

use crate::document::Document;
use crate::sync::background::{SyncCommand, SyncLoop};

/// Cadence of the background loop.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Time between sync cycles.
    pub interval: Duration,
    /// Cap on the exponential backoff after failed cycles.
    pub max_backoff: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Handle to an attached document and its background sync task.
///
/// Dropping the handle detaches: the task flushes what it can,
/// deregisters from the server, and stops.
#[derive(Clone)]
pub struct SyncHandle {
    document: Arc<Mutex<Document>>,
    commands: mpsc::Sender<SyncCommand>,
    status: watch::Receiver<SyncStatus>,
    connection: watch::Receiver<ConnectionStatus>,
}

impl SyncHandle {
    /// Attach `document` through `transport` and start its sync loop.
    /// The server assigns the replica identity; every timestamp issued
    /// before attachment is retagged with it.
    pub async fn attach(
        mut document: Document,
        transport: Arc<dyn DocumentTransport>,
        options: SyncOptions,
    ) -> crate::Result<Self> {
        let key = document.key().clone();
        let response = transport
            .attach(AttachRequest { key: key.clone() })
            .await?;
        document.mark_attached(response.actor)?;

        let document = Arc::new(Mutex::new(document));
        let (commands, command_rx) = mpsc::channel(16);
        let (status_tx, status) = watch::channel(SyncStatus::Attaching);
        let (connection_tx, connection) = watch::channel(ConnectionStatus::Connected);
        let sync_loop = SyncLoop::new(
            Arc::clone(&document),
            transport,
            options,
            command_rx,
            status_tx,
            connection_tx,
        );
        tokio::spawn(sync_loop.run().instrument(info_span!("sync", doc = %key)));
        Ok(Self {
            document,
            commands,
            status,
            connection,
        })
    }

    /// The attached document. Lock it to read or edit.
    pub fn document(&self) -> Arc<Mutex<Document>> {
        Arc::clone(&self.document)
    }

    /// Run a sync cycle immediately and wait for its outcome.
    pub async fn sync_now(&self) -> Result<(), SyncError> {
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(SyncCommand::SyncNow { respond_to })
            .await
            .map_err(|_| SyncError::LoopStopped)?;
        response.await.map_err(|_| SyncError::LoopStopped)?
    }

    /// Suspend the sync cadence. Local edits keep queueing.
    pub async fn pause(&self) -> Result<(), SyncError> {
        self.commands
            .send(SyncCommand::Pause)
            .await
            .map_err(|_| SyncError::LoopStopped)
    }

    /// Resume after [`SyncHandle::pause`]; a cycle runs immediately.
    pub async fn resume(&self) -> Result<(), SyncError> {
        self.commands
            .send(SyncCommand::Resume)
            .await
            .map_err(|_| SyncError::LoopStopped)
    }

    /// Flush pending changes, deregister from the server, and stop the
    /// loop. The document stays usable locally.
    pub async fn detach(self) -> Result<(), SyncError> {
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(SyncCommand::Detach { respond_to })
            .await
            .map_err(|_| SyncError::LoopStopped)?;
        response.await.map_err(|_| SyncError::LoopStopped)?
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn connection(&self) -> ConnectionStatus {
        *self.connection.borrow()
    }

    /// A watch on the loop status, for waiting on transitions.
    pub fn status_watch(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// A watch on server reachability.
    pub fn connection_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.clone()
    }
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("status", &self.status())
            .field("connection", &self.connection())
            .finish()
    }
}
