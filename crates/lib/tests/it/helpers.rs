//! Shared test fixtures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tandem::sync::{
    AttachRequest, AttachResponse, PullRequest, PullResponse, PushRequest, PushResponse,
};
use tandem::{
    ActorId, Change, Document, DocumentKey, DocumentTransport, Operation, SyncError, SyncHandle,
    SyncOptions, SyncServer, Timestamp,
};
use uuid::Uuid;

/// A deterministic actor identity. Higher bytes order higher, which
/// fixes conflict winners in advance.
pub fn actor(byte: u8) -> ActorId {
    ActorId::from(Uuid::from_bytes([byte; 16]))
}

pub fn ts(lamport: u64, actor: ActorId) -> Timestamp {
    tsd(lamport, actor, 0)
}

pub fn tsd(lamport: u64, actor: ActorId, delimiter: u32) -> Timestamp {
    Timestamp {
        lamport,
        actor,
        delimiter,
    }
}

/// A hand-built change, as another replica would have produced it.
pub fn change(actor: ActorId, lamport: u64, ops: Vec<Operation>) -> Change {
    Change {
        actor,
        lamport,
        message: None,
        ops,
    }
}

pub fn doc(key: &str) -> Document {
    Document::new(DocumentKey::new(key).unwrap())
}

/// Attach with a cycle interval long enough that only explicit
/// `sync_now` calls drive the loop.
pub async fn attach(transport: Arc<dyn DocumentTransport>, key: &str) -> SyncHandle {
    attach_doc(transport, doc(key)).await
}

pub async fn attach_doc(transport: Arc<dyn DocumentTransport>, document: Document) -> SyncHandle {
    let options = SyncOptions {
        interval: Duration::from_secs(3600),
        max_backoff: Duration::from_secs(3600),
    };
    SyncHandle::attach(document, transport, options)
        .await
        .unwrap()
}

/// A transport that fails on demand, for connection-loss tests. Attach
/// and detach always go through so tests can set up and tear down.
pub struct FlakyTransport {
    pub server: SyncServer,
    failing: AtomicBool,
}

impl FlakyTransport {
    pub fn new() -> Self {
        Self {
            server: SyncServer::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SyncError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(SyncError::transport("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentTransport for FlakyTransport {
    async fn attach(&self, request: AttachRequest) -> Result<AttachResponse, SyncError> {
        self.server.attach(request).await
    }

    async fn detach(&self, key: &DocumentKey, actor: ActorId) -> Result<(), SyncError> {
        self.server.detach(key, actor).await
    }

    async fn push(&self, request: PushRequest) -> Result<PushResponse, SyncError> {
        self.check()?;
        self.server.push(request).await
    }

    async fn pull(&self, request: PullRequest) -> Result<PullResponse, SyncError> {
        self.check()?;
        self.server.pull(request).await
    }
}
