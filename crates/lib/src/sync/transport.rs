//! The transport seam between the sync loop and a server.

use async_trait::async_trait;

use crate::document::DocumentKey;
use crate::sync::errors::SyncError;
use crate::sync::protocol::{
    AttachRequest, AttachResponse, PullRequest, PullResponse, PushRequest, PushResponse,
};
use crate::time::ActorId;

/// How the sync loop talks to a server.
///
/// [`crate::sync::SyncServer`] implements this in process; a networked
/// deployment implements it over its wire of choice. All methods take
/// `&self`: one transport serves every document attached through it.
#[async_trait]
pub trait DocumentTransport: Send + Sync {
    async fn attach(&self, request: AttachRequest) -> Result<AttachResponse, SyncError>;

    async fn detach(&self, key: &DocumentKey, actor: ActorId) -> Result<(), SyncError>;

    async fn push(&self, request: PushRequest) -> Result<PushResponse, SyncError>;

    async fn pull(&self, request: PullRequest) -> Result<PullResponse, SyncError>;
}
