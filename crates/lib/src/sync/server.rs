//! In-process sync server.
//!
//! The server is deliberately simple: per document it stores the change
//! log in arrival order, the set of attached replicas with their
//! observed lamport high-water marks, and the latest presence record per
//! replica. It never interprets operations; sequencing is the only
//! service it provides.

use std::collections::{hash_map, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::document::DocumentKey;
use crate::presence::PresenceRecord;
use crate::sync::errors::SyncError;
use crate::sync::protocol::{
    AttachRequest, AttachResponse, PullRequest, PullResponse, PushRequest, PushResponse,
    SequencedChange,
};
use crate::sync::transport::DocumentTransport;
use crate::time::ActorId;

#[derive(Debug, Default)]
struct ActorState {
    observed_lamport: u64,
    /// Highest change lamport this replica has pushed. Re-pushed changes
    /// (a lost acknowledgement) are detected by this and not re-stored.
    pushed_lamport: u64,
}

#[derive(Debug, Default)]
struct DocState {
    changes: Vec<SequencedChange>,
    actors: HashMap<ActorId, ActorState>,
    presences: HashMap<ActorId, PresenceRecord>,
}

impl DocState {
    /// The garbage collection floor: the minimum lamport every attached
    /// replica has observed.
    fn min_synced_lamport(&self) -> u64 {
        self.actors
            .values()
            .map(|actor| actor.observed_lamport)
            .min()
            .unwrap_or(0)
    }
}

/// A [`DocumentTransport`] serving documents from process memory.
#[derive(Debug, Default)]
pub struct SyncServer {
    documents: Mutex<HashMap<DocumentKey, DocState>>,
}

impl SyncServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<DocumentKey, DocState>>, SyncError> {
        self.documents
            .lock()
            .map_err(|_| SyncError::transport("server state poisoned"))
    }

    /// The stored change count for a document. Zero when unknown.
    pub fn change_count(&self, key: &DocumentKey) -> usize {
        self.lock()
            .ok()
            .and_then(|docs| docs.get(key).map(|doc| doc.changes.len()))
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentTransport for SyncServer {
    async fn attach(&self, request: AttachRequest) -> Result<AttachResponse, SyncError> {
        let mut docs = self.lock()?;
        let doc = docs.entry(request.key.clone()).or_default();
        let actor = ActorId::random();
        doc.actors.insert(actor, ActorState::default());
        info!(doc = %request.key, %actor, "replica attached");
        Ok(AttachResponse { actor })
    }

    async fn detach(&self, key: &DocumentKey, actor: ActorId) -> Result<(), SyncError> {
        let mut docs = self.lock()?;
        let doc = docs.get_mut(key).ok_or_else(|| SyncError::UnknownDocument {
            key: key.to_string(),
        })?;
        doc.actors.remove(&actor);
        doc.presences.remove(&actor);
        info!(doc = %key, %actor, "replica detached");
        Ok(())
    }

    async fn push(&self, request: PushRequest) -> Result<PushResponse, SyncError> {
        let mut docs = self.lock()?;
        let doc = docs
            .get_mut(&request.key)
            .ok_or_else(|| SyncError::UnknownDocument {
                key: request.key.to_string(),
            })?;
        if !doc.actors.contains_key(&request.actor) {
            return Err(SyncError::UnknownActor {
                key: request.key.to_string(),
            });
        }

        let mut stored = 0;
        let mut fresh = 0;
        for change in request.changes {
            let state = doc
                .actors
                .get_mut(&request.actor)
                .ok_or_else(|| SyncError::UnknownActor {
                    key: request.key.to_string(),
                })?;
            stored += 1;
            if change.actor == request.actor && change.lamport <= state.pushed_lamport {
                continue;
            }
            state.pushed_lamport = state.pushed_lamport.max(change.lamport);
            let seq = doc.changes.len() as u64 + 1;
            doc.changes.push(SequencedChange { seq, change });
            fresh += 1;
        }

        if let Some(record) = request.presence {
            match doc.presences.entry(request.actor) {
                hash_map::Entry::Occupied(mut existing) => {
                    existing
                        .get_mut()
                        .replace_if_newer(record.presence, record.updated_at);
                }
                hash_map::Entry::Vacant(vacant) => {
                    vacant.insert(record);
                }
            }
        }

        let state = doc
            .actors
            .get_mut(&request.actor)
            .ok_or_else(|| SyncError::UnknownActor {
                key: request.key.to_string(),
            })?;
        state.observed_lamport = state.observed_lamport.max(request.observed_lamport);
        debug!(doc = %request.key, actor = %request.actor, stored, fresh, "push");
        Ok(PushResponse {
            stored,
            min_synced_lamport: doc.min_synced_lamport(),
        })
    }

    async fn pull(&self, request: PullRequest) -> Result<PullResponse, SyncError> {
        let mut docs = self.lock()?;
        let doc = docs
            .get_mut(&request.key)
            .ok_or_else(|| SyncError::UnknownDocument {
                key: request.key.to_string(),
            })?;
        let state = doc
            .actors
            .get_mut(&request.actor)
            .ok_or_else(|| SyncError::UnknownActor {
                key: request.key.to_string(),
            })?;
        state.observed_lamport = state.observed_lamport.max(request.observed_lamport);

        let changes: Vec<SequencedChange> = doc
            .changes
            .iter()
            .skip(request.after_seq as usize)
            .cloned()
            .collect();
        let presences: Vec<(ActorId, PresenceRecord)> = doc
            .presences
            .iter()
            .map(|(actor, record)| (*actor, record.clone()))
            .collect();
        debug!(
            doc = %request.key,
            actor = %request.actor,
            after_seq = request.after_seq,
            delivered = changes.len(),
            "pull"
        );
        Ok(PullResponse {
            changes,
            presences,
            min_synced_lamport: doc.min_synced_lamport(),
        })
    }
}
