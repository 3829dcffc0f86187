//! The local replica of a shared document.
//!
//! A [`Document`] owns a [`Root`] tree, the lamport clock stamping its
//! edits, the queue of changes not yet acknowledged by the server, and
//! the presence maps of its peers. Local edits go through
//! [`Document::update`]; remote changes arrive through
//! [`Document::apply_change`] and merge without coordination.

mod edit;
mod errors;
mod events;
mod key;

pub use edit::{EditContext, Input};
pub use errors::DocumentError;
pub use events::{ChangeOrigin, DocEvent, SubscriptionId};
pub use key::DocumentKey;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::change::Change;
use crate::crdt::Root;
use crate::document::events::Listener;
use crate::presence::{Presence, PresenceRecord};
use crate::time::{ActorId, LamportClock, Timestamp, VersionVector};
use crate::Result;

/// Attachment state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStatus {
    /// Editable locally; nothing is replicated.
    Detached,
    /// Registered with a server and eligible for sync.
    Attached,
}

/// A local, always-editable replica of a shared document.
pub struct Document {
    key: DocumentKey,
    root: Root,
    clock: LamportClock,
    seen: VersionVector,
    pending: Vec<Change>,
    last_server_seq: u64,
    presences: HashMap<ActorId, PresenceRecord>,
    presence_dirty: bool,
    status: DocStatus,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
}

impl Document {
    /// Create a detached document. It is immediately editable; edits made
    /// before attachment are replayed to the server on first sync.
    pub fn new(key: DocumentKey) -> Self {
        Self {
            key,
            root: Root::new(),
            clock: LamportClock::new(ActorId::initial()),
            seen: VersionVector::new(),
            pending: Vec::new(),
            last_server_seq: 0,
            presences: HashMap::new(),
            presence_dirty: false,
            status: DocStatus::Detached,
            listeners: HashMap::new(),
            next_listener: 0,
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// This replica's identity. The placeholder until first attachment.
    pub fn actor(&self) -> ActorId {
        self.clock.actor()
    }

    pub fn status(&self) -> DocStatus {
        self.status
    }

    /// The live document value as JSON.
    pub fn to_json(&self) -> JsonValue {
        self.root.to_json()
    }

    /// The underlying tree, for typed reads.
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// The live value at a `$`-rooted dotted path, as JSON.
    pub fn get(&self, path: &str) -> Option<JsonValue> {
        self.root.resolve(path).map(|node| node.to_json())
    }

    /// Run an edit session. All edits made by `f` commit atomically as
    /// one change; if `f` fails, the document is untouched. Returns the
    /// committed change, or `None` when the session made no edits.
    pub fn update(
        &mut self,
        f: impl FnOnce(&mut EditContext) -> Result<()>,
    ) -> Result<Option<Change>> {
        self.commit(None, f)
    }

    /// Like [`Document::update`], with a message surfaced in events.
    pub fn update_with_message(
        &mut self,
        message: impl Into<String>,
        f: impl FnOnce(&mut EditContext) -> Result<()>,
    ) -> Result<Option<Change>> {
        self.commit(Some(message.into()), f)
    }

    fn commit(
        &mut self,
        message: Option<String>,
        f: impl FnOnce(&mut EditContext) -> Result<()>,
    ) -> Result<Option<Change>> {
        // Edit a working copy so a failing closure leaves no trace.
        let mut root = self.root.clone();
        let mut clock = self.clock.clone();
        let mut ops = Vec::new();
        let mut paths = Vec::new();
        let mut ctx = EditContext::new(&mut root, &mut clock, &self.seen, &mut ops, &mut paths);
        f(&mut ctx)?;
        drop(ctx);
        if ops.is_empty() {
            return Ok(None);
        }

        let change = Change {
            actor: clock.actor(),
            lamport: clock.lamport(),
            message: message.clone(),
            ops,
        };
        debug!(
            doc = %self.key,
            lamport = change.lamport,
            ops = change.ops.len(),
            "committed local change"
        );
        self.seen.observe(&Timestamp {
            lamport: clock.lamport(),
            actor: clock.actor(),
            delimiter: 0,
        });
        self.root = root;
        self.clock = clock;
        let actor = self.actor();
        self.pending.push(change.clone());
        paths.sort();
        paths.dedup();
        self.emit(&DocEvent::Change {
            origin: ChangeOrigin::Local,
            actor,
            message,
            paths,
        });
        Ok(Some(change))
    }

    /// Merge a change produced by another replica.
    ///
    /// Application is per operation: an operation referencing state this
    /// replica never observed (typically already collected garbage) is
    /// skipped with a warning rather than failing the change, since
    /// skipping cannot affect convergence once every replica does it the
    /// same way.
    pub fn apply_change(&mut self, change: &Change) {
        let mut paths = Vec::new();
        for op in &change.ops {
            let executed_at = op.executed_at();
            match self.root.apply(op) {
                Ok(touched) => paths.extend(touched),
                Err(err) => {
                    warn!(doc = %self.key, %executed_at, %err, "skipping inapplicable operation");
                }
            }
            self.clock.observe(&executed_at);
            self.seen.observe(&executed_at);
        }
        paths.sort();
        paths.dedup();
        self.emit(&DocEvent::Change {
            origin: ChangeOrigin::Remote,
            actor: change.actor,
            message: change.message.clone(),
            paths,
        });
    }

    /// Changes committed locally and not yet acknowledged by the server.
    pub fn pending_changes(&self) -> Vec<Change> {
        self.pending.clone()
    }

    /// Drop the first `count` pending changes after the server stored
    /// them.
    pub(crate) fn acknowledge(&mut self, count: usize) {
        self.pending.drain(..count.min(self.pending.len()));
    }

    /// Sequence number of the last server change merged into this
    /// replica. Kept on the document rather than the sync loop so that a
    /// detach followed by a re-attach resumes where it left off instead
    /// of replaying the whole server log.
    pub(crate) fn last_server_seq(&self) -> u64 {
        self.last_server_seq
    }

    pub(crate) fn set_last_server_seq(&mut self, seq: u64) {
        self.last_server_seq = seq;
    }

    /// The highest lamport value this replica has issued or observed.
    /// Reported to the server, which takes the minimum across replicas
    /// as the garbage collection floor.
    pub fn observed_lamport(&self) -> u64 {
        self.clock.lamport()
    }

    /// Publish this replica's presence, replacing the previous map
    /// wholesale.
    pub fn set_presence(&mut self, presence: Presence) {
        let updated_at = self.clock.next();
        let actor = self.actor();
        self.presences
            .insert(actor, PresenceRecord::new(presence.clone(), updated_at));
        self.presence_dirty = true;
        self.emit(&DocEvent::PresenceUpdated { actor, presence });
    }

    /// The presence map last published by `actor`, if it is still
    /// attached.
    pub fn presence(&self, actor: &ActorId) -> Option<&Presence> {
        self.presences.get(actor).map(|record| &record.presence)
    }

    /// All known presences, this replica's included.
    pub fn presences(&self) -> impl Iterator<Item = (&ActorId, &Presence)> {
        self.presences
            .iter()
            .map(|(actor, record)| (actor, &record.presence))
    }

    /// The local presence record when it changed since the last push.
    pub(crate) fn take_presence_update(&mut self) -> Option<PresenceRecord> {
        if !self.presence_dirty {
            return None;
        }
        self.presence_dirty = false;
        self.presences.get(&self.actor()).cloned()
    }

    /// Merge a peer's presence record pulled from the server.
    pub(crate) fn merge_presence(&mut self, actor: ActorId, record: PresenceRecord) {
        if actor == self.actor() {
            return;
        }
        let changed = match self.presences.entry(actor) {
            std::collections::hash_map::Entry::Occupied(mut existing) => existing
                .get_mut()
                .replace_if_newer(record.presence.clone(), record.updated_at),
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(record.clone());
                true
            }
        };
        if changed {
            self.emit(&DocEvent::PresenceUpdated {
                actor,
                presence: record.presence,
            });
        }
    }

    /// Drop a departed peer's presence.
    pub(crate) fn remove_presence(&mut self, actor: ActorId) {
        if self.presences.remove(&actor).is_some() {
            self.emit(&DocEvent::PresenceDeparted { actor });
        }
    }

    /// Subscribe to change and presence events. The listener runs
    /// synchronously on the thread applying the change.
    pub fn subscribe(
        &mut self,
        listener: impl Fn(&DocEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.insert(id, Box::new(listener));
        SubscriptionId(id)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id.0).is_some()
    }

    fn emit(&self, event: &DocEvent) {
        for listener in self.listeners.values() {
            listener(event);
        }
    }

    /// Reclaim tombstones whose deletion lamport is below `floor`.
    /// Returns the number of nodes removed.
    pub fn garbage_collect(&mut self, floor: u64) -> usize {
        crate::gc::collect(&self.key, &mut self.root, floor)
    }

    /// Total node count, tombstones included.
    pub fn node_count(&self) -> usize {
        self.root.count_nodes()
    }

    /// Adopt the identity assigned by the server. Every placeholder
    /// timestamp issued before attachment is retagged in place.
    pub(crate) fn mark_attached(&mut self, actor: ActorId) -> std::result::Result<(), DocumentError> {
        if self.status == DocStatus::Attached {
            return Err(DocumentError::AlreadyAttached);
        }
        self.clock.set_actor(actor);
        self.root.retag_actor(actor);
        self.seen.retag_actor(actor);
        for change in &mut self.pending {
            change.retag_actor(actor);
        }
        if let Some(mut record) = self.presences.remove(&ActorId::initial()) {
            record.updated_at.retag_actor(actor);
            self.presences.insert(actor, record);
            self.presence_dirty = true;
        }
        self.status = DocStatus::Attached;
        debug!(doc = %self.key, %actor, "attached");
        Ok(())
    }

    /// Leave the shared session. Peer presences are dropped; the
    /// document stays editable.
    pub(crate) fn mark_detached(&mut self) {
        self.status = DocStatus::Detached;
        let own = self.actor();
        let departed: Vec<ActorId> = self
            .presences
            .keys()
            .filter(|actor| **actor != own)
            .copied()
            .collect();
        for actor in departed {
            self.remove_presence(actor);
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("key", &self.key)
            .field("actor", &self.actor())
            .field("status", &self.status)
            .field("pending", &self.pending.len())
            .finish()
    }
}
