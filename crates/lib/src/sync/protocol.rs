//! Push-pull protocol messages.
//!
//! The server is the single sequencer: it stores changes per document in
//! arrival order and hands them out by sequence number. A replica pushes
//! its pending changes and pulls everything sequenced after the last
//! sequence number it has seen, its own changes included (they keep the
//! sequence numbering gapless; the client skips re-applying them).
//!
//! Both requests report the replica's observed lamport high-water mark.
//! The server answers with the minimum across attached replicas, which
//! is the garbage collection floor.

use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::document::DocumentKey;
use crate::presence::PresenceRecord;
use crate::time::ActorId;

/// Register a replica with a document, creating the document on first
/// attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachRequest {
    pub key: DocumentKey,
}

/// The identity the server assigned to the replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachResponse {
    pub actor: ActorId,
}

/// A stored change together with its server-assigned sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedChange {
    pub seq: u64,
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    pub key: DocumentKey,
    pub actor: ActorId,
    pub changes: Vec<Change>,
    /// The replica's presence, when it changed since the last push.
    pub presence: Option<PresenceRecord>,
    pub observed_lamport: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    /// How many of the pushed changes were stored. Re-pushed changes the
    /// server already holds count as stored.
    pub stored: usize,
    pub min_synced_lamport: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub key: DocumentKey,
    pub actor: ActorId,
    /// Deliver changes sequenced strictly after this.
    pub after_seq: u64,
    pub observed_lamport: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    pub changes: Vec<SequencedChange>,
    /// The complete presence set of currently attached replicas. Peers
    /// absent from it have departed.
    pub presences: Vec<(ActorId, PresenceRecord)>,
    pub min_synced_lamport: u64,
}
