//! Changes and the operations they carry.
//!
//! A change is the replication unit: every local edit session produces
//! one change holding the operations it executed, all stamped with the
//! same lamport value and told apart by their delimiters. Changes are
//! what the sync layer pushes to and pulls from the server, and applying
//! a change is atomic on the receiving side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crdt::{NodeSeed, TextPos};
use crate::time::{ActorId, Timestamp, VersionVector};

/// A single mutation of the document tree.
///
/// Every operation names its parent container by creation timestamp and
/// carries the timestamp it executed at; that timestamp becomes the
/// created node's identity for `Set` and `Add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Write `key` in the object created at `parent`.
    Set {
        parent: Timestamp,
        key: String,
        value: NodeSeed,
        executed_at: Timestamp,
    },
    /// Insert into the array created at `parent`, after the element
    /// created at `after` (`after == parent` inserts at the head).
    Add {
        parent: Timestamp,
        after: Timestamp,
        value: NodeSeed,
        executed_at: Timestamp,
    },
    /// Tombstone the entry created at `target` inside `parent`.
    Remove {
        parent: Timestamp,
        target: Timestamp,
        executed_at: Timestamp,
    },
    /// Replace a range of the text created at `parent` with `content`.
    /// `seen` captures what the editing replica had observed, which
    /// decides deterministically which blocks the deletion covers.
    Edit {
        parent: Timestamp,
        from: TextPos,
        to: TextPos,
        content: String,
        seen: VersionVector,
        executed_at: Timestamp,
    },
    /// Set the attributes of a range of the text created at `parent`.
    Style {
        parent: Timestamp,
        from: TextPos,
        to: TextPos,
        attributes: BTreeMap<String, String>,
        seen: VersionVector,
        executed_at: Timestamp,
    },
    /// Add `amount` to the counter created at `parent`.
    Increase {
        parent: Timestamp,
        amount: i64,
        executed_at: Timestamp,
    },
}

impl Operation {
    /// The container this operation addresses.
    pub fn parent(&self) -> Timestamp {
        match self {
            Operation::Set { parent, .. }
            | Operation::Add { parent, .. }
            | Operation::Remove { parent, .. }
            | Operation::Edit { parent, .. }
            | Operation::Style { parent, .. }
            | Operation::Increase { parent, .. } => *parent,
        }
    }

    /// The timestamp this operation executed at.
    pub fn executed_at(&self) -> Timestamp {
        match self {
            Operation::Set { executed_at, .. }
            | Operation::Add { executed_at, .. }
            | Operation::Remove { executed_at, .. }
            | Operation::Edit { executed_at, .. }
            | Operation::Style { executed_at, .. }
            | Operation::Increase { executed_at, .. } => *executed_at,
        }
    }

    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        match self {
            Operation::Set {
                parent, executed_at, ..
            } => {
                parent.retag_actor(actor);
                executed_at.retag_actor(actor);
            }
            Operation::Add {
                parent,
                after,
                executed_at,
                ..
            } => {
                parent.retag_actor(actor);
                after.retag_actor(actor);
                executed_at.retag_actor(actor);
            }
            Operation::Remove {
                parent,
                target,
                executed_at,
            } => {
                parent.retag_actor(actor);
                target.retag_actor(actor);
                executed_at.retag_actor(actor);
            }
            Operation::Edit {
                parent,
                from,
                to,
                seen,
                executed_at,
                ..
            }
            | Operation::Style {
                parent,
                from,
                to,
                seen,
                executed_at,
                ..
            } => {
                parent.retag_actor(actor);
                from.created_at.retag_actor(actor);
                to.created_at.retag_actor(actor);
                seen.retag_actor(actor);
                executed_at.retag_actor(actor);
            }
            Operation::Increase {
                parent, executed_at, ..
            } => {
                parent.retag_actor(actor);
                executed_at.retag_actor(actor);
            }
        }
    }
}

/// One atomic edit session, as replicated between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// The replica that produced this change.
    pub actor: ActorId,
    /// The lamport value shared by every operation in this change.
    pub lamport: u64,
    /// Optional caller-supplied description, surfaced in events.
    pub message: Option<String>,
    pub ops: Vec<Operation>,
}

impl Change {
    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        if self.actor.is_initial() {
            self.actor = actor;
        }
        for op in &mut self.ops {
            op.retag_actor(actor);
        }
    }
}
