//! Logical time for ordering operations across replicas.
//!
//! This module provides the [`LamportClock`] that every document carries,
//! the [`Timestamp`] it issues, and the [`ActorId`] identifying the replica
//! that issued it. Timestamps are totally ordered (lamport, then actor,
//! then delimiter), which is what makes concurrent operations commute: any
//! two replicas comparing the same pair of timestamps reach the same
//! verdict without coordination.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a single replica.
///
/// A document starts out with the [`ActorId::initial`] placeholder and
/// receives its real identity when it first attaches to a server. All
/// timestamps issued before attachment are retagged at that point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ActorId(Uuid);

impl ActorId {
    /// The placeholder identity of a never-attached document.
    pub const fn initial() -> Self {
        Self(Uuid::nil())
    }

    /// Generate a fresh random identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Whether this is the pre-attachment placeholder.
    pub fn is_initial(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl From<Uuid> for ActorId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// A logical timestamp: `(lamport, actor, delimiter)`.
///
/// The delimiter distinguishes timestamps issued within a single local
/// edit session, which shares one lamport value across all of its
/// operations. Every node created in a document's history carries a
/// unique timestamp; timestamps are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub lamport: u64,
    pub actor: ActorId,
    pub delimiter: u32,
}

impl Timestamp {
    /// The timestamp of the root object. No issued timestamp ever
    /// compares equal to it.
    pub const fn initial() -> Self {
        Self {
            lamport: 0,
            actor: ActorId::initial(),
            delimiter: 0,
        }
    }

    /// Replace the placeholder actor with the identity assigned at
    /// attachment. The root sentinel (lamport 0) is shared by every
    /// replica and stays as it is; timestamps already carrying a real
    /// actor are left untouched.
    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        if self.lamport > 0 && self.actor.is_initial() {
            self.actor = actor;
        }
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lamport
            .cmp(&other.lamport)
            .then_with(|| self.actor.cmp(&other.actor))
            .then_with(|| self.delimiter.cmp(&other.delimiter))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.lamport, self.actor, self.delimiter)
    }
}

/// Per-document Lamport clock.
///
/// `next()` starts a new edit session (bumps the lamport counter),
/// `derive()` issues further timestamps within the same session by
/// incrementing the delimiter, and `observe()` implements the standard
/// Lamport synchronization rule: seeing a remote timestamp ahead of the
/// local counter advances the counter past it, so causally later local
/// edits always stamp greater.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LamportClock {
    actor: ActorId,
    lamport: u64,
    delimiter: u32,
}

impl LamportClock {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            lamport: 0,
            delimiter: 0,
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn lamport(&self) -> u64 {
        self.lamport
    }

    /// Re-stamp the clock identity on attachment.
    pub(crate) fn set_actor(&mut self, actor: ActorId) {
        self.actor = actor;
    }

    /// Issue the first timestamp of a new local edit session.
    pub fn next(&mut self) -> Timestamp {
        self.lamport += 1;
        self.delimiter = 0;
        Timestamp {
            lamport: self.lamport,
            actor: self.actor,
            delimiter: 0,
        }
    }

    /// Issue a further timestamp within the current edit session.
    pub fn derive(&mut self) -> Timestamp {
        self.delimiter += 1;
        Timestamp {
            lamport: self.lamport,
            actor: self.actor,
            delimiter: self.delimiter,
        }
    }

    /// Advance past a remote timestamp: `max(local, remote.lamport) + 1`
    /// whenever the remote value is ahead.
    pub fn observe(&mut self, remote: &Timestamp) {
        if remote.lamport > self.lamport {
            self.lamport = remote.lamport + 1;
            self.delimiter = 0;
        }
    }
}

/// Per-actor high-water marks of observed lamport values.
///
/// A version vector snapshot travels inside text `Edit`/`Style`
/// operations so that remote replicas can decide deterministically which
/// content the editing replica had seen, independent of delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionVector(BTreeMap<ActorId, u64>);

impl VersionVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a timestamp has been observed.
    pub fn observe(&mut self, ts: &Timestamp) {
        let entry = self.0.entry(ts.actor).or_insert(0);
        if ts.lamport > *entry {
            *entry = ts.lamport;
        }
    }

    /// Whether the replica that produced this vector had seen `ts`.
    pub fn covers(&self, ts: &Timestamp) -> bool {
        self.0.get(&ts.actor).copied().unwrap_or(0) >= ts.lamport
    }

    pub fn get(&self, actor: &ActorId) -> u64 {
        self.0.get(actor).copied().unwrap_or(0)
    }

    /// Re-key the placeholder actor entry after attachment.
    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        if let Some(lamport) = self.0.remove(&ActorId::initial()) {
            let entry = self.0.entry(actor).or_insert(0);
            if lamport > *entry {
                *entry = lamport;
            }
        }
    }
}
