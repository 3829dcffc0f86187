//! Replicated counter.
//!
//! Increments are commutative, so the counter only needs to guard
//! against re-delivery: every applied increment's timestamp is kept in a
//! set that the garbage collector prunes once no replica can issue new
//! operations that old. The prune floor itself is retained, so a stamp
//! below it still reads as already applied when an old change is
//! replayed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::time::{ActorId, Timestamp};

/// An integer counter merged by summing increments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    value: i64,
    applied: BTreeSet<Timestamp>,
    pruned_below: u64,
}

impl Counter {
    pub fn new(initial: i64) -> Self {
        Self {
            value: initial,
            applied: BTreeSet::new(),
            pruned_below: 0,
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Apply an `Increase`. Returns `false` on re-delivery, including
    /// stamps whose guard was pruned.
    pub(crate) fn increase(&mut self, amount: i64, executed_at: &Timestamp) -> bool {
        if executed_at.lamport < self.pruned_below || !self.applied.insert(*executed_at) {
            return false;
        }
        self.value = self.value.wrapping_add(amount);
        true
    }

    /// Drop re-delivery guards that the sync floor has passed, keeping
    /// the floor as a watermark. The sum itself is never touched.
    pub(crate) fn prune_applied(&mut self, floor: u64) {
        if floor > self.pruned_below {
            self.pruned_below = floor;
        }
        self.applied.retain(|ts| ts.lamport >= self.pruned_below);
    }

    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        self.applied = self
            .applied
            .iter()
            .map(|ts| {
                let mut ts = *ts;
                ts.retag_actor(actor);
                ts
            })
            .collect();
    }
}
