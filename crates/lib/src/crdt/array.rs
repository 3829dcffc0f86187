//! Replicated growable array.
//!
//! Elements form an insertion-anchored sequence: every element remembers
//! the timestamp of the element it was inserted after (the container's
//! own creation timestamp anchors the head). Concurrent inserts at the
//! same anchor are ordered newest first; since a causally later insert
//! always stamps greater than anything its replica had seen, it lands
//! directly after the anchor it addressed. An element's descendants
//! (elements anchored inside its subtree) travel with it, and tombstoned
//! elements stay linked so that concurrent operations can still resolve
//! them as anchors.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::crdt::errors::CrdtError;
use crate::crdt::object::collectible;
use crate::crdt::Node;
use crate::time::{ActorId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Element {
    node: Node,
    inserted_after: Timestamp,
    removed_at: Option<Timestamp>,
}

impl Element {
    fn is_live(&self) -> bool {
        self.removed_at.is_none()
    }
}

/// An ordered sequence of nodes with deterministic concurrent-insert
/// resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Array {
    elements: Vec<Element>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an `Add` anchored after `after` (`container` anchors the
    /// head). Returns `Ok(false)` on re-delivery.
    pub(crate) fn add(
        &mut self,
        container: &Timestamp,
        after: &Timestamp,
        node: Node,
    ) -> Result<bool, CrdtError> {
        if self
            .elements
            .iter()
            .any(|e| e.node.created_at == node.created_at)
        {
            return Ok(false);
        }

        let start = if after == container {
            0
        } else {
            let anchor = self
                .elements
                .iter()
                .position(|e| e.node.created_at == *after)
                .ok_or(CrdtError::MissingTarget { target: *after })?;
            anchor + 1
        };

        let index = self.insertion_index(start, after, &node.created_at);
        self.elements.insert(
            index,
            Element {
                node,
                inserted_after: *after,
                removed_at: None,
            },
        );
        Ok(true)
    }

    /// Scan forward from the anchor, skipping same-anchor siblings with
    /// greater timestamps (those are concurrent inserts) along with
    /// their subtrees.
    fn insertion_index(&self, start: usize, after: &Timestamp, created_at: &Timestamp) -> usize {
        let mut index = start;
        let mut skipped: HashSet<Timestamp> = HashSet::new();
        while index < self.elements.len() {
            let element = &self.elements[index];
            let sibling = element.inserted_after == *after
                && element.node.created_at > *created_at;
            if sibling || skipped.contains(&element.inserted_after) {
                skipped.insert(element.node.created_at);
                index += 1;
            } else {
                break;
            }
        }
        index
    }

    /// Tombstone the element created at `target`. Linkage is preserved.
    pub(crate) fn remove(&mut self, target: &Timestamp, removed_at: &Timestamp) -> bool {
        for element in &mut self.elements {
            if element.node.created_at == *target {
                match &element.removed_at {
                    Some(existing) if existing >= removed_at => {}
                    _ => element.removed_at = Some(*removed_at),
                }
                return true;
            }
        }
        false
    }

    /// The live element at `index`.
    pub fn get(&self, index: usize) -> Option<&Node> {
        self.iter().nth(index)
    }

    /// Creation timestamp of the live element at `index`, used to anchor
    /// index-addressed inserts.
    pub(crate) fn live_created_at(&self, index: usize) -> Option<Timestamp> {
        self.get(index).map(|node| node.created_at)
    }

    /// Live elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.elements
            .iter()
            .filter(|e| e.is_live())
            .map(|e| &e.node)
    }

    pub fn len(&self) -> usize {
        self.elements.iter().filter(|e| e.is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.iter().map(Node::to_json).collect())
    }

    pub(crate) fn children_mut(&mut self) -> impl Iterator<Item = (String, &mut Node)> {
        self.elements
            .iter_mut()
            .enumerate()
            .map(|(i, e)| (i.to_string(), &mut e.node))
    }

    pub(crate) fn count_descendants(&self) -> usize {
        self.elements.iter().map(|e| e.node.count_nodes()).sum()
    }

    pub(crate) fn purge(&mut self, floor: u64) -> usize {
        let mut purged = 0;
        self.elements.retain_mut(|element| {
            if collectible(&element.removed_at, floor) {
                purged += element.node.count_nodes();
                false
            } else {
                purged += element.node.purge(floor);
                true
            }
        });
        purged
    }

    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        for element in &mut self.elements {
            element.node.retag_actor(actor);
            element.inserted_after.retag_actor(actor);
            if let Some(removed_at) = &mut element.removed_at {
                removed_at.retag_actor(actor);
            }
        }
    }
}
