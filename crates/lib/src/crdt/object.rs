//! Last-writer-wins object.
//!
//! Each key holds the winning entry plus any shadowed losers. A `Set`
//! with a greater timestamp displaces the current winner; a displaced or
//! losing value is retained as a tombstoned shadow only when it is a
//! container, so that operations and tombstones inside it remain
//! addressable until the garbage collector reclaims the whole subtree.
//! Scalar losers carry no addressable state and are discarded outright.

use std::collections::hash_map;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::crdt::Node;
use crate::time::{ActorId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Entry {
    pub(crate) node: Node,
    pub(crate) removed_at: Option<Timestamp>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.removed_at.is_none()
    }

    /// Stamp (or re-stamp with a greater timestamp) the tombstone.
    pub(crate) fn mark_removed(&mut self, removed_at: &Timestamp) -> bool {
        match &self.removed_at {
            Some(existing) if existing >= removed_at => false,
            _ => {
                self.removed_at = Some(*removed_at);
                true
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Slot {
    winner: Entry,
    shadows: Vec<Entry>,
}

/// A mapping from string keys to nodes with LWW conflict resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Object {
    slots: HashMap<String, Slot>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a `Set`. Returns `true` when the visible winner changed;
    /// re-delivery of an already-seen node is a no-op.
    pub(crate) fn set(&mut self, key: &str, node: Node) -> bool {
        let slot = match self.slots.entry(key.to_string()) {
            hash_map::Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    winner: Entry {
                        node,
                        removed_at: None,
                    },
                    shadows: Vec::new(),
                });
                return true;
            }
            hash_map::Entry::Occupied(occupied) => occupied.into_mut(),
        };

        let created_at = node.created_at;
        if slot.winner.node.created_at == created_at
            || slot.shadows.iter().any(|s| s.node.created_at == created_at)
        {
            return false;
        }

        if created_at > slot.winner.node.created_at {
            let mut loser = std::mem::replace(
                &mut slot.winner,
                Entry {
                    node,
                    removed_at: None,
                },
            );
            if loser.node.is_container() {
                loser.mark_removed(&created_at);
                slot.shadows.push(loser);
            }
            true
        } else {
            // The incoming node lost a race it never got to see. Keep it
            // addressable if it is a container.
            if node.is_container() {
                let removed_at = slot.winner.node.created_at;
                slot.shadows.push(Entry {
                    node,
                    removed_at: Some(removed_at),
                });
            }
            false
        }
    }

    /// Tombstone the entry whose node was created at `target`. Returns
    /// `false` when no such entry exists here.
    pub(crate) fn remove(&mut self, target: &Timestamp, removed_at: &Timestamp) -> bool {
        for slot in self.slots.values_mut() {
            if slot.winner.node.created_at == *target {
                slot.winner.mark_removed(removed_at);
                return true;
            }
            for shadow in &mut slot.shadows {
                if shadow.node.created_at == *target {
                    shadow.mark_removed(removed_at);
                    return true;
                }
            }
        }
        false
    }

    /// The live value at `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.slots
            .get(key)
            .filter(|slot| slot.winner.is_live())
            .map(|slot| &slot.winner.node)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Live entries only.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.winner.is_live())
            .map(|(key, slot)| (key, &slot.winner.node))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = JsonMap::new();
        for (key, node) in self.iter() {
            map.insert(key.clone(), node.to_json());
        }
        JsonValue::Object(map)
    }

    /// Every child node, winners and shadows alike, keyed by its path
    /// segment.
    pub(crate) fn children_mut(&mut self) -> impl Iterator<Item = (String, &mut Node)> {
        self.slots.iter_mut().flat_map(|(key, slot)| {
            let winner = std::iter::once((key.clone(), &mut slot.winner.node));
            let shadows = slot
                .shadows
                .iter_mut()
                .map(move |entry| (key.clone(), &mut entry.node));
            winner.chain(shadows)
        })
    }

    pub(crate) fn count_descendants(&self) -> usize {
        self.slots
            .values()
            .map(|slot| {
                slot.winner.node.count_nodes()
                    + slot
                        .shadows
                        .iter()
                        .map(|s| s.node.count_nodes())
                        .sum::<usize>()
            })
            .sum()
    }

    /// Reclaim every tombstoned entry whose deletion lamport is below
    /// `floor`, together with its subtree. Returns the number of nodes
    /// removed.
    pub(crate) fn purge(&mut self, floor: u64) -> usize {
        let mut purged = 0;
        self.slots.retain(|_, slot| {
            slot.shadows.retain_mut(|shadow| {
                if collectible(&shadow.removed_at, floor) {
                    purged += shadow.node.count_nodes();
                    false
                } else {
                    purged += shadow.node.purge(floor);
                    true
                }
            });
            if slot.shadows.is_empty() && collectible(&slot.winner.removed_at, floor) {
                purged += slot.winner.node.count_nodes();
                false
            } else {
                purged += slot.winner.node.purge(floor);
                true
            }
        });
        purged
    }

    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        for slot in self.slots.values_mut() {
            slot.winner.node.retag_actor(actor);
            if let Some(removed_at) = &mut slot.winner.removed_at {
                removed_at.retag_actor(actor);
            }
            for shadow in &mut slot.shadows {
                shadow.node.retag_actor(actor);
                if let Some(removed_at) = &mut shadow.removed_at {
                    removed_at.retag_actor(actor);
                }
            }
        }
    }
}

/// A tombstone is collectible once every attached replica's clock has
/// advanced past its deletion lamport.
pub(crate) fn collectible(removed_at: &Option<Timestamp>, floor: u64) -> bool {
    matches!(removed_at, Some(ts) if ts.lamport < floor)
}
