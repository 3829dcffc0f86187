//! Replicated rich text.
//!
//! Text is a sequence of blocks. Editing splits blocks so that deletion
//! granularity matches the edit bounds; split pieces keep the creation
//! timestamp of their origin block and are told apart by their starting
//! offset within it. Positions address a boundary in that origin space
//! (`(created_at, absolute offset)`), so they stay meaningful no matter
//! how the block has been split since the position was captured.
//!
//! Insertion ordering follows the same anchor rule as the array: a new
//! block is anchored at the boundary it was inserted at, concurrent
//! inserts at the same boundary order newest first (so a causally later
//! insert lands at the boundary it addressed), and split continuations
//! always stay directly after the pieces they continue.
//!
//! Range deletion and styling carry the editing replica's version vector
//! so every replica agrees on which blocks the editor had seen; content
//! inserted concurrently inside the range survives.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::crdt::errors::CrdtError;
use crate::crdt::object::collectible;
use crate::time::{ActorId, Timestamp, VersionVector};

/// Identity of a block piece: the creating timestamp plus the piece's
/// starting offset within the originally inserted block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct BlockId {
    created_at: Timestamp,
    offset: u32,
}

/// A boundary between characters, expressed in a block's origin space.
/// The text container's own creation timestamp (offset 0) denotes the
/// head boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextPos {
    pub created_at: Timestamp,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Block {
    id: BlockId,
    content: String,
    attrs: BTreeMap<String, String>,
    styled_at: Option<Timestamp>,
    inserted_after: TextPos,
    removed_at: Option<Timestamp>,
}

impl Block {
    fn is_live(&self) -> bool {
        self.removed_at.is_none()
    }

    fn char_len(&self) -> u32 {
        self.content.chars().count() as u32
    }

    fn end_offset(&self) -> u32 {
        self.id.offset + self.char_len()
    }

    fn mark_removed(&mut self, removed_at: &Timestamp) {
        match &self.removed_at {
            Some(existing) if existing >= removed_at => {}
            _ => self.removed_at = Some(*removed_at),
        }
    }
}

/// A styled run of live text, as exposed to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub content: String,
    pub attributes: BTreeMap<String, String>,
}

/// The text CRDT.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Text {
    blocks: Vec<Block>,
}

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    /// The boundary before the live character at `index` (== the number
    /// of live characters preceding it). Captured against the current
    /// state; `own` is the container's creation timestamp.
    pub fn pos_for_index(&self, own: &Timestamp, index: usize) -> Result<TextPos, CrdtError> {
        if index == 0 {
            return Ok(TextPos {
                created_at: *own,
                offset: 0,
            });
        }
        let mut remaining = index;
        for block in self.blocks.iter().filter(|b| b.is_live()) {
            let len = block.char_len() as usize;
            if remaining <= len {
                return Ok(TextPos {
                    created_at: block.id.created_at,
                    offset: block.id.offset + remaining as u32,
                });
            }
            remaining -= len;
        }
        Err(CrdtError::IndexOutOfBounds {
            index,
            len: self.len_chars(),
        })
    }

    /// Resolve a position to a block-boundary index, splitting the piece
    /// it lands inside when necessary.
    fn boundary(&mut self, own: &Timestamp, pos: &TextPos) -> Result<usize, CrdtError> {
        if pos.created_at == *own {
            return Ok(0);
        }
        let mut found = false;
        for i in 0..self.blocks.len() {
            let block = &self.blocks[i];
            if block.id.created_at != pos.created_at {
                continue;
            }
            found = true;
            if pos.offset == block.id.offset {
                return Ok(i);
            }
            if pos.offset == block.end_offset() {
                return Ok(i + 1);
            }
            if pos.offset > block.id.offset && pos.offset < block.end_offset() {
                self.split(i, (pos.offset - block.id.offset) as usize);
                return Ok(i + 1);
            }
        }
        if found {
            Err(CrdtError::InvalidPosition {
                position: format!("{}+{}", pos.created_at, pos.offset),
            })
        } else {
            Err(CrdtError::MissingTarget {
                target: pos.created_at,
            })
        }
    }

    /// Split the block at `index` after `at` characters. The right piece
    /// keeps the origin timestamp and is anchored at the split boundary,
    /// so it always stays directly after the left piece.
    fn split(&mut self, index: usize, at: usize) {
        let block = &mut self.blocks[index];
        let byte_at = block
            .content
            .char_indices()
            .nth(at)
            .map(|(b, _)| b)
            .unwrap_or(block.content.len());
        let rest = block.content.split_off(byte_at);
        let right = Block {
            id: BlockId {
                created_at: block.id.created_at,
                offset: block.id.offset + at as u32,
            },
            content: rest,
            attrs: block.attrs.clone(),
            styled_at: block.styled_at,
            inserted_after: TextPos {
                created_at: block.id.created_at,
                offset: block.id.offset + at as u32,
            },
            removed_at: block.removed_at,
        };
        self.blocks.insert(index + 1, right);
    }

    /// Apply an edit: tombstone the covered range (only blocks the editor
    /// had seen, per `seen`), then insert `content` anchored at the start
    /// boundary. Returns `Ok(false)` on re-delivery.
    pub(crate) fn edit(
        &mut self,
        own: &Timestamp,
        from: &TextPos,
        to: &TextPos,
        content: &str,
        executed_at: &Timestamp,
        seen: &VersionVector,
    ) -> Result<bool, CrdtError> {
        if !content.is_empty()
            && self
                .blocks
                .iter()
                .any(|b| b.id.created_at == *executed_at)
        {
            return Ok(false);
        }

        let from_b = self.boundary(own, from)?;
        let to_b = self.boundary(own, to)?;
        if to_b < from_b {
            return Err(CrdtError::InvalidPosition {
                position: format!("range {}+{}..{}+{}", from.created_at, from.offset, to.created_at, to.offset),
            });
        }

        for block in &mut self.blocks[from_b..to_b] {
            if seen.covers(&block.id.created_at) {
                block.mark_removed(executed_at);
            }
        }

        if !content.is_empty() {
            let index = self.insertion_index(from_b, from, executed_at);
            self.blocks.insert(
                index,
                Block {
                    id: BlockId {
                        created_at: *executed_at,
                        offset: 0,
                    },
                    content: content.to_string(),
                    attrs: BTreeMap::new(),
                    styled_at: None,
                    inserted_after: *from,
                    removed_at: None,
                },
            );
        }
        Ok(true)
    }

    /// Same anchor rule as the array: skip same-anchor siblings with
    /// greater timestamps (concurrent inserts) plus their subtrees. A
    /// split continuation (a piece whose timestamp equals the anchor's)
    /// is never a sibling, so inserts always land before it.
    fn insertion_index(&self, start: usize, anchor: &TextPos, created_at: &Timestamp) -> usize {
        let mut index = start;
        let mut skipped: HashSet<Timestamp> = HashSet::new();
        while index < self.blocks.len() {
            let block = &self.blocks[index];
            let sibling = block.inserted_after == *anchor
                && block.id.created_at != anchor.created_at
                && block.id.created_at > *created_at;
            if sibling
                || skipped.contains(&block.inserted_after.created_at)
                || skipped.contains(&block.id.created_at)
            {
                skipped.insert(block.id.created_at);
                index += 1;
            } else {
                break;
            }
        }
        index
    }

    /// Replace the attribute map of every covered, seen block when the
    /// style stamp is newer than the block's last one.
    pub(crate) fn style(
        &mut self,
        own: &Timestamp,
        from: &TextPos,
        to: &TextPos,
        attributes: &BTreeMap<String, String>,
        executed_at: &Timestamp,
        seen: &VersionVector,
    ) -> Result<bool, CrdtError> {
        let from_b = self.boundary(own, from)?;
        let to_b = self.boundary(own, to)?;
        let mut changed = false;
        for block in &mut self.blocks[from_b..to_b] {
            if !seen.covers(&block.id.created_at) {
                continue;
            }
            let newer = match &block.styled_at {
                Some(existing) => existing < executed_at,
                None => true,
            };
            if newer {
                block.attrs = attributes.clone();
                block.styled_at = Some(*executed_at);
                changed = true;
            }
        }
        Ok(changed)
    }

    /// The live character count.
    pub fn len_chars(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.is_live())
            .map(|b| b.char_len() as usize)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| !b.is_live() || b.content.is_empty())
    }

    /// The live text.
    pub fn to_string_view(&self) -> String {
        self.blocks
            .iter()
            .filter(|b| b.is_live())
            .map(|b| b.content.as_str())
            .collect()
    }

    /// Live text as styled runs.
    pub fn spans(&self) -> Vec<TextSpan> {
        self.blocks
            .iter()
            .filter(|b| b.is_live())
            .map(|b| TextSpan {
                content: b.content.clone(),
                attributes: b.attrs.clone(),
            })
            .collect()
    }

    pub(crate) fn purge(&mut self, floor: u64) -> usize {
        let before = self.blocks.len();
        self.blocks
            .retain(|block| !collectible(&block.removed_at, floor));
        before - self.blocks.len()
    }

    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        for block in &mut self.blocks {
            block.id.created_at.retag_actor(actor);
            block.inserted_after.created_at.retag_actor(actor);
            if let Some(removed_at) = &mut block.removed_at {
                removed_at.retag_actor(actor);
            }
            if let Some(styled_at) = &mut block.styled_at {
                styled_at.retag_actor(actor);
            }
        }
    }
}
