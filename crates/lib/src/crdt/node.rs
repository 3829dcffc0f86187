//! Tree nodes of the document value model.
//!
//! Every node carries the timestamp of the operation that created it;
//! that timestamp is how operations address existing state, so it is
//! unique across the whole document history and never reused. Deletion
//! never detaches a node; it stamps a tombstone on the entry holding
//! it, and the garbage collector reclaims it once no replica can still
//! reference it.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::crdt::{Array, Counter, Object, Primitive, Text};
use crate::time::{ActorId, Timestamp};

/// One node of the document tree: a creation timestamp plus content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub created_at: Timestamp,
    pub content: Content,
}

/// The typed content of a [`Node`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Content {
    Primitive(Primitive),
    Object(Object),
    Array(Array),
    Text(Text),
    Counter(Counter),
}

impl Node {
    pub fn new(created_at: Timestamp, content: Content) -> Self {
        Self {
            created_at,
            content,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.content {
            Content::Primitive(p) => p.type_name(),
            Content::Object(_) => "object",
            Content::Array(_) => "array",
            Content::Text(_) => "text",
            Content::Counter(_) => "counter",
        }
    }

    /// Containers keep their tombstoned shape addressable until GC, so a
    /// losing container is shadowed rather than discarded.
    pub fn is_container(&self) -> bool {
        matches!(
            &self.content,
            Content::Object(_) | Content::Array(_) | Content::Text(_)
        )
    }

    pub fn as_object(&self) -> Option<&Object> {
        match &self.content {
            Content::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match &mut self.content {
            Content::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match &self.content {
            Content::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match &mut self.content {
            Content::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match &self.content {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut Text> {
        match &mut self.content {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_counter(&self) -> Option<&Counter> {
        match &self.content {
            Content::Counter(counter) => Some(counter),
            _ => None,
        }
    }

    pub fn as_counter_mut(&mut self) -> Option<&mut Counter> {
        match &mut self.content {
            Content::Counter(counter) => Some(counter),
            _ => None,
        }
    }

    /// The caller-visible JSON view. Tombstoned entries are hidden.
    pub fn to_json(&self) -> JsonValue {
        match &self.content {
            Content::Primitive(p) => p.to_json(),
            Content::Object(obj) => obj.to_json(),
            Content::Array(arr) => arr.to_json(),
            Content::Text(text) => JsonValue::from(text.to_string_view()),
            Content::Counter(counter) => JsonValue::from(counter.value()),
        }
    }

    /// Every child node, tombstoned or not, paired with its path segment.
    /// Used to resolve operation targets, which may legitimately address
    /// deleted state.
    pub(crate) fn children_mut(&mut self) -> Box<dyn Iterator<Item = (String, &mut Node)> + '_> {
        match &mut self.content {
            Content::Object(obj) => Box::new(obj.children_mut()),
            Content::Array(arr) => Box::new(arr.children_mut()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Size of this subtree, counting tombstoned nodes. Used for GC
    /// accounting.
    pub(crate) fn count_nodes(&self) -> usize {
        match &self.content {
            Content::Object(obj) => 1 + obj.count_descendants(),
            Content::Array(arr) => 1 + arr.count_descendants(),
            _ => 1,
        }
    }

    /// Reclaim tombstones whose deletion lamport is below `floor`.
    pub(crate) fn purge(&mut self, floor: u64) -> usize {
        match &mut self.content {
            Content::Object(obj) => obj.purge(floor),
            Content::Array(arr) => arr.purge(floor),
            Content::Text(text) => text.purge(floor),
            Content::Counter(counter) => {
                counter.prune_applied(floor);
                0
            }
            Content::Primitive(_) => 0,
        }
    }

    /// Re-stamp placeholder actors after attachment.
    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        self.created_at.retag_actor(actor);
        match &mut self.content {
            Content::Object(obj) => obj.retag_actor(actor),
            Content::Array(arr) => arr.retag_actor(actor),
            Content::Text(text) => text.retag_actor(actor),
            Content::Counter(counter) => counter.retag_actor(actor),
            Content::Primitive(_) => {}
        }
    }
}

/// Wire payload that constructs a single node. Containers are created
/// empty; their contents arrive as separate operations within the same
/// change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeSeed {
    Primitive(Primitive),
    Object,
    Array,
    Text,
    Counter { initial: i64 },
}

impl NodeSeed {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeSeed::Primitive(p) => p.type_name(),
            NodeSeed::Object => "object",
            NodeSeed::Array => "array",
            NodeSeed::Text => "text",
            NodeSeed::Counter { .. } => "counter",
        }
    }

    pub(crate) fn create(&self, created_at: Timestamp) -> Node {
        let content = match self {
            NodeSeed::Primitive(p) => Content::Primitive(p.clone()),
            NodeSeed::Object => Content::Object(Object::new()),
            NodeSeed::Array => Content::Array(Array::new()),
            NodeSeed::Text => Content::Text(Text::new()),
            NodeSeed::Counter { initial } => Content::Counter(Counter::new(*initial)),
        };
        Node::new(created_at, content)
    }
}
