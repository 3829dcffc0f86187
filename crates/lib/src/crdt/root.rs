//! The document tree root and operation dispatch.
//!
//! Operations address the container they mutate by its creation
//! timestamp. Resolution walks the whole tree, tombstoned subtrees
//! included, because a concurrent operation may legitimately target
//! state that was deleted before the operation arrived.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::change::Operation;
use crate::crdt::errors::CrdtError;
use crate::crdt::{Content, Node, Object};
use crate::time::{ActorId, Timestamp};

/// The path of the root object.
pub const ROOT_PATH: &str = "$";

/// The root object of a document, together with operation application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    node: Node,
}

impl Default for Root {
    fn default() -> Self {
        Self::new()
    }
}

impl Root {
    pub fn new() -> Self {
        Self {
            node: Node::new(Timestamp::initial(), Content::Object(Object::new())),
        }
    }

    /// Apply one operation. Returns the paths whose visible value may
    /// have changed. Re-delivered operations apply as no-ops.
    pub(crate) fn apply(&mut self, op: &Operation) -> Result<Vec<String>, CrdtError> {
        let parent_at = op.parent();
        let (path, parent) = find_mut(&mut self.node, ROOT_PATH.to_string(), &parent_at)
            .ok_or(CrdtError::MissingParent { parent: parent_at })?;
        let actual = parent.type_name();

        match op {
            Operation::Set {
                key,
                value,
                executed_at,
                ..
            } => {
                let object = parent.as_object_mut().ok_or(CrdtError::TypeMismatch {
                    expected: "object",
                    actual,
                })?;
                object.set(key, value.create(*executed_at));
                Ok(vec![format!("{path}.{key}")])
            }
            Operation::Add {
                after,
                value,
                executed_at,
                ..
            } => {
                let container = parent.created_at;
                let array = parent.as_array_mut().ok_or(CrdtError::TypeMismatch {
                    expected: "array",
                    actual,
                })?;
                array.add(&container, after, value.create(*executed_at))?;
                Ok(vec![path])
            }
            Operation::Remove {
                target,
                executed_at,
                ..
            } => {
                let removed = match &mut parent.content {
                    Content::Object(object) => object.remove(target, executed_at),
                    Content::Array(array) => array.remove(target, executed_at),
                    _ => {
                        return Err(CrdtError::TypeMismatch {
                            expected: "object or array",
                            actual,
                        });
                    }
                };
                if !removed {
                    return Err(CrdtError::MissingTarget { target: *target });
                }
                Ok(vec![path])
            }
            Operation::Edit {
                from,
                to,
                content,
                seen,
                executed_at,
                ..
            } => {
                let own = parent.created_at;
                let text = parent.as_text_mut().ok_or(CrdtError::TypeMismatch {
                    expected: "text",
                    actual,
                })?;
                text.edit(&own, from, to, content, executed_at, seen)?;
                Ok(vec![path])
            }
            Operation::Style {
                from,
                to,
                attributes,
                seen,
                executed_at,
                ..
            } => {
                let own = parent.created_at;
                let text = parent.as_text_mut().ok_or(CrdtError::TypeMismatch {
                    expected: "text",
                    actual,
                })?;
                text.style(&own, from, to, attributes, executed_at, seen)?;
                Ok(vec![path])
            }
            Operation::Increase {
                amount, executed_at, ..
            } => {
                let counter = parent.as_counter_mut().ok_or(CrdtError::TypeMismatch {
                    expected: "counter",
                    actual,
                })?;
                counter.increase(*amount, executed_at);
                Ok(vec![path])
            }
        }
    }

    /// Navigate the live tree by a `$`-rooted dotted path. Tombstoned
    /// state is invisible here.
    pub fn resolve(&self, path: &str) -> Option<&Node> {
        let rest = path.strip_prefix(ROOT_PATH)?;
        let mut node = &self.node;
        for segment in rest.split('.').filter(|s| !s.is_empty()) {
            node = match &node.content {
                Content::Object(object) => object.get(segment)?,
                Content::Array(array) => array.get(segment.parse().ok()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// The live container holding the root object's entries.
    pub fn object(&self) -> &Object {
        match &self.node.content {
            Content::Object(object) => object,
            _ => unreachable!("root is always an object"),
        }
    }

    /// The caller-visible JSON snapshot.
    pub fn to_json(&self) -> JsonValue {
        self.node.to_json()
    }

    /// Total node count, tombstones included.
    pub fn count_nodes(&self) -> usize {
        self.node.count_nodes()
    }

    pub(crate) fn purge(&mut self, floor: u64) -> usize {
        self.node.purge(floor)
    }

    pub(crate) fn retag_actor(&mut self, actor: ActorId) {
        self.node.retag_actor(actor);
    }
}

/// Depth-first search for the node created at `target`, over winners,
/// shadows, and tombstoned elements alike.
fn find_mut<'a>(
    node: &'a mut Node,
    path: String,
    target: &Timestamp,
) -> Option<(String, &'a mut Node)> {
    if node.created_at == *target {
        return Some((path, node));
    }
    for (segment, child) in node.children_mut() {
        let child_path = format!("{path}.{segment}");
        if let Some(found) = find_mut(child, child_path, target) {
            return Some(found);
        }
    }
    None
}
