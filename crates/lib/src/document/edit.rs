//! Local editing.
//!
//! [`EditContext`] is handed to the closure passed to
//! [`crate::Document::update`]. Every call immediately applies to a
//! working copy of the tree and records the corresponding operation, so
//! later calls in the same closure observe earlier ones; the document
//! commits the batch as a single change when the closure returns.

use std::collections::BTreeMap;

use crate::change::Operation;
use crate::crdt::{CrdtError, Node, NodeSeed, Primitive, Root, TextPos};
use crate::document::errors::DocumentError;
use crate::time::{LamportClock, Timestamp, VersionVector};
use crate::Result;

/// A JSON-like value accepted by editing calls. Containers expand into
/// one operation per node.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Value(Primitive),
    Object(Vec<(String, Input)>),
    Array(Vec<Input>),
    Text(String),
    Counter(i64),
}

impl Input {
    pub fn object(entries: impl IntoIterator<Item = (impl Into<String>, Input)>) -> Self {
        Input::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn array(items: impl IntoIterator<Item = Input>) -> Self {
        Input::Array(items.into_iter().collect())
    }

    pub fn text(content: impl Into<String>) -> Self {
        Input::Text(content.into())
    }

    pub fn counter(initial: i64) -> Self {
        Input::Counter(initial)
    }

    fn seed(&self) -> NodeSeed {
        match self {
            Input::Value(p) => NodeSeed::Primitive(p.clone()),
            Input::Object(_) => NodeSeed::Object,
            Input::Array(_) => NodeSeed::Array,
            Input::Text(_) => NodeSeed::Text,
            Input::Counter(initial) => NodeSeed::Counter { initial: *initial },
        }
    }
}

impl From<Primitive> for Input {
    fn from(value: Primitive) -> Self {
        Input::Value(value)
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Input::Value(value.into())
    }
}

impl From<i64> for Input {
    fn from(value: i64) -> Self {
        Input::Value(value.into())
    }
}

impl From<i32> for Input {
    fn from(value: i32) -> Self {
        Input::Value(value.into())
    }
}

impl From<f64> for Input {
    fn from(value: f64) -> Self {
        Input::Value(value.into())
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Value(value.into())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Value(value.into())
    }
}

/// One editing session over a document.
///
/// All operations of a session share a lamport value; the session's
/// first stamp bumps the clock and later stamps advance the delimiter.
pub struct EditContext<'a> {
    root: &'a mut Root,
    clock: &'a mut LamportClock,
    seen: &'a VersionVector,
    ops: &'a mut Vec<Operation>,
    paths: &'a mut Vec<String>,
    issued: bool,
}

impl<'a> EditContext<'a> {
    pub(crate) fn new(
        root: &'a mut Root,
        clock: &'a mut LamportClock,
        seen: &'a VersionVector,
        ops: &'a mut Vec<Operation>,
        paths: &'a mut Vec<String>,
    ) -> Self {
        Self {
            root,
            clock,
            seen,
            ops,
            paths,
            issued: false,
        }
    }

    fn stamp(&mut self) -> Timestamp {
        if self.issued {
            self.clock.derive()
        } else {
            self.issued = true;
            self.clock.next()
        }
    }

    /// Everything this replica has observed, the current session
    /// included.
    fn seen_now(&self, now: &Timestamp) -> VersionVector {
        let mut seen = self.seen.clone();
        seen.observe(now);
        seen
    }

    fn apply(&mut self, op: Operation) -> Result<()> {
        let touched = self.root.apply(&op)?;
        self.paths.extend(touched);
        self.ops.push(op);
        Ok(())
    }

    fn node_at(&self, path: &str) -> Result<&Node> {
        self.root
            .resolve(path)
            .ok_or_else(|| DocumentError::PathNotFound {
                path: path.to_string(),
            })
            .map_err(Into::into)
    }

    fn typed<T>(
        &self,
        path: &str,
        expected: &'static str,
        pick: impl FnOnce(&Node) -> Option<T>,
    ) -> Result<T> {
        let node = self.node_at(path)?;
        let actual = node.type_name();
        pick(node).ok_or_else(|| {
            DocumentError::TypeMismatch {
                path: path.to_string(),
                expected,
                actual,
            }
            .into()
        })
    }

    /// Write `key` in the object at `path`. Nested [`Input`] containers
    /// expand into one operation per node.
    pub fn set(&mut self, path: &str, key: &str, value: impl Into<Input>) -> Result<()> {
        let parent = self.typed(path, "object", |n| n.as_object().map(|_| n.created_at))?;
        self.set_input(parent, key, value.into())
    }

    /// Remove `key` from the object at `path`.
    pub fn remove(&mut self, path: &str, key: &str) -> Result<()> {
        let (parent, target) = self.typed(path, "object", |n| {
            n.as_object()
                .map(|obj| (n.created_at, obj.get(key).map(|child| child.created_at)))
        })?;
        let target = target.ok_or_else(|| DocumentError::PathNotFound {
            path: format!("{path}.{key}"),
        })?;
        let executed_at = self.stamp();
        self.apply(Operation::Remove {
            parent,
            target,
            executed_at,
        })
    }

    /// Append to the array at `path`.
    pub fn push(&mut self, path: &str, value: impl Into<Input>) -> Result<()> {
        let (parent, len) = self.array_at(path)?;
        self.insert_input(path, parent, len, value.into())
    }

    /// Insert before the live element at `index` of the array at `path`.
    /// `index == len` appends.
    pub fn insert(&mut self, path: &str, index: usize, value: impl Into<Input>) -> Result<()> {
        let (parent, _) = self.array_at(path)?;
        self.insert_input(path, parent, index, value.into())
    }

    /// Remove the live element at `index` of the array at `path`.
    pub fn remove_at(&mut self, path: &str, index: usize) -> Result<()> {
        let (parent, target) = self.typed(path, "array", |n| {
            n.as_array()
                .map(|arr| (n.created_at, arr.live_created_at(index)))
        })?;
        let (_, len) = self.array_at(path)?;
        let target = target.ok_or(CrdtError::IndexOutOfBounds { index, len })?;
        let executed_at = self.stamp();
        self.apply(Operation::Remove {
            parent,
            target,
            executed_at,
        })
    }

    /// Replace the live character range `[from, to)` of the text at
    /// `path` with `content`.
    pub fn edit(&mut self, path: &str, from: usize, to: usize, content: &str) -> Result<()> {
        let (parent, from, to) = self.text_range(path, from, to)?;
        let executed_at = self.stamp();
        let seen = self.seen_now(&executed_at);
        self.apply(Operation::Edit {
            parent,
            from,
            to,
            content: content.to_string(),
            seen,
            executed_at,
        })
    }

    /// Set the attributes of the live character range `[from, to)` of
    /// the text at `path`.
    pub fn style(
        &mut self,
        path: &str,
        from: usize,
        to: usize,
        attributes: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<()> {
        let (parent, from, to) = self.text_range(path, from, to)?;
        let executed_at = self.stamp();
        let seen = self.seen_now(&executed_at);
        let attributes: BTreeMap<String, String> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.apply(Operation::Style {
            parent,
            from,
            to,
            attributes,
            seen,
            executed_at,
        })
    }

    /// Add `amount` to the counter at `path`.
    pub fn increase(&mut self, path: &str, amount: i64) -> Result<()> {
        let parent = self.typed(path, "counter", |n| n.as_counter().map(|_| n.created_at))?;
        let executed_at = self.stamp();
        self.apply(Operation::Increase {
            parent,
            amount,
            executed_at,
        })
    }

    fn array_at(&self, path: &str) -> Result<(Timestamp, usize)> {
        self.typed(path, "array", |n| {
            n.as_array().map(|arr| (n.created_at, arr.len()))
        })
    }

    fn text_range(&self, path: &str, from: usize, to: usize) -> Result<(Timestamp, TextPos, TextPos)> {
        let node = self.node_at(path)?;
        let actual = node.type_name();
        let text = node.as_text().ok_or(DocumentError::TypeMismatch {
            path: path.to_string(),
            expected: "text",
            actual,
        })?;
        let parent = node.created_at;
        let from = text.pos_for_index(&parent, from)?;
        let to = text.pos_for_index(&parent, to)?;
        Ok((parent, from, to))
    }

    fn set_input(&mut self, parent: Timestamp, key: &str, input: Input) -> Result<()> {
        let executed_at = self.stamp();
        self.apply(Operation::Set {
            parent,
            key: key.to_string(),
            value: input.seed(),
            executed_at,
        })?;
        self.fill(executed_at, input)
    }

    fn insert_input(
        &mut self,
        path: &str,
        parent: Timestamp,
        index: usize,
        input: Input,
    ) -> Result<()> {
        let after = if index == 0 {
            parent
        } else {
            let (_, anchor) = self.typed(path, "array", |n| {
                n.as_array()
                    .map(|arr| (n.created_at, arr.live_created_at(index - 1)))
            })?;
            let (_, len) = self.array_at(path)?;
            anchor.ok_or(CrdtError::IndexOutOfBounds { index, len })?
        };
        self.add_input(parent, after, input)?;
        Ok(())
    }

    fn add_input(&mut self, parent: Timestamp, after: Timestamp, input: Input) -> Result<Timestamp> {
        let executed_at = self.stamp();
        self.apply(Operation::Add {
            parent,
            after,
            value: input.seed(),
            executed_at,
        })?;
        self.fill(executed_at, input)?;
        Ok(executed_at)
    }

    /// Expand a container input into the operations creating its
    /// contents.
    fn fill(&mut self, created: Timestamp, input: Input) -> Result<()> {
        match input {
            Input::Value(_) | Input::Counter(_) => Ok(()),
            Input::Object(entries) => {
                for (key, value) in entries {
                    self.set_input(created, &key, value)?;
                }
                Ok(())
            }
            Input::Array(items) => {
                let mut after = created;
                for item in items {
                    after = self.add_input(created, after, item)?;
                }
                Ok(())
            }
            Input::Text(content) => {
                if content.is_empty() {
                    return Ok(());
                }
                let head = TextPos {
                    created_at: created,
                    offset: 0,
                };
                let executed_at = self.stamp();
                let seen = self.seen_now(&executed_at);
                self.apply(Operation::Edit {
                    parent: created,
                    from: head,
                    to: head,
                    content,
                    seen,
                    executed_at,
                })
            }
        }
    }
}
