//! Chained writes through paths that may not exist yet.
//!
//! `tree.at("x").at("y").set("z", 1)` behaves like `tree.set(("x", "y", "z"), 1)`: the
//! cursor only collects segments, and nothing is attached to the tree until a write
//! through it succeeds. Dropping a cursor without writing leaves the tree untouched.

use std::borrow::Cow;

use crate::config::settings;
use crate::errors::{TreeError, TreeResult};
use crate::node::Node;
use crate::path::{key_segments, Key, Segment};

/// Pending path below a borrowed root.
#[derive(Debug)]
pub struct Cursor<'a> {
    root: &'a mut Node,
    path: Vec<Segment>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(root: &'a mut Node) -> Self {
        Self {
            root,
            path: Vec::new(),
        }
    }

    /// Extend the pending path; delimited names contribute one segment per part.
    #[must_use]
    pub fn at(mut self, key: impl Into<Key>) -> Self {
        self.path.extend(key_segments(key.into(), settings()));
        self
    }

    pub fn path(&self) -> &[Segment] {
        &self.path
    }

    fn full_path(&self, key: Key) -> Key {
        let mut path = self.path.clone();
        path.extend(key_segments(key, settings()));
        Key::Path(path)
    }

    /// Read the node at the pending path. Missing keys read as placeholders.
    pub fn get(&self) -> TreeResult<Cow<'_, Node>> {
        if self.path.is_empty() {
            return Ok(Cow::Borrowed(&*self.root));
        }
        self.root.get(Key::Path(self.path.clone()))
    }

    /// Whether every segment of the pending path already exists.
    pub fn exists(&self) -> bool {
        let mut node: &Node = &*self.root;
        for segment in &self.path {
            let next = match (node, segment) {
                (Node::Map(map), Segment::Name(name)) => map.entry(name),
                (Node::Seq(seq), Segment::Index(i)) => seq.item(*i).ok(),
                _ => None,
            };
            match next {
                Some(child) => node = child,
                None => return false,
            }
        }
        true
    }

    /// Write `value` at `key` below the pending path, creating what is missing.
    pub fn set(self, key: impl Into<Key>, value: impl Into<Node>) -> TreeResult<()> {
        let full = self.full_path(key.into());
        self.root.set(full, value)
    }

    /// Write `value` at the pending path itself.
    ///
    /// # Errors
    /// `InvalidArgument` when no path is pending; the root is never replaced.
    pub fn assign(self, value: impl Into<Node>) -> TreeResult<()> {
        if self.path.is_empty() {
            return Err(TreeError::InvalidArgument(
                "cannot assign at the root, no path pending".to_string(),
            ));
        }
        self.root.set(Key::Path(self.path), value)
    }

    pub fn delete(self, key: impl Into<Key>) -> TreeResult<()> {
        let full = self.full_path(key.into());
        self.root.delete(full)
    }
}
