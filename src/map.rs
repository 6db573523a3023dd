//! Keyed container node. Entries keep insertion order.

use std::borrow::Cow;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::config::settings;
use crate::errors::{TreeError, TreeResult};
use crate::node::{adopt, merge_into, Node};
use crate::path::{resolve, Key, Resolved, Segment};
use crate::scalar::{LeafType, Scalar};

pub(crate) const VARIANT: &str = "map";

#[derive(Debug, Clone, Default)]
pub struct MapNode {
    pub(crate) entries: IndexMap<String, Node>,
    pub(crate) leaf_type: Option<LeafType>,
}

/// Equality is by content; the leaf-type constraint is not compared.
impl PartialEq for MapNode {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

fn map_key(segment: Segment) -> TreeResult<String> {
    match segment {
        Segment::Name(name) => Ok(name),
        other => Err(TreeError::InvalidKey {
            key: other.to_string(),
            variant: VARIANT,
        }),
    }
}

impl MapNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn typed(leaf_type: Option<LeafType>) -> Self {
        Self {
            entries: IndexMap::new(),
            leaf_type,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn leaf_type(&self) -> Option<LeafType> {
        self.leaf_type
    }

    pub(crate) fn set_leaf_type(&mut self, leaf_type: LeafType) {
        self.leaf_type = Some(leaf_type);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Node> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Node)> {
        self.entries.iter_mut()
    }

    /// Direct child lookup; the key is never split.
    pub fn entry(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    /// Store without validation; only for values already under this constraint.
    pub(crate) fn insert_raw(&mut self, key: String, value: Node) {
        self.entries.insert(key, value);
    }

    fn placeholder(&self) -> Node {
        Node::Map(Self::typed(self.leaf_type))
    }

    #[instrument(level = "trace", skip_all)]
    pub fn get(&self, key: impl Into<Key>) -> TreeResult<Cow<'_, Node>> {
        match resolve(key.into(), settings())? {
            Resolved::Recursed(head, tail) => {
                let name = map_key(head)?;
                match self.entries.get(&name) {
                    Some(child) => child.get(tail),
                    None => {
                        let placeholder = self.placeholder();
                        let value = placeholder.get(tail)?.into_owned();
                        Ok(Cow::Owned(value))
                    }
                }
            }
            Resolved::Single(segment) => {
                let name = map_key(segment)?;
                match self.entries.get(&name) {
                    Some(child) => Ok(Cow::Borrowed(child)),
                    None => {
                        trace!(key = %name, "Missing key, returning detached placeholder");
                        Ok(Cow::Owned(self.placeholder()))
                    }
                }
            }
        }
    }

    pub fn get_mut(&mut self, key: impl Into<Key>) -> TreeResult<&mut Node> {
        match resolve(key.into(), settings())? {
            Resolved::Recursed(head, tail) => {
                let name = map_key(head)?;
                self.entries
                    .get_mut(&name)
                    .ok_or(TreeError::KeyNotFound(name))?
                    .get_mut(tail)
            }
            Resolved::Single(segment) => {
                let name = map_key(segment)?;
                self.entries.get_mut(&name).ok_or(TreeError::KeyNotFound(name))
            }
        }
    }

    /// Write `value` at `key`.
    ///
    /// Missing intermediate maps are built detached, filled, and attached only once the
    /// nested write succeeded.
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Node>) -> TreeResult<()> {
        let value = value.into();
        match resolve(key.into(), settings())? {
            Resolved::Recursed(head, tail) => {
                let name = map_key(head)?;
                match self.entries.get_mut(&name) {
                    Some(child) => child.set(tail, value),
                    None => {
                        let mut placeholder = self.placeholder();
                        placeholder.set(tail, value)?;
                        debug!(key = %name, "Attaching autovivified map");
                        self.entries.insert(name, placeholder);
                        Ok(())
                    }
                }
            }
            Resolved::Single(segment) => {
                let name = map_key(segment)?;
                let value = adopt(value, self.leaf_type)?;
                self.entries.insert(name, value);
                Ok(())
            }
        }
    }

    pub fn delete(&mut self, key: impl Into<Key>) -> TreeResult<()> {
        match resolve(key.into(), settings())? {
            Resolved::Recursed(head, tail) => {
                let name = map_key(head)?;
                self.entries
                    .get_mut(&name)
                    .ok_or(TreeError::KeyNotFound(name))?
                    .delete(tail)
            }
            Resolved::Single(segment) => {
                let name = map_key(segment)?;
                self.entries
                    .shift_remove(&name)
                    .map(|_| ())
                    .ok_or(TreeError::KeyNotFound(name))
            }
        }
    }

    /// Rename a key in place; the entry keeps its position.
    ///
    /// # Errors
    /// `KeyNotFound` if `old` is absent, `DuplicateKey` if `new` is already taken.
    pub fn rename_key(&mut self, old: impl Into<Key>, new: &str) -> TreeResult<()> {
        match resolve(old.into(), settings())? {
            Resolved::Recursed(head, tail) => {
                let name = map_key(head)?;
                self.entries
                    .get_mut(&name)
                    .ok_or(TreeError::KeyNotFound(name))?
                    .rename_key(tail, new)
            }
            Resolved::Single(segment) => {
                let name = map_key(segment)?;
                let index = self
                    .entries
                    .get_index_of(&name)
                    .ok_or_else(|| TreeError::KeyNotFound(name.clone()))?;
                if name == new {
                    return Ok(());
                }
                if self.entries.contains_key(new) {
                    return Err(TreeError::DuplicateKey(new.to_string()));
                }
                if let Some(value) = self.entries.shift_remove(&name) {
                    self.entries.shift_insert(index, new.to_string(), value);
                }
                Ok(())
            }
        }
    }

    /// Deep merge: nested maps merge, sequences merge positionally, leaves are
    /// overwritten. All or nothing.
    pub fn update(&mut self, other: MapNode) -> TreeResult<()> {
        debug!(keys = other.len(), "Staging merge");
        let mut staged = self.clone();
        staged.merge(other, "")?;
        *self = staged;
        Ok(())
    }

    pub(crate) fn merge(&mut self, other: MapNode, path: &str) -> TreeResult<()> {
        let delimiter = &settings().delimiter;
        for (key, incoming) in other.entries {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}{delimiter}{key}")
            };
            match self.entries.get_mut(&key) {
                Some(existing) => merge_into(existing, incoming, self.leaf_type, &child_path)?,
                None => {
                    let value = adopt(incoming, self.leaf_type)?;
                    self.entries.insert(key, value);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn flatten_into(&self, prefix: &str, delimiter: &str, flat: &mut IndexMap<String, Scalar>) {
        for (key, value) in &self.entries {
            match value {
                Node::Map(map) => map.flatten_into(&format!("{prefix}{key}{delimiter}"), delimiter, flat),
                Node::Seq(seq) => seq.flatten_into(&format!("{prefix}{key}"), delimiter, flat),
                Node::Scalar(scalar) => {
                    flat.insert(format!("{prefix}{key}"), scalar.clone());
                }
                Node::Empty => {}
            }
        }
    }

    pub(crate) fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Scalar>) {
        for value in self.entries.values() {
            value.collect_leaves(leaves);
        }
    }

    /// Find the first node stored under `key`, descending into each container child
    /// before comparing that child's own key.
    pub fn search(&self, key: &str) -> TreeResult<&Node> {
        for (name, value) in &self.entries {
            if value.is_container() {
                if let Ok(found) = value.search(key) {
                    return Ok(found);
                }
            }
            if name == key {
                return Ok(value);
            }
        }
        Err(TreeError::SearchExhausted(key.to_string()))
    }

    pub(crate) fn collect_matches<'a>(&'a self, key: &str, found: &mut Vec<&'a Node>) {
        for (name, value) in &self.entries {
            value.collect_matches(key, found);
            if name == key {
                found.push(value);
            }
        }
    }

    pub fn to_plain(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(key, value)| (key.clone(), value.to_plain()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Node)> for MapNode {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            leaf_type: None,
        }
    }
}
