//! Positional container node.
//!
//! Positions and slices address items directly. A name (or a path starting with a
//! name) is broadcast: it is applied to every item and the results are collected into
//! a new sequence.

use std::borrow::Cow;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::settings;
use crate::errors::{TreeError, TreeResult};
use crate::node::{adopt, merge_into, Node};
use crate::path::{resolve, Key, Resolved, Segment, SliceSpec};
use crate::scalar::{LeafType, Scalar};

pub(crate) const VARIANT: &str = "seq";

#[derive(Debug, Clone, Default)]
pub struct SeqNode {
    pub(crate) items: Vec<Node>,
    pub(crate) leaf_type: Option<LeafType>,
}

/// Equality is by content; the leaf-type constraint is not compared.
impl PartialEq for SeqNode {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

/// Whether the key addresses items of this sequence rather than keys of its items.
fn addresses_items(key: &Key) -> bool {
    match key {
        Key::Index(_) | Key::Slice(_) => true,
        Key::Path(segments) => matches!(segments.first(), Some(Segment::Index(_) | Segment::Slice(_))),
        Key::Name(_) => false,
    }
}

impl SeqNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn typed(leaf_type: Option<LeafType>) -> Self {
        Self {
            items: Vec::new(),
            leaf_type,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn leaf_type(&self) -> Option<LeafType> {
        self.leaf_type
    }

    pub(crate) fn set_leaf_type(&mut self, leaf_type: LeafType) {
        self.leaf_type = Some(leaf_type);
    }

    pub fn items(&self) -> &[Node] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Node> {
        self.items.iter_mut()
    }

    fn position(&self, index: isize) -> TreeResult<usize> {
        let len = self.items.len();
        let resolved = if index < 0 { index + len as isize } else { index };
        if resolved < 0 || resolved >= len as isize {
            return Err(TreeError::IndexOutOfRange { index, len });
        }
        Ok(resolved as usize)
    }

    /// The item at `index`; negative indices count from the end.
    pub fn item(&self, index: isize) -> TreeResult<&Node> {
        let position = self.position(index)?;
        Ok(&self.items[position])
    }

    /// A new sequence holding the selected items, under the same constraint.
    pub fn sliced(&self, spec: &SliceSpec) -> TreeResult<SeqNode> {
        let items = spec
            .indices(self.items.len())?
            .into_iter()
            .map(|i| self.items[i].clone())
            .collect();
        Ok(SeqNode {
            items,
            leaf_type: self.leaf_type,
        })
    }

    #[instrument(level = "trace", skip_all)]
    pub fn get(&self, key: impl Into<Key>) -> TreeResult<Cow<'_, Node>> {
        let key = key.into();
        if !addresses_items(&key) {
            return self.broadcast_get(&key);
        }
        let label = key.to_string();
        match resolve(key, settings())? {
            Resolved::Single(Segment::Index(i)) => Ok(Cow::Borrowed(self.item(i)?)),
            Resolved::Single(Segment::Slice(spec)) => Ok(Cow::Owned(Node::Seq(self.sliced(&spec)?))),
            Resolved::Recursed(Segment::Index(i), tail) => self.item(i)?.get(tail),
            Resolved::Recursed(Segment::Slice(spec), tail) => {
                let mut results = SeqNode::new();
                for i in spec.indices(self.items.len())? {
                    results.items.push(self.items[i].get(tail.clone())?.into_owned());
                }
                Ok(Cow::Owned(Node::Seq(results)))
            }
            _ => Err(TreeError::InvalidKey {
                key: label,
                variant: VARIANT,
            }),
        }
    }

    /// Apply `key` to every item. Items that are not containers yield a null scalar.
    fn broadcast_get(&self, key: &Key) -> TreeResult<Cow<'_, Node>> {
        let mut results = SeqNode::new();
        for item in &self.items {
            let value = if item.is_container() {
                item.get(key.clone())?.into_owned()
            } else {
                Node::Scalar(Scalar::Null)
            };
            results.items.push(value);
        }
        Ok(Cow::Owned(Node::Seq(results)))
    }

    /// Mutable access to an existing item or a node below one; names are not broadcast.
    pub fn get_mut(&mut self, key: impl Into<Key>) -> TreeResult<&mut Node> {
        let key = key.into();
        let label = key.to_string();
        match resolve(key, settings())? {
            Resolved::Single(Segment::Index(i)) => {
                let position = self.position(i)?;
                Ok(&mut self.items[position])
            }
            Resolved::Recursed(Segment::Index(i), tail) => {
                let position = self.position(i)?;
                self.items[position].get_mut(tail)
            }
            _ => Err(TreeError::InvalidKey {
                key: label,
                variant: VARIANT,
            }),
        }
    }

    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Node>) -> TreeResult<()> {
        let key = key.into();
        let value = value.into();
        if !addresses_items(&key) {
            return self.broadcast_set(key, value);
        }
        let label = key.to_string();
        match resolve(key, settings())? {
            Resolved::Single(Segment::Index(i)) => {
                let position = self.position(i)?;
                self.items[position] = adopt(value, self.leaf_type)?;
                Ok(())
            }
            Resolved::Single(Segment::Slice(spec)) => self.assign_slice(&spec, value),
            Resolved::Recursed(Segment::Index(i), tail) => {
                let position = self.position(i)?;
                self.items[position].set(tail, value)
            }
            Resolved::Recursed(Segment::Slice(spec), tail) => {
                let selected = spec.indices(self.items.len())?;
                let mut staged = Vec::with_capacity(selected.len());
                for &i in &selected {
                    let mut item = self.items[i].clone();
                    item.set(tail.clone(), value.clone())?;
                    staged.push(item);
                }
                for (i, item) in selected.into_iter().zip(staged) {
                    self.items[i] = item;
                }
                Ok(())
            }
            _ => Err(TreeError::InvalidKey {
                key: label,
                variant: VARIANT,
            }),
        }
    }

    /// Write `key` into every item. Staged on copies and committed only if every item
    /// accepted the write.
    fn broadcast_set(&mut self, key: Key, value: Node) -> TreeResult<()> {
        let mut staged = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !item.is_container() {
                return Err(TreeError::InvalidBroadcastKey {
                    key: key.to_string(),
                    reason: format!("cannot set a key on a {} item", item.variant_name()),
                });
            }
            let mut item = item.clone();
            item.set(key.clone(), value.clone())?;
            staged.push(item);
        }
        debug!(key = %key, items = staged.len(), "Committing broadcast write");
        self.items = staged;
        Ok(())
    }

    /// Slice assignment. A contiguous slice is spliced and may change the length; an
    /// extended slice needs exactly as many values as it selects.
    fn assign_slice(&mut self, spec: &SliceSpec, value: Node) -> TreeResult<()> {
        let incoming = match value {
            Node::Seq(seq) => seq.items,
            other => {
                return Err(TreeError::InvalidArgument(format!(
                    "can only assign a sequence to a slice, got a {}",
                    other.variant_name()
                )))
            }
        };
        let incoming = incoming
            .into_iter()
            .map(|item| adopt(item, self.leaf_type))
            .collect::<TreeResult<Vec<_>>>()?;
        let selected = spec.indices(self.items.len())?;

        if spec.step.unwrap_or(1) == 1 {
            let len = self.items.len() as isize;
            let start = match selected.first() {
                Some(&first) => first,
                None => spec
                    .start
                    .map(|b| if b < 0 { b + len } else { b })
                    .unwrap_or(0)
                    .clamp(0, len) as usize,
            };
            let end = start + selected.len();
            self.items.splice(start..end, incoming);
            return Ok(());
        }

        if selected.len() != incoming.len() {
            return Err(TreeError::ShapeMismatch {
                path: format!("[{}]", spec),
                reason: format!(
                    "attempt to assign sequence of size {} to extended slice of size {}",
                    incoming.len(),
                    selected.len()
                ),
            });
        }
        for (i, item) in selected.into_iter().zip(incoming) {
            self.items[i] = item;
        }
        Ok(())
    }

    pub fn delete(&mut self, key: impl Into<Key>) -> TreeResult<()> {
        let key = key.into();
        if !addresses_items(&key) {
            return self.broadcast_delete(key);
        }
        let label = key.to_string();
        match resolve(key, settings())? {
            Resolved::Single(Segment::Index(i)) => {
                let position = self.position(i)?;
                self.items.remove(position);
                Ok(())
            }
            Resolved::Single(Segment::Slice(spec)) => {
                let mut selected = spec.indices(self.items.len())?;
                selected.sort_unstable();
                selected.dedup();
                for i in selected.into_iter().rev() {
                    self.items.remove(i);
                }
                Ok(())
            }
            Resolved::Recursed(Segment::Index(i), tail) => {
                let position = self.position(i)?;
                self.items[position].delete(tail)
            }
            Resolved::Recursed(Segment::Slice(spec), tail) => {
                let selected = spec.indices(self.items.len())?;
                let mut staged = Vec::with_capacity(selected.len());
                for &i in &selected {
                    let mut item = self.items[i].clone();
                    item.delete(tail.clone())?;
                    staged.push(item);
                }
                for (i, item) in selected.into_iter().zip(staged) {
                    self.items[i] = item;
                }
                Ok(())
            }
            _ => Err(TreeError::InvalidKey {
                key: label,
                variant: VARIANT,
            }),
        }
    }

    fn broadcast_delete(&mut self, key: Key) -> TreeResult<()> {
        let mut staged = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !item.is_container() {
                return Err(TreeError::InvalidBroadcastKey {
                    key: key.to_string(),
                    reason: format!("cannot delete a key from a {} item", item.variant_name()),
                });
            }
            let mut item = item.clone();
            item.delete(key.clone())?;
            staged.push(item);
        }
        self.items = staged;
        Ok(())
    }

    /// Rename a key below the item addressed by the head of `old`.
    pub fn rename_key(&mut self, old: impl Into<Key>, new: &str) -> TreeResult<()> {
        let key = old.into();
        let label = key.to_string();
        match resolve(key, settings())? {
            Resolved::Recursed(Segment::Index(i), tail) => {
                let position = self.position(i)?;
                self.items[position].rename_key(tail, new)
            }
            _ => Err(TreeError::InvalidKey {
                key: label,
                variant: VARIANT,
            }),
        }
    }

    /// Append after validating against the leaf-type constraint.
    pub fn append(&mut self, value: impl Into<Node>) -> TreeResult<()> {
        let value = adopt(value.into(), self.leaf_type)?;
        self.items.push(value);
        Ok(())
    }

    /// Insert before `index`. Out-of-range indices clamp to the ends.
    pub fn insert(&mut self, index: isize, value: impl Into<Node>) -> TreeResult<()> {
        let value = adopt(value.into(), self.leaf_type)?;
        let len = self.items.len() as isize;
        let position = (if index < 0 { index + len } else { index }).clamp(0, len) as usize;
        self.items.insert(position, value);
        Ok(())
    }

    /// Positional deep merge with a sequence of the same length. All or nothing.
    pub fn update(&mut self, other: SeqNode) -> TreeResult<()> {
        let mut staged = self.clone();
        staged.merge(other, "")?;
        *self = staged;
        Ok(())
    }

    pub(crate) fn merge(&mut self, other: SeqNode, path: &str) -> TreeResult<()> {
        if self.items.len() != other.items.len() {
            return Err(TreeError::ShapeMismatch {
                path: path.to_string(),
                reason: format!(
                    "cannot update a sequence of length {} with one of length {}",
                    self.items.len(),
                    other.items.len()
                ),
            });
        }
        let leaf_type = self.leaf_type;
        for (i, (slot, incoming)) in self.items.iter_mut().zip(other.items).enumerate() {
            merge_into(slot, incoming, leaf_type, &format!("{path}[{i}]"))?;
        }
        Ok(())
    }

    pub(crate) fn flatten_into(&self, prefix: &str, delimiter: &str, flat: &mut IndexMap<String, Scalar>) {
        for (i, value) in self.items.iter().enumerate() {
            let key = format!("{prefix}[{i}]");
            match value {
                Node::Map(map) => map.flatten_into(&format!("{key}{delimiter}"), delimiter, flat),
                Node::Seq(seq) => seq.flatten_into(&key, delimiter, flat),
                Node::Scalar(scalar) => {
                    flat.insert(key, scalar.clone());
                }
                Node::Empty => {}
            }
        }
    }

    pub(crate) fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Scalar>) {
        for value in &self.items {
            value.collect_leaves(leaves);
        }
    }

    pub fn search(&self, key: &str) -> TreeResult<&Node> {
        self.items
            .iter()
            .filter(|item| item.is_container())
            .find_map(|item| item.search(key).ok())
            .ok_or_else(|| TreeError::SearchExhausted(key.to_string()))
    }

    pub(crate) fn collect_matches<'a>(&'a self, key: &str, found: &mut Vec<&'a Node>) {
        for item in &self.items {
            item.collect_matches(key, found);
        }
    }

    pub fn to_plain(&self) -> Value {
        Value::Array(self.items.iter().map(Node::to_plain).collect())
    }
}

impl FromIterator<Node> for SeqNode {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            leaf_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seq(value: Value) -> SeqNode {
        match Node::new(value).unwrap() {
            Node::Seq(seq) => seq,
            other => panic!("expected seq, got {:?}", other),
        }
    }

    #[test]
    fn negative_index_counts_from_end() {
        let s = seq(json!([1, 2, 3]));
        assert_eq!(s.get(-1).unwrap().as_i64(), Some(3));
        assert_eq!(
            s.get(3).unwrap_err(),
            TreeError::IndexOutOfRange { index: 3, len: 3 }
        );
    }

    #[test]
    fn name_key_broadcasts_over_items() {
        let s = seq(json!([{"a": 1}, {"a": 2}, 7]));
        let values = s.get("a").unwrap();
        assert_eq!(values.to_plain(), json!([1, 2, null]));
    }

    #[test]
    fn broadcast_set_is_all_or_nothing() {
        let mut s = seq(json!([{"a": 1}, 5]));
        let err = s.set("a", 2).unwrap_err();
        assert!(matches!(err, TreeError::InvalidBroadcastKey { .. }));
        assert_eq!(s.to_plain(), json!([{"a": 1}, 5]));
    }

    #[test]
    fn contiguous_slice_assignment_splices() {
        let mut s = seq(json!([1, 2, 3, 4]));
        s.set(SliceSpec::new(Some(1), Some(3)), Node::from(vec![Node::from(9)])).unwrap();
        assert_eq!(s.to_plain(), json!([1, 9, 4]));
        s.set(SliceSpec::new(Some(1), Some(1)), Node::from(vec![Node::from(7)])).unwrap();
        assert_eq!(s.to_plain(), json!([1, 7, 9, 4]));
    }

    #[test]
    fn extended_slice_assignment_needs_matching_length() {
        let mut s = seq(json!([1, 2, 3, 4]));
        let spec = SliceSpec::all().with_step(2);
        let err = s.set(spec, Node::from(vec![Node::from(0)])).unwrap_err();
        assert!(matches!(err, TreeError::ShapeMismatch { .. }));
        s.set(spec, Node::from(vec![Node::from(0), Node::from(0)])).unwrap();
        assert_eq!(s.to_plain(), json!([0, 2, 0, 4]));
    }

    #[test]
    fn slice_delete_removes_selection() {
        let mut s = seq(json!([0, 1, 2, 3, 4]));
        s.delete(SliceSpec::all().with_step(2)).unwrap();
        assert_eq!(s.to_plain(), json!([1, 3]));
    }

    #[test]
    fn insert_clamps_like_a_list() {
        let mut s = seq(json!([1, 2]));
        s.insert(100, 3).unwrap();
        s.insert(-100, 0).unwrap();
        assert_eq!(s.to_plain(), json!([0, 1, 2, 3]));
    }

    #[test]
    fn typed_append_rejects_wrong_type() {
        let mut s = SeqNode::typed(Some(LeafType::Int));
        s.append(1).unwrap();
        assert!(matches!(
            s.append("x"),
            Err(TreeError::TypeConstraintViolation { .. })
        ));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn update_requires_equal_length() {
        let mut s = seq(json!([1, 2]));
        let err = s.update(seq(json!([1]))).unwrap_err();
        assert!(matches!(err, TreeError::ShapeMismatch { .. }));
        s.update(seq(json!([5, 6]))).unwrap();
        assert_eq!(s.to_plain(), json!([5, 6]));
    }
}
