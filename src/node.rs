//! The recursive tree node: a closed enum over maps, sequences, scalars and the
//! empty node.
//!
//! Reads (`get`) never mutate: a missing map key yields a detached, empty placeholder.
//! Writes (`set`, or the chained [`Cursor`]) resolve existing children, build any missing
//! intermediate maps detached from the tree, perform the write, and only then attach
//! the new chain. A failed write therefore leaves the tree as it was.

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;
use tracing::instrument;

use crate::cursor::Cursor;
use crate::errors::{TreeError, TreeResult};
use crate::map::MapNode;
use crate::path::Key;
use crate::scalar::{LeafType, Scalar};
use crate::seq::SeqNode;

/// A tree node. The variant is fixed at construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    Map(MapNode),
    Seq(SeqNode),
    Scalar(Scalar),
    /// Constructed from no data; has no children and no type
    #[default]
    Empty,
}

impl Node {
    /// Construct a tree from a plain value.
    ///
    /// `null` yields [`Node::Empty`], objects a map and arrays a sequence.
    ///
    /// # Errors
    /// Returns `UnsupportedConstructorInput` for any other value.
    pub fn new(value: Value) -> TreeResult<Self> {
        match value {
            Value::Null => Ok(Node::Empty),
            Value::Object(_) | Value::Array(_) => Ok(Node::from(value)),
            other => Err(TreeError::UnsupportedConstructorInput(other.to_string())),
        }
    }

    /// Construct a typed tree; every scalar in `value` must satisfy `leaf_type`.
    ///
    /// # Errors
    /// Returns `UnsupportedConstructorInput` for non-container input and
    /// `TypeConstraintViolation` for the first scalar that does not fit.
    pub fn with_leaf_type(value: Value, leaf_type: LeafType) -> TreeResult<Self> {
        let mut node = Self::new(value)?;
        node.inherit(leaf_type)?;
        Ok(node)
    }

    /// An empty, untyped map.
    pub fn new_map() -> Self {
        Node::Map(MapNode::new())
    }

    /// An empty, untyped sequence.
    pub fn new_seq() -> Self {
        Node::Seq(SeqNode::new())
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Node::Map(_) => "map",
            Node::Seq(_) => "seq",
            Node::Scalar(_) => "scalar",
            Node::Empty => "empty",
        }
    }

    /// Maps and sequences are containers; everything else is a leaf by default.
    pub fn is_container(&self) -> bool {
        matches!(self, Node::Map(_) | Node::Seq(_))
    }

    pub fn is_empty_node(&self) -> bool {
        matches!(self, Node::Empty)
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapNode> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&SeqNode> {
        match self {
            Node::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_seq_mut(&mut self) -> Option<&mut SeqNode> {
        match self {
            Node::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(Scalar::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().and_then(Scalar::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    /// Number of direct children; zero for leaves.
    pub fn len(&self) -> usize {
        match self {
            Node::Map(map) => map.len(),
            Node::Seq(seq) => seq.len(),
            Node::Scalar(_) | Node::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn leaf_type(&self) -> Option<LeafType> {
        match self {
            Node::Map(map) => map.leaf_type(),
            Node::Seq(seq) => seq.leaf_type(),
            Node::Scalar(_) | Node::Empty => None,
        }
    }

    /// Override the leaf-type constraint of a container.
    ///
    /// Existing values are not revalidated; the constraint applies to later writes and
    /// to children created from here on.
    pub fn set_leaf_type(&mut self, leaf_type: LeafType) -> TreeResult<()> {
        match self {
            Node::Map(map) => {
                map.set_leaf_type(leaf_type);
                Ok(())
            }
            Node::Seq(seq) => {
                seq.set_leaf_type(leaf_type);
                Ok(())
            }
            other => Err(TreeError::InvalidArgument(format!(
                "a {} node carries no leaf type",
                other.variant_name()
            ))),
        }
    }

    /// Read the node addressed by `key`.
    ///
    /// Existing nodes are borrowed; placeholders for missing map keys, slices and
    /// broadcast results are returned owned.
    pub fn get(&self, key: impl Into<Key>) -> TreeResult<Cow<'_, Node>> {
        match self {
            Node::Map(map) => map.get(key),
            Node::Seq(seq) => seq.get(key),
            other => Err(other.not_a_container(key.into())),
        }
    }

    /// Mutable access to an existing node; nothing is created.
    pub fn get_mut(&mut self, key: impl Into<Key>) -> TreeResult<&mut Node> {
        match self {
            Node::Map(map) => map.get_mut(key),
            Node::Seq(seq) => seq.get_mut(key),
            other => Err(other.not_a_container(key.into())),
        }
    }

    /// Write `value` at `key`, creating missing intermediate maps.
    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Node>) -> TreeResult<()> {
        match self {
            Node::Map(map) => map.set(key, value),
            Node::Seq(seq) => seq.set(key, value),
            other => Err(other.not_a_container(key.into())),
        }
    }

    pub fn delete(&mut self, key: impl Into<Key>) -> TreeResult<()> {
        match self {
            Node::Map(map) => map.delete(key),
            Node::Seq(seq) => seq.delete(key),
            other => Err(other.not_a_container(key.into())),
        }
    }

    /// Rename the key addressed by `old` to `new`, keeping its position.
    pub fn rename_key(&mut self, old: impl Into<Key>, new: &str) -> TreeResult<()> {
        match self {
            Node::Map(map) => map.rename_key(old, new),
            Node::Seq(seq) => seq.rename_key(old, new),
            other => Err(other.not_a_container(old.into())),
        }
    }

    /// Start a pending path below this node; see [`Cursor`].
    pub fn at(&mut self, key: impl Into<Key>) -> Cursor<'_> {
        Cursor::new(self).at(key)
    }

    /// Deep-merge a congruent container into this one.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if the variants differ.
    pub fn update(&mut self, other: impl Into<Node>) -> TreeResult<()> {
        match (self, other.into()) {
            (Node::Map(map), Node::Map(other)) => map.update(other),
            (Node::Seq(seq), Node::Seq(other)) => seq.update(other),
            (this, other) => Err(TreeError::ShapeMismatch {
                path: String::new(),
                reason: format!("cannot update a {} with a {}", this.variant_name(), other.variant_name()),
            }),
        }
    }

    /// Every scalar reachable from this node, in iteration order.
    pub fn leafs(&self) -> Vec<&Scalar> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    pub(crate) fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Scalar>) {
        match self {
            Node::Map(map) => map.collect_leaves(leaves),
            Node::Seq(seq) => seq.collect_leaves(leaves),
            Node::Scalar(scalar) => leaves.push(scalar),
            Node::Empty => {}
        }
    }

    /// Depth-first, child-first search for `key` (see [`MapNode::search`]).
    ///
    /// # Errors
    /// Returns `SearchExhausted` if no map below this node holds `key`.
    #[instrument(level = "trace", skip(self))]
    pub fn search(&self, key: &str) -> TreeResult<&Node> {
        match self {
            Node::Map(map) => map.search(key),
            Node::Seq(seq) => seq.search(key),
            Node::Scalar(_) | Node::Empty => Err(TreeError::SearchExhausted(key.to_string())),
        }
    }

    /// Every match for `key`, in the order [`Node::search`] would visit them.
    pub fn search_all(&self, key: &str) -> Vec<&Node> {
        let mut found = Vec::new();
        self.collect_matches(key, &mut found);
        found
    }

    pub(crate) fn collect_matches<'a>(&'a self, key: &str, found: &mut Vec<&'a Node>) {
        match self {
            Node::Map(map) => map.collect_matches(key, found),
            Node::Seq(seq) => seq.collect_matches(key, found),
            Node::Scalar(_) | Node::Empty => {}
        }
    }

    /// Convert back into plain nested values; `Empty` becomes `null`.
    pub fn to_plain(&self) -> Value {
        match self {
            Node::Map(map) => map.to_plain(),
            Node::Seq(seq) => seq.to_plain(),
            Node::Scalar(scalar) => scalar.to_plain(),
            Node::Empty => Value::Null,
        }
    }

    /// Put an untyped subtree under `leaf_type`, validating its scalars.
    ///
    /// Containers with a constraint of their own keep it.
    pub(crate) fn inherit(&mut self, leaf_type: LeafType) -> TreeResult<()> {
        match self {
            Node::Scalar(scalar) => scalar.check(Some(leaf_type)),
            Node::Map(map) if map.leaf_type().is_none() => {
                map.set_leaf_type(leaf_type);
                map.iter_mut().try_for_each(|(_, child)| child.inherit(leaf_type))
            }
            Node::Seq(seq) if seq.leaf_type().is_none() => {
                seq.set_leaf_type(leaf_type);
                seq.iter_mut().try_for_each(|child| child.inherit(leaf_type))
            }
            _ => Ok(()),
        }
    }

    fn not_a_container(&self, key: Key) -> TreeError {
        TreeError::NotAContainer {
            key: key.to_string(),
            variant: self.variant_name(),
        }
    }
}

/// Validate a value about to be stored under a container with `leaf_type`.
pub(crate) fn adopt(value: Node, leaf_type: Option<LeafType>) -> TreeResult<Node> {
    let mut value = value;
    if let Some(leaf_type) = leaf_type {
        value.inherit(leaf_type)?;
    }
    Ok(value)
}

/// Merge `incoming` into the existing slot: containers merge recursively, anything
/// else is overwritten.
pub(crate) fn merge_into(
    slot: &mut Node,
    incoming: Node,
    leaf_type: Option<LeafType>,
    path: &str,
) -> TreeResult<()> {
    match (slot, incoming) {
        (Node::Map(map), Node::Map(other)) => map.merge(other, path),
        (Node::Seq(seq), Node::Seq(other)) => seq.merge(other, path),
        (slot, other) if slot.is_container() => Err(TreeError::ShapeMismatch {
            path: path.to_string(),
            reason: format!("cannot merge a {} into a {}", other.variant_name(), slot.variant_name()),
        }),
        (slot, other) => {
            *slot = adopt(other, leaf_type)?;
            Ok(())
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain())
    }
}

/// Child conversion: never fails, `null` becomes a null scalar.
impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(entries) => {
                let mut map = MapNode::new();
                for (key, child) in entries {
                    map.insert_raw(key, Node::from(child));
                }
                Node::Map(map)
            }
            Value::Array(items) => Node::Seq(items.into_iter().map(Node::from).collect()),
            Value::String(s) => Node::Scalar(Scalar::Str(s)),
            other => Node::Scalar(Scalar::from_plain(&other).unwrap_or(Scalar::Null)),
        }
    }
}

impl From<Scalar> for Node {
    fn from(scalar: Scalar) -> Self {
        Node::Scalar(scalar)
    }
}

impl From<MapNode> for Node {
    fn from(map: MapNode) -> Self {
        Node::Map(map)
    }
}

impl From<SeqNode> for Node {
    fn from(seq: SeqNode) -> Self {
        Node::Seq(seq)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::Seq(items.into_iter().collect())
    }
}

macro_rules! node_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Node::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

node_from_scalar!(bool, i64, i32, u32, f64, f32, String, &str);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constructor_picks_variant_from_plain_value() {
        assert_eq!(Node::new(Value::Null).unwrap(), Node::Empty);
        assert!(matches!(Node::new(json!({"a": 1})).unwrap(), Node::Map(_)));
        assert!(matches!(Node::new(json!([1, 2])).unwrap(), Node::Seq(_)));
    }

    #[test]
    fn constructor_rejects_scalars() {
        let err = Node::new(json!(5)).unwrap_err();
        assert!(matches!(err, TreeError::UnsupportedConstructorInput(_)));
    }

    #[test]
    fn typed_constructor_validates_every_leaf() {
        assert!(Node::with_leaf_type(json!({"a": 1, "b": {"c": 5}}), LeafType::Int).is_ok());
        let err = Node::with_leaf_type(json!({"a": 1, "b": ["x"]}), LeafType::Int).unwrap_err();
        assert!(matches!(err, TreeError::TypeConstraintViolation { .. }));
    }

    #[test]
    fn typed_constructor_propagates_leaf_type_to_children() {
        let node = Node::with_leaf_type(json!({"b": {"c": [5]}}), LeafType::Int).unwrap();
        assert_eq!(node.get("b").unwrap().leaf_type(), Some(LeafType::Int));
        assert_eq!(node.get("b.c").unwrap().leaf_type(), Some(LeafType::Int));
    }

    #[test]
    fn empty_node_is_inert() {
        let mut empty = Node::Empty;
        assert!(matches!(empty.get("a"), Err(TreeError::NotAContainer { .. })));
        assert!(matches!(empty.set("a", 1), Err(TreeError::NotAContainer { .. })));
        assert!(empty.leafs().is_empty());
        assert_eq!(empty.leaf_type(), None);
        assert_eq!(empty.to_plain(), Value::Null);
    }

    #[test]
    fn adopt_keeps_explicit_child_constraint() {
        let child = Node::with_leaf_type(json!({"s": "x"}), LeafType::Str).unwrap();
        let adopted = adopt(child, Some(LeafType::Int)).unwrap();
        assert_eq!(adopted.leaf_type(), Some(LeafType::Str));
    }

    #[test]
    fn update_rejects_mismatched_variants() {
        let mut node = Node::new(json!({"a": 1})).unwrap();
        let err = node.update(Node::new(json!([1])).unwrap()).unwrap_err();
        assert!(matches!(err, TreeError::ShapeMismatch { .. }));
    }
}
