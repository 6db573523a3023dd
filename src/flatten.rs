//! Flattening a tree into delimited-key/leaf pairs, and rebuilding a tree from them.
//!
//! Keys are joined with the configured delimiter; sequence positions are written as
//! `[i]` suffixes, e.g. `l[0][1].b`.

use indexmap::IndexMap;
use tracing::instrument;

use crate::config::settings;
use crate::errors::{TreeError, TreeResult};
use crate::map::MapNode;
use crate::node::Node;
use crate::path::{parse_flat_key, Segment};
use crate::scalar::Scalar;
use crate::seq::SeqNode;

/// Flattened view of a tree, in iteration order.
pub type Flat = IndexMap<String, Scalar>;

impl Node {
    /// Flatten with the configured delimiter.
    pub fn flattened(&self) -> Flat {
        self.flattened_with("", &settings().delimiter)
    }

    /// Flatten below `prefix`. Empty nodes contribute nothing; a scalar root is stored
    /// under the prefix itself.
    pub fn flattened_with(&self, prefix: &str, delimiter: &str) -> Flat {
        let mut flat = Flat::new();
        match self {
            Node::Map(map) => {
                let prefix = if prefix.is_empty() {
                    String::new()
                } else {
                    format!("{prefix}{delimiter}")
                };
                map.flatten_into(&prefix, delimiter, &mut flat);
            }
            Node::Seq(seq) => seq.flatten_into(prefix, delimiter, &mut flat),
            Node::Scalar(scalar) => {
                flat.insert(prefix.to_string(), scalar.clone());
            }
            Node::Empty => {}
        }
        flat
    }
}

/// Rebuild a tree from a flattened view using the configured delimiter.
pub fn unflatten(flat: &Flat) -> TreeResult<Node> {
    unflatten_with(flat, &settings().delimiter)
}

/// Rebuild a tree from a flattened view.
///
/// The root is a sequence if the first key starts with a position, a map otherwise.
/// Positions must be filled in order.
///
/// # Errors
/// Returns `ShapeMismatch` if keys disagree on the shape or skip a position.
#[instrument(level = "debug", skip(flat), fields(entries = flat.len()))]
pub fn unflatten_with(flat: &Flat, delimiter: &str) -> TreeResult<Node> {
    let mut root: Option<Node> = None;
    for (key, value) in flat {
        let segments = parse_flat_key(key, delimiter)?;
        let node = root.get_or_insert_with(|| container_for(&segments[0]));
        place(node, &segments, value.clone(), key)?;
    }
    Ok(root.unwrap_or_else(Node::new_map))
}

fn container_for(segment: &Segment) -> Node {
    match segment {
        Segment::Index(_) => Node::Seq(SeqNode::new()),
        _ => Node::Map(MapNode::new()),
    }
}

fn place(node: &mut Node, segments: &[Segment], value: Scalar, key: &str) -> TreeResult<()> {
    let Some((head, rest)) = segments.split_first() else {
        return Err(TreeError::InvalidArgument(format!("empty flattened key '{key}'")));
    };
    match (node, head) {
        (Node::Map(map), Segment::Name(name)) => match rest.first() {
            None => {
                map.entries.insert(name.clone(), Node::Scalar(value));
                Ok(())
            }
            Some(next) => {
                let child = map
                    .entries
                    .entry(name.clone())
                    .or_insert_with(|| container_for(next));
                place(child, rest, value, key)
            }
        },
        (Node::Seq(seq), Segment::Index(i)) => {
            let position = *i as usize;
            let len = seq.items.len();
            if *i < 0 || position > len {
                return Err(TreeError::ShapeMismatch {
                    path: key.to_string(),
                    reason: format!("position {i} skips ahead of sequence length {len}"),
                });
            }
            match rest.first() {
                None if position == len => seq.items.push(Node::Scalar(value)),
                None => seq.items[position] = Node::Scalar(value),
                Some(next) => {
                    if position == len {
                        seq.items.push(container_for(next));
                    }
                    return place(&mut seq.items[position], rest, value, key);
                }
            }
            Ok(())
        }
        (node, head) => Err(TreeError::ShapeMismatch {
            path: key.to_string(),
            reason: format!("a {} cannot hold segment {head}", node.variant_name()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_sequences_use_bracket_suffixes() {
        let tree = Node::new(json!({"a": {"l": [[1, 2], {"b": 3}]}})).unwrap();
        let flat = tree.flattened();
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a.l[0][0]", "a.l[0][1]", "a.l[1].b"]);
    }

    #[test]
    fn unflatten_restores_mixed_tree() {
        let tree = Node::new(json!({"a": [{"b": 1}, [2, 3]], "c": "x"})).unwrap();
        assert_eq!(unflatten(&tree.flattened()).unwrap(), tree);
    }

    #[test]
    fn unflatten_rejects_skipped_position() {
        let mut flat = Flat::new();
        flat.insert("l[1]".to_string(), Scalar::Int(1));
        assert!(matches!(unflatten(&flat), Err(TreeError::ShapeMismatch { .. })));
    }

    #[test]
    fn unflatten_of_sequence_root() {
        let tree = Node::new(json!([{"d": 1}, 2])).unwrap();
        assert_eq!(unflatten(&tree.flattened()).unwrap(), tree);
    }
}
