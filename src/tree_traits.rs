use termtree::Tree;
use tracing::instrument;

use crate::node::Node;

/// Render a node as an indented text tree.
pub trait TreeDisplay {
    fn to_tree_string(&self) -> Tree<String>;
}

fn label(node: &Node) -> String {
    let name = node.variant_name();
    match node.leaf_type() {
        Some(leaf_type) => format!("{name}<{leaf_type}>"),
        None => name.to_string(),
    }
}

fn child(key: String, value: &Node) -> Tree<String> {
    match value {
        Node::Map(_) | Node::Seq(_) => {
            let mut tree = Tree::new(key);
            tree.push(value.to_tree_string());
            tree
        }
        Node::Scalar(scalar) => Tree::new(format!("{key}: {scalar}")),
        Node::Empty => Tree::new(format!("{key}: <empty>")),
    }
}

impl TreeDisplay for Node {
    #[instrument(level = "trace", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        match self {
            Node::Map(map) => {
                let leaves: Vec<_> = map.iter().map(|(key, value)| child(key.clone(), value)).collect();
                Tree::new(label(self)).with_leaves(leaves)
            }
            Node::Seq(seq) => {
                let leaves: Vec<_> = seq
                    .iter()
                    .enumerate()
                    .map(|(i, value)| child(format!("[{i}]"), value))
                    .collect();
                Tree::new(label(self)).with_leaves(leaves)
            }
            Node::Scalar(scalar) => Tree::new(scalar.to_string()),
            Node::Empty => Tree::new("<empty>".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_keys_and_leaves() {
        let tree = Node::new(json!({"a": 1, "l": [2]})).unwrap();
        let rendered = tree.to_tree_string().to_string();
        assert!(rendered.starts_with("map\n"));
        assert!(rendered.contains("a: 1"));
        assert!(rendered.contains("[0]: 2"));
    }
}
