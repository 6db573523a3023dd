//! Batch operations over one or more congruent trees.
//!
//! Trees are congruent when they have the same variant at every node, equal sequence
//! lengths and equal map key sets. Results always have the shape of the first tree;
//! map keys are visited in its order.

use itertools::Itertools;
use tracing::{instrument, trace};

use crate::config::settings;
use crate::errors::{TreeError, TreeResult};
use crate::map::MapNode;
use crate::node::{adopt, Node};
use crate::path::{render_path, Segment, SliceSpec};
use crate::scalar::Scalar;
use crate::seq::SeqNode;

/// Decides whether a node is a leaf, overriding the default "not a container" rule.
pub type LeafRule<'r> = &'r dyn Fn(&Node) -> bool;

fn rendered(path: &[Segment]) -> String {
    render_path(path, &settings().delimiter)
}

fn shape_mismatch(path: &[Segment], reason: String) -> TreeError {
    TreeError::ShapeMismatch {
        path: rendered(path),
        reason,
    }
}

fn seq_columns<'n>(trees: &[&'n Node], path: &[Segment]) -> TreeResult<Vec<&'n SeqNode>> {
    let seqs = trees
        .iter()
        .map(|tree| match *tree {
            Node::Seq(seq) => Ok(seq),
            other => Err(shape_mismatch(
                path,
                format!("expected a seq, found a {}", other.variant_name()),
            )),
        })
        .collect::<TreeResult<Vec<_>>>()?;
    if !seqs.iter().map(|seq| seq.len()).all_equal() {
        let lengths = seqs.iter().map(|seq| seq.len()).join(", ");
        return Err(shape_mismatch(path, format!("sequence lengths differ: {lengths}")));
    }
    Ok(seqs)
}

fn map_columns<'n>(trees: &[&'n Node], path: &[Segment]) -> TreeResult<Vec<&'n MapNode>> {
    let maps = trees
        .iter()
        .map(|tree| match *tree {
            Node::Map(map) => Ok(map),
            other => Err(shape_mismatch(
                path,
                format!("expected a map, found a {}", other.variant_name()),
            )),
        })
        .collect::<TreeResult<Vec<_>>>()?;
    let first = maps[0];
    for map in &maps[1..] {
        if map.len() != first.len() || !first.keys().all(|key| map.contains_key(key)) {
            return Err(shape_mismatch(
                path,
                format!(
                    "key sets differ: [{}] vs [{}]",
                    first.keys().join(", "),
                    map.keys().join(", ")
                ),
            ));
        }
    }
    Ok(maps)
}

fn leaf_columns(trees: &[&Node], path: &[Segment]) -> TreeResult<()> {
    match trees.iter().find(|tree| tree.is_container()) {
        Some(container) => Err(shape_mismatch(
            path,
            format!("expected a leaf, found a {}", container.variant_name()),
        )),
        None => Ok(()),
    }
}

fn column<'n>(seqs: &[&'n SeqNode], i: usize) -> Vec<&'n Node> {
    seqs.iter().map(|seq| &seq.items[i]).collect()
}

fn map_column<'n>(maps: &[&'n MapNode], key: &str) -> Vec<&'n Node> {
    maps.iter().filter_map(|map| map.entry(key)).collect()
}

/// Apply `op` to corresponding leaves of congruent trees.
///
/// `op` receives the n leaves at one position; the result tree has the shape of the
/// first tree with `op`'s outputs as leaves.
pub fn apply<F>(mut op: F, trees: &[&Node]) -> TreeResult<Node>
where
    F: FnMut(&[&Node]) -> TreeResult<Node>,
{
    apply_with(|leaves, _path| op(leaves), trees, None)
}

/// Like [`apply`], but `op` also receives the path of the leaves, and an optional
/// leaf rule decides where recursion stops.
///
/// # Errors
/// `ShapeMismatch` if the trees are not congruent, `LeafRuleMismatch` if the rule
/// rejects a node that is not a container, and whatever `op` returns.
#[instrument(level = "debug", skip_all, fields(trees = trees.len()))]
pub fn apply_with<F>(mut op: F, trees: &[&Node], is_leaf: Option<LeafRule<'_>>) -> TreeResult<Node>
where
    F: FnMut(&[&Node], &[Segment]) -> TreeResult<Node>,
{
    if trees.is_empty() {
        return Err(TreeError::InvalidArgument("apply needs at least one tree".to_string()));
    }
    let mut path = Vec::new();
    apply_node(&mut op, trees, is_leaf, &mut path)
}

fn apply_node<F>(
    op: &mut F,
    trees: &[&Node],
    is_leaf: Option<LeafRule<'_>>,
    path: &mut Vec<Segment>,
) -> TreeResult<Node>
where
    F: FnMut(&[&Node], &[Segment]) -> TreeResult<Node>,
{
    let first = trees[0];
    if is_leaf.is_some_and(|rule| rule(first)) {
        return op(trees, &path[..]);
    }
    match first {
        Node::Seq(_) => {
            let seqs = seq_columns(trees, path)?;
            let mut result = SeqNode::new();
            for i in 0..seqs[0].len() {
                path.push(Segment::Index(i as isize));
                let value = apply_node(op, &column(&seqs, i), is_leaf, path);
                path.pop();
                result.items.push(value?);
            }
            Ok(Node::Seq(result))
        }
        Node::Map(_) => {
            let maps = map_columns(trees, path)?;
            let mut result = MapNode::new();
            for key in maps[0].keys() {
                path.push(Segment::Name(key.clone()));
                let value = apply_node(op, &map_column(&maps, key), is_leaf, path);
                path.pop();
                result.insert_raw(key.clone(), value?);
            }
            Ok(Node::Map(result))
        }
        _ if is_leaf.is_none() => {
            leaf_columns(trees, path)?;
            trace!(path = %rendered(path), "Applying to leaves");
            op(trees, &path[..])
        }
        _ => Err(TreeError::LeafRuleMismatch { path: rendered(path) }),
    }
}

/// Call `op` on every leaf with its path, in iteration order.
pub fn foreach<F>(mut op: F, tree: &Node)
where
    F: FnMut(&Node, &[Segment]),
{
    let mut path = Vec::new();
    foreach_node(&mut op, tree, &mut path);
}

fn foreach_node<F>(op: &mut F, node: &Node, path: &mut Vec<Segment>)
where
    F: FnMut(&Node, &[Segment]),
{
    match node {
        Node::Seq(seq) => {
            for (i, item) in seq.iter().enumerate() {
                path.push(Segment::Index(i as isize));
                foreach_node(op, item, path);
                path.pop();
            }
        }
        Node::Map(map) => {
            for (key, value) in map.iter() {
                path.push(Segment::Name(key.clone()));
                foreach_node(op, value, path);
                path.pop();
            }
        }
        leaf => op(leaf, &path[..]),
    }
}

/// Like [`foreach`], with mutable access to each leaf.
///
/// Writes through this bypass the leaf-type constraint of the enclosing containers.
pub fn foreach_mut<F>(mut op: F, tree: &mut Node)
where
    F: FnMut(&mut Node, &[Segment]),
{
    let mut path = Vec::new();
    foreach_node_mut(&mut op, tree, &mut path);
}

fn foreach_node_mut<F>(op: &mut F, node: &mut Node, path: &mut Vec<Segment>)
where
    F: FnMut(&mut Node, &[Segment]),
{
    match node {
        Node::Seq(seq) => {
            for (i, item) in seq.iter_mut().enumerate() {
                path.push(Segment::Index(i as isize));
                foreach_node_mut(op, item, path);
                path.pop();
            }
        }
        Node::Map(map) => {
            for (key, value) in map.iter_mut() {
                path.push(Segment::Name(key.clone()));
                foreach_node_mut(op, value, path);
                path.pop();
            }
        }
        leaf => op(leaf, &path[..]),
    }
}

/// Combine corresponding leaves of congruent trees into one tree.
///
/// # Errors
/// `InvalidArgument` for an empty input, `ShapeMismatch` if the trees are not
/// congruent, and whatever `op` returns.
#[instrument(level = "debug", skip_all, fields(trees = trees.len()))]
pub fn reduce<F>(mut op: F, trees: &[&Node]) -> TreeResult<Node>
where
    F: FnMut(&[&Node]) -> TreeResult<Node>,
{
    if trees.is_empty() {
        return Err(TreeError::InvalidArgument("reduce needs at least one tree".to_string()));
    }
    let mut path = Vec::new();
    reduce_node(&mut op, trees, &mut path)
}

fn reduce_node<F>(op: &mut F, trees: &[&Node], path: &mut Vec<Segment>) -> TreeResult<Node>
where
    F: FnMut(&[&Node]) -> TreeResult<Node>,
{
    match trees[0] {
        Node::Seq(_) => {
            let seqs = seq_columns(trees, path)?;
            let mut result = SeqNode::new();
            for i in 0..seqs[0].len() {
                path.push(Segment::Index(i as isize));
                let value = reduce_node(op, &column(&seqs, i), path);
                path.pop();
                result.items.push(value?);
            }
            Ok(Node::Seq(result))
        }
        Node::Map(_) => {
            let maps = map_columns(trees, path)?;
            let mut result = MapNode::new();
            for key in maps[0].keys() {
                path.push(Segment::Name(key.clone()));
                let value = reduce_node(op, &map_column(&maps, key), path);
                path.pop();
                result.insert_raw(key.clone(), value?);
            }
            Ok(Node::Map(result))
        }
        _ => {
            leaf_columns(trees, path)?;
            op(trees)
        }
    }
}

/// Slice every leaf of `tree` with `spec`, keeping the tree's shape and leaf type.
///
/// Sequence leaves are sub-sequenced and string leaves sliced by character.
///
/// # Errors
/// `InvalidArgument` if `tree` is not a container, `NotSliceable` for other leaves,
/// `LeafRuleMismatch` if the rule rejects a non-container.
#[instrument(level = "debug", skip(tree, is_leaf))]
pub fn slice(tree: &Node, spec: SliceSpec, is_leaf: Option<LeafRule<'_>>) -> TreeResult<Node> {
    if !tree.is_container() {
        return Err(TreeError::InvalidArgument(format!(
            "can only slice a map or seq, got a {}",
            tree.variant_name()
        )));
    }
    let mut path = Vec::new();
    slice_tree(tree, &spec, is_leaf, &mut path)
}

fn slice_tree(
    tree: &Node,
    spec: &SliceSpec,
    is_leaf: Option<LeafRule<'_>>,
    path: &mut Vec<Segment>,
) -> TreeResult<Node> {
    match tree {
        Node::Seq(seq) => {
            let mut base = SeqNode::typed(seq.leaf_type());
            for (i, item) in seq.iter().enumerate() {
                path.push(Segment::Index(i as isize));
                let value = slice_child(item, spec, is_leaf, path);
                path.pop();
                base.items.push(adopt(value?, base.leaf_type())?);
            }
            Ok(Node::Seq(base))
        }
        Node::Map(map) => {
            let mut base = MapNode::typed(map.leaf_type());
            for (key, value) in map.iter() {
                path.push(Segment::Name(key.clone()));
                let sliced = slice_child(value, spec, is_leaf, path);
                path.pop();
                base.insert_raw(key.clone(), adopt(sliced?, base.leaf_type())?);
            }
            Ok(Node::Map(base))
        }
        leaf => slice_leaf(leaf, spec),
    }
}

fn slice_child(
    value: &Node,
    spec: &SliceSpec,
    is_leaf: Option<LeafRule<'_>>,
    path: &mut Vec<Segment>,
) -> TreeResult<Node> {
    match is_leaf {
        Some(rule) if rule(value) => slice_leaf(value, spec),
        _ if value.is_container() => slice_tree(value, spec, is_leaf, path),
        None => slice_leaf(value, spec),
        Some(_) => Err(TreeError::LeafRuleMismatch { path: rendered(path) }),
    }
}

fn slice_leaf(value: &Node, spec: &SliceSpec) -> TreeResult<Node> {
    match value {
        Node::Seq(seq) => Ok(Node::Seq(seq.sliced(spec)?)),
        Node::Scalar(Scalar::Str(text)) => {
            let chars: Vec<char> = text.chars().collect();
            let sliced: String = spec.indices(chars.len())?.into_iter().map(|i| chars[i]).collect();
            Ok(Node::from(sliced))
        }
        Node::Scalar(scalar) => Err(TreeError::NotSliceable {
            variant: scalar.leaf_type().name(),
        }),
        other => Err(TreeError::NotSliceable {
            variant: other.variant_name(),
        }),
    }
}
