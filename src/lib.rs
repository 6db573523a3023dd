//! Path-addressable trees of nested maps and sequences.
//!
//! A [`Node`] is built from plain JSON-like data and addressed with delimited keys
//! (`"a.b.c"`), positions, slices, or explicit paths (`("a", 0, "c")`). Writes through
//! missing intermediate maps create them; reads never do. Trees may carry a leaf-type
//! constraint checked on every write.
//!
//! ```
//! use pathtree::Node;
//! use serde_json::json;
//!
//! let mut tree = Node::new(json!({"a": {"l": [1, 2]}})).unwrap();
//! tree.set("x.y.z", 3).unwrap();
//! assert_eq!(tree.get("a.l").unwrap().get(-1).unwrap().as_i64(), Some(2));
//! assert_eq!(tree.get(("x", "y", "z")).unwrap().as_i64(), Some(3));
//! ```

pub mod config;
pub mod cursor;
pub mod errors;
pub mod flatten;
pub mod loader;
pub mod map;
pub mod node;
pub mod ops;
pub mod path;
pub mod scalar;
pub mod seq;
pub mod tree_traits;
pub mod util;

pub use crate::config::{settings, Settings};
pub use crate::cursor::Cursor;
pub use crate::errors::{LoadError, LoadResult, TreeError, TreeResult};
pub use crate::flatten::{unflatten, unflatten_with, Flat};
pub use crate::loader::{
    from_file, from_json_file, from_json_str, from_yaml_file, from_yaml_str, to_json_string,
    to_yaml_string,
};
pub use crate::map::MapNode;
pub use crate::node::Node;
pub use crate::ops::{apply, apply_with, foreach, foreach_mut, reduce, slice, LeafRule};
pub use crate::path::{Key, Segment, SliceSpec};
pub use crate::scalar::{LeafType, Scalar};
pub use crate::seq::SeqNode;
pub use crate::tree_traits::TreeDisplay;

#[cfg(test)]
mod tests {
    use crate::util::testing;

    #[ctor::ctor]
    fn init() {
        testing::init_test_setup();
    }
}
