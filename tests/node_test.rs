use rstest::{fixture, rstest};
use serde_json::{json, Value};

use pathtree::util::testing;
use pathtree::{LeafType, Node, Scalar, SliceSpec, TreeError};

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

#[fixture]
fn simple_nested() -> Value {
    json!({"a": 1, "b": {"c": 5}})
}

#[fixture]
fn simple() -> Value {
    json!({"a": 1, "b": 2})
}

#[fixture]
fn list_of_maps() -> Value {
    json!([{"a": 1, "b": 2}, {"a": 1, "b": 2}, {"a": 1, "b": 2}])
}

#[fixture]
fn list_of_list_of_maps() -> Value {
    let row = json!([{"a": 1, "b": 2}, {"a": 1, "b": 2}, {"a": 1, "b": 2}]);
    json!([row.clone(), row.clone(), row])
}

#[fixture]
fn map_with_list_of_maps() -> Value {
    json!({
        "l": [{"a": 1, "b": 2}, {"a": 2, "b": 3}, {"a": 3, "b": 4}],
        "m": 5
    })
}

#[fixture]
fn list_of_different_maps() -> Value {
    json!([{"a": 1, "b": 2}, {"a": 3, "c": 4}, {"a": 5, "d": 6, "e": 7}])
}

#[fixture]
fn nested_same_key() -> Value {
    json!({"a": {"a": {"a": 3}}})
}

// ------------------------------------------------------------
// Construction
// ------------------------------------------------------------

#[rstest]
fn given_plain_data_when_constructed_then_to_plain_round_trips(
    simple: Value,
    list_of_maps: Value,
    map_with_list_of_maps: Value,
    list_of_different_maps: Value,
) {
    for value in [simple, list_of_maps, map_with_list_of_maps, list_of_different_maps] {
        assert_eq!(Node::new(value.clone()).unwrap().to_plain(), value);
    }
}

#[rstest]
fn given_mixed_scalars_when_constructed_then_kinds_survive() {
    let value = json!({"s": "h", "i": 5, "f": 0.5, "b": true, "n": null, "e": [], "m": {}});
    let tree = Node::new(value.clone()).unwrap();
    assert_eq!(tree.to_plain(), value);
    assert_eq!(*tree.get("n").unwrap(), Node::Scalar(Scalar::Null));
}

#[rstest]
#[case(json!(5))]
#[case(json!("text"))]
#[case(json!(true))]
fn given_scalar_when_constructed_then_unsupported(#[case] value: Value) {
    assert!(matches!(
        Node::new(value),
        Err(TreeError::UnsupportedConstructorInput(_))
    ));
}

#[rstest]
fn given_null_when_constructed_then_empty_node() {
    let node = Node::new(Value::Null).unwrap();
    assert!(node.is_empty_node());
    assert!(node.flattened().is_empty());
}

#[rstest]
fn given_constructed_tree_when_mutated_then_source_is_untouched(simple_nested: Value) {
    let mut tree = Node::new(simple_nested.clone()).unwrap();
    let a = tree.get("a").unwrap().as_i64().unwrap();
    tree.set("a", a + 1).unwrap();
    let c = tree.get("b.c").unwrap().as_i64().unwrap();
    tree.set("b.c", c + 1).unwrap();

    assert_eq!(tree.get("a").unwrap().as_i64(), Some(2));
    assert_eq!(tree.get("b.c").unwrap().as_i64(), Some(6));
    assert_eq!(simple_nested, json!({"a": 1, "b": {"c": 5}}));
}

// ------------------------------------------------------------
// Addressing
// ------------------------------------------------------------

#[rstest]
fn given_nested_map_when_addressed_then_all_forms_agree(simple_nested: Value) {
    let tree = Node::new(simple_nested).unwrap();
    let chained = tree.get("b").unwrap().get("c").unwrap().into_owned();
    assert_eq!(chained, *tree.get("b.c").unwrap());
    assert_eq!(chained, *tree.get(("b", "c")).unwrap());
    assert_eq!(chained.as_i64(), Some(5));
}

#[rstest]
fn given_tuple_key_when_segment_contains_delimiter_then_taken_literally() {
    let mut tree = Node::new_map();
    tree.set(("a.b",), 1).unwrap();
    assert_eq!(tree.to_plain(), json!({"a.b": 1}));
    assert_eq!(tree.get(("a.b",)).unwrap().as_i64(), Some(1));
}

#[rstest]
fn given_mixed_path_when_read_then_descends_through_sequence(map_with_list_of_maps: Value) {
    let tree = Node::new(map_with_list_of_maps).unwrap();
    assert_eq!(tree.get(("l", 1, "b")).unwrap().as_i64(), Some(3));
    assert_eq!(tree.get(("l", -1, "a")).unwrap().as_i64(), Some(3));
}

#[rstest]
fn given_missing_key_when_read_then_placeholder_and_tree_unchanged(simple: Value) {
    let tree = Node::new(simple.clone()).unwrap();
    assert_eq!(*tree.get("x.y").unwrap(), Node::new_map());
    assert_eq!(tree.to_plain(), simple);
}

#[rstest]
fn given_scalar_child_when_indexed_then_not_a_container(simple: Value) {
    let tree = Node::new(simple).unwrap();
    assert!(matches!(tree.get("a.x"), Err(TreeError::NotAContainer { .. })));
}

#[rstest]
fn given_get_mut_when_key_missing_then_key_not_found(simple_nested: Value) {
    let mut tree = Node::new(simple_nested).unwrap();
    assert!(matches!(tree.get_mut("b.x"), Err(TreeError::KeyNotFound(_))));
    *tree.get_mut("b.c").unwrap() = Node::from(7);
    assert_eq!(tree.to_plain(), json!({"a": 1, "b": {"c": 7}}));
}

// ------------------------------------------------------------
// Autovivification
// ------------------------------------------------------------

#[rstest]
fn given_new_keys_when_set_then_intermediate_maps_created(simple_nested: Value) {
    let mut tree = Node::new(simple_nested).unwrap();
    tree.set("g", 1).unwrap();
    tree.at("b").set("d", 2).unwrap();
    tree.set("h.j", 3).unwrap();

    assert_eq!(tree.get("g").unwrap().as_i64(), Some(1));
    assert_eq!(tree.get("b.d").unwrap().as_i64(), Some(2));
    assert_eq!(tree.get("h.j").unwrap().as_i64(), Some(3));
}

#[rstest]
fn given_empty_tree_when_chained_write_then_committed() {
    let mut tree = Node::new_map();
    tree.at("x").at("y").set("z", 1).unwrap();
    assert_eq!(tree.to_plain(), json!({"x": {"y": {"z": 1}}}));
}

#[rstest]
fn given_empty_tree_when_chain_only_read_then_nothing_attached() {
    let mut tree = Node::new_map();
    let _ = tree.at("x").at("y").get().unwrap();
    let _ = tree.get("x.y").unwrap();
    assert_eq!(tree.to_plain(), json!({}));
}

// ------------------------------------------------------------
// Leaf types
// ------------------------------------------------------------

#[rstest]
fn given_int_tree_when_assigning_then_only_ints_accepted(simple_nested: Value) {
    let mut tree = Node::with_leaf_type(simple_nested, LeafType::Int).unwrap();
    tree.set("d", 8).unwrap();
    let err = tree.set("e", "u").unwrap_err();
    assert_eq!(
        err,
        TreeError::TypeConstraintViolation {
            expected: LeafType::Int,
            found: LeafType::Str,
        }
    );
    assert!(tree.get("e").unwrap().is_empty());
}

#[rstest]
fn given_int_tree_when_nested_plain_value_assigned_then_leaves_checked() {
    let mut tree = Node::with_leaf_type(json!({}), LeafType::Int).unwrap();
    let err = tree.set("m", Node::from(json!({"x": 1, "y": "bad"}))).unwrap_err();
    assert!(matches!(err, TreeError::TypeConstraintViolation { .. }));
    tree.set("m", Node::from(json!({"x": 1}))).unwrap();
    assert_eq!(tree.get("m").unwrap().leaf_type(), Some(LeafType::Int));
}

#[rstest]
fn given_number_tree_when_assigning_then_ints_and_floats_accepted() {
    let mut tree = Node::with_leaf_type(json!([]), LeafType::Number).unwrap();
    let seq = tree.as_seq_mut().unwrap();
    seq.append(1).unwrap();
    seq.append(0.5).unwrap();
    assert!(seq.append(true).is_err());
    assert_eq!(tree.to_plain(), json!([1, 0.5]));
}

#[rstest]
fn given_leaf_type_override_when_set_then_later_writes_checked(simple: Value) {
    let mut tree = Node::new(simple).unwrap();
    assert_eq!(tree.leaf_type(), None);
    tree.set_leaf_type(LeafType::Str).unwrap();
    assert_eq!(tree.leaf_type(), Some(LeafType::Str));
    assert!(tree.set("c", 3).is_err());
    tree.set("c", "three").unwrap();
}

// ------------------------------------------------------------
// Sequences
// ------------------------------------------------------------

#[rstest]
fn given_sequence_when_appending_mixed_values_then_stored(list_of_maps: Value) {
    let mut tree = Node::new(list_of_maps).unwrap();
    let seq = tree.as_seq_mut().unwrap();
    seq.append(Node::from(json!([0]))).unwrap();
    seq.append(Node::from(json!({"a": 1}))).unwrap();
    seq.append(Node::new(json!({"b": 1})).unwrap()).unwrap();
    seq.append(Node::new_seq()).unwrap();

    tree.get_mut(-1)
        .unwrap()
        .as_seq_mut()
        .unwrap()
        .append(Node::new(json!({"a": 1})).unwrap())
        .unwrap();

    assert_eq!(tree.len(), 7);
    assert_eq!(tree.get(-1).unwrap().to_plain(), json!([{"a": 1}]));
}

#[rstest]
fn given_list_of_maps_when_name_read_then_broadcast(list_of_maps: Value, list_of_list_of_maps: Value) {
    let tree = Node::new(list_of_maps).unwrap();
    assert_eq!(tree.get("a").unwrap().to_plain(), json!([1, 1, 1]));

    let tree = Node::new(list_of_list_of_maps).unwrap();
    assert_eq!(
        tree.get("a").unwrap().to_plain(),
        json!([[1, 1, 1], [1, 1, 1], [1, 1, 1]])
    );
}

#[rstest]
fn given_list_of_maps_when_name_set_then_every_item_updated(list_of_maps: Value) {
    let mut tree = Node::new(list_of_maps).unwrap();
    tree.set("a", 10).unwrap();
    assert_eq!(tree.get("a").unwrap().to_plain(), json!([10, 10, 10]));

    tree.set((SliceSpec::to(2), "a"), 1).unwrap();
    assert_eq!(tree.get("a").unwrap().to_plain(), json!([1, 1, 10]));
}

#[rstest]
fn given_nested_lists_when_name_set_then_broadcast_recurses(list_of_list_of_maps: Value) {
    let mut tree = Node::new(list_of_list_of_maps).unwrap();
    tree.set("a", 10).unwrap();
    let total: i64 = tree
        .get("a")
        .unwrap()
        .flattened()
        .values()
        .filter_map(Scalar::as_i64)
        .sum();
    assert_eq!(total, 10 * 3 * 3);
}

#[rstest]
fn given_sequence_when_sliced_then_new_sequence(map_with_list_of_maps: Value) {
    let tree = Node::new(map_with_list_of_maps).unwrap();
    let tail = tree.get(("l", SliceSpec::starting_at(1))).unwrap();
    assert_eq!(tail.to_plain(), json!([{"a": 2, "b": 3}, {"a": 3, "b": 4}]));
    let bs = tree.get(("l", SliceSpec::to(2), "b")).unwrap();
    assert_eq!(bs.to_plain(), json!([2, 3]));
}

#[rstest]
fn given_extreme_step_when_sliced_then_single_item() {
    let tree = Node::new(json!([1, 2, 3])).unwrap();
    let picked = tree.get(SliceSpec::starting_at(1).with_step(isize::MAX)).unwrap();
    assert_eq!(picked.to_plain(), json!([2]));
}

#[rstest]
fn given_sequence_when_broadcast_delete_then_key_removed_everywhere(list_of_maps: Value) {
    let mut tree = Node::new(list_of_maps).unwrap();
    tree.delete("b").unwrap();
    assert_eq!(tree.to_plain(), json!([{"a": 1}, {"a": 1}, {"a": 1}]));
    assert!(matches!(tree.delete("b"), Err(TreeError::KeyNotFound(_))));
}

#[rstest]
fn given_sequence_when_index_out_of_range_then_error(list_of_maps: Value) {
    let mut tree = Node::new(list_of_maps).unwrap();
    assert_eq!(
        tree.set(5, 1).unwrap_err(),
        TreeError::IndexOutOfRange { index: 5, len: 3 }
    );
}

// ------------------------------------------------------------
// Traversal
// ------------------------------------------------------------

#[rstest]
fn given_nested_tree_when_collecting_leaves_then_in_order() {
    let tree = Node::new(json!({"a": 1, "b": 2, "c": {"d": 3, "e": [4, 5], "f": 6}})).unwrap();
    let leaves: Vec<i64> = tree.leafs().into_iter().filter_map(Scalar::as_i64).collect();
    assert_eq!(leaves, vec![1, 2, 3, 4, 5, 6]);

    assert!(Node::new_map().leafs().is_empty());
    assert!(Node::new_seq().leafs().is_empty());
}

#[rstest]
fn given_trees_when_searched_then_child_first(
    simple_nested: Value,
    list_of_different_maps: Value,
    nested_same_key: Value,
) {
    let tree = Node::new(simple_nested).unwrap();
    assert_eq!(tree.search("c").unwrap().as_i64(), Some(5));

    let tree = Node::new(list_of_different_maps).unwrap();
    assert_eq!(tree.search("a").unwrap().as_i64(), Some(1));
    assert_eq!(tree.search("c").unwrap().as_i64(), Some(4));

    let tree = Node::new(nested_same_key).unwrap();
    assert_eq!(tree.search("a").unwrap().as_i64(), Some(3));
    assert!(matches!(tree.search("u"), Err(TreeError::SearchExhausted(_))));
}

#[rstest]
fn given_repeated_key_when_search_all_then_every_match_in_search_order(nested_same_key: Value) {
    let tree = Node::new(nested_same_key).unwrap();
    let matches: Vec<Value> = tree.search_all("a").into_iter().map(Node::to_plain).collect();
    assert_eq!(matches, vec![json!(3), json!({"a": 3}), json!({"a": {"a": 3}})]);
    assert_eq!(*tree.search("a").unwrap(), *tree.search_all("a")[0]);
}

// ------------------------------------------------------------
// Update and rename
// ------------------------------------------------------------

#[rstest]
fn given_maps_when_updated_then_deep_merged(map_with_list_of_maps: Value) {
    let mut tree = Node::new(map_with_list_of_maps).unwrap();
    let patch = Node::new(json!({"l": [{"a": 10}, {}, {"c": 0}], "n": "new"})).unwrap();
    tree.update(patch).unwrap();
    assert_eq!(
        tree.to_plain(),
        json!({
            "l": [{"a": 10, "b": 2}, {"a": 2, "b": 3}, {"a": 3, "b": 4, "c": 0}],
            "m": 5,
            "n": "new"
        })
    );
}

#[rstest]
fn given_incongruent_update_when_applied_then_tree_unchanged(map_with_list_of_maps: Value) {
    let mut tree = Node::new(map_with_list_of_maps.clone()).unwrap();
    let patch = Node::new(json!({"m": 6, "l": [{"a": 0}]})).unwrap();
    assert!(matches!(tree.update(patch), Err(TreeError::ShapeMismatch { .. })));
    assert_eq!(tree.to_plain(), map_with_list_of_maps);
}

#[rstest]
fn given_nested_key_when_renamed_then_position_kept(map_with_list_of_maps: Value) {
    let mut tree = Node::new(map_with_list_of_maps).unwrap();
    tree.rename_key(("l", 0, "a"), "z").unwrap();
    let first = tree.get(("l", 0)).unwrap().into_owned();
    let keys: Vec<String> = first.as_map().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["z", "b"]);
}
