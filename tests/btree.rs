use std::collections::BTreeSet;

use bough_tree::{BTree, NodeRef, TreeError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// The number of operations to perform in each proptest case.
const TEST_SIZE: usize = 2_000;

/// Generates keys in a range narrow enough to force collisions.
fn key_strategy() -> impl Strategy<Value = i64> {
    -500i64..500i64
}

// ─── Structural fixtures through the public API ──────────────────────────

/// Collects a node's keys plus those of its whole subtree, one vector of
/// keys per node, in depth-first order.
fn collect_shape(node: NodeRef<'_, i32>, out: &mut Vec<Vec<i32>>) {
    out.push(node.keys().to_vec());
    for child in node.children() {
        collect_shape(child, out);
    }
}

fn shape(tree: &BTree<i32>) -> Vec<Vec<i32>> {
    let mut out = Vec::new();
    if let Some(root) = tree.root() {
        collect_shape(root, &mut out);
    }
    out
}

/// The ascending-add walkthrough: one packed node, then a split, growth in
/// the high leaf, and a second split widening the root.
#[test]
fn ascending_adds_split_in_sequence() {
    let mut tree = BTree::new();

    for key in [10, 20, 30, 40, 50] {
        tree.add(key);
    }
    assert!(tree.valid());
    assert_eq!(shape(&tree), [vec![10, 20, 30, 40, 50]]);

    tree.add(60);
    assert!(tree.valid());
    assert_eq!(shape(&tree), [vec![30], vec![10, 20], vec![40, 50, 60]]);

    tree.add(70);
    tree.add(80);
    assert!(tree.valid());
    assert_eq!(shape(&tree), [vec![30], vec![10, 20], vec![40, 50, 60, 70, 80]]);

    tree.add(90);
    assert!(tree.valid());
    assert_eq!(shape(&tree), [vec![30, 60], vec![10, 20], vec![40, 50], vec![70, 80, 90]]);
}

#[test]
fn add_returns_a_node_holding_the_key() {
    let mut tree = BTree::new();
    for key in 0..200 {
        let node = tree.add(key);
        assert!(node.keys().contains(&key), "add({key}) returned a node without it");
    }
}

#[test]
fn duplicate_adds_change_nothing() {
    let mut tree: BTree<i32> = (0..50).collect();
    let before = shape(&tree);

    for key in 0..50 {
        tree.add(key);
    }

    assert_eq!(tree.key_count(), 50);
    assert_eq!(shape(&tree), before);
}

// ─── Node walking ────────────────────────────────────────────────────────

#[test]
fn parent_links_walk_back_to_the_root() {
    let tree: BTree<i32> = (0..500).collect();
    let root = tree.root().unwrap();

    assert!(root.parent().is_none());

    // From every leaf, following parents must end at the root.
    fn check(node: NodeRef<'_, i32>, root: NodeRef<'_, i32>) {
        if node.is_leaf() {
            let mut current = node;
            while let Some(parent) = current.parent() {
                current = parent;
            }
            assert_eq!(current, root);
        } else {
            for child in node.children() {
                check(child, root);
            }
        }
    }
    check(root, root);
}

#[test]
fn children_iterator_matches_child_count() {
    let tree: BTree<i32> = (0..300).collect();
    let root = tree.root().unwrap();

    assert_eq!(root.children().len(), root.child_count());
    assert_eq!(root.children().count(), root.child_count());
    for child in root.children() {
        assert_eq!(child.parent(), Some(root));
    }
}

#[test]
fn leaves_all_sit_at_the_same_depth() {
    let tree: BTree<i32> = (0..1000).collect();

    fn depths(node: NodeRef<'_, i32>, depth: usize, out: &mut Vec<usize>) {
        if node.is_leaf() {
            out.push(depth);
        } else {
            for child in node.children() {
                depths(child, depth + 1, out);
            }
        }
    }

    let mut out = Vec::new();
    depths(tree.root().unwrap(), 1, &mut out);
    assert!(out.iter().all(|&depth| depth == tree.height()));
}

// ─── Iteration ───────────────────────────────────────────────────────────

#[test]
fn in_order_yields_sorted_unique_keys() {
    let mut tree = BTree::new();
    for key in [40, 10, 30, 50, 20, 30, 10] {
        tree.add(key);
    }

    let keys: Vec<i32> = tree.in_order().copied().collect();
    assert_eq!(keys, [10, 20, 30, 40, 50]);
}

#[test]
fn in_order_is_restartable_and_sized() {
    let tree: BTree<i32> = (0..123).collect();

    let first: Vec<i32> = tree.in_order().copied().collect();
    let second: Vec<i32> = tree.in_order().copied().collect();
    assert_eq!(first, second);

    let mut iter = tree.in_order();
    assert_eq!(iter.len(), 123);
    iter.next();
    assert_eq!(iter.len(), 122);
}

#[test]
fn in_order_of_an_empty_tree_is_empty() {
    let tree: BTree<i32> = BTree::new();
    assert_eq!(tree.in_order().count(), 0);
}

#[test]
fn borrowed_into_iterator_matches_in_order() {
    let tree: BTree<i32> = (0..64).collect();
    let via_loop: Vec<i32> = (&tree).into_iter().copied().collect();
    let via_in_order: Vec<i32> = tree.in_order().copied().collect();
    assert_eq!(via_loop, via_in_order);
}

// ─── Errors ──────────────────────────────────────────────────────────────

#[test]
fn deleting_an_absent_key_reports_not_found() {
    let mut tree: BTree<i32> = (0..10).collect();
    assert_eq!(tree.delete(&99), Err(TreeError::NotFound));
    assert_eq!(tree.key_count(), 10);
    assert!(tree.valid());
}

#[test]
fn deleting_the_last_key_reports_empty_tree() {
    let mut tree = BTree::new();
    tree.add('x');

    assert_eq!(tree.delete(&'x'), Err(TreeError::EmptyTree));
    assert!(tree.is_empty());
    assert!(tree.find(&'x').is_none());
    assert!(tree.valid());

    // The tree remains usable afterwards.
    tree.add('y');
    assert_eq!(tree.key_count(), 1);
}

// ─── Introspection ───────────────────────────────────────────────────────

#[test]
fn introspection_on_the_empty_tree() {
    let tree: BTree<i32> = BTree::new();
    assert_eq!(tree.height(), 0);
    assert_eq!(tree.key_count(), 0);
    assert_eq!(tree.node_count(), 0);
    assert!(tree.root().is_none());
    assert!(tree.first().is_none());
    assert!(tree.last().is_none());
    assert!(tree.average_keys_per_node().abs() < f64::EPSILON);
    assert!(tree.valid());
}

#[test]
fn first_and_last_track_the_extremes() {
    let mut tree = BTree::new();
    for key in [17, 3, 99, 41] {
        tree.add(key);
    }

    assert_eq!(tree.first(), Some(&3));
    assert_eq!(tree.last(), Some(&99));

    tree.delete(&99).unwrap();
    assert_eq!(tree.last(), Some(&41));
}

#[test]
fn average_occupancy_counts_keys_over_nodes() {
    let tree: BTree<i32> = (1..=6).collect();
    // Six keys over a root and two leaves.
    assert_eq!(tree.node_count(), 3);
    assert!((tree.average_keys_per_node() - 2.0).abs() < f64::EPSILON);
}

#[test]
fn clear_resets_the_tree() {
    let mut tree: BTree<i32> = (0..100).collect();
    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.node_count(), 0);
    assert!(tree.root().is_none());
}

#[test]
fn debug_formats_as_a_set() {
    let tree: BTree<i32> = [2, 1, 3].into_iter().collect();
    assert_eq!(format!("{tree:?}"), "{1, 2, 3}");
}

#[test]
fn clone_is_deep() {
    let mut tree: BTree<i32> = (0..50).collect();
    let snapshot = tree.clone();

    for key in 0..25 {
        tree.delete(&key).unwrap();
    }

    assert_eq!(snapshot.key_count(), 50);
    assert!(snapshot.valid());
    assert_eq!(tree.key_count(), 25);
}

// ─── Randomized model tests ──────────────────────────────────────────────

#[derive(Debug, Clone)]
enum SetOp {
    Add(i64),
    Delete(i64),
    Find(i64),
    First,
    Last,
}

fn set_op_strategy() -> impl Strategy<Value = SetOp> {
    prop_oneof![
        5 => key_strategy().prop_map(SetOp::Add),
        3 => key_strategy().prop_map(SetOp::Delete),
        2 => key_strategy().prop_map(SetOp::Find),
        1 => Just(SetOp::First),
        1 => Just(SetOp::Last),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Replays a random op sequence on both `BTree` and `BTreeSet` and
    /// asserts identical observable behaviour at every step.
    #[test]
    fn tree_ops_match_btreeset(ops in proptest::collection::vec(set_op_strategy(), TEST_SIZE)) {
        let mut tree: BTree<i64> = BTree::new();
        let mut model: BTreeSet<i64> = BTreeSet::new();

        for op in &ops {
            match op {
                SetOp::Add(key) => {
                    tree.add(*key);
                    model.insert(*key);
                }
                SetOp::Delete(key) => {
                    let tree_result = tree.delete(key);
                    let model_result = model.remove(key);
                    match tree_result {
                        Ok(()) | Err(TreeError::EmptyTree) => prop_assert!(model_result),
                        Err(TreeError::NotFound) => prop_assert!(!model_result),
                    }
                }
                SetOp::Find(key) => {
                    prop_assert_eq!(tree.contains(key), model.contains(key), "contains({})", key);
                }
                SetOp::First => {
                    prop_assert_eq!(tree.first(), model.first(), "first()");
                }
                SetOp::Last => {
                    prop_assert_eq!(tree.last(), model.last(), "last()");
                }
            }
            prop_assert_eq!(tree.key_count(), model.len(), "key_count mismatch after {:?}", op);
        }

        prop_assert!(tree.valid());
        let keys: Vec<i64> = tree.in_order().copied().collect();
        let expected: Vec<i64> = model.iter().copied().collect();
        prop_assert_eq!(keys, expected, "in_order() mismatch");
    }

    /// The tree stays valid after every single mutation, not just at the
    /// end of a workload.
    #[test]
    fn every_mutation_preserves_validity(ops in proptest::collection::vec(set_op_strategy(), 200)) {
        let mut tree: BTree<i64> = BTree::new();

        for op in &ops {
            match op {
                SetOp::Add(key) => {
                    tree.add(*key);
                }
                SetOp::Delete(key) => {
                    let _ = tree.delete(key);
                }
                _ => continue,
            }
            prop_assert!(tree.valid(), "invariants broken after {:?}", op);
        }
    }

    /// Inserting then deleting every key in an unrelated order drains the
    /// tree; the final removal reports emptiness and nothing panics on the
    /// way there.
    #[test]
    fn round_trip_ends_with_empty_tree(keys in proptest::collection::btree_set(key_strategy(), 1..400)) {
        let mut tree: BTree<i64> = BTree::new();

        // Insert high-to-low, delete low-to-high.
        for key in keys.iter().rev() {
            tree.add(*key);
        }
        prop_assert!(tree.valid());

        let all: Vec<i64> = keys.iter().copied().collect();
        let (last, rest) = all.split_last().unwrap();
        for key in rest {
            prop_assert_eq!(tree.delete(key), Ok(()));
        }
        prop_assert_eq!(tree.delete(last), Err(TreeError::EmptyTree));
        prop_assert!(tree.is_empty());
    }

    /// A key is findable immediately after its add and gone immediately
    /// after its delete.
    #[test]
    fn membership_follows_mutation(keys in proptest::collection::vec(key_strategy(), 1..300)) {
        let mut tree: BTree<i64> = BTree::new();

        for key in &keys {
            tree.add(*key);
            prop_assert!(tree.find(key).is_some(), "find({}) after add", key);
        }
        for key in &keys {
            match tree.delete(key) {
                Ok(()) | Err(TreeError::EmptyTree) => {
                    prop_assert!(tree.find(key).is_none(), "find({}) after delete", key);
                }
                Err(TreeError::NotFound) => {} // deleted by an earlier duplicate
            }
        }
        prop_assert!(tree.is_empty());
    }
}
