use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::borrow::Borrow;

use log::{debug, trace};
use smallvec::smallvec;

use super::arena::Arena;
use super::handle::Handle;
use super::node::{MAX_KEYS, MIN_KEYS, Node, SearchResult};
use crate::error::TreeError;

/// The core B-tree implementation backing `BTree`.
///
/// Nodes live in an arena and refer to each other by handle: children are
/// owned through the child lists, parents are plain back-references. Both
/// mutating entry points ([`add`](Self::add) and [`delete`](Self::delete))
/// repair occupancy on the way down, so the structural invariants hold again
/// by the time either returns.
#[derive(Clone)]
pub(crate) struct RawBTree<K> {
    /// Arena storing all tree nodes.
    nodes: Arena<Node<K>>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
    /// Total number of keys in the tree.
    len: usize,
}

impl<K> RawBTree<K> {
    /// Creates a new, empty tree.
    pub(crate) const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            root: None,
            len: 0,
        }
    }

    /// Creates a new tree with node slots for at least `capacity` keys.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Arena::with_capacity(capacity.div_ceil(MIN_KEYS)),
            root: None,
            len: 0,
        }
    }

    /// Returns the number of keys this tree can hold without reallocating.
    pub(crate) fn capacity(&self) -> usize {
        self.nodes.capacity() * MIN_KEYS
    }

    /// Returns the number of keys in the tree.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree contains no keys.
    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of nodes in the tree.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Clears all keys from the tree.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.len = 0;
    }

    /// Returns the root handle, if the tree is non-empty.
    pub(crate) fn root(&self) -> Option<Handle> {
        self.root
    }

    /// Returns a reference to a node by handle.
    pub(crate) fn node(&self, handle: Handle) -> &Node<K> {
        self.nodes.get(handle)
    }

    /// Returns a mutable reference to a node by handle.
    fn node_mut(&mut self, handle: Handle) -> &mut Node<K> {
        self.nodes.get_mut(handle)
    }

    /// Number of levels from the root down to the leaves: 0 for the empty
    /// tree, 1 for a lone leaf. Uniform-depth means any downward path works.
    pub(crate) fn height(&self) -> usize {
        let Some(mut node) = self.root else { return 0 };

        let mut height = 1;
        while !self.node(node).is_leaf() {
            node = self.node(node).child(0);
            height += 1;
        }
        height
    }

    /// Mean occupancy across all nodes, a packing diagnostic for renderers.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn average_keys_per_node(&self) -> f64 {
        if self.root.is_none() {
            0.0
        } else {
            self.len as f64 / self.nodes.len() as f64
        }
    }

    /// Points the parent links of `node`'s children back at `node`.
    fn adopt_children(&mut self, node: Handle) {
        for index in 0..self.node(node).child_count() {
            let child = self.node(node).child(index);
            self.node_mut(child).set_parent(Some(node));
        }
    }
}

impl<K: Ord + Clone> RawBTree<K> {
    // ─── Locator ─────────────────────────────────────────────────────────

    /// Returns the handle of the node holding `key`, if any.
    pub(crate) fn find<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root?;

        loop {
            let node = self.node(current);
            match node.search(key) {
                SearchResult::Found(_) => return Some(current),
                SearchResult::NotFound(index) => {
                    if node.is_leaf() {
                        return None;
                    }
                    current = node.child(index);
                }
            }
        }
    }

    /// Greatest key in the subtree rooted at `node`: the last key of its
    /// rightmost-descendant leaf.
    pub(crate) fn predecessor(&self, mut node: Handle) -> &K {
        loop {
            let n = self.node(node);
            if n.is_leaf() {
                return n.last_key();
            }
            node = n.child(n.child_count() - 1);
        }
    }

    /// Smallest key in the subtree rooted at `node`: the first key of its
    /// leftmost-descendant leaf.
    pub(crate) fn successor(&self, mut node: Handle) -> &K {
        loop {
            let n = self.node(node);
            if n.is_leaf() {
                return n.first_key();
            }
            node = n.child(0);
        }
    }

    /// This node's position within its parent's child list, located through
    /// one of its own keys (any would do; the first is cheapest).
    fn descendant_index(&self, node: Handle) -> usize {
        let parent = self.node(node).parent().expect("`RawBTree::descendant_index()` - node has no parent!");

        let index = match self.node(parent).search(self.node(node).first_key()) {
            SearchResult::NotFound(index) => index,
            // A child's key can never sit in its parent as well.
            SearchResult::Found(_) => unreachable!("`RawBTree::descendant_index()` - key duplicated in parent!"),
        };
        debug_assert!(
            self.node(parent).child(index) == node,
            "`RawBTree::descendant_index()` - parent link and child list disagree!"
        );
        index
    }

    // ─── Splitter ────────────────────────────────────────────────────────

    /// Splits a full node, promoting its middle key into the parent.
    ///
    /// Returns `(low, high, median)`; `high` keeps the original handle, and
    /// the new low node is inserted immediately before it in the parent.
    /// When the parent is itself full it is split first - the climb goes
    /// only as far as needed to guarantee the promotion has room to land.
    fn split(&mut self, node: Handle) -> (Handle, Handle, K) {
        if let Some(parent) = self.node(node).parent() {
            if self.node(parent).is_full() {
                trace!("split: climbing into a full parent first");
                self.split(parent);
            }
            // The climb may have moved this node under a different parent.
            let parent = self.node(node).parent().expect("`RawBTree::split()` - parent link lost during climb!");
            let index = self.descendant_index(node);

            let (low, median) = self.node_mut(node).split();
            let low = self.nodes.alloc(low);
            self.adopt_children(low);

            debug_assert!(!self.node(parent).is_full(), "`RawBTree::split()` - promotion into a full parent!");
            let parent_node = self.node_mut(parent);
            parent_node.insert_key_at(index, median.clone());
            parent_node.insert_child_at(index, low);
            trace!("split: promoted the median into the parent");

            (low, node, median)
        } else {
            // Splitting the top of the tree: a brand-new root appears above
            // both halves and the height grows by exactly one.
            let (low, median) = self.node_mut(node).split();
            let low = self.nodes.alloc(low);
            self.adopt_children(low);

            let mut root = Node::new();
            root.insert_key_at(0, median.clone());
            root.set_children(smallvec![low, node]);
            let root = self.nodes.alloc(root);
            self.node_mut(low).set_parent(Some(root));
            self.node_mut(node).set_parent(Some(root));
            self.root = Some(root);
            debug!("split: tree grew a new root");

            (low, node, median)
        }
    }

    // ─── Inserter ────────────────────────────────────────────────────────

    /// Inserts `key`, returning the handle of the node that now holds it.
    ///
    /// Adding a key the tree already contains is a no-op that returns the
    /// owning node. A full leaf is split before it receives the key; the
    /// promoted median decides which half the insertion continues into.
    pub(crate) fn add(&mut self, key: K) -> Handle {
        let Some(root) = self.root else {
            let mut node = Node::new();
            node.insert_key_at(0, key);
            let handle = self.nodes.alloc(node);
            self.root = Some(handle);
            self.len = 1;
            return handle;
        };

        let mut current = root;
        loop {
            match self.node(current).search(&key) {
                SearchResult::Found(_) => return current,
                SearchResult::NotFound(index) => {
                    if !self.node(current).is_leaf() {
                        current = self.node(current).child(index);
                        continue;
                    }
                    if self.node(current).is_full() {
                        let (low, high, median) = self.split(current);
                        current = if key <= median { low } else { high };
                        // Re-search the chosen half; it has room now.
                        continue;
                    }
                    self.node_mut(current).insert_key_at(index, key);
                    self.len += 1;
                    return current;
                }
            }
        }
    }

    // ─── Rebalancer ──────────────────────────────────────────────────────

    /// Tops up a child sitting at minimum occupancy so the descent can step
    /// into a node that tolerates losing one key.
    ///
    /// Returns the handle to continue at: normally the child itself (grown
    /// by a borrow or a merge), but when the merge consumes the root's last
    /// key the root absorbs both children and the caller must continue
    /// there instead - the child's identity is gone.
    fn ensure_minimum_before_descent(&mut self, child: Handle) -> Handle {
        debug_assert!(
            self.node(child).at_minimum(),
            "`RawBTree::ensure_minimum_before_descent()` - child is not at minimum!"
        );
        let parent = self
            .node(child)
            .parent()
            .expect("`RawBTree::ensure_minimum_before_descent()` - child has no parent!");
        let index = self.descendant_index(child);

        let left = (index > 0).then(|| self.node(parent).child(index - 1));
        let right = (index < self.node(parent).key_count()).then(|| self.node(parent).child(index + 1));

        // Deterministic left preference between qualifying siblings.
        if let Some(left) = left
            && self.node(left).can_spare()
        {
            self.borrow_from_left(parent, index);
            return child;
        }
        if let Some(right) = right
            && self.node(right).can_spare()
        {
            self.borrow_from_right(parent, index);
            return child;
        }

        if left.is_some() { self.merge_at(parent, index - 1) } else { self.merge_at(parent, index) }
    }

    /// Rotates the left sibling's greatest key up into the parent and the
    /// parent's separator down to the front of `children[index]`.
    fn borrow_from_left(&mut self, parent: Handle, index: usize) {
        trace!("rebalance: borrowing from the left sibling");
        let left = self.node(parent).child(index - 1);
        let child = self.node(parent).child(index);

        let left_node = self.node_mut(left);
        let donated = left_node.remove_key_at(left_node.key_count() - 1);
        let moved = (!left_node.is_leaf()).then(|| {
            let count = left_node.child_count();
            left_node.remove_child_at(count - 1)
        });

        let separator = self.node_mut(parent).replace_key(index - 1, donated);
        let child_node = self.node_mut(child);
        child_node.insert_key_at(0, separator);
        if let Some(moved) = moved {
            child_node.insert_child_at(0, moved);
            self.node_mut(moved).set_parent(Some(child));
        }
    }

    /// Rotates the right sibling's least key up into the parent and the
    /// parent's separator down to the back of `children[index]`.
    fn borrow_from_right(&mut self, parent: Handle, index: usize) {
        trace!("rebalance: borrowing from the right sibling");
        let right = self.node(parent).child(index + 1);
        let child = self.node(parent).child(index);

        let right_node = self.node_mut(right);
        let donated = right_node.remove_key_at(0);
        let moved = (!right_node.is_leaf()).then(|| right_node.remove_child_at(0));

        let separator = self.node_mut(parent).replace_key(index, donated);
        let child_node = self.node_mut(child);
        let key_count = child_node.key_count();
        child_node.insert_key_at(key_count, separator);
        if let Some(moved) = moved {
            let child_count = child_node.child_count();
            child_node.insert_child_at(child_count, moved);
            self.node_mut(moved).set_parent(Some(child));
        }
    }

    /// Folds `children[index]`, `keys[index]`, and `children[index + 1]`
    /// into a single node and removes the consumed slot from the parent.
    ///
    /// The left child absorbs its sibling and is returned - except when the
    /// parent is the root and this was its only key. Then the root absorbs
    /// both children, the tree shrinks by one level, and the root is
    /// returned as the node to continue at.
    fn merge_at(&mut self, parent: Handle, index: usize) -> Handle {
        let parent_node = self.node(parent);
        let left = parent_node.child(index);
        let right = parent_node.child(index + 1);

        if parent_node.parent().is_none() && parent_node.key_count() == 1 {
            debug!("rebalance: root absorbed its last two children");
            let (mut keys, mut children) = self.nodes.take(left).into_parts();
            let (right_keys, right_children) = self.nodes.take(right).into_parts();

            let root_node = self.node_mut(parent);
            keys.push(root_node.remove_key_at(0));
            keys.extend(right_keys);
            children.extend(right_children);
            root_node.set_keys(keys);
            root_node.set_children(children);
            self.adopt_children(parent);
            return parent;
        }

        trace!("rebalance: merging two siblings around their separator");
        let right_node = self.nodes.take(right);
        let parent_node = self.node_mut(parent);
        let separator = parent_node.remove_key_at(index);
        let removed = parent_node.remove_child_at(index + 1);
        debug_assert!(removed == right, "`RawBTree::merge_at()` - child list out of step with key list!");

        self.node_mut(left).merge_right(separator, right_node);
        // The arrivals from the right sibling still point at the old node.
        self.adopt_children(left);
        left
    }

    // ─── Deleter ─────────────────────────────────────────────────────────

    /// Removes `key` from the tree.
    ///
    /// Returns `NotFound` when the key is absent (no key is removed, though
    /// the descent may already have rebalanced nodes along its path) and
    /// `EmptyTree` when the removal took the final key - the tree is left
    /// empty rather than keeping a zero-key node around.
    pub(crate) fn delete<Q>(&mut self, key: &Q) -> crate::error::Result<()>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let root = self.root.ok_or(TreeError::NotFound)?;
        self.delete_at(root, key)?;
        self.len -= 1;

        let root = self.root.expect("`RawBTree::delete()` - root vanished mid-delete!");
        if self.node(root).key_count() == 0 {
            debug_assert!(self.node(root).is_leaf(), "`RawBTree::delete()` - empty root still has children!");
            self.nodes.clear();
            self.root = None;
            debug!("delete: removed the final key, tree is empty");
            return Err(TreeError::EmptyTree);
        }
        Ok(())
    }

    /// Per-node deletion: locate the key, then either remove it here,
    /// substitute it from a neighbouring subtree, or restructure and chase
    /// it downward.
    fn delete_at<Q>(&mut self, mut node: Handle, key: &Q) -> crate::error::Result<()>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        loop {
            match self.node(node).search(key) {
                SearchResult::Found(index) => {
                    if self.node(node).is_leaf() {
                        trace!("delete: removing directly from a leaf");
                        self.node_mut(node).remove_key_at(index);
                        return Ok(());
                    }

                    let below = self.node(node).child(index);
                    let above = self.node(node).child(index + 1);

                    if self.node(below).can_spare() {
                        trace!("delete: substituting the predecessor");
                        let replacement = self.delete_predecessor(below);
                        self.node_mut(node).replace_key(index, replacement);
                        return Ok(());
                    }
                    if self.node(above).can_spare() {
                        trace!("delete: substituting the successor");
                        let replacement = self.delete_successor(above);
                        self.node_mut(node).replace_key(index, replacement);
                        return Ok(());
                    }

                    // Both neighbours sit at minimum: fold them together
                    // around the doomed key, then chase it into the merged
                    // node (which now holds it exactly once).
                    trace!("delete: merging around the doomed key");
                    node = self.merge_at(node, index);
                }
                SearchResult::NotFound(index) => {
                    if self.node(node).is_leaf() {
                        return Err(TreeError::NotFound);
                    }
                    let child = self.node(node).child(index);
                    node = if self.node(child).at_minimum() {
                        self.ensure_minimum_before_descent(child)
                    } else {
                        child
                    };
                }
            }
        }
    }

    /// Removes and returns the greatest key of the subtree at `node`.
    ///
    /// The key being removed is unknown until the rightmost leaf is
    /// reached, so every node on the right spine is topped up before the
    /// descent steps into it.
    fn delete_predecessor(&mut self, mut node: Handle) -> K {
        loop {
            let n = self.node(node);
            if n.is_leaf() {
                let last = n.key_count() - 1;
                return self.node_mut(node).remove_key_at(last);
            }
            let child = n.child(n.child_count() - 1);
            node = if self.node(child).at_minimum() {
                self.ensure_minimum_before_descent(child)
            } else {
                child
            };
        }
    }

    /// Removes and returns the least key of the subtree at `node`, topping
    /// up the left spine on the way down.
    fn delete_successor(&mut self, mut node: Handle) -> K {
        loop {
            let n = self.node(node);
            if n.is_leaf() {
                return self.node_mut(node).remove_key_at(0);
            }
            let child = n.child(0);
            node = if self.node(child).at_minimum() {
                self.ensure_minimum_before_descent(child)
            } else {
                child
            };
        }
    }
}

impl<K: Ord> RawBTree<K> {
    // ─── Validator ───────────────────────────────────────────────────────

    /// Walks the whole tree and returns a description of every structural
    /// invariant violation found. An empty result means the tree is valid.
    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let Some(root) = self.root else {
            if self.len != 0 {
                errors.push(format!("empty tree claims {} keys", self.len));
            }
            return errors;
        };

        if self.node(root).parent().is_some() {
            errors.push("root has a parent link".into());
        }

        let mut leaf_depth = None;
        let total = self.validate_node(root, 0, None, None, &mut leaf_depth, &mut errors);
        if total != self.len {
            errors.push(format!("key-count mismatch: tracked {}, counted {total}", self.len));
        }
        errors
    }

    /// Checks one node and its subtree, returning the subtree's key count.
    ///
    /// `lower` is exclusive and `upper` inclusive, matching the separation
    /// rule: a separator bounds its left subtree from above (equal keys
    /// sort left) and its right subtree strictly from below.
    fn validate_node(
        &self,
        handle: Handle,
        depth: usize,
        lower: Option<&K>,
        upper: Option<&K>,
        leaf_depth: &mut Option<usize>,
        errors: &mut Vec<String>,
    ) -> usize {
        let node = self.node(handle);
        let count = node.key_count();

        let minimum = if node.parent().is_some() { MIN_KEYS } else { 1 };
        if count < minimum || count > MAX_KEYS {
            errors.push(format!("occupancy out of bounds at {handle:?}: {count} keys"));
        }

        for index in 1..count {
            if node.key(index - 1) >= node.key(index) {
                errors.push(format!("keys out of order at {handle:?}, indices {} and {index}", index - 1));
            }
        }

        for index in 0..count {
            let key = node.key(index);
            if let Some(lower) = lower
                && key <= lower
            {
                errors.push(format!("key {index} at {handle:?} escapes its lower bound"));
            }
            if let Some(upper) = upper
                && key > upper
            {
                errors.push(format!("key {index} at {handle:?} escapes its upper bound"));
            }
        }

        if node.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) if depth != expected => {
                    errors.push(format!("leaf depth mismatch at {handle:?}: expected {expected}, got {depth}"));
                }
                Some(_) => {}
            }
            return count;
        }

        if node.child_count() != count + 1 {
            errors.push(format!(
                "child count mismatch at {handle:?}: {count} keys, {} children",
                node.child_count()
            ));
        }

        let mut total = count;
        for index in 0..node.child_count() {
            let child = node.child(index);
            if self.node(child).parent() != Some(handle) {
                errors.push(format!("stale parent link on child {index} of {handle:?}"));
            }
            let child_lower = if index > 0 { Some(node.key(index - 1)) } else { lower };
            let child_upper = if index < count { Some(node.key(index)) } else { upper };
            total += self.validate_node(child, depth + 1, child_lower, child_upper, leaf_depth, errors);
        }
        total
    }
}
