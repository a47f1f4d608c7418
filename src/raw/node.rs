use core::borrow::Borrow;

use smallvec::SmallVec;

use super::handle::Handle;

/// Minimum degree of every tree in this crate.
pub(crate) const T: usize = 3;

/// Fewest keys a non-root node may hold. The root's floor is 1 instead.
pub(crate) const MIN_KEYS: usize = T - 1;
/// Most keys any node may hold.
pub(crate) const MAX_KEYS: usize = 2 * T - 1;
/// Index of the key a split promotes out of a full node.
pub(crate) const MIDDLE_INDEX: usize = T - 1;
pub(crate) const MAX_CHILDREN: usize = MAX_KEYS + 1;

/// One node of the tree: ordered keys, owned children, non-owning parent.
///
/// A node is a leaf exactly when `children` is empty; otherwise
/// `children.len() == keys.len() + 1`. The `parent` handle is used for
/// navigation only (sibling lookup, root discovery) and never for ownership.
///
/// The +1 on the inline capacities gives restructuring steps slack without
/// spilling to the heap.
#[derive(Clone, Debug)]
pub(crate) struct Node<K> {
    parent: Option<Handle>,
    keys: SmallVec<[K; MAX_KEYS + 1]>,
    children: SmallVec<[Handle; MAX_CHILDREN + 1]>,
}

/// Result of searching for a key within a single node.
pub(crate) enum SearchResult {
    /// Key was found at the given index.
    Found(usize),
    /// Key was not found; index is the child to descend into, which is also
    /// where the key would sit if inserted here.
    NotFound(usize),
}

impl<K> Node<K> {
    /// Creates a new empty leaf with no parent.
    pub(crate) fn new() -> Self {
        Self {
            parent: None,
            keys: SmallVec::new(),
            children: SmallVec::new(),
        }
    }

    /// Returns true if this node has no children.
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns true if this node holds the maximum number of keys.
    pub(crate) fn is_full(&self) -> bool {
        self.keys.len() == MAX_KEYS
    }

    /// Fewest keys this node may hold given its role.
    fn minimum_keys(&self) -> usize {
        if self.parent.is_some() { MIN_KEYS } else { 1 }
    }

    /// Returns true if this node holds exactly its role's minimum, i.e. it
    /// cannot lose a key without violating the occupancy bounds.
    pub(crate) fn at_minimum(&self) -> bool {
        self.keys.len() == self.minimum_keys()
    }

    /// Returns true if this node can donate a key to a sibling.
    pub(crate) fn can_spare(&self) -> bool {
        self.keys.len() > self.minimum_keys()
    }

    pub(crate) fn parent(&self) -> Option<Handle> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Handle>) {
        self.parent = parent;
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    pub(crate) fn first_key(&self) -> &K {
        &self.keys[0]
    }

    pub(crate) fn last_key(&self) -> &K {
        &self.keys[self.keys.len() - 1]
    }

    #[inline]
    pub(crate) fn child(&self, index: usize) -> Handle {
        self.children[index]
    }

    pub(crate) fn children(&self) -> &[Handle] {
        &self.children
    }

    /// Decomposes the node into its key and child lists.
    pub(crate) fn into_parts(self) -> (SmallVec<[K; MAX_KEYS + 1]>, SmallVec<[Handle; MAX_CHILDREN + 1]>) {
        (self.keys, self.children)
    }

    // ─── Checked mutators ────────────────────────────────────────────────
    //
    // Each mutator re-checks the bound it could break and fails fast; these
    // are the only points where structural corruption could slip in
    // silently. Checks are debug-build only.

    /// Inserts `key` at `index`, shifting later keys right.
    pub(crate) fn insert_key_at(&mut self, index: usize, key: K) {
        debug_assert!(!self.is_full(), "`Node::insert_key_at()` - node is already full!");
        debug_assert!(index <= self.keys.len(), "`Node::insert_key_at()` - `index` is out of bounds!");
        self.keys.insert(index, key);
    }

    /// Removes and returns the key at `index`.
    pub(crate) fn remove_key_at(&mut self, index: usize) -> K {
        debug_assert!(index < self.keys.len(), "`Node::remove_key_at()` - `index` is out of bounds!");
        self.keys.remove(index)
    }

    /// Overwrites the key at `index`, returning the previous key.
    pub(crate) fn replace_key(&mut self, index: usize, key: K) -> K {
        debug_assert!(index < self.keys.len(), "`Node::replace_key()` - `index` is out of bounds!");
        core::mem::replace(&mut self.keys[index], key)
    }

    /// Inserts a child handle at `index`, shifting later children right.
    pub(crate) fn insert_child_at(&mut self, index: usize, child: Handle) {
        debug_assert!(
            self.children.len() < MAX_CHILDREN,
            "`Node::insert_child_at()` - child list is already full!"
        );
        debug_assert!(index <= self.children.len(), "`Node::insert_child_at()` - `index` is out of bounds!");
        self.children.insert(index, child);
    }

    /// Removes and returns the child handle at `index`.
    pub(crate) fn remove_child_at(&mut self, index: usize) -> Handle {
        debug_assert!(index < self.children.len(), "`Node::remove_child_at()` - `index` is out of bounds!");
        self.children.remove(index)
    }

    /// Replaces the whole key list.
    pub(crate) fn set_keys(&mut self, keys: SmallVec<[K; MAX_KEYS + 1]>) {
        debug_assert!(keys.len() >= self.minimum_keys(), "`Node::set_keys()` - below minimum occupancy!");
        debug_assert!(keys.len() <= MAX_KEYS, "`Node::set_keys()` - above maximum occupancy!");
        self.keys = keys;
    }

    /// Replaces the whole child list. Callers must re-parent the children.
    pub(crate) fn set_children(&mut self, children: SmallVec<[Handle; MAX_CHILDREN + 1]>) {
        debug_assert!(
            children.is_empty() || children.len() == self.keys.len() + 1,
            "`Node::set_children()` - children must number keys + 1!"
        );
        self.children = children;
    }

    // ─── Restructuring primitives ────────────────────────────────────────

    /// Splits this full node in two around its middle key.
    ///
    /// Returns `(low, median)`: a brand-new node holding the keys and
    /// children below the median (with this node's parent link copied), and
    /// the median key itself, removed here for the caller to promote. This
    /// node keeps its identity as the high half, so handles held to it stay
    /// meaningful.
    pub(crate) fn split(&mut self) -> (Node<K>, K) {
        debug_assert!(self.is_full(), "`Node::split()` - node is not full!");

        let high_keys: SmallVec<[K; MAX_KEYS + 1]> = self.keys.drain(MIDDLE_INDEX + 1..).collect();
        let median = self.keys.pop().expect("`Node::split()` - missing middle key!");
        let low_keys = core::mem::replace(&mut self.keys, high_keys);

        let low_children = if self.is_leaf() {
            SmallVec::new()
        } else {
            let high_children: SmallVec<[Handle; MAX_CHILDREN + 1]> = self.children.drain(T..).collect();
            core::mem::replace(&mut self.children, high_children)
        };

        let low = Node {
            parent: self.parent,
            keys: low_keys,
            children: low_children,
        };

        (low, median)
    }

    /// Absorbs a right sibling and the separator that sat between them.
    ///
    /// Callers must re-parent the children that arrive from `right`.
    pub(crate) fn merge_right(&mut self, separator: K, right: Node<K>) {
        debug_assert!(
            self.keys.len() + 1 + right.keys.len() <= MAX_KEYS,
            "`Node::merge_right()` - merged node would overflow!"
        );

        let (right_keys, right_children) = right.into_parts();
        self.keys.push(separator);
        self.keys.extend(right_keys);
        self.children.extend(right_children);
    }

    /// Searches for `key` among this node's keys.
    ///
    /// The not-found index is the first position whose key is greater than
    /// `key`: simultaneously the child to descend into and the slot the key
    /// would occupy here.
    #[inline]
    pub(crate) fn search<Q>(&self, key: &Q) -> SearchResult
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        match self.keys.binary_search_by(|k| k.borrow().cmp(key)) {
            Ok(index) => SearchResult::Found(index),
            Err(index) => SearchResult::NotFound(index),
        }
    }
}
