//! A parent-linked B-tree for Rust.
//!
//! This crate provides [`BTree`], a self-balancing multi-way search tree of
//! minimum degree 3 over any totally ordered key type. Unlike the standard
//! library's `BTreeSet`, every node carries a non-owning back-reference to
//! its parent, and the tree hands out read-only [`NodeRef`] views so that
//! embedding applications (renderers, drivers, diagnostics) can walk the
//! structure node by node.
//!
//! Both mutating operations repair the tree *while descending*: insertion
//! splits an over-full node before stepping into it, and deletion tops up an
//! at-minimum child (by borrowing from a sibling or merging with one) before
//! stepping into it. No separate rebalancing pass ever runs, and the
//! occupancy, ordering, and uniform-depth invariants hold after every single
//! operation.
//!
//! # Example
//!
//! ```
//! use bough_tree::{BTree, TreeError};
//!
//! let mut tree = BTree::new();
//! for key in [30, 10, 20] {
//!     tree.add(key);
//! }
//!
//! assert!(tree.valid());
//! assert_eq!(tree.in_order().collect::<Vec<_>>(), [&10, &20, &30]);
//!
//! tree.delete(&20).unwrap();
//! assert!(tree.find(&20).is_none());
//! assert_eq!(tree.delete(&20), Err(TreeError::NotFound));
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **Structural introspection** - [`NodeRef`] walks keys, children, and parents read-only
//! - **Self-validating** - [`BTree::valid`] re-checks every structural invariant on demand
//! - **Cache-friendly nodes** - keys and child handles stored inline via `smallvec`

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod error;
mod raw;

pub mod btree;

pub use btree::{BTree, Children, InOrder, NodeRef};
pub use error::{Result, TreeError};
