//! Error types for `bough_tree`.

use thiserror::Error;

/// Convenient result alias for fallible tree operations.
pub type Result<T> = core::result::Result<T, TreeError>;

/// The recoverable failures a tree operation can report.
///
/// Structural corruption is never reported through this enum: an occupancy or
/// child-count inconsistency is a defect in the tree algorithms themselves and
/// trips a debug assertion instead of surfacing as a value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum TreeError {
    /// `delete` was called with a key the tree does not contain.
    ///
    /// No key is removed; the key set is exactly what it was.
    #[error("key not found in tree")]
    NotFound,

    /// `delete` removed the final key from a single-node tree.
    ///
    /// The removal *did* happen; the tree is now empty. The caller decides
    /// whether an empty tree is acceptable or the structure should be
    /// discarded.
    #[error("deleted the last key; tree is now empty")]
    EmptyTree,
}
