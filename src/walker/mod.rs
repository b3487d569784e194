//! Depth-first, post-order traversal of a directory tree.

mod walker;

pub use walker::{WalkError, Walker};
