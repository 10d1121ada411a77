//! Regression tree representation.

/// Node identifier: an index into the tree's node array.
pub type NodeId = u32;

mod tree;

pub use tree::{Node, NodeStat, RegTree};
