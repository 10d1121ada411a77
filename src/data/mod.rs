//! Data structures for training inputs.
//!
//! Feature matrices are row-sparse: a row stores only the features that are
//! present for that instance. Absent features are *missing*, and the tree
//! grower learns a default direction for them.

mod sparse;

pub use sparse::{RowView, SparseMatrix};
