//! arbor: exact greedy regression trees for gradient boosting.
//!
//! This crate implements the single-tree learner at the core of a gradient
//! boosting round: given per-instance first- and second-order loss
//! derivatives and a row-sparse feature matrix, it grows one regression tree
//! by exact greedy split enumeration with sparsity-aware default directions,
//! layer-wise weight regularization, and bottom-up pruning.

pub mod data;
pub mod io;
pub mod repr;
pub mod training;
