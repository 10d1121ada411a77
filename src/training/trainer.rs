//! Trainer facade: one tree, one boosting round.
//!
//! [`TreeTrainer`] binds a [`RegTree`] to a parameter set. A boosting driver
//! calls [`TreeTrainer::boost`] once per round with that round's gradients
//! and hessians; afterwards the trainer answers predictions by walking the
//! finished tree. Sparse predictions go through a reusable dense scratch
//! plus unknown mask that is restored after every call.

use rayon::prelude::*;

use crate::data::{RowView, SparseMatrix};
use crate::repr::{NodeId, RegTree};

use super::grower::{BoostReport, TreeGrower};
use super::logger::TrainingLogger;
use super::params::{ParamError, TreeParams};

/// Trains and serves a single regression tree.
pub struct TreeTrainer {
    params: TreeParams,
    tree: RegTree,
    logger: TrainingLogger,
    /// Dense feature scratch for sparse prediction.
    tmp_feat: Vec<f32>,
    /// Unknown mask for sparse prediction; all-true between calls.
    tmp_unknown: Vec<bool>,
}

impl TreeTrainer {
    /// Create a trainer with a fresh tree.
    ///
    /// # Errors
    ///
    /// Returns an error when the parameters fail validation.
    pub fn new(params: TreeParams) -> Result<Self, ParamError> {
        params.validate()?;
        let tree = RegTree::new(params.num_roots);
        let logger = TrainingLogger::new(params.verbosity);
        Ok(Self {
            params,
            tree,
            logger,
            tmp_feat: Vec::new(),
            tmp_unknown: Vec::new(),
        })
    }

    /// Grow the tree for one boosting round.
    ///
    /// `grad` and `hess` are this round's per-instance loss derivatives; an
    /// instance with `hess < 0` is ignored. `group_id` is either empty
    /// (single root) or one group per instance, each below `num_roots`.
    pub fn boost(
        &mut self,
        grad: &[f32],
        hess: &[f32],
        matrix: &SparseMatrix,
        group_id: &[u32],
    ) -> BoostReport {
        assert_eq!(grad.len(), hess.len(), "grad and hess lengths must match");
        assert!(
            grad.len() < u32::MAX as usize,
            "number of instances exceeds supported range"
        );
        assert!(
            matrix.num_rows() >= grad.len(),
            "feature matrix has fewer rows than gradient vector"
        );
        self.logger
            .info(&format!("building tree with {} instances", grad.len()));

        let grower = TreeGrower::new(&self.params, &mut self.tree, grad, hess, matrix, group_id);
        let report = grower.grow();

        self.logger.info(&format!(
            "tree grown: {} roots, {} extra nodes, {} pruned, max_depth={}",
            self.tree.num_roots(),
            self.tree.n_extra_nodes(),
            report.num_pruned,
            report.max_depth
        ));
        report
    }

    /// Predict from a dense feature vector with an unknown mask, starting at
    /// the given root group.
    pub fn predict_dense(&self, feat: &[f32], unknown: &[bool], root: NodeId) -> f32 {
        assert!(
            feat.len() >= self.params.num_feature && unknown.len() >= self.params.num_feature,
            "input feature vector smaller than num_feature"
        );
        let nid = self.tree.leaf_index(feat, unknown, root);
        self.tree.node(nid).leaf_value()
    }

    /// Predict from a sparse row, starting at the given root group.
    ///
    /// Features absent from the row are unknown and follow the tree's
    /// default directions.
    pub fn predict_sparse(&mut self, row: RowView<'_>, root: NodeId) -> f32 {
        self.init_scratch();
        for (findex, fvalue) in row.iter() {
            let findex = findex as usize;
            assert!(
                findex < self.params.num_feature,
                "input feature index exceeds num_feature"
            );
            self.tmp_feat[findex] = fvalue;
            self.tmp_unknown[findex] = false;
        }
        let nid = self.tree.leaf_index(&self.tmp_feat, &self.tmp_unknown, root);
        for &findex in row.findex {
            self.tmp_unknown[findex as usize] = true;
        }
        self.tree.node(nid).leaf_value()
    }

    /// Leaf node id a dense feature vector lands in.
    pub fn leaf_index(&self, feat: &[f32], unknown: &[bool], root: NodeId) -> NodeId {
        self.tree.leaf_index(feat, unknown, root)
    }

    /// Predict every row of a matrix. `group_id` follows the same convention
    /// as [`TreeTrainer::boost`].
    pub fn predict_all(&self, matrix: &SparseMatrix, group_id: &[u32]) -> Vec<f32> {
        let nf = self.params.num_feature;
        let mut feat = vec![0.0f32; nf];
        let mut unknown = vec![true; nf];
        (0..matrix.num_rows())
            .map(|ridx| {
                let root = if group_id.is_empty() {
                    0
                } else {
                    group_id[ridx]
                };
                predict_row_with_scratch(
                    &self.tree,
                    matrix.row(ridx),
                    root,
                    &mut feat,
                    &mut unknown,
                )
            })
            .collect()
    }

    /// Parallel [`TreeTrainer::predict_all`] with per-thread scratch.
    pub fn par_predict_all(&self, matrix: &SparseMatrix, group_id: &[u32]) -> Vec<f32> {
        let nf = self.params.num_feature;
        (0..matrix.num_rows())
            .into_par_iter()
            .map_init(
                || (vec![0.0f32; nf], vec![true; nf]),
                |(feat, unknown), ridx| {
                    let root = if group_id.is_empty() {
                        0
                    } else {
                        group_id[ridx]
                    };
                    predict_row_with_scratch(&self.tree, matrix.row(ridx), root, feat, unknown)
                },
            )
            .collect()
    }

    /// The trained tree.
    pub fn tree(&self) -> &RegTree {
        &self.tree
    }

    /// The parameter set in use.
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Consume the trainer, keeping the tree.
    pub fn into_tree(self) -> RegTree {
        self.tree
    }

    fn init_scratch(&mut self) {
        if self.tmp_feat.len() != self.params.num_feature {
            self.tmp_feat = vec![0.0; self.params.num_feature];
            self.tmp_unknown = vec![true; self.params.num_feature];
        }
    }
}

/// Fill the dense scratch from a sparse row, traverse, and restore the mask.
fn predict_row_with_scratch(
    tree: &RegTree,
    row: RowView<'_>,
    root: NodeId,
    feat: &mut [f32],
    unknown: &mut [bool],
) -> f32 {
    for (findex, fvalue) in row.iter() {
        assert!(
            (findex as usize) < feat.len(),
            "input feature index exceeds num_feature"
        );
        feat[findex as usize] = fvalue;
        unknown[findex as usize] = false;
    }
    let nid = tree.leaf_index(feat, unknown, root);
    for &findex in row.findex {
        unknown[findex as usize] = true;
    }
    tree.node(nid).leaf_value()
}
