//! Training parameters and the regularized objective.
//!
//! [`TreeParams`] groups every knob one tree build reads, with defaults
//! matching the usual gradient-boosting conventions. The gain and weight
//! functions implement layer-wise regularization: a child's weight is pulled
//! toward its parent's `base_weight` rather than toward zero.
//!
//! # Weight and cost
//!
//! With L2 strength `λ` and parent anchor `p`:
//!
//! ```text
//! w*(G, H, p)   = (λ·p − G) / (H + λ)
//! cost(G, H, p) = 0.5 · (λ·p − G)² / (H + λ)
//! ```
//!
//! `cost` is the objective reduction a node achieves at its optimal weight;
//! split gain is `cost(left) + cost(right) − root_cost`. At the root the
//! anchor is zero and both reduce to the familiar `−G/(H+λ)` form.

use serde::{Deserialize, Serialize};

use super::logger::Verbosity;

/// Handling of instances whose split feature is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DefaultDirection {
    /// Try both directions and keep the one with higher gain.
    #[default]
    Learn,
    /// Missing instances always go right (only the forward sweep runs).
    Right,
    /// Missing instances always go left (only the backward sweep runs).
    Left,
}

impl DefaultDirection {
    /// Whether split enumeration runs the forward sweep (missing go right).
    #[inline]
    pub fn need_forward(self) -> bool {
        matches!(self, Self::Learn | Self::Right)
    }

    /// Whether split enumeration runs the backward sweep (missing go left).
    #[inline]
    pub fn need_backward(self) -> bool {
        matches!(self, Self::Learn | Self::Left)
    }
}

/// Parameters for growing one regression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParams {
    /// Shrinkage applied to leaf weights. Default: 0.3.
    pub learning_rate: f32,
    /// Minimum loss reduction a split must keep to survive pruning.
    /// Default: 0.0.
    pub min_split_loss: f32,
    /// Maximum tree depth. Default: 6.
    pub max_depth: u32,
    /// L2 regularization on leaf weights. Default: 1.0.
    pub reg_lambda: f32,
    /// Minimum sum of hessians required in each child. Default: 1.0.
    pub min_child_weight: f32,
    /// Default direction for missing feature values. Default: learned.
    pub default_direction: DefaultDirection,
    /// Row subsampling ratio in (0, 1]. Default: 1.0 (no sampling).
    pub subsample: f32,
    /// Number of features instances may reference.
    pub num_feature: usize,
    /// Number of root groups (one subtree each). Default: 1.
    pub num_roots: u32,
    /// Seed for the subsampling RNG. Default: 0.
    pub seed: u64,
    /// Logging verbosity. Default: info.
    pub verbosity: Verbosity,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            min_split_loss: 0.0,
            max_depth: 6,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
            default_direction: DefaultDirection::Learn,
            subsample: 1.0,
            num_feature: 0,
            num_roots: 1,
            seed: 0,
            verbosity: Verbosity::Info,
        }
    }
}

impl TreeParams {
    /// Create params for a matrix with the given number of features.
    pub fn new(num_feature: usize) -> Self {
        Self {
            num_feature,
            ..Default::default()
        }
    }

    /// Builder: set the learning rate.
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Builder: set the pruning threshold (minimum split loss).
    pub fn with_min_split_loss(mut self, gamma: f32) -> Self {
        self.min_split_loss = gamma;
        self
    }

    /// Builder: set the maximum depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Builder: set L2 regularization.
    pub fn with_reg_lambda(mut self, reg_lambda: f32) -> Self {
        self.reg_lambda = reg_lambda;
        self
    }

    /// Builder: set the minimum child hessian sum.
    pub fn with_min_child_weight(mut self, min_child_weight: f32) -> Self {
        self.min_child_weight = min_child_weight;
        self
    }

    /// Builder: set the default direction policy.
    pub fn with_default_direction(mut self, direction: DefaultDirection) -> Self {
        self.default_direction = direction;
        self
    }

    /// Builder: set the row subsampling ratio.
    pub fn with_subsample(mut self, subsample: f32) -> Self {
        self.subsample = subsample;
        self
    }

    /// Builder: set the number of root groups.
    pub fn with_num_roots(mut self, num_roots: u32) -> Self {
        self.num_roots = num_roots;
        self
    }

    /// Builder: set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder: set the logging verbosity.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid parameter found.
    pub fn validate(&self) -> Result<(), ParamError> {
        if !(self.learning_rate > 0.0) {
            return Err(ParamError::InvalidLearningRate(self.learning_rate));
        }
        if self.min_split_loss < 0.0 {
            return Err(ParamError::InvalidMinSplitLoss(self.min_split_loss));
        }
        if self.reg_lambda < 0.0 {
            return Err(ParamError::InvalidRegLambda(self.reg_lambda));
        }
        if self.min_child_weight < 0.0 {
            return Err(ParamError::InvalidMinChildWeight(self.min_child_weight));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ParamError::InvalidSubsample(self.subsample));
        }
        if self.num_roots == 0 {
            return Err(ParamError::InvalidNumRoots);
        }
        Ok(())
    }

    /// Optimal regularized weight for a node, anchored at the parent weight.
    ///
    /// Returns 0 when the hessian sum is below `min_child_weight`.
    pub fn calc_weight(&self, sum_grad: f64, sum_hess: f64, parent_weight: f64) -> f64 {
        if sum_hess < self.min_child_weight as f64 {
            return 0.0;
        }
        let lambda = self.reg_lambda as f64;
        (lambda * parent_weight - sum_grad) / (sum_hess + lambda)
    }

    /// Objective reduction a node achieves at its optimal anchored weight.
    pub fn calc_cost(&self, sum_grad: f64, sum_hess: f64, parent_weight: f64) -> f64 {
        let lambda = self.reg_lambda as f64;
        let delta = lambda * parent_weight - sum_grad;
        0.5 * delta * delta / (sum_hess + lambda)
    }

    /// Objective reduction for a node treated as its own root (zero anchor).
    pub fn calc_root_cost(&self, sum_grad: f64, sum_hess: f64) -> f64 {
        self.calc_cost(sum_grad, sum_hess, 0.0)
    }

    /// Whether a recorded split gain is low enough to prune away.
    #[inline]
    pub fn need_prune(&self, loss_chg: f64, _depth: u32) -> bool {
        loss_chg < self.min_split_loss as f64
    }

    /// Whether a node's hessian sum is too small to form two children.
    #[inline]
    pub fn cannot_split(&self, sum_hess: f64, _depth: u32) -> bool {
        sum_hess < 2.0 * self.min_child_weight as f64
    }
}

/// Parameter validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParamError {
    /// learning_rate must be > 0.
    #[error("learning_rate must be > 0, got {0}")]
    InvalidLearningRate(f32),

    /// min_split_loss must be >= 0.
    #[error("min_split_loss must be >= 0, got {0}")]
    InvalidMinSplitLoss(f32),

    /// reg_lambda must be >= 0.
    #[error("reg_lambda must be >= 0, got {0}")]
    InvalidRegLambda(f32),

    /// min_child_weight must be >= 0.
    #[error("min_child_weight must be >= 0, got {0}")]
    InvalidMinChildWeight(f32),

    /// subsample must be in (0, 1].
    #[error("subsample must be in (0, 1], got {0}")]
    InvalidSubsample(f32),

    /// num_roots must be >= 1.
    #[error("num_roots must be >= 1")]
    InvalidNumRoots,
}
