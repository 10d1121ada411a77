//! Single-tree grower.
//!
//! [`TreeGrower`] builds one regression tree from per-instance gradients and
//! hessians over a row-sparse feature matrix. Growth is driven by a
//! depth-first stack of pending node expansions. Each expansion reprojects
//! the node's instances into column-major order, enumerates candidate splits
//! per feature with both default directions, and either installs the best
//! split (partitioning the instance-id set in place and queueing two child
//! tasks) or finalizes the node as a leaf and lets pruning walk upward.
//!
//! # Instance-id sets
//!
//! All live tasks share one backing buffer of row ids, each owning a
//! disjoint sorted range. Splitting a node reshuffles its range in place so
//! the two children own two contiguous subranges; sibling subtrees never
//! interleave, which is why depth-first order keeps the buffer access local.
//!
//! # Sparsity
//!
//! Rows missing the split feature never appear in its column, so the
//! enumerator sweeps each column twice: forward (missing rows default right)
//! and backward (missing rows default left). The sweep with the higher gain
//! wins, and the chosen direction is packed into the stored split index.

use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::SparseMatrix;
use crate::repr::{NodeId, RegTree};

use super::params::TreeParams;
use super::scratch::{ColumnEntry, ColumnScratch};
use super::selector::{SplitCandidate, SplitSelector};

/// Gain floor for installing a split; also the threshold nudge past the
/// extreme value at a sweep's end.
pub(crate) const RT_EPS: f32 = 1e-5;
/// Strict-separation guard between adjacent feature values.
const RT_2EPS: f32 = 2.0 * RT_EPS;

/// Statistics reported by one tree build.
#[derive(Debug, Clone, Copy)]
pub struct BoostReport {
    /// Deepest node reached.
    pub max_depth: u32,
    /// Number of nodes removed by pruning.
    pub num_pruned: u32,
    /// Total allocated nodes, including detached ones.
    pub n_nodes: usize,
}

/// A pending node expansion: a tree node plus the range of the shared id
/// buffer it owns, and the parent's base weight as regularization anchor.
#[derive(Debug, Clone, Copy)]
struct Task {
    nid: NodeId,
    start: usize,
    len: usize,
    parent_weight: f32,
}

impl Task {
    fn new(nid: NodeId, start: usize, len: usize, parent_weight: f32) -> Self {
        Self {
            nid,
            start,
            len,
            parent_weight,
        }
    }
}

/// Grows one tree for one boosting round.
///
/// Holds exclusive mutable access to the tree and all scratch state for the
/// duration of the build; gradients, hessians, the feature matrix, and group
/// ids are borrowed read-only.
pub struct TreeGrower<'a> {
    params: &'a TreeParams,
    tree: &'a mut RegTree,
    grad: &'a [f32],
    hess: &'a [f32],
    matrix: &'a SparseMatrix,
    group_id: &'a [u32],
    /// LIFO stack of pending expansions (depth-first order).
    tasks: Vec<Task>,
    /// Shared backing buffer of instance ids, partitioned among live tasks.
    idset: Vec<u32>,
    /// Column-major reprojection scratch, reused across expansions.
    scratch: ColumnScratch,
    /// Reusable buffer for the split-side row ids of one split.
    qset: Vec<u32>,
    rng: Xoshiro256PlusPlus,
    max_depth_seen: u32,
    num_pruned: u32,
}

impl<'a> TreeGrower<'a> {
    /// Create a grower for one tree build.
    pub fn new(
        params: &'a TreeParams,
        tree: &'a mut RegTree,
        grad: &'a [f32],
        hess: &'a [f32],
        matrix: &'a SparseMatrix,
        group_id: &'a [u32],
    ) -> Self {
        debug_assert_eq!(grad.len(), hess.len());
        Self {
            params,
            tree,
            grad,
            hess,
            matrix,
            group_id,
            tasks: Vec::new(),
            idset: Vec::new(),
            scratch: ColumnScratch::new(),
            qset: Vec::new(),
            rng: Xoshiro256PlusPlus::seed_from_u64(params.seed),
            max_depth_seen: 0,
            num_pruned: 0,
        }
    }

    /// Run the build to completion and report statistics.
    pub fn grow(mut self) -> BoostReport {
        self.init_tasks();
        while let Some(task) = self.tasks.pop() {
            self.expand(task);
        }
        BoostReport {
            max_depth: self.max_depth_seen,
            num_pruned: self.num_pruned,
            n_nodes: self.tree.n_nodes(),
        }
    }

    // ------------------------------------------------------------------
    // Root initialization
    // ------------------------------------------------------------------

    /// Build the root id set(s) and seed the task stack.
    ///
    /// Instances with a negative hessian are dropped everywhere: the hessian
    /// channel doubles as an ignore marker for the boosting driver.
    fn init_tasks(&mut self) {
        let n = self.grad.len();

        if self.group_id.is_empty() {
            if self.params.subsample > 1.0 - 1e-6 {
                self.idset
                    .extend((0..n as u32).filter(|&i| self.hess[i as usize] >= 0.0));
            } else {
                for i in 0..n {
                    if self.hess[i] < 0.0 {
                        continue;
                    }
                    if self.rng.gen::<f32>() < self.params.subsample {
                        self.idset.push(i as u32);
                    }
                }
            }
            let len = self.idset.len();
            self.tasks.push(Task::new(0, 0, len, 0.0));
            return;
        }

        assert_eq!(
            self.group_id.len(),
            n,
            "group id length must match instance count"
        );
        let num_roots = self.params.num_roots as usize;

        // Counting-sort partition of surviving rows keyed by group id.
        let mut rptr = vec![0usize; num_roots + 1];
        for i in 0..n {
            if self.hess[i] < 0.0 {
                continue;
            }
            let gid = self.group_id[i] as usize;
            assert!(gid < num_roots, "group id {} exceeds number of roots", gid);
            rptr[gid + 1] += 1;
        }
        for g in 0..num_roots {
            rptr[g + 1] += rptr[g];
        }
        self.idset.resize(rptr[num_roots], 0);
        let mut cursor = rptr.clone();
        for i in 0..n {
            if self.hess[i] < 0.0 {
                continue;
            }
            let gid = self.group_id[i] as usize;
            self.idset[cursor[gid]] = i as u32;
            cursor[gid] += 1;
        }
        for g in 0..num_roots {
            let (start, end) = (rptr[g], rptr[g + 1]);
            if start < end {
                self.tasks
                    .push(Task::new(g as NodeId, start, end - start, 0.0));
            }
        }
    }

    // ------------------------------------------------------------------
    // Node expansion
    // ------------------------------------------------------------------

    /// Expand one task into a split or finalize it as a leaf.
    fn expand(&mut self, task: Task) {
        let depth = self.tree.depth(task.nid);
        if depth > self.max_depth_seen {
            self.max_depth_seen = depth;
        }
        if depth >= self.params.max_depth {
            self.make_leaf(task, None);
            return;
        }

        // Budget phase: per-feature entry counts plus the node's totals.
        self.scratch.init_budget(self.params.num_feature);
        let mut rsum_grad = 0.0f64;
        let mut rsum_hess = 0.0f64;
        for &ridx in &self.idset[task.start..task.start + task.len] {
            rsum_grad += self.grad[ridx as usize] as f64;
            rsum_hess += self.hess[ridx as usize] as f64;
            for &findex in self.matrix.row(ridx as usize).findex {
                self.scratch.add_budget(findex);
            }
        }

        if self.params.cannot_split(rsum_hess, depth) {
            self.make_leaf(task, Some((rsum_grad, rsum_hess)));
            self.scratch.cleanup();
            return;
        }

        // Storage phase: regroup the rows' entries by feature.
        self.scratch.init_storage();
        for &ridx in &self.idset[task.start..task.start + task.len] {
            for (findex, fvalue) in self.matrix.row(ridx as usize).iter() {
                self.scratch.push(findex, ColumnEntry::new(fvalue, ridx));
            }
        }

        let root_cost = self.params.calc_root_cost(rsum_grad, rsum_hess);
        // Weight of this node if it stays a leaf; also the regularization
        // anchor handed to both children.
        let base_weight =
            self.params
                .calc_weight(rsum_grad, rsum_hess, task.parent_weight as f64);

        let mut selector = SplitSelector::new();
        let params = self.params;
        let grad = self.grad;
        let hess = self.hess;
        self.scratch.for_each_column(|findex, col_start, column| {
            // Local sort beats one global sort when features are sparse.
            column.sort_unstable_by(|a, b| {
                a.fvalue
                    .partial_cmp(&b.fvalue)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            enumerate_column(
                params,
                grad,
                hess,
                column,
                col_start,
                findex,
                rsum_grad,
                rsum_hess,
                root_cost,
                base_weight,
                &mut selector,
            );
        });
        self.scratch.cleanup();

        let best = *selector.best();
        if best.loss_chg > RT_EPS {
            self.tree.set_split(
                task.nid,
                best.split_index(),
                best.split_value,
                best.default_left(),
            );
            self.make_split(task, &best, base_weight);
        } else {
            self.make_leaf(task, Some((rsum_grad, rsum_hess)));
        }
    }

    /// Partition the task's id range between the two children of a freshly
    /// installed split and queue their expansions.
    fn make_split(&mut self, task: Task, best: &SplitCandidate, base_weight: f64) {
        {
            let stat = self.tree.stat_mut(task.nid);
            stat.loss_chg = best.loss_chg;
            stat.base_weight = base_weight as f32;
            stat.leaf_child_cnt = 0;
        }
        let (cleft, cright) = self.tree.add_children(task.nid);

        // Split-side row ids, ascending.
        self.qset.clear();
        self.qset.extend(
            self.scratch.entries()[best.start..best.start + best.len]
                .iter()
                .map(|e| e.rindex),
        );
        self.qset.sort_unstable();
        debug_assert!(self.qset.len() <= task.len);

        // Merge-style removal: compact the ids NOT in qset to the front,
        // preserving their ascending order, then write qset into the tail.
        // Both sides of the range stay sorted.
        let ids = &mut self.idset[task.start..task.start + task.len];
        let mut top = 0usize;
        for i in 0..ids.len() {
            if top < self.qset.len() && ids[i] == self.qset[top] {
                top += 1;
            } else {
                ids[i - top] = ids[i];
            }
        }
        debug_assert_eq!(top, self.qset.len(), "split side must be a subset");
        let def_len = task.len - self.qset.len();
        ids[def_len..].copy_from_slice(&self.qset);

        // The default child owns the rows missing the split feature.
        let (def_nid, spl_nid) = if best.default_left() {
            (cleft, cright)
        } else {
            (cright, cleft)
        };
        let anchor = base_weight as f32;
        self.tasks
            .push(Task::new(def_nid, task.start, def_len, anchor));
        self.tasks.push(Task::new(
            spl_nid,
            task.start + def_len,
            self.qset.len(),
            anchor,
        ));
    }

    /// Finalize a task as a leaf and give pruning a chance to collapse
    /// ancestors. `sums` carries the node totals when the caller already
    /// accumulated them.
    fn make_leaf(&mut self, task: Task, sums: Option<(f64, f64)>) {
        let (sum_grad, sum_hess) = match sums {
            Some(sums) => sums,
            None => {
                let mut sum_grad = 0.0f64;
                let mut sum_hess = 0.0f64;
                for &ridx in &self.idset[task.start..task.start + task.len] {
                    sum_grad += self.grad[ridx as usize] as f64;
                    sum_hess += self.hess[ridx as usize] as f64;
                }
                (sum_grad, sum_hess)
            }
        };
        let weight = self
            .params
            .calc_weight(sum_grad, sum_hess, task.parent_weight as f64);
        self.tree
            .set_leaf(task.nid, self.params.learning_rate * weight as f32);
        let depth = self.tree.depth(task.nid);
        self.try_prune_leaf(task.nid, depth);
    }

    /// Walk upward from a fresh leaf, collapsing each ancestor whose
    /// children are both leaves and whose recorded gain fails the pruning
    /// threshold. Stops at the first ancestor that keeps its split, or at a
    /// root.
    fn try_prune_leaf(&mut self, nid: NodeId, depth: u32) {
        let mut nid = nid;
        let mut depth = depth;
        while !self.tree.node(nid).is_root() {
            let pid = self.tree.node(nid).parent();
            self.tree.stat_mut(pid).leaf_child_cnt += 1;
            let stat = *self.tree.stat(pid);
            if stat.leaf_child_cnt >= 2
                && self.params.need_prune(stat.loss_chg as f64, depth - 1)
            {
                self.tree
                    .change_to_leaf(pid, self.params.learning_rate * stat.base_weight);
                self.num_pruned += 2;
                nid = pid;
                depth -= 1;
            } else {
                return;
            }
        }
    }
}

// ----------------------------------------------------------------------
// Split enumeration
// ----------------------------------------------------------------------

/// Enumerate the split points of one sorted feature column, contributing the
/// column's best candidate to the global selector.
///
/// The forward sweep accumulates the left child and assigns missing rows to
/// the right; the backward sweep mirrors it. A split point is valid at the
/// end of the sweep or where adjacent values are separated by more than
/// `2ε`. Thresholds are midpoints between adjacent values, nudged by `ε`
/// past the extreme value at the sweep's end.
#[allow(clippy::too_many_arguments)]
fn enumerate_column(
    params: &TreeParams,
    grad: &[f32],
    hess: &[f32],
    column: &[ColumnEntry],
    col_start: usize,
    findex: u32,
    rsum_grad: f64,
    rsum_hess: f64,
    root_cost: f64,
    parent_weight: f64,
    global: &mut SplitSelector,
) {
    let mut local = SplitSelector::new();
    let n = column.len();
    let min_child_weight = params.min_child_weight as f64;

    if params.default_direction.need_forward() {
        // Forward sweep: accumulate the left child, missing rows default right.
        let mut csum_grad = 0.0f64;
        let mut csum_hess = 0.0f64;
        for j in 0..n {
            let ridx = column[j].rindex as usize;
            csum_grad += grad[ridx] as f64;
            csum_hess += hess[ridx] as f64;
            let tail = j == n - 1;
            if tail || column[j].fvalue + RT_2EPS < column[j + 1].fvalue {
                if csum_hess < min_child_weight {
                    continue;
                }
                let dsum_hess = rsum_hess - csum_hess;
                if dsum_hess < min_child_weight {
                    // Monotone in j: no later point can restore the other side.
                    break;
                }
                let loss_chg = params.calc_cost(csum_grad, csum_hess, parent_weight)
                    + params.calc_cost(rsum_grad - csum_grad, dsum_hess, parent_weight)
                    - root_cost;
                let split_value = if tail {
                    column[j].fvalue + RT_EPS
                } else {
                    0.5 * (column[j].fvalue + column[j + 1].fvalue)
                };
                local.push(SplitCandidate::new(
                    loss_chg as f32,
                    col_start,
                    j + 1,
                    findex,
                    split_value,
                    false,
                ));
            }
        }
    }

    if params.default_direction.need_backward() {
        // Backward sweep: accumulate the right child, missing rows default left.
        let mut csum_grad = 0.0f64;
        let mut csum_hess = 0.0f64;
        for j in (1..=n).rev() {
            let ridx = column[j - 1].rindex as usize;
            csum_grad += grad[ridx] as f64;
            csum_hess += hess[ridx] as f64;
            let head = j == 1;
            if head || column[j - 2].fvalue + RT_2EPS < column[j - 1].fvalue {
                if csum_hess < min_child_weight {
                    continue;
                }
                let dsum_hess = rsum_hess - csum_hess;
                if dsum_hess < min_child_weight {
                    break;
                }
                let loss_chg = params.calc_cost(csum_grad, csum_hess, parent_weight)
                    + params.calc_cost(rsum_grad - csum_grad, dsum_hess, parent_weight)
                    - root_cost;
                let split_value = if head {
                    column[0].fvalue - RT_EPS
                } else {
                    0.5 * (column[j - 2].fvalue + column[j - 1].fvalue)
                };
                local.push(SplitCandidate::new(
                    loss_chg as f32,
                    col_start + j - 1,
                    n - j + 1,
                    findex,
                    split_value,
                    true,
                ));
            }
        }
    }

    global.push(*local.best());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::params::DefaultDirection;

    fn entries(pairs: &[(f32, u32)]) -> Vec<ColumnEntry> {
        pairs.iter().map(|&(v, r)| ColumnEntry::new(v, r)).collect()
    }

    #[test]
    fn enumerate_finds_midpoint_split() {
        // Rows 0,1 at x=1 with grad +1; rows 2,3 at x=2 with grad -1.
        let params = TreeParams::new(1);
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0; 4];
        let column = entries(&[(1.0, 0), (1.0, 1), (2.0, 2), (2.0, 3)]);

        let mut selector = SplitSelector::new();
        enumerate_column(
            &params,
            &grad,
            &hess,
            &column,
            0,
            0,
            0.0,
            4.0,
            params.calc_root_cost(0.0, 4.0),
            0.0,
            &mut selector,
        );

        let best = selector.best();
        assert!(best.loss_chg > 0.0);
        assert_eq!(best.split_value, 1.5);
        assert_eq!(best.split_index(), 0);
        // gain = 0.5·4/3 · 2 with λ = 1
        assert!((best.loss_chg - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn enumerate_respects_min_child_weight() {
        let params = TreeParams::new(1).with_min_child_weight(3.0);
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0; 4];
        let column = entries(&[(1.0, 0), (1.0, 1), (2.0, 2), (2.0, 3)]);

        let mut selector = SplitSelector::new();
        enumerate_column(
            &params,
            &grad,
            &hess,
            &column,
            0,
            0,
            0.0,
            4.0,
            params.calc_root_cost(0.0, 4.0),
            0.0,
            &mut selector,
        );

        // Neither side can reach 3.0 hessians; no candidate survives.
        assert_eq!(selector.best().loss_chg, 0.0);
    }

    #[test]
    fn enumerate_skips_tied_values() {
        // All values equal: the only valid point is the tail, which leaves
        // the other side empty.
        let params = TreeParams::new(1);
        let grad = [1.0, -1.0];
        let hess = [1.0; 2];
        let column = entries(&[(2.0, 0), (2.0, 1)]);

        let mut selector = SplitSelector::new();
        enumerate_column(
            &params,
            &grad,
            &hess,
            &column,
            0,
            0,
            0.0,
            2.0,
            params.calc_root_cost(0.0, 2.0),
            0.0,
            &mut selector,
        );
        assert_eq!(selector.best().loss_chg, 0.0);
    }

    #[test]
    fn sweep_direction_controls_default_side() {
        // Rows 0,1 carry the feature; row 2 is missing (absent from the
        // column) but counted in the node totals.
        let grad = [1.0, -1.0, -1.0];
        let hess = [1.0; 3];
        let column = entries(&[(1.0, 0), (2.0, 1)]);
        let rsum_grad = -1.0;
        let rsum_hess = 3.0;

        let forward_only = TreeParams::new(1)
            .with_default_direction(DefaultDirection::Right)
            .with_min_child_weight(0.5);
        let mut selector = SplitSelector::new();
        enumerate_column(
            &forward_only,
            &grad,
            &hess,
            &column,
            0,
            0,
            rsum_grad,
            rsum_hess,
            forward_only.calc_root_cost(rsum_grad, rsum_hess),
            0.0,
            &mut selector,
        );
        assert!(!selector.best().default_left());

        let backward_only = TreeParams::new(1)
            .with_default_direction(DefaultDirection::Left)
            .with_min_child_weight(0.5);
        let mut selector = SplitSelector::new();
        enumerate_column(
            &backward_only,
            &grad,
            &hess,
            &column,
            0,
            0,
            rsum_grad,
            rsum_hess,
            backward_only.calc_root_cost(rsum_grad, rsum_hess),
            0.0,
            &mut selector,
        );
        assert!(selector.best().default_left());
    }

    #[test]
    fn candidate_slice_identifies_swept_side() {
        // Forward candidates point at the left (accumulated) rows; offsets
        // are global into the entry buffer, here starting at 4.
        let params = TreeParams::new(1).with_default_direction(DefaultDirection::Right);
        let mut grad = [0.0f32; 10];
        let mut hess = [0.0f32; 10];
        for &(r, g) in &[(7usize, 1.0f32), (9, 1.0), (3, -1.0), (5, -1.0)] {
            grad[r] = g;
            hess[r] = 1.0;
        }
        let column = entries(&[(1.0, 7), (1.0, 9), (2.0, 3), (2.0, 5)]);

        let mut selector = SplitSelector::new();
        enumerate_column(
            &params,
            &grad,
            &hess,
            &column,
            4,
            0,
            0.0,
            4.0,
            params.calc_root_cost(0.0, 4.0),
            0.0,
            &mut selector,
        );

        let best = selector.best();
        assert!(best.loss_chg > 0.0);
        assert_eq!(best.start, 4);
        assert_eq!(best.len, 2);
    }
}
