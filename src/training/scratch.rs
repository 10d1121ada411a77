//! Reusable column-major reprojection scratch.
//!
//! Node expansion needs the active instances of a node regrouped by feature:
//! for every feature present in the node's rows, a contiguous run of
//! `(value, row)` entries. [`ColumnScratch`] builds that layout in two passes
//! over the rows:
//!
//! 1. **Budget**: [`ColumnScratch::add_budget`] counts entries per feature
//!    and records which features were touched at all (the *active list*).
//! 2. **Storage**: [`ColumnScratch::init_storage`] turns counts into segment
//!    offsets and sizes the entry buffer; [`ColumnScratch::push`] then drops
//!    each entry into its feature's segment.
//!
//! The scratch is reused across every node expansion of a tree build.
//! [`ColumnScratch::cleanup`] restores the counter array by zeroing only the
//! slots on the active list, so per-node overhead is proportional to the
//! features the node actually touches, not to the full feature space. Deep
//! trees over wide sparse matrices depend on that amortization.

/// One entry of a feature column: a value and the row it came from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnEntry {
    /// Feature value.
    pub fvalue: f32,
    /// Row index the value belongs to.
    pub rindex: u32,
}

impl ColumnEntry {
    /// Create an entry.
    #[inline]
    pub fn new(fvalue: f32, rindex: u32) -> Self {
        Self { fvalue, rindex }
    }
}

/// Reusable scratch building a column-major view of one node's rows.
///
/// `rptr[f + 1]` carries feature `f`'s entry count during the budget phase
/// and its write cursor during the storage phase; after all pushes it is the
/// end offset of `f`'s segment. Segments are laid out in ascending feature
/// order, so walking the sorted active list with a running start offset
/// recovers every column slice.
#[derive(Debug, Default)]
pub struct ColumnScratch {
    /// Per-feature counter/cursor array, length num_features + 1.
    /// All-zero between uses.
    rptr: Vec<usize>,
    /// Entry storage, segmented by feature.
    entries: Vec<ColumnEntry>,
    /// Features touched during the current invocation.
    active: Vec<u32>,
}

impl ColumnScratch {
    /// Create an empty scratch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a budget phase for a feature space of the given width.
    ///
    /// The counter array is sized on first use and kept between uses; a
    /// prior [`ColumnScratch::cleanup`] must have restored it to zero.
    pub fn init_budget(&mut self, num_features: usize) {
        debug_assert!(self.active.is_empty(), "cleanup was not called");
        if self.rptr.len() != num_features + 1 {
            self.rptr.clear();
            self.rptr.resize(num_features + 1, 0);
        }
    }

    /// Count one entry for `findex`, recording it in the active list on
    /// first touch.
    #[inline]
    pub fn add_budget(&mut self, findex: u32) {
        let slot = findex as usize + 1;
        assert!(
            slot < self.rptr.len(),
            "feature index {} out of range",
            findex
        );
        if self.rptr[slot] == 0 {
            self.active.push(findex);
        }
        self.rptr[slot] += 1;
    }

    /// End the budget phase: lay out one segment per active feature and size
    /// the entry buffer.
    pub fn init_storage(&mut self) {
        self.active.sort_unstable();
        let mut start = 0usize;
        for &f in &self.active {
            let slot = f as usize + 1;
            let count = self.rptr[slot];
            self.rptr[slot] = start;
            start += count;
        }
        self.entries.resize(start, ColumnEntry::default());
    }

    /// Write one entry into its feature's segment. The number of pushes per
    /// feature must match the budget.
    #[inline]
    pub fn push(&mut self, findex: u32, entry: ColumnEntry) {
        let slot = findex as usize + 1;
        self.entries[self.rptr[slot]] = entry;
        self.rptr[slot] += 1;
    }

    /// Visit every active column as `(findex, start_offset, entries)` in
    /// ascending feature order. Only valid after all pushes are done.
    pub fn for_each_column<F>(&mut self, mut f: F)
    where
        F: FnMut(u32, usize, &mut [ColumnEntry]),
    {
        let mut start = 0usize;
        for &findex in &self.active {
            let end = self.rptr[findex as usize + 1];
            debug_assert!(start < end, "active column must be non-empty");
            f(findex, start, &mut self.entries[start..end]);
            start = end;
        }
    }

    /// The features touched during this invocation, ascending after
    /// [`ColumnScratch::init_storage`].
    #[inline]
    pub fn active_columns(&self) -> &[u32] {
        &self.active
    }

    /// The full entry buffer. Segment offsets recorded during enumeration
    /// stay valid until the next [`ColumnScratch::init_storage`].
    #[inline]
    pub fn entries(&self) -> &[ColumnEntry] {
        &self.entries
    }

    /// Restore the counter array by zeroing the active slots only, and clear
    /// the active list. Entry storage is left in place.
    pub fn cleanup(&mut self) {
        for &f in &self.active {
            self.rptr[f as usize + 1] = 0;
        }
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run one full budget → storage → push cycle for `(findex, fvalue, row)`
    /// triples.
    fn build(scratch: &mut ColumnScratch, num_features: usize, data: &[(u32, f32, u32)]) {
        scratch.init_budget(num_features);
        for &(f, _, _) in data {
            scratch.add_budget(f);
        }
        scratch.init_storage();
        for &(f, v, r) in data {
            scratch.push(f, ColumnEntry::new(v, r));
        }
    }

    #[test]
    fn groups_entries_by_feature() {
        let mut scratch = ColumnScratch::new();
        build(
            &mut scratch,
            4,
            &[(2, 1.0, 0), (0, 2.0, 1), (2, 3.0, 1), (0, 4.0, 2)],
        );

        assert_eq!(scratch.active_columns(), &[0, 2]);

        let mut seen = Vec::new();
        scratch.for_each_column(|findex, start, column| {
            seen.push((findex, start, column.to_vec()));
        });

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 0);
        assert_eq!(seen[0].1, 0);
        assert_eq!(
            seen[0].2,
            vec![ColumnEntry::new(2.0, 1), ColumnEntry::new(4.0, 2)]
        );
        assert_eq!(seen[1].0, 2);
        assert_eq!(seen[1].1, 2);
        assert_eq!(
            seen[1].2,
            vec![ColumnEntry::new(1.0, 0), ColumnEntry::new(3.0, 1)]
        );
    }

    #[test]
    fn cleanup_enables_reuse_with_different_columns() {
        let mut scratch = ColumnScratch::new();
        build(&mut scratch, 8, &[(7, 1.0, 0), (3, 2.0, 0)]);
        scratch.cleanup();

        // A second invocation touching other columns must see a clean state.
        build(&mut scratch, 8, &[(1, 5.0, 4)]);
        assert_eq!(scratch.active_columns(), &[1]);

        let mut count = 0;
        scratch.for_each_column(|findex, _, column| {
            assert_eq!(findex, 1);
            assert_eq!(column, &[ColumnEntry::new(5.0, 4)]);
            count += 1;
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn entries_survive_cleanup() {
        let mut scratch = ColumnScratch::new();
        build(&mut scratch, 2, &[(0, 1.0, 0), (1, 2.0, 1)]);
        scratch.cleanup();

        // Offsets recorded before cleanup still index valid storage.
        assert_eq!(scratch.entries()[0], ColumnEntry::new(1.0, 0));
        assert_eq!(scratch.entries()[1], ColumnEntry::new(2.0, 1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn rejects_feature_out_of_range() {
        let mut scratch = ColumnScratch::new();
        scratch.init_budget(2);
        scratch.add_budget(2);
    }
}
