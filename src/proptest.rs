//! Strategies for property-based testing of patterns.
use ::proptest::collection::vec;
use ::proptest::prelude::*;

/// Dimensions `(n_rows, n_cols)` together with a list of (possibly duplicated) entries
/// that are in bounds for those dimensions.
pub fn pattern_entries(
    max_rows: usize,
    max_cols: usize,
    max_entries: usize,
) -> impl Strategy<Value = (usize, usize, Vec<(usize, usize)>)> {
    (0..=max_rows, 0..=max_cols).prop_flat_map(move |(n_rows, n_cols)| {
        // Can't generate any entries for an empty pattern
        let num_entries = if n_rows == 0 || n_cols == 0 { 0..=0 } else { 0..=max_entries };
        let entries = vec((0..n_rows.max(1), 0..n_cols.max(1)), num_entries);
        (Just(n_rows), Just(n_cols), entries)
    })
}

/// A non-empty list of block sizes. Individual blocks may be empty.
pub fn block_sizes(max_blocks: usize, max_block_size: usize) -> impl Strategy<Value = Vec<usize>> {
    vec(0..=max_block_size, 1..=max_blocks.max(1))
}

/// Boundary flags for each DoF of a system with at most `max_dofs` DoFs.
pub fn boundary_flags(max_dofs: usize) -> impl Strategy<Value = Vec<bool>> {
    vec(any::<bool>(), 0..=max_dofs)
}
