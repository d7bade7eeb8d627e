use fenris_sparsity::error::IndexKind;
use fenris_sparsity::proptest::pattern_entries;
use fenris_sparsity::{CompressedPattern, PatternError, PatternStatistics};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn small_pattern() -> CompressedPattern {
    let mut pattern = CompressedPattern::new(3, 4);
    for (i, j) in [(0, 3), (2, 1), (0, 0), (1, 1), (0, 3)] {
        pattern.add(i, j).unwrap();
    }
    pattern
}

#[test]
fn compressed_pattern_statistics() {
    let mut pattern = small_pattern();
    assert_eq!(pattern.n_rows(), 3);
    assert_eq!(pattern.n_columns(), 4);
    assert_eq!(pattern.row_length(0).unwrap(), 2);

    pattern.compress();
    assert!(pattern.is_compressed());
    assert_eq!(pattern.n_nonzero_elements().unwrap(), 4);
    assert_eq!(pattern.max_entries_per_row().unwrap(), 2);
    assert_eq!(pattern.bandwidth().unwrap(), 3);
    assert_eq!(
        pattern.statistics().unwrap(),
        PatternStatistics {
            bandwidth: 3,
            max_entries_per_row: 2,
            n_nonzero_elements: 4,
        }
    );
}

#[test]
fn compressed_pattern_row_iteration_is_restartable() {
    let mut pattern = small_pattern();
    pattern.compress();

    let first: Vec<_> = pattern.row_iter(0).unwrap().collect();
    let second: Vec<_> = pattern.row_iter(0).unwrap().collect();
    assert_eq!(first, vec![0, 3]);
    assert_eq!(first, second);
    assert_eq!(pattern.row_iter(1).unwrap().len(), 1);
    assert_eq!(pattern.row_columns(2).unwrap(), &[1]);

    let entries: Vec<_> = pattern.iter().unwrap().collect();
    assert_eq!(entries, vec![(0, 0), (0, 3), (1, 1), (2, 1)]);
}

#[test]
fn compressed_pattern_requires_compression_for_statistics_and_iteration() {
    let pattern = small_pattern();
    assert!(matches!(pattern.bandwidth(), Err(PatternError::InvalidState { .. })));
    assert!(matches!(pattern.max_entries_per_row(), Err(PatternError::InvalidState { .. })));
    assert!(matches!(pattern.n_nonzero_elements(), Err(PatternError::InvalidState { .. })));
    assert!(pattern.row_iter(0).is_err());
    assert!(pattern.iter().is_err());
    assert!(pattern.to_sparsity_pattern().is_err());
}

#[test]
fn compressed_pattern_rejects_out_of_range_entries() {
    let mut pattern = CompressedPattern::new(2, 5);
    pattern.add(1, 2).unwrap();

    let result = pattern.add(1, 5);
    assert_eq!(
        result,
        Err(PatternError::OutOfRange {
            kind: IndexKind::Column,
            index: 5,
            bound: 5
        })
    );
    assert_eq!(pattern.row_length(1).unwrap(), 1);

    let result = pattern.add(2, 0);
    assert_eq!(
        result,
        Err(PatternError::OutOfRange {
            kind: IndexKind::Row,
            index: 2,
            bound: 2
        })
    );
    assert!(pattern.row_length(2).is_err());
}

#[test]
fn compressed_pattern_add_entries_is_all_or_nothing() {
    let mut pattern = CompressedPattern::new(2, 3);
    let result = pattern.add_entries(0, &[0, 1, 3]);
    assert!(matches!(result, Err(PatternError::OutOfRange { .. })));
    assert_eq!(pattern.row_length(0).unwrap(), 0);

    pattern.add_entries(0, &[2, 0, 2]).unwrap();
    assert_eq!(pattern.row_length(0).unwrap(), 2);
}

#[test]
fn compressed_pattern_rejects_insertion_after_compression() {
    let mut pattern = small_pattern();
    pattern.compress();
    let statistics = pattern.statistics().unwrap();

    assert!(matches!(pattern.add(1, 2), Err(PatternError::InvalidState { .. })));
    assert!(matches!(pattern.add_entries(1, &[2]), Err(PatternError::InvalidState { .. })));
    assert!(pattern.par_add_rows(|_, _| {}).is_err());

    // Compressing again changes nothing
    pattern.compress();
    assert_eq!(pattern.statistics().unwrap(), statistics);
    assert_eq!(pattern.row_length(1).unwrap(), 1);
}

#[test]
fn compressed_pattern_exists() {
    let pattern = small_pattern();
    assert!(pattern.exists(0, 3).unwrap());
    assert!(!pattern.exists(0, 1).unwrap());
    assert!(pattern.exists(0, 4).is_err());
    assert!(pattern.exists(3, 0).is_err());
}

#[test]
fn compressed_pattern_reinit_discards_entries() {
    let mut pattern = small_pattern();
    pattern.compress();
    pattern.reinit(5, 2);
    assert!(!pattern.is_compressed());
    assert_eq!(pattern.n_rows(), 5);
    assert_eq!(pattern.n_columns(), 2);
    assert!((0..5).all(|i| pattern.row_length(i).unwrap() == 0));
    pattern.add(4, 1).unwrap();
}

#[test]
fn empty_pattern_statistics() {
    let mut pattern = CompressedPattern::default();
    pattern.compress();
    assert_eq!(pattern.statistics().unwrap(), PatternStatistics::default());

    let mut pattern = CompressedPattern::new(4, 4);
    pattern.compress();
    assert_eq!(pattern.n_nonzero_elements().unwrap(), 0);
    assert_eq!(pattern.bandwidth().unwrap(), 0);
}

#[test]
fn par_add_rows_builds_tridiagonal_pattern() {
    let n = 10;
    let mut pattern = CompressedPattern::new(n, n);
    pattern
        .par_add_rows(|i, columns| {
            columns.extend(i.saturating_sub(1)..(i + 2).min(n));
        })
        .unwrap();
    pattern.compress();

    assert_eq!(pattern.n_nonzero_elements().unwrap(), 3 * n - 2);
    assert_eq!(pattern.max_entries_per_row().unwrap(), 3);
    assert_eq!(pattern.bandwidth().unwrap(), 1);
    assert_eq!(pattern.row_columns(0).unwrap(), &[0, 1]);
    assert_eq!(pattern.row_columns(5).unwrap(), &[4, 5, 6]);
    assert_eq!(pattern.row_columns(n - 1).unwrap(), &[n - 2, n - 1]);
}

#[test]
fn par_add_rows_has_no_side_effects_on_error() {
    let mut pattern = CompressedPattern::new(4, 4);
    let result = pattern.par_add_rows(|i, columns| columns.extend([i, i + 1]));
    assert_eq!(
        result,
        Err(PatternError::OutOfRange {
            kind: IndexKind::Column,
            index: 4,
            bound: 4
        })
    );
    assert!((0..4).all(|i| pattern.row_length(i).unwrap() == 0));
}

#[test]
fn compressed_pattern_converts_to_csr() {
    let mut pattern = small_pattern();
    pattern.compress();

    let csr_pattern = pattern.to_sparsity_pattern().unwrap();
    assert_eq!(csr_pattern.major_dim(), 3);
    assert_eq!(csr_pattern.minor_dim(), 4);
    assert_eq!(csr_pattern.major_offsets(), &[0, 2, 3, 4]);
    assert_eq!(csr_pattern.minor_indices(), &[0, 3, 1, 1]);

    let matrix = pattern.to_zeroed_csr::<f64>().unwrap();
    assert_eq!(matrix.nnz(), 4);
    assert!(matrix.values().iter().all(|&v| v == 0.0));
}

proptest! {
    #[test]
    fn compressed_statistics_match_entries((n_rows, n_cols, entries) in pattern_entries(8, 8, 40)) {
        let mut pattern = CompressedPattern::new(n_rows, n_cols);
        for &(i, j) in &entries {
            pattern.add(i, j).unwrap();
        }
        pattern.compress();

        let distinct: BTreeSet<_> = entries.iter().copied().collect();
        let row_lengths: Vec<_> = (0..n_rows).map(|i| pattern.row_length(i).unwrap()).collect();

        prop_assert_eq!(pattern.n_nonzero_elements().unwrap(), row_lengths.iter().sum::<usize>());
        prop_assert_eq!(pattern.n_nonzero_elements().unwrap(), distinct.len());
        prop_assert_eq!(pattern.max_entries_per_row().unwrap(), row_lengths.iter().copied().max().unwrap_or(0));
        let expected_bandwidth = distinct.iter().map(|&(i, j)| i.abs_diff(j)).max().unwrap_or(0);
        prop_assert_eq!(pattern.bandwidth().unwrap(), expected_bandwidth);

        let stored: Vec<_> = pattern.iter().unwrap().collect();
        let expected: Vec<_> = distinct.into_iter().collect();
        prop_assert_eq!(stored, expected);
    }
}
