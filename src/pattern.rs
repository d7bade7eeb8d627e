//! Single (non-block) sparsity patterns.
use crate::error::{IndexKind, PatternError};
use crate::row_set::RowSet;
use log::debug;
use nalgebra::Scalar;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use num::Zero;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Statistics derived from a compressed pattern.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStatistics {
    /// Maximum of `|row - column|` over all stored entries.
    pub bandwidth: usize,
    pub max_entries_per_row: usize,
    pub n_nonzero_elements: usize,
}

impl PatternStatistics {
    fn for_row(row_index: usize, row: &RowSet) -> Self {
        let bandwidth = [row.min_column(), row.max_column()]
            .into_iter()
            .flatten()
            .map(|column| column.abs_diff(row_index))
            .max()
            .unwrap_or(0);
        Self {
            bandwidth,
            max_entries_per_row: row.row_length(),
            n_nonzero_elements: row.row_length(),
        }
    }

    fn combine(self, other: Self) -> Self {
        Self {
            bandwidth: self.bandwidth.max(other.bandwidth),
            max_entries_per_row: self.max_entries_per_row.max(other.max_entries_per_row),
            n_nonzero_elements: self.n_nonzero_elements + other.n_nonzero_elements,
        }
    }
}

/// Anything that nonzero entries can be inserted into.
///
/// Implemented by both [`CompressedPattern`] and [`BlockPattern`](crate::block::BlockPattern),
/// so that pattern-building drivers can target either.
pub trait SparsityPatternMut {
    fn n_rows(&self) -> usize;

    fn n_cols(&self) -> usize;

    fn add_entry(&mut self, row: usize, column: usize) -> Result<(), PatternError>;

    /// Add several entries to the same row.
    ///
    /// If an error is returned, none of the entries have been added.
    fn add_row_entries(&mut self, row: usize, columns: &[usize]) -> Result<(), PatternError>;
}

/// A sparsity pattern with a fixed number of rows and columns.
///
/// Entries are added with [`add`](Self::add) while the pattern is open. [`compress`](Self::compress)
/// freezes all rows and computes the [statistics](PatternStatistics) of the pattern. Row iteration
/// and statistics are only available on compressed patterns, and attempting to access them
/// before compression gives an [`InvalidState`](PatternError::InvalidState) error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedPattern {
    rows: Vec<RowSet>,
    n_columns: usize,
    // Present if and only if the pattern is compressed
    statistics: Option<PatternStatistics>,
}

impl Default for CompressedPattern {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl CompressedPattern {
    pub fn new(n_rows: usize, n_columns: usize) -> Self {
        Self {
            rows: vec![RowSet::new(); n_rows],
            n_columns,
            statistics: None,
        }
    }

    /// Resize the pattern, discarding all entries.
    ///
    /// The pattern is open afterwards, even if it was compressed before.
    pub fn reinit(&mut self, n_rows: usize, n_columns: usize) {
        self.rows.clear();
        self.rows.resize(n_rows, RowSet::new());
        self.n_columns = n_columns;
        self.statistics = None;
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    pub fn is_compressed(&self) -> bool {
        self.statistics.is_some()
    }

    pub fn rows(&self) -> &[RowSet] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> Result<&RowSet, PatternError> {
        self.rows
            .get(row)
            .ok_or_else(|| PatternError::out_of_range(IndexKind::Row, row, self.n_rows()))
    }

    fn check_open(&self, operation: &'static str) -> Result<(), PatternError> {
        if self.is_compressed() {
            Err(PatternError::invalid_state(operation, "pattern has already been compressed"))
        } else {
            Ok(())
        }
    }

    fn check_compressed(&self, operation: &'static str) -> Result<PatternStatistics, PatternError> {
        self.statistics
            .ok_or_else(|| PatternError::invalid_state(operation, "pattern has not been compressed"))
    }

    fn check_column(&self, column: usize) -> Result<(), PatternError> {
        if column < self.n_columns {
            Ok(())
        } else {
            Err(PatternError::out_of_range(IndexKind::Column, column, self.n_columns))
        }
    }

    /// Add the entry `(row, column)` to the pattern. Adding an existing entry does nothing.
    pub fn add(&mut self, row: usize, column: usize) -> Result<(), PatternError> {
        self.check_open("add entry")?;
        self.row(row)?;
        self.check_column(column)?;
        self.rows[row].insert(column)
    }

    /// Add the entries `(row, c)` for every `c` in `columns`.
    ///
    /// All columns are validated before anything is inserted.
    pub fn add_entries(&mut self, row: usize, columns: &[usize]) -> Result<(), PatternError> {
        self.check_open("add entries")?;
        self.row(row)?;
        for &column in columns {
            self.check_column(column)?;
        }
        self.rows[row].extend(columns.iter().copied())
    }

    /// Add entries to all rows in parallel.
    ///
    /// `populate_row(i, columns)` is called once for every row `i`, possibly from several
    /// threads at once, and should push the columns of the entries to add to row `i`
    /// into `columns`. All columns are validated before any entry is inserted.
    pub fn par_add_rows<F>(&mut self, populate_row: F) -> Result<(), PatternError>
    where
        F: Fn(usize, &mut Vec<usize>) + Sync,
    {
        self.check_open("add entries")?;
        let row_columns: Vec<Vec<usize>> = (0..self.n_rows())
            .into_par_iter()
            .map(|i| {
                let mut columns = Vec::new();
                populate_row(i, &mut columns);
                columns
            })
            .collect();

        let n_columns = self.n_columns;
        if let Some(&column) = row_columns
            .par_iter()
            .flatten()
            .find_first(|&&column| column >= n_columns)
        {
            return Err(PatternError::out_of_range(IndexKind::Column, column, n_columns));
        }

        self.rows
            .par_iter_mut()
            .zip(row_columns)
            .try_for_each(|(row, columns)| row.extend(columns))
    }

    /// Freeze the pattern and compute its statistics. Does nothing if already compressed.
    pub fn compress(&mut self) {
        if self.is_compressed() {
            return;
        }

        self.rows.par_iter_mut().for_each(RowSet::compress);
        let statistics = self
            .rows
            .par_iter()
            .enumerate()
            .map(|(i, row)| PatternStatistics::for_row(i, row))
            .reduce(PatternStatistics::default, PatternStatistics::combine);

        debug!(
            "Compressed {}x{} pattern: {} nonzeros, max {} per row, bandwidth {}",
            self.n_rows(),
            self.n_columns,
            statistics.n_nonzero_elements,
            statistics.max_entries_per_row,
            statistics.bandwidth
        );
        self.statistics = Some(statistics);
    }

    /// The number of distinct columns in the given row. Available in both phases.
    pub fn row_length(&self, row: usize) -> Result<usize, PatternError> {
        Ok(self.row(row)?.row_length())
    }

    /// Whether `(row, column)` is an entry of the pattern. Available in both phases.
    pub fn exists(&self, row: usize, column: usize) -> Result<bool, PatternError> {
        let row = self.row(row)?;
        self.check_column(column)?;
        Ok(row.contains(column))
    }

    /// The columns of the given row of a compressed pattern, in ascending order.
    pub fn row_columns(&self, row: usize) -> Result<&[usize], PatternError> {
        self.check_compressed("access row columns")?;
        self.row(row)?.columns()
    }

    /// A fresh iterator over the columns of the given row of a compressed pattern,
    /// in ascending order.
    pub fn row_iter(&self, row: usize) -> Result<impl '_ + ExactSizeIterator<Item = usize>, PatternError> {
        Ok(self.row_columns(row)?.iter().copied())
    }

    /// Iterate over all entries `(row, column)` of a compressed pattern in row-major order.
    pub fn iter(&self) -> Result<impl '_ + Iterator<Item = (usize, usize)>, PatternError> {
        self.check_compressed("iterate entries")?;
        let row_columns = self
            .rows
            .iter()
            .map(RowSet::columns)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(row_columns
            .into_iter()
            .enumerate()
            .flat_map(|(i, columns)| columns.iter().map(move |&j| (i, j))))
    }

    pub fn statistics(&self) -> Result<PatternStatistics, PatternError> {
        self.check_compressed("access pattern statistics")
    }

    pub fn bandwidth(&self) -> Result<usize, PatternError> {
        Ok(self.statistics()?.bandwidth)
    }

    pub fn max_entries_per_row(&self) -> Result<usize, PatternError> {
        Ok(self.statistics()?.max_entries_per_row)
    }

    pub fn n_nonzero_elements(&self) -> Result<usize, PatternError> {
        Ok(self.statistics()?.n_nonzero_elements)
    }

    /// Convert a compressed pattern to a CSR sparsity pattern.
    pub fn to_sparsity_pattern(&self) -> Result<SparsityPattern, PatternError> {
        let statistics = self.check_compressed("convert pattern")?;
        let mut offsets = Vec::with_capacity(self.n_rows() + 1);
        let mut column_indices = Vec::with_capacity(statistics.n_nonzero_elements);
        offsets.push(0);
        for row in &self.rows {
            column_indices.extend_from_slice(row.columns()?);
            offsets.push(column_indices.len());
        }

        let pattern =
            SparsityPattern::try_from_offsets_and_indices(self.n_rows(), self.n_columns, offsets, column_indices)
                .expect("Internal error: compressed rows must always form a valid sparsity pattern");
        Ok(pattern)
    }

    /// Allocate a CSR matrix with this pattern and all values set to zero.
    pub fn to_zeroed_csr<T>(&self) -> Result<CsrMatrix<T>, PatternError>
    where
        T: Scalar + Zero,
    {
        Ok(zeroed_csr(self.to_sparsity_pattern()?))
    }
}

pub(crate) fn zeroed_csr<T>(pattern: SparsityPattern) -> CsrMatrix<T>
where
    T: Scalar + Zero,
{
    let values = vec![T::zero(); pattern.nnz()];
    CsrMatrix::try_from_pattern_and_values(pattern, values)
        .expect("Internal error: values must match the number of pattern entries")
}

impl SparsityPatternMut for CompressedPattern {
    fn n_rows(&self) -> usize {
        CompressedPattern::n_rows(self)
    }

    fn n_cols(&self) -> usize {
        self.n_columns
    }

    fn add_entry(&mut self, row: usize, column: usize) -> Result<(), PatternError> {
        self.add(row, column)
    }

    fn add_row_entries(&mut self, row: usize, columns: &[usize]) -> Result<(), PatternError> {
        self.add_entries(row, columns)
    }
}
