use crate::error::PatternError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum RowStorage {
    Open(BTreeSet<usize>),
    // Strictly ascending
    Compressed(Vec<usize>),
}

/// The set of nonzero column indices in a single row of a sparsity pattern.
///
/// A row starts out open: columns may be inserted in any order, and inserting a column that
/// is already present is a no-op. Calling [`compress`](Self::compress) freezes the row into a
/// sorted array, after which the columns can be iterated in ascending order but no longer
/// modified. The transition is one-way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSet {
    storage: RowStorage,
}

impl Default for RowSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RowSet {
    pub fn new() -> Self {
        Self {
            storage: RowStorage::Open(BTreeSet::new()),
        }
    }

    /// Insert a column into the row.
    ///
    /// Returns an error if the row has already been compressed.
    pub fn insert(&mut self, column: usize) -> Result<(), PatternError> {
        match &mut self.storage {
            RowStorage::Open(columns) => {
                columns.insert(column);
                Ok(())
            }
            RowStorage::Compressed(_) => Err(PatternError::invalid_state(
                "insert into row",
                "row has already been compressed",
            )),
        }
    }

    /// Insert all columns produced by the given iterator.
    ///
    /// Either all columns are inserted, or (if the row is compressed) none are.
    pub fn extend(&mut self, columns: impl IntoIterator<Item = usize>) -> Result<(), PatternError> {
        match &mut self.storage {
            RowStorage::Open(set) => {
                set.extend(columns);
                Ok(())
            }
            RowStorage::Compressed(_) => Err(PatternError::invalid_state(
                "insert into row",
                "row has already been compressed",
            )),
        }
    }

    /// Freeze the row. Calling this on an already compressed row does nothing.
    pub fn compress(&mut self) {
        if let RowStorage::Open(columns) = &mut self.storage {
            // BTreeSet iterates in ascending order without duplicates
            let sorted: Vec<usize> = std::mem::take(columns).into_iter().collect();
            self.storage = RowStorage::Compressed(sorted);
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.storage, RowStorage::Compressed(_))
    }

    /// The number of distinct columns in the row.
    pub fn row_length(&self) -> usize {
        match &self.storage {
            RowStorage::Open(columns) => columns.len(),
            RowStorage::Compressed(columns) => columns.len(),
        }
    }

    pub fn contains(&self, column: usize) -> bool {
        match &self.storage {
            RowStorage::Open(columns) => columns.contains(&column),
            RowStorage::Compressed(columns) => columns.binary_search(&column).is_ok(),
        }
    }

    /// The columns of a compressed row, in strictly ascending order.
    ///
    /// Returns an error if the row has not been compressed yet.
    pub fn columns(&self) -> Result<&[usize], PatternError> {
        match &self.storage {
            RowStorage::Compressed(columns) => Ok(columns),
            RowStorage::Open(_) => Err(PatternError::invalid_state(
                "access row columns",
                "row has not been compressed",
            )),
        }
    }

    /// Iterate over the columns of a compressed row in ascending order.
    pub fn iter(&self) -> Result<impl '_ + ExactSizeIterator<Item = usize>, PatternError> {
        Ok(self.columns()?.iter().copied())
    }

    /// Largest column in the row, if any. Available in both phases.
    pub(crate) fn max_column(&self) -> Option<usize> {
        match &self.storage {
            RowStorage::Open(columns) => columns.iter().next_back().copied(),
            RowStorage::Compressed(columns) => columns.last().copied(),
        }
    }

    /// Smallest column in the row, if any. Available in both phases.
    pub(crate) fn min_column(&self) -> Option<usize> {
        match &self.storage {
            RowStorage::Open(columns) => columns.iter().next().copied(),
            RowStorage::Compressed(columns) => columns.first().copied(),
        }
    }
}
