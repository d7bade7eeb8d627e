//! Block-partitioned sparsity patterns.
use crate::error::{Axis, IndexKind, PatternError};
use crate::pattern::{zeroed_csr, CompressedPattern, SparsityPatternMut};
use itertools::Itertools;
use log::{debug, trace};
use nalgebra::Scalar;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use num::Zero;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A partition of a contiguous global index range `0 .. n` into consecutive blocks.
///
/// Translates between global indices and `(block, local)` index pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndices {
    // start_indices[b] is the first global index of block b. The last entry is the total size,
    // so the vector is never empty.
    start_indices: Vec<usize>,
}

impl Default for BlockIndices {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl BlockIndices {
    pub fn new(block_sizes: &[usize]) -> Self {
        let mut start_indices = Vec::with_capacity(block_sizes.len() + 1);
        start_indices.push(0);
        for size in block_sizes {
            let offset = start_indices.last().unwrap_or(&0) + size;
            start_indices.push(offset);
        }
        Self { start_indices }
    }

    /// Splits `total` indices into `num_blocks` blocks of size `total / num_blocks`,
    /// with the last block also receiving the remainder.
    ///
    /// # Panics
    ///
    /// Panics if `num_blocks` is zero.
    pub fn split_evenly(total: usize, num_blocks: usize) -> Self {
        assert!(num_blocks > 0, "Number of blocks must be positive.");
        let size = total / num_blocks;
        let mut block_sizes = vec![size; num_blocks];
        if let Some(last) = block_sizes.last_mut() {
            *last = total - size * (num_blocks - 1);
        }
        Self::new(&block_sizes)
    }

    pub fn num_blocks(&self) -> usize {
        self.start_indices.len() - 1
    }

    pub fn total_size(&self) -> usize {
        *self.start_indices.last().unwrap_or(&0)
    }

    /// # Panics
    ///
    /// Panics if `block` is out of bounds.
    pub fn block_size(&self, block: usize) -> usize {
        assert!(block < self.num_blocks(), "Block index out of bounds.");
        self.start_indices[block + 1] - self.start_indices[block]
    }

    /// The global index of the first entry in the given block.
    ///
    /// # Panics
    ///
    /// Panics if `block` is out of bounds.
    pub fn block_start(&self, block: usize) -> usize {
        assert!(block < self.num_blocks(), "Block index out of bounds.");
        self.start_indices[block]
    }

    pub fn block_sizes<'a>(&'a self) -> impl 'a + Iterator<Item = usize> {
        self.start_indices
            .iter()
            .tuple_windows()
            .map(|(begin, end)| end - begin)
    }

    /// Returns `(block, local_index)` for the given global index, or `None` if the index
    /// is not smaller than the total size.
    ///
    /// Empty blocks never contain an index.
    pub fn global_to_local(&self, global_index: usize) -> Option<(usize, usize)> {
        if global_index >= self.total_size() {
            return None;
        }
        // Find the last block starting at or before the index. Since the start indices
        // are non-decreasing, this skips any empty blocks
        let block = self
            .start_indices
            .partition_point(|&start| start <= global_index)
            - 1;
        Some((block, global_index - self.start_indices[block]))
    }

    pub fn local_to_global(&self, block: usize, local_index: usize) -> Option<usize> {
        if block < self.num_blocks() && local_index < self.block_size(block) {
            Some(self.start_indices[block] + local_index)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Partition {
    rows: BlockIndices,
    columns: BlockIndices,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum State {
    /// Blocks are being sized, no partition available.
    Sizing,
    Building(Partition),
    Compressed(Partition),
}

/// A grid of [`CompressedPattern`]s that together form the pattern of a block matrix.
///
/// The lifecycle of a block pattern is:
///
/// 1. Construct it with [`new`](Self::new) and size every block with
///    [`reinit_block`](Self::reinit_block).
/// 2. Call [`collect_sizes`](Self::collect_sizes), which checks that the blocks are
///    consistently sized and sets up the global index space.
/// 3. Add entries with global indices through [`add`](Self::add).
/// 4. Call [`compress`](Self::compress), after which the pattern is read-only.
///
/// Calling an operation out of order gives an [`InvalidState`](PatternError::InvalidState) error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPattern {
    n_row_blocks: usize,
    n_col_blocks: usize,
    // Row-major
    blocks: Vec<CompressedPattern>,
    state: State,
}

impl BlockPattern {
    pub fn new(n_row_blocks: usize, n_col_blocks: usize) -> Self {
        Self {
            n_row_blocks,
            n_col_blocks,
            blocks: vec![CompressedPattern::default(); n_row_blocks * n_col_blocks],
            state: State::Sizing,
        }
    }

    pub fn n_block_rows(&self) -> usize {
        self.n_row_blocks
    }

    pub fn n_block_cols(&self) -> usize {
        self.n_col_blocks
    }

    fn block_index(&self, i: usize, j: usize) -> Result<usize, PatternError> {
        if i >= self.n_row_blocks {
            Err(PatternError::out_of_range(IndexKind::BlockRow, i, self.n_row_blocks))
        } else if j >= self.n_col_blocks {
            Err(PatternError::out_of_range(IndexKind::BlockColumn, j, self.n_col_blocks))
        } else {
            Ok(i * self.n_col_blocks + j)
        }
    }

    pub fn block(&self, i: usize, j: usize) -> Result<&CompressedPattern, PatternError> {
        let index = self.block_index(i, j)?;
        Ok(&self.blocks[index])
    }

    /// Mutable access to block `(i, j)`.
    ///
    /// Entries added through the returned reference use block-local indices. Since the block
    /// may be resized through this reference, any collected sizes are discarded and
    /// [`collect_sizes`](Self::collect_sizes) must be called again before global indices are
    /// used. Fails with [`InvalidState`](PatternError::InvalidState) after compression.
    pub fn block_mut(&mut self, i: usize, j: usize) -> Result<&mut CompressedPattern, PatternError> {
        let index = self.block_index(i, j)?;
        self.reopen_sizing(i, j, "access block mutably")?;
        Ok(&mut self.blocks[index])
    }

    fn reopen_sizing(&mut self, i: usize, j: usize, operation: &'static str) -> Result<(), PatternError> {
        match self.state {
            State::Compressed(_) => Err(PatternError::invalid_state(
                operation,
                "block pattern has already been compressed",
            )),
            State::Building(_) => {
                debug!("Block ({}, {}) opened for modification, discarding collected block sizes", i, j);
                self.state = State::Sizing;
                Ok(())
            }
            State::Sizing => Ok(()),
        }
    }

    /// Size block `(i, j)` to `n_rows x n_cols`, discarding its entries.
    ///
    /// If sizes had already been collected, the pattern returns to the sizing phase and
    /// [`collect_sizes`](Self::collect_sizes) must be called again.
    pub fn reinit_block(&mut self, i: usize, j: usize, n_rows: usize, n_cols: usize) -> Result<(), PatternError> {
        let index = self.block_index(i, j)?;
        self.reopen_sizing(i, j, "reinit block")?;
        self.blocks[index].reinit(n_rows, n_cols);
        Ok(())
    }

    /// Determine the row and column partitions from the sizes of the individual blocks.
    ///
    /// Returns an [`InconsistentSizing`](PatternError::InconsistentSizing) error if two blocks
    /// in the same block row have a different number of rows, or two blocks in the same
    /// block column have a different number of columns.
    pub fn collect_sizes(&mut self) -> Result<(), PatternError> {
        if let State::Compressed(_) = self.state {
            return Err(PatternError::invalid_state(
                "collect sizes",
                "block pattern has already been compressed",
            ));
        }

        let mut row_block_sizes = Vec::with_capacity(self.n_row_blocks);
        for i in 0..self.n_row_blocks {
            let expected = self.block(i, 0).map(|b| b.n_rows()).unwrap_or(0);
            for j in 0..self.n_col_blocks {
                let found = self.block(i, j)?.n_rows();
                if found != expected {
                    return Err(PatternError::InconsistentSizing {
                        axis: Axis::Row,
                        block: i,
                        expected,
                        found,
                        at: (i, j),
                    });
                }
            }
            row_block_sizes.push(expected);
        }

        let mut col_block_sizes = Vec::with_capacity(self.n_col_blocks);
        for j in 0..self.n_col_blocks {
            let expected = self.block(0, j).map(|b| b.n_columns()).unwrap_or(0);
            for i in 0..self.n_row_blocks {
                let found = self.block(i, j)?.n_columns();
                if found != expected {
                    return Err(PatternError::InconsistentSizing {
                        axis: Axis::Column,
                        block: j,
                        expected,
                        found,
                        at: (i, j),
                    });
                }
            }
            col_block_sizes.push(expected);
        }

        trace!("Row block sizes: {:?}", row_block_sizes);
        trace!("Column block sizes: {:?}", col_block_sizes);

        let partition = Partition {
            rows: BlockIndices::new(&row_block_sizes),
            columns: BlockIndices::new(&col_block_sizes),
        };
        debug!(
            "Collected sizes of {}x{} block pattern: {} rows, {} columns",
            self.n_row_blocks,
            self.n_col_blocks,
            partition.rows.total_size(),
            partition.columns.total_size()
        );
        self.state = State::Building(partition);
        Ok(())
    }

    fn partition(&self, operation: &'static str) -> Result<&Partition, PatternError> {
        match &self.state {
            State::Sizing => Err(PatternError::invalid_state(
                operation,
                "block sizes have not been collected",
            )),
            State::Building(partition) | State::Compressed(partition) => Ok(partition),
        }
    }

    fn compressed_partition(&self, operation: &'static str) -> Result<&Partition, PatternError> {
        match &self.state {
            State::Compressed(partition) => Ok(partition),
            _ => Err(PatternError::invalid_state(
                operation,
                "block pattern has not been compressed",
            )),
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.state, State::Compressed(_))
    }

    /// The partition of the global rows into block rows.
    pub fn row_indices(&self) -> Result<&BlockIndices, PatternError> {
        Ok(&self.partition("access row indices")?.rows)
    }

    /// The partition of the global columns into block columns.
    pub fn column_indices(&self) -> Result<&BlockIndices, PatternError> {
        Ok(&self.partition("access column indices")?.columns)
    }

    /// Total number of rows.
    ///
    /// Before sizes have been collected, this is the number of rows in the first block column.
    pub fn n_rows(&self) -> usize {
        match &self.state {
            State::Building(partition) | State::Compressed(partition) => partition.rows.total_size(),
            State::Sizing => (0..self.n_row_blocks)
                .filter_map(|i| self.block(i, 0).ok())
                .map(CompressedPattern::n_rows)
                .sum(),
        }
    }

    /// Total number of columns.
    ///
    /// Before sizes have been collected, this is the number of columns in the first block row.
    pub fn n_cols(&self) -> usize {
        match &self.state {
            State::Building(partition) | State::Compressed(partition) => partition.columns.total_size(),
            State::Sizing => (0..self.n_col_blocks)
                .filter_map(|j| self.block(0, j).ok())
                .map(CompressedPattern::n_columns)
                .sum(),
        }
    }

    /// Translate a global row index into `(block_row, local_row)`.
    pub fn global_to_local(&self, global_row: usize) -> Result<(usize, usize), PatternError> {
        let rows = &self.partition("translate row index")?.rows;
        rows.global_to_local(global_row)
            .ok_or_else(|| PatternError::out_of_range(IndexKind::Row, global_row, rows.total_size()))
    }

    /// Translate a global column index into `(block_column, local_column)`.
    pub fn global_col_to_local(&self, global_col: usize) -> Result<(usize, usize), PatternError> {
        let columns = &self.partition("translate column index")?.columns;
        columns
            .global_to_local(global_col)
            .ok_or_else(|| PatternError::out_of_range(IndexKind::Column, global_col, columns.total_size()))
    }

    fn check_building(&self, operation: &'static str) -> Result<(), PatternError> {
        match self.state {
            State::Building(_) => Ok(()),
            State::Sizing => Err(PatternError::invalid_state(
                operation,
                "block sizes have not been collected",
            )),
            State::Compressed(_) => Err(PatternError::invalid_state(
                operation,
                "block pattern has already been compressed",
            )),
        }
    }

    /// Add the entry with global indices `(global_row, global_col)`.
    pub fn add(&mut self, global_row: usize, global_col: usize) -> Result<(), PatternError> {
        self.check_building("add entry")?;
        let (block_row, local_row) = self.global_to_local(global_row)?;
        let (block_col, local_col) = self.global_col_to_local(global_col)?;
        let index = self.block_index(block_row, block_col)?;
        self.blocks[index].add(local_row, local_col)
    }

    /// Add the entries `(global_row, c)` for every `c` in `global_cols`.
    ///
    /// All indices are validated before anything is inserted.
    pub fn add_entries(&mut self, global_row: usize, global_cols: &[usize]) -> Result<(), PatternError> {
        self.check_building("add entries")?;
        let (block_row, local_row) = self.global_to_local(global_row)?;
        let local_cols = global_cols
            .iter()
            .map(|&col| self.global_col_to_local(col))
            .collect::<Result<Vec<_>, _>>()?;
        for (block_col, local_col) in local_cols {
            let index = self.block_index(block_row, block_col)?;
            self.blocks[index].add(local_row, local_col)?;
        }
        Ok(())
    }

    /// Compress every block. Does nothing if the pattern is already compressed.
    pub fn compress(&mut self) -> Result<(), PatternError> {
        match self.state {
            State::Sizing => {
                return Err(PatternError::invalid_state(
                    "compress",
                    "block sizes have not been collected",
                ))
            }
            State::Compressed(_) => return Ok(()),
            State::Building(_) => {}
        }

        // Blocks own disjoint storage, so they can be compressed independently
        self.blocks.par_iter_mut().for_each(CompressedPattern::compress);
        self.state = match std::mem::replace(&mut self.state, State::Sizing) {
            State::Building(partition) => State::Compressed(partition),
            other => other,
        };
        debug!(
            "Compressed {}x{} block pattern with {} blocks",
            self.n_rows(),
            self.n_cols(),
            self.blocks.len()
        );
        Ok(())
    }

    /// The number of entries in the given global row, summed over all block columns.
    pub fn row_length(&self, global_row: usize) -> Result<usize, PatternError> {
        let (block_row, local_row) = self.global_to_local(global_row)?;
        let mut length = 0;
        for j in 0..self.n_col_blocks {
            length += self.block(block_row, j)?.row_length(local_row)?;
        }
        Ok(length)
    }

    /// Whether the entry with global indices `(global_row, global_col)` is present.
    pub fn exists(&self, global_row: usize, global_col: usize) -> Result<bool, PatternError> {
        let (block_row, local_row) = self.global_to_local(global_row)?;
        let (block_col, local_col) = self.global_col_to_local(global_col)?;
        self.block(block_row, block_col)?.exists(local_row, local_col)
    }

    /// Iterate over the global columns of the given global row of a compressed pattern,
    /// in ascending order.
    pub fn row_iter(&self, global_row: usize) -> Result<impl '_ + Iterator<Item = usize>, PatternError> {
        let partition = self.compressed_partition("iterate row")?;
        let (block_row, local_row) = self.global_to_local(global_row)?;
        let columns = &partition.columns;
        let row_blocks = &self.blocks[block_row * self.n_col_blocks..(block_row + 1) * self.n_col_blocks];
        let block_columns = row_blocks
            .iter()
            .map(|block| block.row_columns(local_row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(block_columns
            .into_iter()
            .enumerate()
            .flat_map(move |(j, local_cols)| {
                let offset = columns.block_start(j);
                local_cols.iter().map(move |&local_col| offset + local_col)
            }))
    }

    /// Total number of entries over all blocks of a compressed pattern.
    pub fn n_nonzero_elements(&self) -> Result<usize, PatternError> {
        self.compressed_partition("access pattern statistics")?;
        self.blocks
            .iter()
            .map(CompressedPattern::n_nonzero_elements)
            .sum()
    }

    /// Maximum number of entries in a single global row of a compressed pattern.
    pub fn max_entries_per_row(&self) -> Result<usize, PatternError> {
        self.compressed_partition("access pattern statistics")?;
        (0..self.n_rows())
            .map(|row| self.row_length(row))
            .fold_ok(0, usize::max)
    }

    /// Maximum of `|row - column|` over all entries of a compressed pattern, in global indices.
    pub fn bandwidth(&self) -> Result<usize, PatternError> {
        self.compressed_partition("access pattern statistics")?;
        let mut bandwidth = 0;
        for row in 0..self.n_rows() {
            for col in self.row_iter(row)? {
                bandwidth = bandwidth.max(row.abs_diff(col));
            }
        }
        Ok(bandwidth)
    }

    /// Flatten a compressed block pattern into a single CSR sparsity pattern in global indices.
    pub fn to_sparsity_pattern(&self) -> Result<SparsityPattern, PatternError> {
        let nnz = self.n_nonzero_elements()?;
        let n_rows = self.n_rows();
        let mut offsets = Vec::with_capacity(n_rows + 1);
        let mut column_indices = Vec::with_capacity(nnz);
        offsets.push(0);
        for row in 0..n_rows {
            column_indices.extend(self.row_iter(row)?);
            offsets.push(column_indices.len());
        }

        let pattern = SparsityPattern::try_from_offsets_and_indices(n_rows, self.n_cols(), offsets, column_indices)
            .expect("Internal error: compressed blocks must always form a valid sparsity pattern");
        Ok(pattern)
    }

    /// Allocate a global CSR matrix with this pattern and all values set to zero.
    pub fn to_zeroed_csr<T>(&self) -> Result<CsrMatrix<T>, PatternError>
    where
        T: Scalar + Zero,
    {
        Ok(zeroed_csr(self.to_sparsity_pattern()?))
    }
}

impl SparsityPatternMut for BlockPattern {
    fn n_rows(&self) -> usize {
        BlockPattern::n_rows(self)
    }

    fn n_cols(&self) -> usize {
        BlockPattern::n_cols(self)
    }

    fn add_entry(&mut self, row: usize, column: usize) -> Result<(), PatternError> {
        self.add(row, column)
    }

    fn add_row_entries(&mut self, row: usize, columns: &[usize]) -> Result<(), PatternError> {
        self.add_entries(row, columns)
    }
}
