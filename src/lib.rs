//! Sparsity patterns for finite element matrices.
//!
//! The crate provides the structures needed to determine the nonzero layout of a sparse
//! (block) matrix before any numerical values are assembled:
//!
//! - [`RowSet`](row_set::RowSet): the nonzero columns of a single row,
//! - [`CompressedPattern`](pattern::CompressedPattern): a pattern built from rows,
//! - [`BlockPattern`](block::BlockPattern): a grid of patterns forming a block matrix pattern,
//! - [`BoundaryIndexMap`](boundary::BoundaryIndexMap): a compact numbering of boundary
//!   degrees of freedom, used to build patterns restricted to the boundary.
//!
//! Patterns are built in two phases. While open, entries may be added in any order and
//! duplicates are ignored. Compression freezes the pattern, after which rows can be iterated
//! in ascending column order and statistics such as the bandwidth become available.

pub mod block;
pub mod boundary;
pub mod error;
pub mod pattern;
pub mod row_set;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub use block::{BlockIndices, BlockPattern};
pub use boundary::{make_boundary_sparsity_pattern, BoundaryConnectivity, BoundaryIndexMap, INVALID_INDEX};
pub use error::PatternError;
pub use pattern::{CompressedPattern, PatternStatistics, SparsityPatternMut};
pub use row_set::RowSet;

pub extern crate nalgebra_sparse;
