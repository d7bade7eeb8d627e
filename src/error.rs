//! Error types for pattern construction.
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// The kind of index that was found to be out of range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IndexKind {
    Row,
    Column,
    BlockRow,
    BlockColumn,
    Dof,
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Row => "row",
            Self::Column => "column",
            Self::BlockRow => "block row",
            Self::BlockColumn => "block column",
            Self::Dof => "degree of freedom",
        };
        write!(f, "{}", name)
    }
}

/// Row or column axis of a block grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
}

/// Library-wide error type.
///
/// All errors are caller-side precondition violations. An operation that returns an error
/// leaves the structure it was called on unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PatternError {
    /// An index exceeded its declared bound.
    OutOfRange { kind: IndexKind, index: usize, bound: usize },
    /// The operation is not permitted in the current lifecycle phase.
    InvalidState {
        operation: &'static str,
        reason: &'static str,
    },
    /// Two blocks sharing a block row (or block column) were sized differently.
    ///
    /// `block` is the block row (or column) in question, `expected` the size of its first
    /// block and `found` the size of the offending block at grid position `at`.
    InconsistentSizing {
        axis: Axis,
        block: usize,
        expected: usize,
        found: usize,
        at: (usize, usize),
    },
    /// A boundary face references a degree of freedom that has no boundary index.
    UnmappedDof { dof: usize },
}

impl PatternError {
    pub(crate) fn out_of_range(kind: IndexKind, index: usize, bound: usize) -> Self {
        Self::OutOfRange { kind, index, bound }
    }

    pub(crate) fn invalid_state(operation: &'static str, reason: &'static str) -> Self {
        Self::InvalidState { operation, reason }
    }
}

impl Display for PatternError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { kind, index, bound } => {
                write!(f, "{} index {} is out of range (bound is {})", kind, index, bound)
            }
            Self::InvalidState { operation, reason } => {
                write!(f, "cannot {}: {}", operation, reason)
            }
            Self::InconsistentSizing {
                axis,
                block,
                expected,
                found,
                at,
            } => {
                let (axis_name, dim_name) = match axis {
                    Axis::Row => ("block row", "rows"),
                    Axis::Column => ("block column", "columns"),
                };
                write!(
                    f,
                    "inconsistent sizing in {} {}: expected {} {}, but block ({}, {}) has {}",
                    axis_name, block, expected, dim_name, at.0, at.1, found
                )
            }
            Self::UnmappedDof { dof } => {
                write!(f, "degree of freedom {} has no boundary index", dof)
            }
        }
    }
}

impl Error for PatternError {}
