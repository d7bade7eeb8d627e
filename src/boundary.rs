//! Compact numbering of boundary degrees of freedom.
use crate::error::{IndexKind, PatternError};
use crate::pattern::SparsityPatternMut;
use eyre::eyre;
use log::debug;
use serde::{Deserialize, Serialize};

/// Marker for degrees of freedom without a boundary index.
pub const INVALID_INDEX: usize = usize::MAX;

/// Boundary faces of a discretization and the degrees of freedom living on them.
///
/// This is the information a DoF handler needs to provide in order to build boundary
/// index maps and boundary sparsity patterns.
pub trait BoundaryConnectivity {
    /// Total number of degrees of freedom, including interior ones.
    fn num_dofs(&self) -> usize;

    fn num_boundary_faces(&self) -> usize;

    fn boundary_face_dof_count(&self, face_index: usize) -> usize;

    /// Write the (global) degrees of freedom of the given boundary face into `output`,
    /// which has length `boundary_face_dof_count(face_index)`.
    fn populate_boundary_face_dofs(&self, output: &mut [usize], face_index: usize) -> eyre::Result<()>;
}

/// Maps every degree of freedom to its index among the boundary degrees of freedom.
///
/// Boundary DoFs are numbered `0 .. n_boundary_dofs` in ascending order of their global index.
/// All other DoFs map to [`INVALID_INDEX`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryIndexMap {
    boundary_indices: Vec<usize>,
    n_boundary_dofs: usize,
}

impl BoundaryIndexMap {
    /// Build the map from a fallible boundary predicate.
    ///
    /// The predicate is called exactly once for every DoF, in ascending order. The first
    /// error it returns is passed on to the caller.
    pub fn try_from_predicate<E>(
        n_dofs: usize,
        mut is_boundary: impl FnMut(usize) -> Result<bool, E>,
    ) -> Result<Self, E> {
        let mut boundary_indices = Vec::with_capacity(n_dofs);
        let mut next_index = 0;
        for dof in 0..n_dofs {
            if is_boundary(dof)? {
                boundary_indices.push(next_index);
                next_index += 1;
            } else {
                boundary_indices.push(INVALID_INDEX);
            }
        }
        debug!("Mapped {} of {} DoFs to boundary indices", next_index, n_dofs);
        Ok(Self {
            boundary_indices,
            n_boundary_dofs: next_index,
        })
    }

    pub fn from_predicate(n_dofs: usize, mut is_boundary: impl FnMut(usize) -> bool) -> Self {
        Self::try_from_predicate(n_dofs, |dof| Ok::<_, std::convert::Infallible>(is_boundary(dof)))
            .unwrap_or_else(|never| match never {})
    }

    /// Build the map from boundary face connectivity: a DoF is a boundary DoF if it lies on
    /// at least one boundary face.
    pub fn from_boundary_connectivity(connectivity: &(impl ?Sized + BoundaryConnectivity)) -> eyre::Result<Self> {
        let n_dofs = connectivity.num_dofs();
        let mut on_boundary = vec![false; n_dofs];
        let mut face_dofs = Vec::new();
        for face_index in 0..connectivity.num_boundary_faces() {
            face_dofs.resize(connectivity.boundary_face_dof_count(face_index), usize::MAX);
            connectivity.populate_boundary_face_dofs(&mut face_dofs, face_index)?;
            for &dof in &face_dofs {
                let flag = on_boundary
                    .get_mut(dof)
                    .ok_or_else(|| PatternError::out_of_range(IndexKind::Dof, dof, n_dofs))?;
                *flag = true;
            }
        }
        Ok(Self::from_predicate(n_dofs, |dof| on_boundary[dof]))
    }

    pub fn n_dofs(&self) -> usize {
        self.boundary_indices.len()
    }

    pub fn n_boundary_dofs(&self) -> usize {
        self.n_boundary_dofs
    }

    /// The boundary index of the given DoF, or `None` if it is not a boundary DoF
    /// (or out of bounds).
    pub fn get(&self, dof: usize) -> Option<usize> {
        self.boundary_indices
            .get(dof)
            .copied()
            .filter(|&index| index != INVALID_INDEX)
    }

    /// The boundary index of every DoF, with [`INVALID_INDEX`] for interior DoFs.
    pub fn as_slice(&self) -> &[usize] {
        &self.boundary_indices
    }

    /// The inverse map: the global DoF corresponding to each boundary index.
    pub fn boundary_dofs(&self) -> Vec<usize> {
        let mut dofs = Vec::with_capacity(self.n_boundary_dofs);
        dofs.extend(
            self.boundary_indices
                .iter()
                .enumerate()
                .filter(|&(_, &index)| index != INVALID_INDEX)
                .map(|(dof, _)| dof),
        );
        dofs
    }

    fn boundary_index(&self, dof: usize) -> Result<usize, PatternError> {
        match self.boundary_indices.get(dof) {
            None => Err(PatternError::out_of_range(IndexKind::Dof, dof, self.n_dofs())),
            Some(&INVALID_INDEX) => Err(PatternError::UnmappedDof { dof }),
            Some(&index) => Ok(index),
        }
    }
}

/// Adds the couplings between boundary DoFs to a pattern in boundary numbering.
///
/// For every boundary face, every pair of DoFs on the face is coupled, i.e. the entry
/// `(map[i], map[j])` is added for all DoFs `i`, `j` of the face. The pattern must therefore
/// have (at least) `map.n_boundary_dofs()` rows and columns.
pub fn make_boundary_sparsity_pattern<P>(
    connectivity: &(impl ?Sized + BoundaryConnectivity),
    map: &BoundaryIndexMap,
    pattern: &mut P,
) -> eyre::Result<()>
where
    P: ?Sized + SparsityPatternMut,
{
    if map.n_dofs() != connectivity.num_dofs() {
        return Err(eyre!(
            "boundary index map covers {} DoFs, but the connectivity has {}",
            map.n_dofs(),
            connectivity.num_dofs()
        ));
    }

    let mut face_dofs = Vec::new();
    let mut face_boundary_indices = Vec::new();
    for face_index in 0..connectivity.num_boundary_faces() {
        face_dofs.resize(connectivity.boundary_face_dof_count(face_index), usize::MAX);
        connectivity.populate_boundary_face_dofs(&mut face_dofs, face_index)?;

        face_boundary_indices.clear();
        for &dof in &face_dofs {
            face_boundary_indices.push(map.boundary_index(dof)?);
        }

        for &row in &face_boundary_indices {
            pattern.add_row_entries(row, &face_boundary_indices)?;
        }
    }
    Ok(())
}
