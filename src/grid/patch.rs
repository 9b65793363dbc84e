//! Fixed-size patches of cells, the unit of allocation and copy-on-write
//! sharing inside a [`HierarchicalGrid`](super::map::HierarchicalGrid).

use ndarray::Array2;
use std::sync::Arc;

use crate::consts::PATCH_SIZE;
use crate::grid::accumulator::PointAccumulator;

/// A `PATCH_SIZE` x `PATCH_SIZE` block of cells.
pub type PatchCells = Array2<PointAccumulator>;

/// Allocate a fresh, all-default patch.
pub fn new_patch() -> PatchCells {
    Array2::default((PATCH_SIZE as usize, PATCH_SIZE as usize))
}

/// A patch slot in the grid: absent until first written, then reference
/// counted so that cloning the grid is O(number of patches) rather than
/// O(number of cells).
#[derive(Clone, Debug, Default)]
pub struct Patch(Option<Arc<PatchCells>>);

impl Patch {
    pub fn empty() -> Self {
        Self(None)
    }

    /// Wrap already-computed cells, bypassing `make_mut`'s zero-init. Used
    /// when patch contents were built off to the side (e.g. in parallel).
    pub fn from_cells(cells: PatchCells) -> Self {
        Self(Some(Arc::new(cells)))
    }

    pub fn is_allocated(&self) -> bool {
        self.0.is_some()
    }

    pub fn get(&self) -> Option<&PatchCells> {
        self.0.as_deref()
    }

    /// Get a mutable reference to this patch's cells, allocating it (or
    /// cloning it away from other owners) first.
    pub fn make_mut(&mut self) -> &mut PatchCells {
        if self.0.is_none() {
            self.0 = Some(Arc::new(new_patch()));
        }
        Arc::make_mut(self.0.as_mut().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_has_no_cells() {
        let p = Patch::empty();
        assert!(!p.is_allocated());
        assert!(p.get().is_none());
    }

    #[test]
    fn make_mut_allocates_and_is_idempotent() {
        let mut p = Patch::empty();
        p.make_mut()[(0, 0)].update(true, 1.0, 1.0);
        assert!(p.is_allocated());
        assert_eq!(p.get().unwrap()[(0, 0)].hits, 1);
    }

    #[test]
    fn clone_shares_storage_until_mutated() {
        let mut a = Patch::empty();
        a.make_mut()[(1, 1)].update(true, 2.0, 3.0);
        let mut b = a.clone();
        assert_eq!(a.get().unwrap()[(1, 1)].hits, b.get().unwrap()[(1, 1)].hits);
        b.make_mut()[(1, 1)].update(true, 0.0, 0.0);
        assert_eq!(a.get().unwrap()[(1, 1)].hits, 1);
        assert_eq!(b.get().unwrap()[(1, 1)].hits, 2);
    }
}
