//! Hierarchical occupancy grid: a dense array of copy-on-write patches, plus
//! world<->cell coordinate conversion and active-area bookkeeping.
//!
//! Cloning a grid clones the patch array but shares patch contents via
//! `Arc`, so the cost of `Clone` is proportional to the number of patches,
//! not the number of cells.

use std::collections::HashSet;

use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::{PARALLEL_PATCH_THRESHOLD, PATCH_SIZE};
use crate::error::{Result, ScanMatchError};
use crate::geometry::{IntPoint, Point};
use crate::grid::accumulator::PointAccumulator;
use crate::grid::patch::{new_patch, Patch, PatchCells};

/// Calling convention: `set_active_area` followed by `alloc_active_area`
/// must not be interleaved with a separate call to `resize_to_include` in
/// between — the active area's patch coordinates are only valid against the
/// grid frame they were computed from.
#[derive(Clone, Debug)]
pub struct HierarchicalGrid {
    origin: Point,
    delta: f64,
    patches: Array2<Patch>,
    active_area: HashSet<IntPoint>,
}

impl HierarchicalGrid {
    /// Build a grid covering at least `world_width` x `world_height` meters
    /// centered on `center`, at `delta` meters per cell. The resulting cell
    /// dimensions are rounded up to whole patches.
    pub fn new(center: Point, world_width: f64, world_height: f64, delta: f64) -> Self {
        let cells_w = patch_align((world_width / delta).ceil() as i32);
        let cells_h = patch_align((world_height / delta).ceil() as i32);
        let origin = Point::new(
            center.x - cells_w as f64 * delta / 2.0,
            center.y - cells_h as f64 * delta / 2.0,
        );
        Self {
            origin,
            delta,
            patches: Array2::from_elem(
                ((cells_w / PATCH_SIZE) as usize, (cells_h / PATCH_SIZE) as usize),
                Patch::empty(),
            ),
            active_area: HashSet::new(),
        }
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn width(&self) -> i32 {
        self.patches.nrows() as i32 * PATCH_SIZE
    }

    pub fn height(&self) -> i32 {
        self.patches.ncols() as i32 * PATCH_SIZE
    }

    pub fn world2map(&self, p: Point) -> IntPoint {
        IntPoint::new(
            ((p.x - self.origin.x) / self.delta).floor() as i32,
            ((p.y - self.origin.y) / self.delta).floor() as i32,
        )
    }

    pub fn map2world(&self, ip: IntPoint) -> Point {
        Point::new(
            self.origin.x + (ip.x as f64 + 0.5) * self.delta,
            self.origin.y + (ip.y as f64 + 0.5) * self.delta,
        )
    }

    pub fn is_inside(&self, ip: IntPoint) -> bool {
        ip.x >= 0 && ip.y >= 0 && ip.x < self.width() && ip.y < self.height()
    }

    fn patch_coord(ip: IntPoint) -> IntPoint {
        IntPoint::new(ip.x.div_euclid(PATCH_SIZE), ip.y.div_euclid(PATCH_SIZE))
    }

    /// The patch coordinate (`storage().patchIndexes`) owning cell `ip`.
    pub fn patch_of(&self, ip: IntPoint) -> IntPoint {
        Self::patch_coord(ip)
    }

    fn in_patch_offset(ip: IntPoint) -> (usize, usize) {
        (
            ip.x.rem_euclid(PATCH_SIZE) as usize,
            ip.y.rem_euclid(PATCH_SIZE) as usize,
        )
    }

    fn patch_in_bounds(&self, pc: IntPoint) -> bool {
        pc.x >= 0 && pc.y >= 0 && pc.x < self.patches.nrows() as i32 && pc.y < self.patches.ncols() as i32
    }

    /// Read a cell's accumulator. Out-of-bounds or unallocated cells read as
    /// all-default (never visited).
    pub fn cell(&self, ip: IntPoint) -> PointAccumulator {
        if !self.is_inside(ip) {
            return PointAccumulator::default();
        }
        let pc = Self::patch_coord(ip);
        let (ox, oy) = Self::in_patch_offset(ip);
        match self.patches[(pc.x as usize, pc.y as usize)].get() {
            Some(cells) => cells[(ox, oy)],
            None => PointAccumulator::default(),
        }
    }

    /// Mutable access to a cell, allocating its owning patch on first write.
    pub fn cell_mut(&mut self, ip: IntPoint) -> Result<&mut PointAccumulator> {
        if !self.is_inside(ip) {
            return Err(ScanMatchError::OutOfBounds {
                ip,
                width: self.width(),
                height: self.height(),
            });
        }
        let pc = Self::patch_coord(ip);
        let (ox, oy) = Self::in_patch_offset(ip);
        let cells = self.patches[(pc.x as usize, pc.y as usize)].make_mut();
        Ok(&mut cells[(ox, oy)])
    }

    /// Replace the active-area set: the patch coordinates (in this grid's
    /// current frame) that the next registration pass will touch.
    pub fn set_active_area(&mut self, area: HashSet<IntPoint>) {
        self.active_area = area;
    }

    pub fn active_area(&self) -> &HashSet<IntPoint> {
        &self.active_area
    }

    /// Grow the grid so that the given world-frame rectangle is addressable,
    /// padding by `pad_patches` extra patches on each side that must grow.
    pub fn resize_to_include(&mut self, min: Point, max: Point, pad_patches: i32) {
        let ip_min = self.world2map(min);
        let ip_max = self.world2map(max);
        let pmin = Self::patch_coord(ip_min).add(-pad_patches, -pad_patches);
        let pmax = Self::patch_coord(ip_max).add(pad_patches, pad_patches);
        self.ensure_patch_bounds(pmin, pmax);
    }

    /// Ensure every patch in the active area is allocated, growing the grid
    /// first if needed. Allocating many patches at once farms the (zeroed)
    /// patch construction out across threads; the result is then written
    /// back in sequentially, since only one thread at a time may hold the
    /// patch array.
    pub fn alloc_active_area(&mut self) {
        if let Some((min, max)) = patch_bounds(&self.active_area) {
            self.ensure_patch_bounds(min, max);
        }

        let to_alloc: Vec<IntPoint> = self
            .active_area
            .iter()
            .copied()
            .filter(|&pc| self.patch_in_bounds(pc) && !self.patches[(pc.x as usize, pc.y as usize)].is_allocated())
            .collect();

        if to_alloc.is_empty() {
            return;
        }

        let allocated: Vec<(IntPoint, PatchCells)> = if to_alloc.len() >= PARALLEL_PATCH_THRESHOLD {
            to_alloc.par_iter().map(|&pc| (pc, new_patch())).collect()
        } else {
            to_alloc.iter().map(|&pc| (pc, new_patch())).collect()
        };

        for (pc, cells) in allocated {
            self.patches[(pc.x as usize, pc.y as usize)] = Patch::from_cells(cells);
        }
    }

    /// Grow the grid, preserving existing contents, so that patch
    /// coordinates in `[min, max]` (inclusive, current frame) are
    /// addressable.
    fn ensure_patch_bounds(&mut self, min: IntPoint, max: IntPoint) {
        let (cur_w, cur_h) = (self.patches.nrows() as i32, self.patches.ncols() as i32);
        let pad_left = (-min.x).max(0);
        let pad_bottom = (-min.y).max(0);
        let pad_right = (max.x + 1 - cur_w).max(0);
        let pad_top = (max.y + 1 - cur_h).max(0);

        if pad_left == 0 && pad_bottom == 0 && pad_right == 0 && pad_top == 0 {
            return;
        }

        let new_w = cur_w + pad_left + pad_right;
        let new_h = cur_h + pad_bottom + pad_top;
        let mut new_patches = Array2::from_elem((new_w as usize, new_h as usize), Patch::empty());
        for ((x, y), patch) in self.patches.indexed_iter() {
            new_patches[((x as i32 + pad_left) as usize, (y as i32 + pad_bottom) as usize)] = patch.clone();
        }
        self.patches = new_patches;
        self.origin = Point::new(
            self.origin.x - pad_left as f64 * PATCH_SIZE as f64 * self.delta,
            self.origin.y - pad_bottom as f64 * PATCH_SIZE as f64 * self.delta,
        );
        self.active_area = self
            .active_area
            .iter()
            .map(|p| p.add(pad_left, pad_bottom))
            .collect();
    }
}

fn patch_align(cells: i32) -> i32 {
    let cells = cells.max(1);
    cells.div_ceil(PATCH_SIZE) * PATCH_SIZE
}

fn patch_bounds(area: &HashSet<IntPoint>) -> Option<(IntPoint, IntPoint)> {
    let mut iter = area.iter();
    let first = *iter.next()?;
    let (mut min, mut max) = (first, first);
    for &p in iter {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_and_map_round_trip_to_cell_center() {
        let grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        let ip = grid.world2map(Point::new(1.234, -2.5));
        let back = grid.map2world(ip);
        assert!((back.x - 1.234).abs() < grid.delta());
        assert!((back.y - (-2.5)).abs() < grid.delta());
    }

    #[test]
    fn dimensions_are_rounded_up_to_whole_patches() {
        let grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        assert_eq!(grid.width() % PATCH_SIZE, 0);
        assert_eq!(grid.height() % PATCH_SIZE, 0);
    }

    #[test]
    fn unwritten_cells_read_as_default() {
        let grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 5.0, 5.0, 0.1);
        let center = grid.world2map(Point::new(0.0, 0.0));
        assert_eq!(grid.cell(center), PointAccumulator::default());
    }

    #[test]
    fn out_of_bounds_cell_mut_errors() {
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 1.0, 1.0, 0.1);
        let far = IntPoint::new(1_000_000, 1_000_000);
        assert!(matches!(grid.cell_mut(far), Err(ScanMatchError::OutOfBounds { .. })));
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 5.0, 5.0, 0.1);
        let ip = grid.world2map(Point::new(0.3, -0.2));
        grid.cell_mut(ip).unwrap().update(true, 0.3, -0.2);
        assert_eq!(grid.cell(ip).hits, 1);
    }

    #[test]
    fn alloc_active_area_grows_and_allocates() {
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 1.0, 1.0, 0.1);
        let far_world = Point::new(50.0, 50.0);
        let far_ip = grid.world2map(far_world);
        let pc = IntPoint::new(
            far_ip.x.div_euclid(PATCH_SIZE),
            far_ip.y.div_euclid(PATCH_SIZE),
        );
        let mut area = HashSet::new();
        area.insert(pc);
        grid.set_active_area(area);
        grid.alloc_active_area();
        assert!(grid.is_inside(far_ip));
        assert_eq!(grid.cell(far_ip), PointAccumulator::default());
    }

    #[test]
    fn cloning_shares_patches_until_written() {
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 2.0, 2.0, 0.1);
        let ip = grid.world2map(Point::new(0.0, 0.0));
        grid.cell_mut(ip).unwrap().update(true, 0.0, 0.0);
        let mut clone = grid.clone();
        clone.cell_mut(ip).unwrap().update(true, 0.0, 0.0);
        assert_eq!(grid.cell(ip).hits, 1);
        assert_eq!(clone.cell(ip).hits, 2);
    }
}
