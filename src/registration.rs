//! Active-area computation and scan registration: the two write passes
//! that, together, carve free space and mark hits along every beam.

use std::collections::HashSet;

use tracing::trace;

use crate::config::MatchingConfig;
use crate::consts::PATCH_SIZE;
use crate::error::Result;
use crate::geometry::{IntPoint, OrientedPoint, Point};
use crate::grid::HierarchicalGrid;
use crate::laser::{classify_beam, Beam, LaserGeometry};
use crate::raster::LineScratch;

struct ValidBeam {
    phit: Point,
    max_ranged: bool,
}

fn valid_beams(laser: &LaserGeometry, cfg: &MatchingConfig, lp: &OrientedPoint, readings: &[f64]) -> Vec<ValidBeam> {
    let mut beams = Vec::with_capacity(readings.len());
    for (i, &raw) in readings.iter().enumerate().skip(cfg.initial_beams_skip) {
        let Some(&angle) = laser.beam_angles().get(i) else {
            break;
        };
        let (range, max_ranged) = match classify_beam(raw, cfg.usable_range, cfg.laser_max_range) {
            Beam::Invalid => continue,
            Beam::Valid { range, max_ranged } => (range, max_ranged),
        };
        let heading = lp.theta + angle;
        let (s, c) = heading.sin_cos();
        beams.push(ValidBeam {
            phit: Point::new(lp.x + range * c, lp.y + range * s),
            max_ranged,
        });
    }
    beams
}

fn chebyshev(a: IntPoint, b: IntPoint) -> i32 {
    (a.x - b.x).abs().max((a.y - b.y).abs())
}

/// Compute the set of patches the next [`register_scan`] will touch,
/// growing the map first so every beam's expected hit point lies strictly
/// inside it. Installs the active area on `grid` and allocates it.
pub fn compute_active_area(
    laser: &LaserGeometry,
    cfg: &MatchingConfig,
    grid: &mut HierarchicalGrid,
    pose: &OrientedPoint,
    readings: &[f64],
    scratch: &mut LineScratch,
) -> Result<()> {
    let lp = laser.pose_in_world(pose);
    let beams = valid_beams(laser, cfg, &lp, readings);

    let mut min = lp.point();
    let mut max = lp.point();
    for beam in &beams {
        min.x = min.x.min(beam.phit.x);
        min.y = min.y.min(beam.phit.y);
        max.x = max.x.max(beam.phit.x);
        max.y = max.y.max(beam.phit.y);
    }

    let pad_patches = ((cfg.enlarge_step / (grid.delta() * PATCH_SIZE as f64)).ceil() as i32).max(1);
    grid.resize_to_include(min, max, pad_patches);

    let p0 = grid.world2map(lp.point());
    let mut area = HashSet::new();

    for beam in &beams {
        let iphit = grid.world2map(beam.phit);
        if cfg.generate_map {
            let line = scratch.rasterize(p0, iphit)?;
            let pts = line.as_slice();
            let last = pts.len() - 1;
            for &cell in &pts[..last] {
                area.insert(grid.patch_of(cell));
            }
            if !beam.max_ranged {
                area.insert(grid.patch_of(iphit));
            }
        } else {
            area.insert(grid.patch_of(iphit));
        }
    }

    trace!(patches = area.len(), "active area computed");
    grid.set_active_area(area);
    grid.alloc_active_area();
    Ok(())
}

/// Update hit/miss accumulators for every valid beam. Must be preceded by
/// `compute_active_area` (callers normally gate this on the matcher's
/// `active_area_computed` flag rather than calling it unconditionally).
pub fn register_scan(
    laser: &LaserGeometry,
    cfg: &MatchingConfig,
    grid: &mut HierarchicalGrid,
    pose: &OrientedPoint,
    readings: &[f64],
    scratch: &mut LineScratch,
) -> Result<()> {
    let lp = laser.pose_in_world(pose);
    let beams = valid_beams(laser, cfg, &lp, readings);
    let p0 = grid.world2map(lp.point());

    for beam in &beams {
        let iphit = grid.world2map(beam.phit);

        if cfg.generate_map {
            let line = scratch.rasterize(p0, iphit)?;
            let pts = line.as_slice();
            let last_idx = pts.len() - 1;
            let end_cell = pts[last_idx];

            for &cell in &pts[..last_idx] {
                grid.cell_mut(cell)?.update(false, 0.0, 0.0);
                // TSDF-style close-to-surface weighting: cells within
                // Chebyshev distance 1 of the endpoint are counted twice.
                // Preserved as specified even though it duplicates the
                // subsequent single update in the same loop.
                if chebyshev(cell, end_cell) <= 1 {
                    grid.cell_mut(cell)?.update(false, 0.0, 0.0);
                }
            }
            if !beam.max_ranged {
                grid.cell_mut(end_cell)?.update(true, beam.phit.x, beam.phit.y);
            }
        } else if !beam.max_ranged {
            grid.cell_mut(iphit)?.update(true, beam.phit.x, beam.phit.y);
        }
    }

    Ok(())
}
