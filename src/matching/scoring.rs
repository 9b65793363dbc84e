//! Scan-to-map scoring kernel: `score` and `likelihood_and_score` share the
//! per-beam expected-point setup and cell search window, and differ only in
//! which beams they include and how a match is folded into the result.

use crate::config::MatchingConfig;
use crate::consts::NULL_LIKELIHOOD;
use crate::geometry::{IntPoint, OrientedPoint, Point};
use crate::grid::HierarchicalGrid;
use crate::laser::{classify_beam, Beam, LaserGeometry};

/// The geometry of a single beam's expected hit, precomputed once per beam
/// and shared by the score and likelihood search.
struct BeamGeometry {
    phit: Point,
    iphit: IntPoint,
    d: IntPoint,
}

fn beam_geometry(lp: &OrientedPoint, angle: f64, range: f64, grid: &HierarchicalGrid, free_cell_ratio: f64) -> BeamGeometry {
    let heading = lp.theta + angle;
    let (s, c) = heading.sin_cos();
    let phit = Point::new(lp.x + range * c, lp.y + range * s);
    let pfree = Point::new(
        phit.x - free_cell_ratio * grid.delta() * c,
        phit.y - free_cell_ratio * grid.delta() * s,
    );
    let iphit = grid.world2map(phit);
    let ipfree = grid.world2map(pfree);
    BeamGeometry {
        phit,
        iphit,
        d: iphit.sub(&ipfree),
    }
}

/// Search the `(2*kernel_size+1)^2` window around `iphit` for the occupied
/// cell, with an empty cell at `candidate - d`, nearest (in world distance)
/// to `phit`. Returns the squared distance and the matched cell's mean hit
/// position.
fn search_window(grid: &HierarchicalGrid, geom: &BeamGeometry, kernel_size: i32, fullness_threshold: f64) -> Option<(f64, Point)> {
    let mut best: Option<(f64, Point)> = None;
    for oy in -kernel_size..=kernel_size {
        for ox in -kernel_size..=kernel_size {
            let candidate = geom.iphit.add(ox, oy);
            if !grid.is_inside(candidate) {
                continue;
            }
            let occ = grid.cell(candidate);
            if occ.fullness() <= fullness_threshold {
                continue;
            }
            let free_neighbor = candidate.sub(&geom.d);
            if !grid.is_inside(free_neighbor) || grid.cell(free_neighbor).fullness() > fullness_threshold {
                continue;
            }
            let Some((mx, my)) = occ.mean() else {
                continue;
            };
            let dist2 = (geom.phit.x - mx).powi(2) + (geom.phit.y - my).powi(2);
            let improves = match best {
                Some((b, _)) => dist2 < b,
                None => true,
            };
            if improves {
                best = Some((dist2, Point::new(mx, my)));
            }
        }
    }
    best
}

/// Sum, over beams, of `exp(-dmin^2 / gaussianSigma)` for beams with a
/// matching occupied cell. Max-ranged beams are treated as carrying no
/// evidence and are skipped entirely, matching the source's score path.
pub fn score(laser: &LaserGeometry, cfg: &MatchingConfig, grid: &HierarchicalGrid, pose: &OrientedPoint, readings: &[f64]) -> f64 {
    let lp = laser.pose_in_world(pose);
    let mut total = 0.0;
    for (i, &raw) in readings.iter().enumerate().skip(cfg.initial_beams_skip) {
        let Some(&angle) = laser.beam_angles().get(i) else {
            break;
        };
        let range = match classify_beam(raw, cfg.usable_range, cfg.laser_max_range) {
            Beam::Invalid => continue,
            Beam::Valid { max_ranged: true, .. } => continue,
            Beam::Valid { range, .. } => range,
        };
        let geom = beam_geometry(&lp, angle, range, grid, cfg.free_cell_ratio);
        if !grid.is_inside(geom.iphit) {
            continue;
        }
        if let Some((dist2, _)) = search_window(grid, &geom, cfg.kernel_size, cfg.fullness_threshold) {
            total += (-dist2 / cfg.gaussian_sigma).exp();
        }
    }
    total
}

/// Result of the joint score/log-likelihood evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LikelihoodResult {
    pub score: f64,
    pub log_likelihood: f64,
    pub matched_beams: usize,
}

/// Like [`score`], but also accumulates a log-likelihood (every evaluated
/// beam contributes, using [`NULL_LIKELIHOOD`] when no cell matches) and
/// counts matched beams. `likelihoodSkip` decimates which beams are
/// evaluated.
pub fn likelihood_and_score(
    laser: &LaserGeometry,
    cfg: &MatchingConfig,
    grid: &HierarchicalGrid,
    pose: &OrientedPoint,
    readings: &[f64],
) -> LikelihoodResult {
    let lp = laser.pose_in_world(pose);
    let stride = cfg.likelihood_skip as usize + 1;
    let mut score_total = 0.0;
    let mut log_likelihood = 0.0;
    let mut matched_beams = 0usize;

    for (i, &raw) in readings.iter().enumerate().skip(cfg.initial_beams_skip) {
        if (i - cfg.initial_beams_skip) % stride != 0 {
            continue;
        }
        let Some(&angle) = laser.beam_angles().get(i) else {
            break;
        };
        let range = match classify_beam(raw, cfg.usable_range, cfg.laser_max_range) {
            Beam::Invalid => continue,
            Beam::Valid { max_ranged: true, .. } => continue,
            Beam::Valid { range, .. } => range,
        };
        let geom = beam_geometry(&lp, angle, range, grid, cfg.free_cell_ratio);
        if !grid.is_inside(geom.iphit) {
            log_likelihood += NULL_LIKELIHOOD;
            continue;
        }
        match search_window(grid, &geom, cfg.kernel_size, cfg.fullness_threshold) {
            Some((dist2, _)) => {
                log_likelihood += -dist2 / cfg.likelihood_sigma;
                score_total += (-dist2 / cfg.gaussian_sigma).exp();
                matched_beams += 1;
            }
            None => log_likelihood += NULL_LIKELIHOOD,
        }
    }

    LikelihoodResult {
        score: score_total,
        log_likelihood,
        matched_beams,
    }
}

/// Find the beam's expected hit point and its paired nearest occupied-cell
/// mean, for callers (the ICP step) that need point correspondences rather
/// than a reduced score/likelihood.
pub(crate) fn correspondence(grid: &HierarchicalGrid, lp: &OrientedPoint, angle: f64, range: f64, cfg: &MatchingConfig) -> Option<(Point, Point)> {
    let geom = beam_geometry(lp, angle, range, grid, cfg.free_cell_ratio);
    if !grid.is_inside(geom.iphit) {
        return None;
    }
    search_window(grid, &geom, cfg.kernel_size, cfg.fullness_threshold).map(|(_, matched)| (geom.phit, matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn laser_straight_ahead() -> LaserGeometry {
        LaserGeometry::new(&[0.0], OrientedPoint::default()).unwrap()
    }

    fn register_single_hit(grid: &mut HierarchicalGrid, world_hit: Point) {
        let ip = grid.world2map(world_hit);
        grid.cell_mut(ip).unwrap().update(true, world_hit.x, world_hit.y);
    }

    #[test]
    fn empty_map_scores_zero() {
        let laser = laser_straight_ahead();
        let cfg = MatchingConfig::default();
        let grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        let pose = OrientedPoint::default();
        assert_eq!(score(&laser, &cfg, &grid, &pose, &[2.0]), 0.0);
    }

    #[test]
    fn exact_hit_scores_close_to_one() {
        let laser = laser_straight_ahead();
        let cfg = MatchingConfig::default();
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        register_single_hit(&mut grid, Point::new(2.0, 0.0));
        let pose = OrientedPoint::default();
        let s = score(&laser, &cfg, &grid, &pose, &[2.0]);
        assert!(s > 0.9, "expected near-perfect match, got {s}");
    }

    #[test]
    fn max_ranged_beam_contributes_nothing_to_score() {
        let laser = laser_straight_ahead();
        let mut cfg = MatchingConfig::default();
        cfg.usable_range = 2.0;
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        register_single_hit(&mut grid, Point::new(2.0, 0.0));
        let pose = OrientedPoint::default();
        assert_eq!(score(&laser, &cfg, &grid, &pose, &[2.0]), 0.0);
    }

    #[test]
    fn likelihood_result_tracks_matched_beam_count() {
        let laser = LaserGeometry::new(&[0.0, 0.1], OrientedPoint::default()).unwrap();
        let cfg = MatchingConfig::default();
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        register_single_hit(&mut grid, Point::new(2.0, 0.0));
        let pose = OrientedPoint::default();
        let result = likelihood_and_score(&laser, &cfg, &grid, &pose, &[2.0, 10.0]);
        assert_eq!(result.matched_beams, 1);
    }
}
