//! Gauss-Newton-style ICP pose refinement: a faster, less robust
//! alternative to the greedy hill-climb optimizer.

use tracing::trace;

use crate::config::MatchingConfig;
use crate::geometry::{normalize_angle, OrientedPoint};
use crate::grid::HierarchicalGrid;
use crate::laser::{classify_beam, Beam, LaserGeometry};
use crate::matching::scoring::{correspondence, score};

/// Safety bound on ICP iterations; the loop ordinarily exits earlier once
/// the score stops increasing, but a hard cap avoids looping forever on
/// pathological inputs that oscillate at floating-point precision.
const MAX_ICP_ITERATIONS: u32 = 50;

pub struct IcpResult {
    pub pose: OrientedPoint,
    pub best_score: f64,
}

/// Run one point-to-point ICP step at `pose`: pair each beam's expected hit
/// with its nearest matching map point, then solve the rigid transform
/// minimizing squared residuals. Returns `None` if no beam found a
/// correspondence.
fn icp_step(laser: &LaserGeometry, cfg: &MatchingConfig, grid: &HierarchicalGrid, pose: &OrientedPoint, readings: &[f64]) -> Option<OrientedPoint> {
    let lp = laser.pose_in_world(pose);
    let mut obs = Vec::new();
    let mut tgt = Vec::new();

    for (i, &raw) in readings.iter().enumerate().skip(cfg.initial_beams_skip) {
        let Some(&angle) = laser.beam_angles().get(i) else {
            break;
        };
        let range = match classify_beam(raw, cfg.usable_range, cfg.laser_max_range) {
            Beam::Invalid => continue,
            Beam::Valid { range, .. } => range,
        };
        if let Some((phit, matched)) = correspondence(grid, &lp, angle, range, cfg) {
            obs.push(phit);
            tgt.push(matched);
        }
    }

    if obs.is_empty() {
        return None;
    }

    let n = obs.len() as f64;
    let obs_centroid_x = obs.iter().map(|p| p.x).sum::<f64>() / n;
    let obs_centroid_y = obs.iter().map(|p| p.y).sum::<f64>() / n;
    let tgt_centroid_x = tgt.iter().map(|p| p.x).sum::<f64>() / n;
    let tgt_centroid_y = tgt.iter().map(|p| p.y).sum::<f64>() / n;

    let mut cross = 0.0;
    let mut dot = 0.0;
    for (o, t) in obs.iter().zip(tgt.iter()) {
        let ox = o.x - obs_centroid_x;
        let oy = o.y - obs_centroid_y;
        let tx = t.x - tgt_centroid_x;
        let ty = t.y - tgt_centroid_y;
        cross += ox * ty - oy * tx;
        dot += ox * tx + oy * ty;
    }

    let rotation = cross.atan2(dot);
    let (s, c) = rotation.sin_cos();
    let tx = tgt_centroid_x - (c * obs_centroid_x - s * obs_centroid_y);
    let ty = tgt_centroid_y - (s * obs_centroid_x + c * obs_centroid_y);

    Some(OrientedPoint {
        x: c * pose.x - s * pose.y + tx,
        y: s * pose.x + c * pose.y + ty,
        theta: normalize_angle(pose.theta + rotation),
    })
}

/// Repeatedly apply [`icp_step`], accepting each step while the resulting
/// score keeps increasing.
pub fn icp_optimize(laser: &LaserGeometry, cfg: &MatchingConfig, grid: &HierarchicalGrid, init: OrientedPoint, readings: &[f64]) -> IcpResult {
    let mut current_pose = init;
    let mut current_score = score(laser, cfg, grid, &current_pose, readings);

    for iteration in 0..MAX_ICP_ITERATIONS {
        let Some(candidate_pose) = icp_step(laser, cfg, grid, &current_pose, readings) else {
            break;
        };
        let candidate_score = score(laser, cfg, grid, &candidate_pose, readings);
        trace!(iteration, candidate_score, current_score, "icp step");
        if candidate_score <= current_score {
            break;
        }
        current_pose = candidate_pose;
        current_score = candidate_score;
    }

    IcpResult {
        pose: current_pose,
        best_score: current_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn map_with_wall_hit(world_hit: Point) -> HierarchicalGrid {
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        let ip = grid.world2map(world_hit);
        grid.cell_mut(ip).unwrap().update(true, world_hit.x, world_hit.y);
        grid
    }

    #[test]
    fn icp_never_regresses_below_initial_score() {
        let laser = LaserGeometry::new(&[0.0], OrientedPoint::default()).unwrap();
        let cfg = MatchingConfig::default();
        let grid = map_with_wall_hit(Point::new(2.0, 0.0));
        let init = OrientedPoint::new(0.1, 0.02, 0.0);
        let base_score = score(&laser, &cfg, &grid, &init, &[2.0]);
        let result = icp_optimize(&laser, &cfg, &grid, init, &[2.0]);
        assert!(result.best_score >= base_score);
    }

    #[test]
    fn icp_with_no_correspondences_returns_initial_pose() {
        let laser = LaserGeometry::new(&[0.0], OrientedPoint::default()).unwrap();
        let cfg = MatchingConfig::default();
        let grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        let init = OrientedPoint::new(0.1, 0.0, 0.0);
        let result = icp_optimize(&laser, &cfg, &grid, init, &[2.0]);
        assert_eq!(result.pose, init);
    }
}
