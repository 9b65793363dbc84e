//! Greedy coordinate-move hill-climb pose optimizer.

use tracing::{debug, warn};

use crate::config::MatchingConfig;
use crate::geometry::OrientedPoint;
use crate::grid::HierarchicalGrid;
use crate::laser::LaserGeometry;
use crate::matching::scoring::{likelihood_and_score, score};
use crate::matching::ScoredMove;

/// The six local-frame neighbor moves, in the fixed evaluation order the
/// optimizer iterates every round.
const NEIGHBOR_MOVES: [(&str, f64, f64, f64); 6] = [
    ("Front", 1.0, 0.0, 0.0),
    ("Back", -1.0, 0.0, 0.0),
    ("Left", 0.0, 1.0, 0.0),
    ("Right", 0.0, -1.0, 0.0),
    ("TurnLeft", 0.0, 0.0, 1.0),
    ("TurnRight", 0.0, 0.0, -1.0),
];

/// Result of the greedy optimizer: the refined pose, its score, and every
/// candidate pose visited along the way (current pose each round plus all
/// six neighbors), for reuse by the optimizer-derived posterior variant.
pub struct OptimizeResult {
    pub pose: OrientedPoint,
    pub best_score: f64,
    pub visited: Vec<ScoredMove>,
}

fn odometry_gain(candidate: &OrientedPoint, init: &OrientedPoint, cfg: &MatchingConfig) -> f64 {
    let delta = candidate.sub(init);
    let mut gain = 1.0;
    if cfg.angular_odometry_reliability > 0.0 {
        gain *= (-cfg.angular_odometry_reliability * delta.theta * delta.theta).exp();
    }
    if cfg.linear_odometry_reliability > 0.0 {
        gain *= (-cfg.linear_odometry_reliability * (delta.x * delta.x + delta.y * delta.y)).exp();
    }
    gain
}

fn evaluate(
    laser: &LaserGeometry,
    cfg: &MatchingConfig,
    grid: &HierarchicalGrid,
    pose: OrientedPoint,
    init: &OrientedPoint,
    readings: &[f64],
) -> ScoredMove {
    let likelihood_result = likelihood_and_score(laser, cfg, grid, &pose, readings);
    let gained_score = likelihood_result.score * odometry_gain(&pose, init, cfg);
    ScoredMove {
        pose,
        score: gained_score,
        likelihood: likelihood_result.log_likelihood,
    }
}

/// Hill-climb from `init`, gated by the odometry prior, until both no
/// improvement was found this round and the refinement counter reaches
/// `cfg.opt_recursive_iterations`.
pub fn optimize(
    laser: &LaserGeometry,
    cfg: &MatchingConfig,
    grid: &HierarchicalGrid,
    init: OrientedPoint,
    readings: &[f64],
) -> OptimizeResult {
    let mut ldelta = cfg.opt_linear_delta;
    let mut adelta = cfg.opt_angular_delta;
    let mut current_pose = init;
    let mut current_move = evaluate(laser, cfg, grid, current_pose, &init, readings);
    let mut visited = vec![current_move];
    let mut refinement = 0u32;

    loop {
        let mut best_local = current_move;
        let mut improved = false;

        for &(name, dx, dy, dtheta) in &NEIGHBOR_MOVES {
            let offset = OrientedPoint::new(dx * ldelta, dy * ldelta, dtheta * adelta);
            let candidate_pose = offset.absolute(&current_pose);
            let candidate_move = evaluate(laser, cfg, grid, candidate_pose, &init, readings);
            visited.push(candidate_move);
            if candidate_move.score > best_local.score {
                debug!(step = name, score = candidate_move.score, "accepted better neighbor");
                best_local = candidate_move;
                improved = true;
            }
        }

        current_pose = best_local.pose;
        current_move = best_local;

        if !improved {
            ldelta *= 0.5;
            adelta *= 0.5;
            refinement += 1;
        }

        if !improved && refinement >= cfg.opt_recursive_iterations {
            break;
        }
    }

    if refinement >= cfg.opt_recursive_iterations && current_move.score <= visited[0].score {
        warn!(
            refinement,
            "optimizer exhausted refinement rounds without net improvement"
        );
    }

    OptimizeResult {
        pose: current_move.pose,
        best_score: current_move.score,
        visited,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn laser_straight_ahead() -> LaserGeometry {
        LaserGeometry::new(&[0.0], OrientedPoint::default()).unwrap()
    }

    fn map_with_wall_hit(world_hit: Point) -> HierarchicalGrid {
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        let ip = grid.world2map(world_hit);
        grid.cell_mut(ip).unwrap().update(true, world_hit.x, world_hit.y);
        grid
    }

    #[test]
    fn optimize_never_regresses_below_initial_score() {
        let laser = laser_straight_ahead();
        let cfg = MatchingConfig::default();
        let grid = map_with_wall_hit(Point::new(2.0, 0.0));
        let init = OrientedPoint::new(0.1, 0.0, 0.0);
        let base_score = score(&laser, &cfg, &grid, &init, &[2.0]);
        let result = optimize(&laser, &cfg, &grid, init, &[2.0]);
        assert!(result.best_score >= base_score);
    }

    #[test]
    fn strong_linear_odometry_prior_pins_the_pose() {
        let laser = laser_straight_ahead();
        let mut cfg = MatchingConfig::default();
        cfg.linear_odometry_reliability = 1.0e6;
        let grid = map_with_wall_hit(Point::new(2.3, 0.4));
        let init = OrientedPoint::new(0.2, -0.1, 0.0);
        let result = optimize(&laser, &cfg, &grid, init, &[2.0]);
        assert!((result.pose.x - init.x).abs() < 1e-6);
        assert!((result.pose.y - init.y).abs() < 1e-6);
    }

    #[test]
    fn visited_list_includes_current_and_all_neighbors_per_round() {
        let laser = laser_straight_ahead();
        let mut cfg = MatchingConfig::default();
        cfg.opt_recursive_iterations = 1;
        let grid = map_with_wall_hit(Point::new(2.0, 0.0));
        let result = optimize(&laser, &cfg, &grid, OrientedPoint::default(), &[2.0]);
        assert!(result.visited.len() >= 7);
    }
}
