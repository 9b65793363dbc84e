//! The top-level scan matcher: ties laser geometry, tuning parameters, and
//! the scratch rasterization buffer together behind the public API.

use crate::config::MatchingConfig;
use crate::error::{Result, ScanMatchError};
use crate::geometry::{Covariance3, OrientedPoint};
use crate::grid::HierarchicalGrid;
use crate::laser::{LaserGeometry, Readings};
use crate::matching::icp::icp_optimize;
use crate::matching::optimize::optimize;
use crate::matching::posterior::{reduce, sampled_grid_posterior, Gaussian3, Posterior};
use crate::matching::scoring::score as score_kernel;
use crate::raster::LineScratch;
use crate::registration::{compute_active_area, register_scan};

/// Long-lived, single-threaded scan matcher. Not `Sync`-safe across
/// concurrent calls on the same instance: the scratch rasterization buffer
/// and the active-area flag are exclusive, per-matcher state. Disjoint
/// `(matcher, map)` pairs may run concurrently on different threads.
pub struct ScanMatcher {
    laser: Option<LaserGeometry>,
    config: MatchingConfig,
    scratch: LineScratch,
    active_area_computed: bool,
}

impl ScanMatcher {
    pub fn new(config: MatchingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            laser: None,
            config,
            scratch: LineScratch::new(),
            active_area_computed: false,
        })
    }

    fn laser(&self) -> Result<LaserGeometry> {
        self.laser.clone().ok_or(ScanMatchError::LaserNotConfigured)
    }

    /// Install the beam layout. Copies `angles` in; the source slice need
    /// not outlive this call.
    pub fn set_laser_parameters(&mut self, angles: &[f64], laser_pose: OrientedPoint) -> Result<()> {
        self.laser = Some(LaserGeometry::new(angles, laser_pose)?);
        Ok(())
    }

    pub fn set_matching_parameters(&mut self, config: MatchingConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Reset the active-area flag; callers must call this before a fresh
    /// scan at a new pose.
    pub fn invalidate_active_area(&mut self) {
        self.active_area_computed = false;
    }

    pub fn compute_active_area(&mut self, grid: &mut HierarchicalGrid, pose: &OrientedPoint, readings: &Readings) -> Result<()> {
        let laser = self.laser()?;
        compute_active_area(&laser, &self.config, grid, pose, readings.as_slice(), &mut self.scratch)?;
        self.active_area_computed = true;
        Ok(())
    }

    /// Update the map's hit/miss accumulators for `readings` at `pose`.
    /// Auto-triggers `compute_active_area` if it has not already run since
    /// the last `invalidate_active_area`.
    pub fn register_scan(&mut self, grid: &mut HierarchicalGrid, pose: &OrientedPoint, readings: &Readings) -> Result<()> {
        let laser = self.laser()?;
        if !self.active_area_computed {
            compute_active_area(&laser, &self.config, grid, pose, readings.as_slice(), &mut self.scratch)?;
            self.active_area_computed = true;
        }
        register_scan(&laser, &self.config, grid, pose, readings.as_slice(), &mut self.scratch)
    }

    pub fn score(&self, grid: &HierarchicalGrid, pose: &OrientedPoint, readings: &Readings) -> Result<f64> {
        let laser = self.laser()?;
        Ok(score_kernel(&laser, &self.config, grid, pose, readings.as_slice()))
    }

    /// Greedy hill-climb refinement. Returns the refined pose and its score.
    pub fn optimize(&self, grid: &HierarchicalGrid, init: OrientedPoint, readings: &Readings) -> Result<(OrientedPoint, f64)> {
        let laser = self.laser()?;
        let result = optimize(&laser, &self.config, grid, init, readings.as_slice());
        Ok((result.pose, result.best_score))
    }

    /// Greedy hill-climb refinement with a posterior covariance estimated
    /// from every candidate pose visited along the way.
    pub fn optimize_with_covariance(&self, grid: &HierarchicalGrid, init: OrientedPoint, readings: &Readings) -> Result<(OrientedPoint, Covariance3, f64)> {
        let laser = self.laser()?;
        let result = optimize(&laser, &self.config, grid, init, readings.as_slice());
        let posterior = reduce(&result.visited)?;
        Ok((result.pose, posterior.covariance, result.best_score))
    }

    pub fn icp_optimize(&self, grid: &HierarchicalGrid, init: OrientedPoint, readings: &Readings) -> Result<(OrientedPoint, f64)> {
        let laser = self.laser()?;
        let result = icp_optimize(&laser, &self.config, grid, init, readings.as_slice());
        Ok((result.pose, result.best_score))
    }

    /// Sampled-grid posterior estimate around `pose`, optionally folding in
    /// a caller-supplied odometry prior.
    pub fn likelihood(&self, grid: &HierarchicalGrid, pose: &OrientedPoint, readings: &Readings, odometry: Option<(&Gaussian3, f64)>) -> Result<Posterior> {
        let laser = self.laser()?;
        sampled_grid_posterior(&laser, &self.config, grid, pose, readings.as_slice(), odometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn matcher_with_single_beam() -> ScanMatcher {
        let mut matcher = ScanMatcher::new(MatchingConfig::default()).unwrap();
        matcher.set_laser_parameters(&[0.0], OrientedPoint::default()).unwrap();
        matcher
    }

    #[test]
    fn calls_before_laser_configured_fail_cleanly() {
        let matcher = ScanMatcher::new(MatchingConfig::default()).unwrap();
        let grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 2.0, 2.0, 0.05);
        let readings = Readings::new(vec![1.0]).unwrap();
        let result = matcher.score(&grid, &OrientedPoint::default(), &readings);
        assert!(matches!(result, Err(ScanMatchError::LaserNotConfigured)));
    }

    #[test]
    fn register_then_score_round_trips() {
        let mut matcher = matcher_with_single_beam();
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        let readings = Readings::new(vec![2.0]).unwrap();
        let pose = OrientedPoint::default();

        matcher.register_scan(&mut grid, &pose, &readings).unwrap();
        let s = matcher.score(&grid, &pose, &readings).unwrap();
        assert!(s > 0.0);
    }

    #[test]
    fn invalidate_active_area_forces_recomputation() {
        let mut matcher = matcher_with_single_beam();
        let mut grid = HierarchicalGrid::new(Point::new(0.0, 0.0), 10.0, 10.0, 0.05);
        let readings = Readings::new(vec![2.0]).unwrap();
        let pose = OrientedPoint::default();

        matcher.compute_active_area(&mut grid, &pose, &readings).unwrap();
        assert!(matcher.active_area_computed);
        matcher.invalidate_active_area();
        assert!(!matcher.active_area_computed);
    }
}
