//! Laser geometry (beam directions, mount pose) and range-reading validity.

use serde::{Deserialize, Serialize};

use crate::consts::LASER_MAXBEAMS;
use crate::error::{Result, ScanMatchError};
use crate::geometry::OrientedPoint;

/// Fixed beam layout of a planar laser, relative to the robot frame.
///
/// Established once via [`LaserGeometry::new`] and invariant thereafter —
/// nothing in this crate mutates `beam_angles` or `num_beams` after
/// construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaserGeometry {
    laser_pose: OrientedPoint,
    beam_angles: Vec<f64>,
}

impl LaserGeometry {
    /// Build a laser geometry from `angles` (one entry per beam, radians
    /// relative to the laser's own zero heading) and the laser's mount pose
    /// relative to the robot. Rejects more than [`LASER_MAXBEAMS`] beams.
    pub fn new(angles: &[f64], laser_pose: OrientedPoint) -> Result<Self> {
        if angles.len() > LASER_MAXBEAMS {
            return Err(ScanMatchError::TooManyBeams {
                count: angles.len(),
                max: LASER_MAXBEAMS,
            });
        }
        Ok(Self {
            laser_pose,
            beam_angles: angles.to_vec(),
        })
    }

    pub fn laser_pose(&self) -> OrientedPoint {
        self.laser_pose
    }

    pub fn beam_angles(&self) -> &[f64] {
        &self.beam_angles
    }

    pub fn num_beams(&self) -> usize {
        self.beam_angles.len()
    }

    /// The laser's pose in the world frame given the robot's world pose.
    pub fn pose_in_world(&self, robot_pose: &OrientedPoint) -> OrientedPoint {
        self.laser_pose.absolute(robot_pose)
    }
}

/// An ordered sequence of range readings, one per beam of a [`LaserGeometry`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Readings(Vec<f64>);

impl Readings {
    pub fn new(ranges: Vec<f64>) -> Result<Self> {
        if ranges.is_empty() {
            return Err(ScanMatchError::EmptyReadings);
        }
        Ok(Self(ranges))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The outcome of validating a single beam's raw reading against
/// `laserMaxRange`/`usableRange`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Beam {
    /// NaN, zero, or beyond `laser_max_range` — carries no evidence.
    Invalid,
    /// A usable reading, already clamped to `usable_range`.
    Valid { range: f64, max_ranged: bool },
}

/// Classify a raw range reading. `range == usable_range` after clamping is
/// reported as `max_ranged` — the source treats exact usable-range returns
/// as misses for mapping/scoring purposes.
pub fn classify_beam(raw: f64, usable_range: f64, laser_max_range: f64) -> Beam {
    if raw.is_nan() || raw == 0.0 || raw > laser_max_range {
        return Beam::Invalid;
    }
    let clamped = raw.min(usable_range);
    Beam::Valid {
        range: clamped,
        max_ranged: clamped >= usable_range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_many_beams() {
        let angles = vec![0.0; LASER_MAXBEAMS + 1];
        let result = LaserGeometry::new(&angles, OrientedPoint::default());
        assert!(matches!(result, Err(ScanMatchError::TooManyBeams { .. })));
    }

    #[test]
    fn accepts_max_beams() {
        let angles = vec![0.0; LASER_MAXBEAMS];
        assert!(LaserGeometry::new(&angles, OrientedPoint::default()).is_ok());
    }

    #[test]
    fn classifies_nan_zero_and_overrange_as_invalid() {
        assert_eq!(classify_beam(f64::NAN, 10.0, 12.0), Beam::Invalid);
        assert_eq!(classify_beam(0.0, 10.0, 12.0), Beam::Invalid);
        assert_eq!(classify_beam(13.0, 10.0, 12.0), Beam::Invalid);
    }

    #[test]
    fn clamps_valid_reading_to_usable_range() {
        match classify_beam(11.0, 10.0, 12.0) {
            Beam::Valid { range, max_ranged } => {
                assert!((range - 10.0).abs() < 1e-12);
                assert!(max_ranged);
            }
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn in_range_reading_is_not_max_ranged() {
        match classify_beam(2.0, 10.0, 12.0) {
            Beam::Valid { range, max_ranged } => {
                assert!((range - 2.0).abs() < 1e-12);
                assert!(!max_ranged);
            }
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn empty_readings_rejected() {
        assert!(matches!(Readings::new(vec![]), Err(ScanMatchError::EmptyReadings)));
    }
}
