//! Tunable matching parameters, as a serde-serializable configuration tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_FREE_CELL_RATIO, DEFAULT_FULLNESS_THRESHOLD};
use crate::error::{Result, ScanMatchError};

/// All tunables for scoring, optimization, active-area computation, and
/// posterior estimation. See the field docs for the effect of each.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Clamp applied to readings used as evidence; beams beyond this are
    /// "no information" for scoring and free-space traversals up to this
    /// range for map generation.
    #[serde(default = "default_usable_range")]
    pub usable_range: f64,
    /// Hardware max range; readings beyond this are dropped entirely.
    #[serde(default = "default_laser_max_range")]
    pub laser_max_range: f64,
    /// Kernel width for `score`.
    #[serde(default = "default_gaussian_sigma")]
    pub gaussian_sigma: f64,
    /// Kernel width for `likelihoodAndScore`.
    #[serde(default = "default_likelihood_sigma")]
    pub likelihood_sigma: f64,
    /// Half-width of the cell search window around each expected hit.
    #[serde(default = "default_kernel_size")]
    pub kernel_size: i32,
    /// Initial linear step size for the greedy optimizer (meters).
    #[serde(default = "default_opt_linear_delta")]
    pub opt_linear_delta: f64,
    /// Initial angular step size for the greedy optimizer (radians).
    #[serde(default = "default_opt_angular_delta")]
    pub opt_angular_delta: f64,
    /// Minimum refinement rounds before the greedy optimizer terminates.
    #[serde(default = "default_opt_recursive_iterations")]
    pub opt_recursive_iterations: u32,
    /// Beam decimation stride for likelihood evaluation: every `skip + 1`-th
    /// beam is evaluated.
    #[serde(default)]
    pub likelihood_skip: u32,
    /// Occupancy fraction above which a cell counts as occupied.
    #[serde(default = "default_fullness_threshold")]
    pub fullness_threshold: f64,
    /// Map-resize padding, in meters, applied by `computeActiveArea`.
    #[serde(default = "default_enlarge_step")]
    pub enlarge_step: f64,
    /// Offset in cells, from an expected hit to its expected free neighbor.
    #[serde(default = "default_free_cell_ratio")]
    pub free_cell_ratio: f64,
    /// Leading beams ignored by the scoring kernel.
    #[serde(default)]
    pub initial_beams_skip: usize,
    /// Whether registration/active-area traces the full beam (`true`) or
    /// only the hit cell (`false`).
    #[serde(default = "default_generate_map")]
    pub generate_map: bool,
    /// Weight of the angular odometry prior in the optimizer's score gain.
    #[serde(default)]
    pub angular_odometry_reliability: f64,
    /// Weight of the linear odometry prior in the optimizer's score gain.
    #[serde(default)]
    pub linear_odometry_reliability: f64,
    /// Posterior sampling grid: translational half-range (meters).
    #[serde(default = "default_ll_sample_range")]
    pub ll_sample_range: f64,
    /// Posterior sampling grid: translational step (meters).
    #[serde(default = "default_ll_sample_step")]
    pub ll_sample_step: f64,
    /// Posterior sampling grid: angular half-range (radians).
    #[serde(default = "default_la_sample_range")]
    pub la_sample_range: f64,
    /// Posterior sampling grid: angular step (radians).
    #[serde(default = "default_la_sample_step")]
    pub la_sample_step: f64,
}

fn default_usable_range() -> f64 {
    10.0
}
fn default_laser_max_range() -> f64 {
    12.0
}
fn default_gaussian_sigma() -> f64 {
    0.0625
}
fn default_likelihood_sigma() -> f64 {
    0.0625
}
fn default_kernel_size() -> i32 {
    1
}
fn default_opt_linear_delta() -> f64 {
    0.05
}
fn default_opt_angular_delta() -> f64 {
    0.05
}
fn default_opt_recursive_iterations() -> u32 {
    3
}
fn default_fullness_threshold() -> f64 {
    DEFAULT_FULLNESS_THRESHOLD
}
fn default_enlarge_step() -> f64 {
    10.0
}
fn default_free_cell_ratio() -> f64 {
    DEFAULT_FREE_CELL_RATIO
}
fn default_generate_map() -> bool {
    true
}
fn default_ll_sample_range() -> f64 {
    0.01
}
fn default_ll_sample_step() -> f64 {
    0.01
}
fn default_la_sample_range() -> f64 {
    0.01
}
fn default_la_sample_step() -> f64 {
    0.01
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            usable_range: default_usable_range(),
            laser_max_range: default_laser_max_range(),
            gaussian_sigma: default_gaussian_sigma(),
            likelihood_sigma: default_likelihood_sigma(),
            kernel_size: default_kernel_size(),
            opt_linear_delta: default_opt_linear_delta(),
            opt_angular_delta: default_opt_angular_delta(),
            opt_recursive_iterations: default_opt_recursive_iterations(),
            likelihood_skip: 0,
            fullness_threshold: default_fullness_threshold(),
            enlarge_step: default_enlarge_step(),
            free_cell_ratio: default_free_cell_ratio(),
            initial_beams_skip: 0,
            generate_map: default_generate_map(),
            angular_odometry_reliability: 0.0,
            linear_odometry_reliability: 0.0,
            ll_sample_range: default_ll_sample_range(),
            ll_sample_step: default_ll_sample_step(),
            la_sample_range: default_la_sample_range(),
            la_sample_step: default_la_sample_step(),
        }
    }
}

impl MatchingConfig {
    /// Reject non-positive sigmas/deltas/ranges and a negative kernel size.
    /// Called once by the matcher when parameters are installed.
    pub fn validate(&self) -> Result<()> {
        let positive: [(&'static str, f64); 9] = [
            ("usableRange", self.usable_range),
            ("laserMaxRange", self.laser_max_range),
            ("gaussianSigma", self.gaussian_sigma),
            ("likelihoodSigma", self.likelihood_sigma),
            ("optLinearDelta", self.opt_linear_delta),
            ("optAngularDelta", self.opt_angular_delta),
            ("enlargeStep", self.enlarge_step),
            ("freeCellRatio", self.free_cell_ratio),
            ("llSampleStep", self.ll_sample_step),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ScanMatchError::InvalidParameter {
                    name,
                    value,
                    constraint: "> 0",
                });
            }
        }
        if self.kernel_size < 0 {
            return Err(ScanMatchError::InvalidParameter {
                name: "kernelSize",
                value: self.kernel_size as f64,
                constraint: ">= 0",
            });
        }
        if self.laser_max_range < self.usable_range {
            return Err(ScanMatchError::InvalidParameter {
                name: "laserMaxRange",
                value: self.laser_max_range,
                constraint: ">= usableRange",
            });
        }
        Ok(())
    }
}

impl fmt::Display for MatchingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MatchingConfig(usableRange={}, laserMaxRange={}, gaussianSigma={}, \
             likelihoodSigma={}, kernelSize={}, optDelta=({}, {}), generateMap={})",
            self.usable_range,
            self.laser_max_range,
            self.gaussian_sigma,
            self.likelihood_sigma,
            self.kernel_size,
            self.opt_linear_delta,
            self.opt_angular_delta,
            self.generate_map
        )
    }
}
