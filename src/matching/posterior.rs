//! Pose posterior estimation: reduce a list of sampled/visited candidate
//! poses into a mean and 3x3 covariance over (x, y, theta).

use crate::config::MatchingConfig;
use crate::error::{Result, ScanMatchError};
use crate::geometry::{normalize_angle, Covariance3, OrientedPoint};
use crate::grid::HierarchicalGrid;
use crate::laser::LaserGeometry;
use crate::matching::scoring::likelihood_and_score;
use crate::matching::ScoredMove;

/// A caller-supplied 3D Gaussian prior over (x, y, theta), used as an
/// optional odometry term added to the posterior's log-likelihood.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gaussian3 {
    pub mean: OrientedPoint,
    pub covariance: Covariance3,
}

impl Gaussian3 {
    /// Log-density at `p`, up to an additive normalizing constant (the
    /// constant cancels in the posterior reduction's `lmax` subtraction).
    pub fn log_eval(&self, p: &OrientedPoint) -> f64 {
        let dx = p.x - self.mean.x;
        let dy = p.y - self.mean.y;
        let dt = normalize_angle(p.theta - self.mean.theta);
        let inv = invert_symmetric3(&self.covariance);
        -0.5 * (inv.xx * dx * dx
            + inv.yy * dy * dy
            + inv.tt * dt * dt
            + 2.0 * inv.xy * dx * dy
            + 2.0 * inv.xt * dx * dt
            + 2.0 * inv.yt * dy * dt)
    }
}

fn invert_symmetric3(c: &Covariance3) -> Covariance3 {
    let det = c.xx * (c.yy * c.tt - c.yt * c.yt) - c.xy * (c.xy * c.tt - c.yt * c.xt) + c.xt * (c.xy * c.yt - c.yy * c.xt);
    if det.abs() < 1e-15 {
        return Covariance3::default();
    }
    let inv_det = 1.0 / det;
    Covariance3 {
        xx: (c.yy * c.tt - c.yt * c.yt) * inv_det,
        yy: (c.xx * c.tt - c.xt * c.xt) * inv_det,
        tt: (c.xx * c.yy - c.xy * c.xy) * inv_det,
        xy: (c.xt * c.yt - c.xy * c.tt) * inv_det,
        xt: (c.xy * c.yt - c.xt * c.yy) * inv_det,
        yt: (c.xy * c.xt - c.xx * c.yt) * inv_det,
    }
}

/// Result of a posterior reduction: first two moments of the pose
/// distribution implied by a set of scored candidates, plus the raw and
/// normalized log-evidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Posterior {
    pub mean: OrientedPoint,
    pub covariance: Covariance3,
    pub lmax: f64,
    pub log_z: f64,
}

/// Reduce a list of scored candidates into a posterior. Always uses the
/// circular mean for theta (see the crate's resolution of the source's
/// arithmetic/circular mean inconsistency).
///
/// Errors with [`ScanMatchError::ZeroMatchMass`] if `moves` is empty.
pub fn reduce(moves: &[ScoredMove]) -> Result<Posterior> {
    if moves.is_empty() {
        return Err(ScanMatchError::ZeroMatchMass);
    }

    let lmax = moves.iter().fold(f64::NEG_INFINITY, |acc, m| acc.max(m.likelihood));

    let mut lcum = 0.0;
    let mut wx = 0.0;
    let mut wy = 0.0;
    let mut wsin = 0.0;
    let mut wcos = 0.0;
    for m in moves {
        let w = (m.likelihood - lmax).exp();
        lcum += w;
        wx += w * m.pose.x;
        wy += w * m.pose.y;
        wsin += w * m.pose.theta.sin();
        wcos += w * m.pose.theta.cos();
    }

    if lcum <= 0.0 {
        return Err(ScanMatchError::ZeroMatchMass);
    }

    let mean = OrientedPoint::new(wx / lcum, wy / lcum, wsin.atan2(wcos));

    let mut xx = 0.0;
    let mut yy = 0.0;
    let mut tt = 0.0;
    let mut xy = 0.0;
    let mut xt = 0.0;
    let mut yt = 0.0;
    for m in moves {
        let w = (m.likelihood - lmax).exp();
        let dx = m.pose.x - mean.x;
        let dy = m.pose.y - mean.y;
        let dt = normalize_angle(m.pose.theta - mean.theta);
        xx += w * dx * dx;
        yy += w * dy * dy;
        tt += w * dt * dt;
        xy += w * dx * dy;
        xt += w * dx * dt;
        yt += w * dy * dt;
    }

    let covariance = Covariance3 {
        xx: xx / lcum,
        yy: yy / lcum,
        tt: tt / lcum,
        xy: xy / lcum,
        xt: xt / lcum,
        yt: yt / lcum,
    };

    Ok(Posterior {
        mean,
        covariance,
        lmax,
        log_z: lcum.ln() + lmax,
    })
}

fn sample_axis(range: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 {
        return vec![0.0];
    }
    let n = ((2.0 * range) / step).round() as i64;
    (0..=n.max(0)).map(|i| -range + i as f64 * step).collect()
}

/// Sample `likelihoodAndScore` over the Cartesian product of offsets
/// `[-ll_sample_range, ll_sample_range] x [...] x [-la_sample_range,
/// la_sample_range]` around `pose`, optionally folding in a log-prior, and
/// reduce the resulting candidates into a posterior.
pub fn sampled_grid_posterior(
    laser: &LaserGeometry,
    cfg: &MatchingConfig,
    grid: &HierarchicalGrid,
    pose: &OrientedPoint,
    readings: &[f64],
    prior: Option<(&Gaussian3, f64)>,
) -> Result<Posterior> {
    let dxs = sample_axis(cfg.ll_sample_range, cfg.ll_sample_step);
    let dys = sample_axis(cfg.ll_sample_range, cfg.ll_sample_step);
    let dthetas = sample_axis(cfg.la_sample_range, cfg.la_sample_step);

    let mut moves = Vec::with_capacity(dxs.len() * dys.len() * dthetas.len());
    for &dtheta in &dthetas {
        for &dy in &dys {
            for &dx in &dxs {
                let candidate = OrientedPoint::new(pose.x + dx, pose.y + dy, normalize_angle(pose.theta + dtheta));
                let result = likelihood_and_score(laser, cfg, grid, &candidate, readings);
                let mut likelihood = result.log_likelihood;
                if let Some((odometry, gain)) = prior {
                    likelihood += odometry.log_eval(&candidate) / gain;
                }
                moves.push(ScoredMove {
                    pose: candidate,
                    score: result.score,
                    likelihood,
                });
            }
        }
    }

    reduce(&moves)
}
