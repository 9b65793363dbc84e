//! Scan-matching core for a 2D laser occupancy-grid SLAM stack: grid-based
//! scoring, hill-climb and ICP pose refinement, active-area bookkeeping,
//! scan registration, and posterior (mean/covariance) estimation.
//!
//! This crate is deliberately narrow: it has no sensor drivers, no motion
//! model, no map serialization, and no wire protocol. Callers own the map
//! and the pose; this crate refines poses against a map and updates it.

pub mod config;
pub mod consts;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod laser;
pub mod matcher;
pub mod matching;
pub mod raster;
pub mod registration;

pub use config::MatchingConfig;
pub use error::{Result, ScanMatchError};
pub use geometry::{Covariance3, IntPoint, OrientedPoint, Point};
pub use grid::HierarchicalGrid;
pub use laser::{LaserGeometry, Readings};
pub use matcher::ScanMatcher;
pub use matching::posterior::{Gaussian3, Posterior};
