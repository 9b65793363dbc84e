//! The occupancy grid: per-cell statistics, patch storage, and the
//! hierarchical map that ties them together.

pub mod accumulator;
pub mod map;
pub mod patch;

pub use accumulator::PointAccumulator;
pub use map::HierarchicalGrid;
