/// Maximum number of beams a single laser geometry may carry.
pub const LASER_MAXBEAMS: usize = 2048;

/// Side length, in cells, of a hierarchical grid patch (2^PATCH_SHIFT).
pub const PATCH_SHIFT: u32 = 5;

/// Cells per patch side: 2^PATCH_SHIFT.
pub const PATCH_SIZE: i32 = 1 << PATCH_SHIFT;

/// Fixed capacity of the matcher's scratch line-rasterization buffer.
pub const LINE_SCRATCH_CAPACITY: usize = 20_000;

/// Per-beam log-likelihood penalty applied when no matching cell is found.
pub const NULL_LIKELIHOOD: f64 = -0.5;

/// Offset, in cells, from an expected hit to its expected free neighbor: sqrt(2).
pub const DEFAULT_FREE_CELL_RATIO: f64 = std::f64::consts::SQRT_2;

/// Occupancy fraction above which a cell is considered occupied.
pub const DEFAULT_FULLNESS_THRESHOLD: f64 = 0.1;

/// Minimum number of patches in an active-area set before `allocActiveArea`
/// allocates them via Rayon instead of sequentially.
pub const PARALLEL_PATCH_THRESHOLD: usize = 64;
