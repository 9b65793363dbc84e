use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanMatchError {
    #[error("laser geometry has {count} beams, exceeds LASER_MAXBEAMS ({max})")]
    TooManyBeams { count: usize, max: usize },

    #[error("invalid matching parameter {name}: {value} (must be {constraint})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        constraint: &'static str,
    },

    #[error("cell access out of bounds: {ip:?} not inside [0,{width})x[0,{height})")]
    OutOfBounds {
        ip: crate::geometry::IntPoint,
        width: i32,
        height: i32,
    },

    #[error("line rasterization requested {requested} cells, scratch buffer capacity is {capacity}")]
    ScratchBufferOverflow { requested: usize, capacity: usize },

    #[error("posterior estimation matched zero beams across the sample grid; mean/covariance undefined")]
    ZeroMatchMass,

    #[error("empty readings sequence")]
    EmptyReadings,

    #[error("laser parameters have not been set via set_laser_parameters")]
    LaserNotConfigured,
}

pub type Result<T> = std::result::Result<T, ScanMatchError>;
