//! Minimal solvers plugged into the sample-consensus driver.

pub mod relative_position;

pub use relative_position::{
    essential_matrix, sampson_error, squared_sampson_error, RelativePositionEstimator,
};
