//! Error types reported by the estimation pipeline.

use thiserror::Error;

/// Errors surfaced by a sample-consensus run.
///
/// A run either succeeds with a model and a summary, or fails with one of
/// these variants and no model at all.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimationError {
    /// A configuration value is outside its admissible range.
    #[error("invalid setting `{name}`: {reason}")]
    InvalidSettings {
        /// Name of the offending field.
        name: &'static str,
        /// Human readable description of the constraint that was violated.
        reason: String,
    },

    /// Fewer correspondences than the minimal sample size.
    #[error("estimation requires at least {required} correspondences, got {actual}")]
    InsufficientData {
        /// Minimal sample size of the estimator.
        required: usize,
        /// Number of correspondences supplied.
        actual: usize,
    },

    /// No candidate ever reached the minimal inlier floor.
    #[error("no viable model found after {iterations} iterations")]
    NoViableModel {
        /// Number of iterations consumed before giving up.
        iterations: usize,
    },

    /// Every drawn sample was degenerate.
    #[error("all {iterations} samples were degenerate")]
    AllSamplesDegenerate {
        /// Number of iterations consumed before giving up.
        iterations: usize,
    },

    /// The run was cancelled or hit its deadline before any viable model was found.
    #[error("estimation interrupted after {iterations} iterations without a viable model")]
    Interrupted {
        /// Number of iterations consumed before the interruption.
        iterations: usize,
    },
}

/// Errors produced by non-linear refinement.
///
/// These never abort an estimation: the driver logs them and keeps the
/// model found by sampling.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RefinementError {
    /// Not enough observations to constrain the refined parameters.
    #[error("refinement requires at least {required} observations, got {actual}")]
    TooFewObservations {
        /// Minimal number of observations.
        required: usize,
        /// Number of observations supplied.
        actual: usize,
    },

    /// The weight vector does not have one entry per observation.
    #[error("expected {expected} observation weights, got {actual}")]
    WeightMismatch {
        /// Number of observations.
        expected: usize,
        /// Number of weights supplied.
        actual: usize,
    },

    /// The iteration limit was reached before the cost stabilised.
    #[error("refinement did not converge within {iterations} iterations")]
    NotConverged {
        /// Number of iterations performed.
        iterations: usize,
    },

    /// The normal equations became singular or produced non-finite values.
    #[error("refinement hit a numerical failure")]
    NumericalFailure,

    /// The estimator has no non-minimal solver.
    #[error("estimator does not support refinement")]
    Unsupported,

    /// The cost function reported an error.
    #[error("cost evaluation failed: {0}")]
    Cost(String),
}
