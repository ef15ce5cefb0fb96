//! # relpose - Robust relative pose with known orientation
//!
//! `relpose` estimates the position of a second camera relative to a first one
//! from point correspondences, when the relative rotation is already known
//! (for example from an IMU or a rotation averaging step). Estimation runs
//! inside a generic sample-consensus framework: a seeded sampler draws
//! two-point samples, a closed-form solver proposes positions, a Sampson
//! residual classifies inliers, and an adaptive stopping rule bounds the
//! number of iterations. The best model is optionally refined on its inliers.
//!
//! ## Quick Start
//!
//! ```rust
//! use nalgebra::{Rotation3, Vector3};
//! use relpose::{
//!     estimate_relative_pose_with_known_orientation, Correspondence, RansacSettings, RansacType,
//! };
//!
//! let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), 0.1);
//! let position = Vector3::new(1.0, 0.0, 0.0);
//!
//! let mut correspondences = Vec::new();
//! for i in 0..5 {
//!     for j in 0..4 {
//!         let world = Vector3::new(
//!             (i as f64 - 2.0) * 0.8,
//!             (j as f64 - 1.5) * 0.9,
//!             6.0 + ((i + j) % 3) as f64 * 1.5,
//!         );
//!         let second = rotation * (world - position);
//!         correspondences.push(Correspondence::new(
//!             world.xy() / world.z,
//!             second.xy() / second.z,
//!         ));
//!     }
//! }
//!
//! let settings = RansacSettings {
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let estimate = estimate_relative_pose_with_known_orientation(
//!     &settings,
//!     RansacType::Ransac,
//!     &correspondences,
//!     &rotation,
//! )
//! .unwrap();
//!
//! assert_eq!(estimate.summary.inliers.len(), 20);
//! assert!((estimate.position - position).norm() < 1e-6);
//! ```
//!
//! ## Extending the Library
//!
//! [`SampleConsensus`](core::SampleConsensus) is generic over its components.
//! Another geometric problem only needs a new [`Estimator`] and a residual
//! function for the built-in scoring; the sampler, stopping rule and driver
//! are reused unchanged.
//!
//! - **[`Estimator`]**: minimal solver and optional non-minimal refit
//! - **[`Sampler`]**: minimal-sample generation
//! - **[`Scoring<M>`](core::Scoring)**: residuals, inliers and model ranking
//! - **[`LocalOptimizer<M>`](core::LocalOptimizer)**: refinement of the final model
//! - **[`TerminationCriterion<S>`](core::TerminationCriterion)**: iteration budget
//!
//! ```rust
//! use relpose::core::Estimator;
//! use relpose::types::DataMatrix;
//!
//! #[derive(Clone)]
//! struct Offset(f64);
//!
//! struct OffsetEstimator;
//!
//! impl Estimator for OffsetEstimator {
//!     type Model = Offset;
//!
//!     fn sample_size(&self) -> usize {
//!         1
//!     }
//!
//!     fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool {
//!         sample.iter().all(|&i| i < data.nrows())
//!     }
//!
//!     fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Offset> {
//!         vec![Offset(data[(sample[0], 1)] - data[(sample[0], 0)])]
//!     }
//! }
//! ```

pub mod api;
pub mod choices;
pub mod core;
pub mod error;
pub mod estimators;
pub mod models;
pub mod optimisers;
pub mod refinement;
pub mod samplers;
pub mod scoring;
pub mod settings;
pub mod termination;
pub mod types;
pub mod utils;

pub use api::{
    estimate_relative_pose_with_known_orientation,
    estimate_relative_pose_with_known_orientation_with_rng, RelativePoseEstimate,
};
pub use crate::core::{
    Estimate, Estimator, LocalOptimizer, RansacSummary, Sampler, Scoring, TerminationCriterion,
};
pub use error::{EstimationError, RefinementError};
pub use models::RelativePosition;
pub use settings::{RansacSettings, RansacType, RefinementSettings};
pub use types::{Correspondence, DataMatrix};
