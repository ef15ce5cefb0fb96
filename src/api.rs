//! High-level entry points wiring the built-in components together.

use log::debug;
use nalgebra::{Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::choices::{SamplerChoice, ScoringChoice};
use crate::core::{RansacSummary, SampleConsensus};
use crate::error::EstimationError;
use crate::estimators::RelativePositionEstimator;
use crate::optimisers::IrlsOptimizer;
use crate::settings::{RansacSettings, RansacType};
use crate::termination::RansacTerminationCriterion;
use crate::types::{correspondences_to_data, Correspondence};

/// Result of a successful relative pose estimation.
#[derive(Debug, Clone)]
pub struct RelativePoseEstimate {
    /// Unit-norm centre of the second camera in the first camera frame.
    pub position: Vector3<f64>,
    pub summary: RansacSummary,
}

/// Estimate the position of the second camera given its known orientation.
///
/// `rotation` maps world (first camera) coordinates into the second camera
/// frame. The random source is seeded from `settings.seed`, or from entropy
/// when no seed is set.
pub fn estimate_relative_pose_with_known_orientation(
    settings: &RansacSettings,
    ransac_type: RansacType,
    correspondences: &[Correspondence],
    rotation: &Rotation3<f64>,
) -> Result<RelativePoseEstimate, EstimationError> {
    let rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    estimate_relative_pose_with_known_orientation_with_rng(
        settings,
        ransac_type,
        correspondences,
        rotation,
        rng,
    )
}

/// Same as [`estimate_relative_pose_with_known_orientation`] with a
/// caller-provided random source.
///
/// Passing `&mut rng` lets successive calls share one seeded generator.
pub fn estimate_relative_pose_with_known_orientation_with_rng<R: RngCore>(
    settings: &RansacSettings,
    ransac_type: RansacType,
    correspondences: &[Correspondence],
    rotation: &Rotation3<f64>,
    rng: R,
) -> Result<RelativePoseEstimate, EstimationError> {
    let data = correspondences_to_data(correspondences);
    let estimator = RelativePositionEstimator::new(*rotation).with_refinement(settings.refinement);
    debug!(
        "estimating relative position from {} correspondences ({:?})",
        data.nrows(),
        ransac_type
    );

    let scoring = ScoringChoice::from_settings(settings, estimator.residual_fn());
    let sampler = SamplerChoice::from_type(ransac_type, rng);
    let final_optimizer = settings.refine.then(|| {
        IrlsOptimizer::new(
            estimator.clone(),
            estimator.residual_fn(),
            settings.error_threshold,
        )
    });
    let termination = RansacTerminationCriterion::from_settings(settings);

    let mut ransac = SampleConsensus::new(
        settings.clone(),
        estimator,
        sampler,
        scoring,
        final_optimizer,
        termination,
    );
    let estimate = ransac.run(&data)?;

    Ok(RelativePoseEstimate {
        position: estimate.model.position,
        summary: estimate.summary,
    })
}
