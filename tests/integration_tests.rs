//! Integration tests for relative pose estimation with known orientation.
//!
//! Synthetic scenes follow one layout: world points uniform in
//! `[-2, 2] x [-2, 2] x [6, 10]`, the first camera at the origin, outliers with
//! both observations uniform in `[-1, 1]^2`, and Gaussian pixel noise at a
//! focal length of 1000.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use nalgebra::{Rotation3, Unit, Vector2, Vector3};
use rand::prelude::*;
use rand_distr::Normal;

use relpose::choices::ScoringChoice;
use relpose::core::{SampleConsensus, TerminationReason};
use relpose::estimators::RelativePositionEstimator;
use relpose::optimisers::IrlsOptimizer;
use relpose::refinement::refine_relative_position;
use relpose::samplers::UniformRandomSampler;
use relpose::termination::RansacTerminationCriterion;
use relpose::types::correspondences_to_data;
use relpose::*;

const NUM_POINTS: usize = 100;
const FOCAL_LENGTH: f64 = 1000.0;
const REPROJECTION_ERROR: f64 = 4.0;

fn test_settings() -> RansacSettings {
    RansacSettings {
        error_threshold: (REPROJECTION_ERROR * REPROJECTION_ERROR)
            / (FOCAL_LENGTH * FOCAL_LENGTH),
        failure_probability: 0.001,
        use_mle: true,
        ..Default::default()
    }
}

fn synthetic_correspondences(
    rng: &mut StdRng,
    rotation: &Rotation3<f64>,
    position: &Vector3<f64>,
    inlier_ratio: f64,
    noise: f64,
) -> Vec<Correspondence> {
    let mut correspondences: Vec<Correspondence> = (0..NUM_POINTS)
        .map(|i| {
            let world = Vector3::new(
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(6.0..10.0),
            );
            if (i as f64) < inlier_ratio * NUM_POINTS as f64 {
                let in_second = rotation * (world - position);
                Correspondence::new(world.xy() / world.z, in_second.xy() / in_second.z)
            } else {
                Correspondence::new(
                    Vector2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)),
                    Vector2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)),
                )
            }
        })
        .collect();

    if noise > 0.0 {
        let pixel = Normal::new(0.0, noise / FOCAL_LENGTH).unwrap();
        for c in correspondences.iter_mut() {
            c.feature1 += Vector2::new(pixel.sample(rng), pixel.sample(rng));
            c.feature2 += Vector2::new(pixel.sample(rng), pixel.sample(rng));
        }
    }
    correspondences
}

fn random_rotation(rng: &mut StdRng, degrees: f64) -> Rotation3<f64> {
    let axis = Unit::new_normalize(Vector3::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
    ));
    Rotation3::from_axis_angle(&axis, degrees.to_radians())
}

fn standard_rotations() -> Vec<Rotation3<f64>> {
    vec![
        Rotation3::identity(),
        Rotation3::from_axis_angle(&Vector3::y_axis(), 12f64.to_radians()),
        Rotation3::from_axis_angle(
            &Unit::new_normalize(Vector3::new(1.0, 0.2, -0.8)),
            -9f64.to_radians(),
        ),
    ]
}

fn execute_random_test(
    rng: &mut StdRng,
    rotation: &Rotation3<f64>,
    position: &Vector3<f64>,
    inlier_ratio: f64,
    noise: f64,
    tolerance: f64,
) -> RelativePoseEstimate {
    let correspondences = synthetic_correspondences(rng, rotation, position, inlier_ratio, noise);
    let estimate = estimate_relative_pose_with_known_orientation_with_rng(
        &test_settings(),
        RansacType::Ransac,
        &correspondences,
        rotation,
        &mut *rng,
    )
    .unwrap_or_else(|e| panic!("estimation failed for position {position:?}: {e}"));

    assert!(estimate.summary.inliers.len() > 3);
    assert_abs_diff_eq!(estimate.position, position.normalize(), epsilon = tolerance);
    estimate
}

#[test]
fn all_inliers_no_noise() {
    let mut rng = StdRng::seed_from_u64(66);
    let positions = [Vector3::new(-1.3, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.5)];
    for rotation in standard_rotations() {
        for position in &positions {
            let estimate = execute_random_test(&mut rng, &rotation, position, 1.0, 0.0, 1e-4);
            assert_eq!(estimate.summary.inliers.len(), NUM_POINTS);
        }
    }
}

#[test]
fn all_inliers_with_noise() {
    let mut rng = StdRng::seed_from_u64(66);
    let positions = [Vector3::new(-1.3, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.5)];
    for rotation in standard_rotations() {
        for position in &positions {
            execute_random_test(&mut rng, &rotation, position, 1.0, 1.0, 1e-2);
        }
    }
}

#[test]
fn outliers_no_noise() {
    let mut rng = StdRng::seed_from_u64(67);
    let rotations = [Rotation3::identity(), random_rotation(&mut rng, 10.0)];
    let positions = [Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)];
    for rotation in &rotations {
        for position in &positions {
            execute_random_test(&mut rng, rotation, position, 0.7, 0.0, 1e-2);
        }
    }
}

#[test]
fn outliers_with_noise() {
    let mut rng = StdRng::seed_from_u64(68);
    let rotations = [Rotation3::identity(), random_rotation(&mut rng, 10.0)];
    let positions = [Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)];
    for rotation in &rotations {
        for position in &positions {
            execute_random_test(&mut rng, rotation, position, 0.7, 1.0, 1e-2);
        }
    }
}

/// Seeds for which the robust estimate lands within `1e-2` (per coordinate)
/// of the error a least-squares fit on the true inliers alone already has.
fn seeds_tracking_inlier_only_fit(settings: &RansacSettings, seeds: std::ops::Range<u64>) -> usize {
    let rotation = Rotation3::identity();
    let position = Vector3::new(-1.3, 0.0, 0.0);
    let truth = position.normalize();
    let num_inliers = (0.7 * NUM_POINTS as f64) as usize;

    seeds
        .filter(|&seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let correspondences =
                synthetic_correspondences(&mut rng, &rotation, &position, 0.7, 1.0);
            let estimate = estimate_relative_pose_with_known_orientation_with_rng(
                settings,
                RansacType::Ransac,
                &correspondences,
                &rotation,
                &mut rng,
            )
            .unwrap_or_else(|e| panic!("estimation failed for seed {seed}: {e}"));

            let data = correspondences_to_data(&correspondences);
            let true_inliers: Vec<usize> = (0..num_inliers).collect();
            let mut reference = truth;
            refine_relative_position(
                &data,
                &true_inliers,
                None,
                &rotation,
                &mut reference,
                &RefinementSettings::default(),
            )
            .unwrap_or_else(|e| panic!("inlier-only fit failed for seed {seed}: {e}"));

            let error = (estimate.position - truth).amax();
            let reference_error = (reference - truth).amax();
            error <= reference_error + 1e-2
        })
        .count()
}

#[test]
fn outliers_with_noise_across_many_seeds() {
    let tracking = seeds_tracking_inlier_only_fit(&test_settings(), 0..100);
    assert!(tracking >= 90, "only {tracking} of 100 seeds tracked the inlier-only fit");
}

#[test]
fn plain_inlier_count_scoring_recovers_position() {
    let mut rng = StdRng::seed_from_u64(5);
    let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), 12f64.to_radians());
    let position = Vector3::new(-1.3, 0.0, 0.0);
    let correspondences = synthetic_correspondences(&mut rng, &rotation, &position, 0.7, 0.5);
    let settings = RansacSettings {
        use_mle: false,
        seed: Some(9),
        ..test_settings()
    };

    let estimate = estimate_relative_pose_with_known_orientation(
        &settings,
        RansacType::Ransac,
        &correspondences,
        &rotation,
    )
    .unwrap();
    assert!(estimate.summary.inliers.len() >= 70);
    assert_abs_diff_eq!(estimate.position, position.normalize(), epsilon = 1e-2);
}

#[test]
fn prosac_on_quality_sorted_data() {
    let mut rng = StdRng::seed_from_u64(21);
    let rotation = random_rotation(&mut rng, 8.0);
    let position = Vector3::new(0.0, 1.0, 0.0);
    // Inliers come first, as with correspondences sorted by match quality.
    let correspondences = synthetic_correspondences(&mut rng, &rotation, &position, 0.6, 0.5);

    let estimate = estimate_relative_pose_with_known_orientation_with_rng(
        &test_settings(),
        RansacType::Prosac,
        &correspondences,
        &rotation,
        StdRng::seed_from_u64(3),
    )
    .unwrap();
    assert!(estimate.summary.inliers.len() > 3);
    assert_abs_diff_eq!(estimate.position, position, epsilon = 1e-2);
}

#[test]
fn same_seed_gives_identical_results() {
    let mut rng = StdRng::seed_from_u64(11);
    let rotation = Rotation3::identity();
    let position = Vector3::new(1.0, 0.0, 0.0);
    let correspondences = synthetic_correspondences(&mut rng, &rotation, &position, 0.7, 1.0);
    let settings = RansacSettings {
        seed: Some(1234),
        ..test_settings()
    };

    let run = || {
        estimate_relative_pose_with_known_orientation(
            &settings,
            RansacType::Ransac,
            &correspondences,
            &rotation,
        )
        .unwrap()
    };
    let a = run();
    let b = run();

    assert_eq!(a.position, b.position);
    assert_eq!(a.summary.inliers, b.summary.inliers);
    assert_eq!(a.summary.num_iterations, b.summary.num_iterations);
    assert_eq!(a.summary.refined, b.summary.refined);
}

#[test]
fn summary_reports_iterations_and_confidence() {
    let mut rng = StdRng::seed_from_u64(12);
    let rotation = Rotation3::identity();
    let position = Vector3::new(0.0, 1.0, 0.0);
    let correspondences = synthetic_correspondences(&mut rng, &rotation, &position, 0.7, 0.0);
    let settings = RansacSettings {
        seed: Some(3),
        ..test_settings()
    };

    let estimate = estimate_relative_pose_with_known_orientation(
        &settings,
        RansacType::Ransac,
        &correspondences,
        &rotation,
    )
    .unwrap();
    let summary = &estimate.summary;

    assert_eq!(summary.num_input_data_points, NUM_POINTS);
    // 70% inliers needs far fewer draws than the minimum.
    assert_eq!(summary.num_iterations, settings.min_iterations);
    assert_eq!(summary.termination, TerminationReason::Converged);
    assert!(summary.confidence > 0.999 && summary.confidence <= 1.0);
    assert!(summary.num_degenerate_samples < summary.num_iterations);
    assert!(summary.inliers.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn too_few_correspondences_fail_immediately() {
    let correspondences = [Correspondence::new(
        Vector2::new(0.1, 0.0),
        Vector2::new(0.2, 0.0),
    )];
    assert_eq!(
        estimate_relative_pose_with_known_orientation(
            &test_settings(),
            RansacType::Ransac,
            &correspondences,
            &Rotation3::identity(),
        )
        .unwrap_err(),
        EstimationError::InsufficientData {
            required: 2,
            actual: 1
        }
    );
}

#[test]
fn unrelated_observations_have_no_viable_model() {
    let mut rng = StdRng::seed_from_u64(31);
    let correspondences =
        synthetic_correspondences(&mut rng, &Rotation3::identity(), &Vector3::x(), 0.0, 0.0);
    let settings = RansacSettings {
        error_threshold: 1e-20,
        min_iterations: 10,
        max_iterations: 200,
        seed: Some(8),
        ..test_settings()
    };

    let err = estimate_relative_pose_with_known_orientation(
        &settings,
        RansacType::Ransac,
        &correspondences,
        &Rotation3::identity(),
    )
    .unwrap_err();
    assert_eq!(err, EstimationError::NoViableModel { iterations: 200 });
}

#[test]
fn zero_baseline_makes_every_sample_degenerate() {
    let mut rng = StdRng::seed_from_u64(32);
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.1);
    let correspondences =
        synthetic_correspondences(&mut rng, &rotation, &Vector3::zeros(), 1.0, 0.0);
    let settings = RansacSettings {
        min_iterations: 10,
        max_iterations: 50,
        seed: Some(8),
        ..test_settings()
    };

    let err = estimate_relative_pose_with_known_orientation(
        &settings,
        RansacType::Ransac,
        &correspondences,
        &rotation,
    )
    .unwrap_err();
    assert_eq!(err, EstimationError::AllSamplesDegenerate { iterations: 50 });
}

#[test]
fn elapsed_deadline_interrupts_the_run() {
    let mut rng = StdRng::seed_from_u64(33);
    let rotation = Rotation3::identity();
    let correspondences =
        synthetic_correspondences(&mut rng, &rotation, &Vector3::x(), 1.0, 0.0);
    let settings = RansacSettings {
        max_duration: Some(Duration::ZERO),
        seed: Some(8),
        ..test_settings()
    };

    let err = estimate_relative_pose_with_known_orientation(
        &settings,
        RansacType::Ransac,
        &correspondences,
        &rotation,
    )
    .unwrap_err();
    assert_eq!(err, EstimationError::Interrupted { iterations: 0 });
}

fn pipeline(
    settings: &RansacSettings,
    rotation: Rotation3<f64>,
    seed: u64,
) -> SampleConsensus<
    RelativePositionEstimator,
    UniformRandomSampler,
    ScoringChoice<RelativePosition, impl Fn(&DataMatrix, &RelativePosition, usize) -> f64 + Copy + Send + Sync>,
    IrlsOptimizer<RelativePositionEstimator, impl Fn(&DataMatrix, &RelativePosition, usize) -> f64>,
    RansacTerminationCriterion,
> {
    let estimator = RelativePositionEstimator::new(rotation);
    let scoring = ScoringChoice::from_settings(settings, estimator.residual_fn());
    let optimizer = IrlsOptimizer::new(
        estimator.clone(),
        estimator.residual_fn(),
        settings.error_threshold,
    );
    SampleConsensus::new(
        settings.clone(),
        estimator,
        UniformRandomSampler::from_seed(seed),
        scoring,
        Some(optimizer),
        RansacTerminationCriterion::from_settings(settings),
    )
}

#[test]
fn parallel_run_matches_serial_run() {
    let mut rng = StdRng::seed_from_u64(41);
    let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), 12f64.to_radians());
    let position = Vector3::new(-1.3, 0.0, 0.0);
    let data = correspondences_to_data(&synthetic_correspondences(
        &mut rng, &rotation, &position, 0.7, 1.0,
    ));
    let settings = test_settings();

    let serial = pipeline(&settings, rotation, 17).run(&data).unwrap();
    let parallel = pipeline(&settings, rotation, 17)
        .run_parallel(&data, 16)
        .unwrap();

    assert_eq!(serial.summary.inliers, parallel.summary.inliers);
    assert_eq!(serial.model, parallel.model);
    assert_abs_diff_eq!(parallel.model.position, position.normalize(), epsilon = 1e-2);
    assert_eq!(serial.model.angle_to(&parallel.model), 0.0);
}

#[test]
fn raised_cancel_flag_stops_before_sampling() {
    let mut rng = StdRng::seed_from_u64(42);
    let rotation = Rotation3::identity();
    let data = correspondences_to_data(&synthetic_correspondences(
        &mut rng,
        &rotation,
        &Vector3::x(),
        1.0,
        0.0,
    ));
    let cancel = Arc::new(AtomicBool::new(true));

    let mut ransac = pipeline(&test_settings(), rotation, 1).with_cancel_flag(cancel);
    assert_eq!(
        ransac.run(&data).unwrap_err(),
        EstimationError::Interrupted { iterations: 0 }
    );
}
