//! Example: relative camera position with a known rotation.
//!
//! Builds a synthetic two-view scene with outliers and pixel noise, then
//! recovers the baseline direction. Run with `RUST_LOG=debug` to follow the
//! sampling loop.

use nalgebra::{Rotation3, Unit, Vector2, Vector3};
use rand::prelude::*;
use rand_distr::Normal;

use relpose::{
    estimate_relative_pose_with_known_orientation_with_rng, Correspondence, RansacSettings,
    RansacType,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut rng = StdRng::seed_from_u64(2024);
    let focal_length = 1000.0;
    let noise = Normal::new(0.0, 1.0 / focal_length)?;

    let rotation = Rotation3::from_axis_angle(
        &Unit::new_normalize(Vector3::new(1.0, 0.2, -0.8)),
        -9f64.to_radians(),
    );
    let position = Vector3::new(-1.3, 0.0, 0.4);

    let n_inliers = 70;
    let n_outliers = 30;
    println!("=== Relative Position with Known Orientation ===\n");
    println!("True position direction: {:.4?}", position.normalize().as_slice());
    println!("Generating {n_inliers} inliers and {n_outliers} outliers\n");

    let mut correspondences = Vec::with_capacity(n_inliers + n_outliers);
    for _ in 0..n_inliers {
        let world = Vector3::new(
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-2.0..2.0),
            rng.gen_range(6.0..10.0),
        );
        let second = rotation * (world - position);
        let f1 = world.xy() / world.z + Vector2::new(noise.sample(&mut rng), noise.sample(&mut rng));
        let f2 = second.xy() / second.z
            + Vector2::new(noise.sample(&mut rng), noise.sample(&mut rng));
        correspondences.push(Correspondence::new(f1, f2));
    }
    for _ in 0..n_outliers {
        correspondences.push(Correspondence::new(
            Vector2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)),
            Vector2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)),
        ));
    }
    correspondences.shuffle(&mut rng);

    let settings = RansacSettings {
        error_threshold: (4.0 / focal_length) * (4.0 / focal_length),
        failure_probability: 0.001,
        use_mle: true,
        ..Default::default()
    };

    let estimate = estimate_relative_pose_with_known_orientation_with_rng(
        &settings,
        RansacType::Ransac,
        &correspondences,
        &rotation,
        &mut rng,
    )?;

    let summary = &estimate.summary;
    println!("Estimated direction:     {:.4?}", estimate.position.as_slice());
    println!(
        "Angular error:           {:.4} deg",
        estimate.position.angle(&position.normalize()).to_degrees()
    );
    println!(
        "Inliers:                 {} / {}",
        summary.inliers.len(),
        summary.num_input_data_points
    );
    println!(
        "Iterations:              {} ({} degenerate, {:?})",
        summary.num_iterations, summary.num_degenerate_samples, summary.termination
    );
    println!("Confidence:              {:.6}", summary.confidence);
    println!("Refined:                 {}", summary.refined);

    Ok(())
}
