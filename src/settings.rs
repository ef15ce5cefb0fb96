//! Configuration types for sample-consensus estimation.

use std::time::Duration;

use crate::error::EstimationError;

/// Sampling strategy used to draw minimal samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RansacType {
    /// Uniform sampling without replacement.
    #[default]
    Ransac,
    /// Progressive sampling over data sorted by decreasing quality.
    Prosac,
}

/// Limits for the non-linear refinement of the final model.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefinementSettings {
    /// Maximum Levenberg-Marquardt iterations.
    pub max_iterations: usize,
    /// Relative cost decrease below which the solver stops.
    pub function_tolerance: f64,
    /// Parameter step norm below which the solver stops.
    pub step_tolerance: f64,
}

impl Default for RefinementSettings {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            function_tolerance: 1e-12,
            step_tolerance: 1e-12,
        }
    }
}

/// Main configuration object for the estimation pipeline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RansacSettings {
    /// Residual cutoff; a datum is an inlier iff its residual is strictly
    /// below this value. For two-view problems this is a squared error in
    /// normalized image units.
    pub error_threshold: f64,
    /// Target probability that no all-inlier sample was ever drawn.
    pub failure_probability: f64,
    /// Rank candidates by a truncated loss instead of the inlier count.
    pub use_mle: bool,
    /// Minimum number of iterations.
    pub min_iterations: usize,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Models with fewer inliers are never promoted to best.
    pub min_inlier_count: usize,
    /// Refine the best model on its inliers once sampling has finished.
    pub refine: bool,
    /// Seed for the generator created by the convenience API.
    pub seed: Option<u64>,
    /// Wall-clock budget, checked between iterations.
    pub max_duration: Option<Duration>,
    pub refinement: RefinementSettings,
}

impl Default for RansacSettings {
    fn default() -> Self {
        Self {
            // 4 pixels at a focal length of 1000, squared.
            error_threshold: 1.6e-5,
            failure_probability: 0.01,
            use_mle: false,
            min_iterations: 100,
            max_iterations: 10_000,
            min_inlier_count: 3,
            refine: true,
            seed: None,
            max_duration: None,
            refinement: RefinementSettings::default(),
        }
    }
}

impl RansacSettings {
    /// Check every field against its admissible range.
    pub fn validate(&self) -> Result<(), EstimationError> {
        if !(self.error_threshold.is_finite() && self.error_threshold > 0.0) {
            return Err(invalid(
                "error_threshold",
                format!("must be finite and positive, got {}", self.error_threshold),
            ));
        }
        if !(self.failure_probability > 0.0 && self.failure_probability < 1.0) {
            return Err(invalid(
                "failure_probability",
                format!("must lie in (0, 1), got {}", self.failure_probability),
            ));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be positive".to_string()));
        }
        if self.min_iterations > self.max_iterations {
            return Err(invalid(
                "min_iterations",
                format!(
                    "{} exceeds max_iterations {}",
                    self.min_iterations, self.max_iterations
                ),
            ));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: String) -> EstimationError {
    EstimationError::InvalidSettings { name, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let cfg = RansacSettings::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.min_iterations, 100);
        assert_eq!(cfg.max_iterations, 10_000);
        assert_eq!(cfg.min_inlier_count, 3);
        assert!(!cfg.use_mle);
        assert!((cfg.failure_probability - 0.01).abs() < 1e-12);
        assert_eq!(cfg.refinement, RefinementSettings::default());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad_threshold = RansacSettings {
            error_threshold: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            bad_threshold.validate(),
            Err(EstimationError::InvalidSettings {
                name: "error_threshold",
                ..
            })
        ));

        let bad_probability = RansacSettings {
            failure_probability: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            bad_probability.validate(),
            Err(EstimationError::InvalidSettings {
                name: "failure_probability",
                ..
            })
        ));

        let inverted_bounds = RansacSettings {
            min_iterations: 20,
            max_iterations: 10,
            ..Default::default()
        };
        assert!(matches!(
            inverted_bounds.validate(),
            Err(EstimationError::InvalidSettings {
                name: "min_iterations",
                ..
            })
        ));
    }
}
