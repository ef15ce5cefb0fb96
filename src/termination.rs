//! Adaptive stopping criterion.
//!
//! After every improvement of the best model the number of iterations still
//! required to reach the target failure probability is recomputed as
//!
//! `K = ceil(log(failure_probability) / log(1 - w^s))`
//!
//! where `w` is the best inlier ratio and `s` the minimal sample size, and
//! clamped to `[min_iterations, max_iterations]`.

use crate::core::TerminationCriterion;
use crate::scoring::Score;
use crate::settings::RansacSettings;
use crate::types::DataMatrix;

/// State of the sampling loop as seen by the stopping criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationState {
    Sampling,
    Converged,
}

/// Number of iterations needed so that, with probability
/// `1 - failure_probability`, at least one all-inlier sample was drawn.
pub fn required_iterations(
    inlier_ratio: f64,
    failure_probability: f64,
    sample_size: usize,
    min_iterations: usize,
    max_iterations: usize,
) -> usize {
    let w = inlier_ratio.clamp(0.0, 1.0);
    if w >= 1.0 {
        return min_iterations;
    }

    let p_good_sample = w.powi(sample_size as i32);
    let log_one_minus_p = (-p_good_sample).ln_1p();
    let log_failure = failure_probability.ln();
    if p_good_sample <= 0.0 || !log_one_minus_p.is_finite() || log_one_minus_p >= 0.0 {
        return max_iterations;
    }

    let k = (log_failure / log_one_minus_p).ceil();
    if !k.is_finite() || k >= max_iterations as f64 {
        return max_iterations;
    }
    (k.max(0.0) as usize).clamp(min_iterations, max_iterations)
}

/// Confidence that an all-inlier sample was drawn during `iterations`
/// draws, `1 - (1 - w^s)^iterations`.
pub fn confidence(inlier_ratio: f64, sample_size: usize, iterations: usize) -> f64 {
    let p_good_sample = inlier_ratio.clamp(0.0, 1.0).powi(sample_size as i32);
    let p_all_bad = (1.0 - p_good_sample).powf(iterations as f64);
    (1.0 - p_all_bad).clamp(0.0, 1.0)
}

/// RANSAC stopping rule driven by the best inlier ratio.
#[derive(Debug, Clone)]
pub struct RansacTerminationCriterion {
    pub failure_probability: f64,
    pub min_iterations: usize,
    pub max_iterations: usize,
    state: TerminationState,
}

impl RansacTerminationCriterion {
    pub fn new(failure_probability: f64, min_iterations: usize, max_iterations: usize) -> Self {
        Self {
            failure_probability,
            min_iterations,
            max_iterations,
            state: TerminationState::Sampling,
        }
    }

    pub fn from_settings(settings: &RansacSettings) -> Self {
        Self::new(
            settings.failure_probability,
            settings.min_iterations,
            settings.max_iterations,
        )
    }

    pub fn state(&self) -> TerminationState {
        self.state
    }
}

impl TerminationCriterion<Score> for RansacTerminationCriterion {
    fn reset(&mut self) {
        self.state = TerminationState::Sampling;
    }

    fn check(
        &mut self,
        data: &DataMatrix,
        best_score: &Score,
        sample_size: usize,
        iteration: usize,
        required_iterations_out: &mut usize,
    ) -> TerminationState {
        let n = data.nrows();
        if n == 0 {
            return self.state;
        }

        let inlier_ratio = best_score.inlier_count as f64 / n as f64;
        let required = required_iterations(
            inlier_ratio,
            self.failure_probability,
            sample_size,
            self.min_iterations,
            self.max_iterations,
        );
        // The best inlier ratio only grows, so the bound only shrinks.
        *required_iterations_out = (*required_iterations_out).min(required);

        if iteration >= *required_iterations_out {
            self.state = TerminationState::Converged;
        }
        self.state
    }
}
