//! Final-model refinement strategies plugged into [`SampleConsensus`](crate::core::SampleConsensus).

use log::debug;

use crate::core::{Estimator, LocalOptimizer};
use crate::error::RefinementError;
use crate::types::DataMatrix;

/// Local optimizer used when no refinement is desired.
pub struct NoopLocalOptimizer;

impl<M: Clone> LocalOptimizer<M> for NoopLocalOptimizer {
    fn run(
        &mut self,
        _data: &DataMatrix,
        _inliers: &[usize],
        model: &M,
    ) -> Result<M, RefinementError> {
        Ok(model.clone())
    }
}

/// Iteratively reweighted refit on the inliers.
///
/// Each pass weights every inlier by `1 - r / threshold`, `r` being its
/// residual under the current model in the same domain as the scoring
/// threshold, and refits through the estimator's weighted non-minimal solver.
/// Data at or beyond the threshold get zero weight. Passes stop once no
/// weight moves by more than `convergence_threshold`.
pub struct IrlsOptimizer<E, F>
where
    E: Estimator,
    F: Fn(&DataMatrix, &E::Model, usize) -> f64,
{
    estimator: E,
    residual_fn: F,
    threshold: f64,
    max_iterations: usize,
    convergence_threshold: f64,
}

impl<E, F> IrlsOptimizer<E, F>
where
    E: Estimator,
    F: Fn(&DataMatrix, &E::Model, usize) -> f64,
{
    pub fn new(estimator: E, residual_fn: F, threshold: f64) -> Self {
        Self {
            estimator,
            residual_fn,
            threshold,
            max_iterations: 20,
            convergence_threshold: 1e-6,
        }
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    fn compute_weights(&self, data: &DataMatrix, model: &E::Model, indices: &[usize]) -> Vec<f64> {
        indices
            .iter()
            .map(|&row| {
                let r = (self.residual_fn)(data, model, row);
                if r < self.threshold {
                    1.0 - r / self.threshold
                } else {
                    0.0
                }
            })
            .collect()
    }
}

impl<E, F> LocalOptimizer<E::Model> for IrlsOptimizer<E, F>
where
    E: Estimator,
    F: Fn(&DataMatrix, &E::Model, usize) -> f64,
{
    fn run(
        &mut self,
        data: &DataMatrix,
        inliers: &[usize],
        model: &E::Model,
    ) -> Result<E::Model, RefinementError> {
        let required = self.estimator.sample_size();
        if inliers.len() < required {
            return Err(RefinementError::TooFewObservations {
                required,
                actual: inliers.len(),
            });
        }

        let mut current = model.clone();
        let mut previous: Option<Vec<f64>> = None;
        for pass in 0..self.max_iterations {
            let weights = self.compute_weights(data, &current, inliers);
            if let Some(previous) = &previous {
                let change = weights
                    .iter()
                    .zip(previous)
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0, f64::max);
                if change < self.convergence_threshold {
                    break;
                }
            }

            match self
                .estimator
                .estimate_model_nonminimal(data, inliers, &current, Some(weights.as_slice()))
            {
                Ok(refined) => current = refined,
                Err(err) if pass == 0 => return Err(err),
                Err(err) => {
                    debug!("reweighting stopped after {pass} passes: {err}");
                    break;
                }
            }
            previous = Some(weights);
        }
        Ok(current)
    }
}
