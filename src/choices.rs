//! Runtime wrappers exposing built-in components via enums while the core
//! [`SampleConsensus`](crate::core::SampleConsensus) stays fully generic.
//! Each enum holds the concrete variants plus a `Dyn` escape hatch for custom
//! implementations.

use rand::rngs::StdRng;
use rand::RngCore;

use crate::core::{Sampler, Scoring};
use crate::samplers::{ProsacSampler, UniformRandomSampler};
use crate::scoring::{InlierCountScoring, Score, TruncatedLossScoring};
use crate::settings::{RansacSettings, RansacType};
use crate::types::DataMatrix;

/// PROSAC draws before falling back to uniform sampling.
const PROSAC_CONVERGENCE_ITERATIONS: usize = 100_000;

/// Runtime sampler selection.
pub enum SamplerChoice<R = StdRng> {
    Uniform(UniformRandomSampler<R>),
    Prosac(ProsacSampler<R>),
    Dyn(Box<dyn Sampler + Send>),
}

impl<R: RngCore> SamplerChoice<R> {
    /// Built-in sampler for `ransac_type`, drawing from `rng`.
    pub fn from_type(ransac_type: RansacType, rng: R) -> Self {
        match ransac_type {
            RansacType::Ransac => SamplerChoice::Uniform(UniformRandomSampler::from_rng(rng)),
            RansacType::Prosac => SamplerChoice::Prosac(ProsacSampler::from_rng(
                rng,
                PROSAC_CONVERGENCE_ITERATIONS,
            )),
        }
    }
}

impl<R: RngCore> Sampler for SamplerChoice<R> {
    fn sample(&mut self, data: &DataMatrix, sample_size: usize, out_indices: &mut [usize]) -> bool {
        match self {
            SamplerChoice::Uniform(s) => s.sample(data, sample_size, out_indices),
            SamplerChoice::Prosac(s) => s.sample(data, sample_size, out_indices),
            SamplerChoice::Dyn(s) => s.sample(data, sample_size, out_indices),
        }
    }
}

/// Runtime scoring selection over a shared residual function.
pub enum ScoringChoice<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    InlierCount(InlierCountScoring<M, F>),
    TruncatedLoss(TruncatedLossScoring<M, F>),
    Dyn(Box<dyn Scoring<M, Score = Score> + Send + Sync>),
}

impl<M, F> ScoringChoice<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    /// Truncated-loss scoring when `use_mle` is set, inlier counting otherwise.
    pub fn from_settings(settings: &RansacSettings, residual_fn: F) -> Self {
        if settings.use_mle {
            ScoringChoice::TruncatedLoss(TruncatedLossScoring::new(
                settings.error_threshold,
                residual_fn,
            ))
        } else {
            ScoringChoice::InlierCount(InlierCountScoring::new(
                settings.error_threshold,
                residual_fn,
            ))
        }
    }
}

impl<M, F> Scoring<M> for ScoringChoice<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    type Score = Score;

    fn threshold(&self) -> f64 {
        match self {
            ScoringChoice::InlierCount(s) => s.threshold(),
            ScoringChoice::TruncatedLoss(s) => s.threshold(),
            ScoringChoice::Dyn(s) => s.threshold(),
        }
    }

    fn score(&self, data: &DataMatrix, model: &M, inliers_out: &mut Vec<usize>) -> Score {
        match self {
            ScoringChoice::InlierCount(s) => s.score(data, model, inliers_out),
            ScoringChoice::TruncatedLoss(s) => s.score(data, model, inliers_out),
            ScoringChoice::Dyn(s) => s.score(data, model, inliers_out),
        }
    }
}
