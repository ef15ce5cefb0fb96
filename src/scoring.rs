//! Scoring strategies ranking candidate models.
//!
//! Both strategies take a per-datum residual function `(data, model, row)`
//! and classify a datum as an inlier iff its residual is strictly below the
//! threshold. They differ in how the aggregate score is formed:
//! - [`InlierCountScoring`] ranks by inlier count, breaking ties by the
//!   summed residual over inliers.
//! - [`TruncatedLossScoring`] ranks by `sum_i min(r_i, threshold)` over all
//!   data, lower being better.

use std::marker::PhantomData;

use crate::core::Scoring;
use crate::types::DataMatrix;

/// Score of a candidate model. Larger compares as better.
///
/// Fields compare lexicographically in declaration order, so `value` is the
/// primary key and `tie_break` the secondary one. `inlier_count` is carried
/// along for the stopping criterion.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Score {
    pub value: f64,
    pub tie_break: f64,
    pub inlier_count: usize,
}

impl Score {
    pub fn new(value: f64, tie_break: f64, inlier_count: usize) -> Self {
        Self {
            value,
            tie_break,
            inlier_count,
        }
    }
}

/// Plain RANSAC scoring: more inliers is better, then a lower summed
/// residual over the inliers.
pub struct InlierCountScoring<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    threshold: f64,
    residual_fn: F,
    _marker: PhantomData<fn(&M)>,
}

impl<M, F> InlierCountScoring<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    pub fn new(threshold: f64, residual_fn: F) -> Self {
        Self {
            threshold,
            residual_fn,
            _marker: PhantomData,
        }
    }
}

impl<M, F> Scoring<M> for InlierCountScoring<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    type Score = Score;

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn score(&self, data: &DataMatrix, model: &M, inliers_out: &mut Vec<usize>) -> Self::Score {
        inliers_out.clear();
        let mut inlier_residual_sum = 0.0;
        for row in 0..data.nrows() {
            let r = (self.residual_fn)(data, model, row);
            if r < self.threshold {
                inliers_out.push(row);
                inlier_residual_sum += r;
            }
        }

        let inlier_count = inliers_out.len();
        Score::new(inlier_count as f64, -inlier_residual_sum, inlier_count)
    }
}

/// MLE-style scoring with a truncated loss.
///
/// Every datum contributes `min(residual, threshold)`; outliers therefore
/// cost a constant and the model whose inliers fit tightest wins among
/// candidates with similar support.
pub struct TruncatedLossScoring<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    threshold: f64,
    residual_fn: F,
    _marker: PhantomData<fn(&M)>,
}

impl<M, F> TruncatedLossScoring<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    pub fn new(threshold: f64, residual_fn: F) -> Self {
        Self {
            threshold,
            residual_fn,
            _marker: PhantomData,
        }
    }
}

impl<M, F> Scoring<M> for TruncatedLossScoring<M, F>
where
    F: Fn(&DataMatrix, &M, usize) -> f64,
{
    type Score = Score;

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn score(&self, data: &DataMatrix, model: &M, inliers_out: &mut Vec<usize>) -> Self::Score {
        inliers_out.clear();
        let mut loss = 0.0;
        for row in 0..data.nrows() {
            let r = (self.residual_fn)(data, model, row);
            if r < self.threshold {
                inliers_out.push(row);
                loss += r;
            } else {
                loss += self.threshold;
            }
        }

        let inlier_count = inliers_out.len();
        Score::new(-loss, inlier_count as f64, inlier_count)
    }
}
