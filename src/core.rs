//! Core traits and the sample-consensus driver.
//!
//! The driver is generic over five seams:
//! - [`Estimator`]: minimal sample size, minimal solver and optional
//!   non-minimal (refinement) solver.
//! - [`Sampler`]: draws minimal samples.
//! - [`Scoring`]: residuals, inlier classification and model ranking.
//! - [`LocalOptimizer`]: refines the final model on its inliers.
//! - [`TerminationCriterion`]: adaptive iteration budget.
//!
//! Swapping the estimator and the scoring is enough to reuse the driver for
//! another geometric problem.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::error::{EstimationError, RefinementError};
use crate::settings::RansacSettings;
use crate::termination::{confidence, TerminationState};
use crate::types::DataMatrix;

/// Estimator responsible for generating model hypotheses from minimal samples.
pub trait Estimator {
    /// Model type produced by this estimator.
    type Model: Clone;

    /// Size of a minimal sample for this estimator.
    fn sample_size(&self) -> usize;

    /// Check whether a given sample can be passed to the solver.
    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool;

    /// Estimate candidate models from a minimal sample.
    ///
    /// Returns every algebraic solution; an empty vector signals a
    /// degenerate sample.
    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model>;

    /// Validate a candidate model before scoring.
    fn is_valid_model(
        &self,
        _model: &Self::Model,
        _data: &DataMatrix,
        _sample: &[usize],
        _threshold: f64,
    ) -> bool {
        true
    }

    /// Re-estimate a model from a non-minimal set, starting from `initial`.
    ///
    /// `weights`, when given, holds one non-negative weight per entry of
    /// `sample`.
    fn estimate_model_nonminimal(
        &self,
        _data: &DataMatrix,
        _sample: &[usize],
        _initial: &Self::Model,
        _weights: Option<&[f64]>,
    ) -> Result<Self::Model, RefinementError> {
        Err(RefinementError::Unsupported)
    }
}

/// Sampler responsible for drawing minimal samples from the data.
pub trait Sampler {
    /// Draw `sample_size` distinct indices into `out_indices`.
    ///
    /// Returns `false` if a sample could not be drawn.
    fn sample(&mut self, data: &DataMatrix, sample_size: usize, out_indices: &mut [usize]) -> bool;
}

/// Scoring strategy used to evaluate model quality and determine inliers.
pub trait Scoring<M> {
    /// Score type; `a > b` means `a` is the better model.
    type Score: Clone + PartialOrd;

    /// Inlier/outlier threshold for residuals in the chosen domain.
    fn threshold(&self) -> f64;

    /// Score a model against every datum and write its inliers to `inliers_out`.
    fn score(&self, data: &DataMatrix, model: &M, inliers_out: &mut Vec<usize>) -> Self::Score;
}

/// Refinement of a model using its inlier set.
pub trait LocalOptimizer<M> {
    fn run(&mut self, data: &DataMatrix, inliers: &[usize], model: &M)
        -> Result<M, RefinementError>;
}

/// Termination criterion deciding when the sampling loop can stop.
pub trait TerminationCriterion<S> {
    /// Return to the initial state before a new run.
    fn reset(&mut self) {}

    /// Called whenever the best score improves.
    ///
    /// May lower `required_iterations`, the iteration budget of the loop, and
    /// reports whether `iteration` draws are already enough.
    fn check(
        &mut self,
        data: &DataMatrix,
        best_score: &S,
        sample_size: usize,
        iteration: usize,
        required_iterations: &mut usize,
    ) -> TerminationState;
}

/// Why the sampling loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The adaptive bound was reached.
    Converged,
    /// `max_iterations` was exhausted.
    MaxIterations,
    /// `max_duration` elapsed.
    Deadline,
    /// The cancellation flag was raised.
    Cancelled,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacSummary {
    /// Inliers of the returned model.
    pub inliers: Vec<usize>,
    pub num_input_data_points: usize,
    /// Samples drawn.
    pub num_iterations: usize,
    /// Samples for which the solver produced no model.
    pub num_degenerate_samples: usize,
    /// Probability that an all-inlier sample was drawn, `1 - (1 - w^s)^k`
    /// for the final inlier ratio `w` and the `k` samples drawn.
    ///
    /// The adaptive bound is the smallest `k` with `(1 - w^s)^k <=
    /// failure_probability`, so a run that stopped on it reports at least
    /// `1 - failure_probability` when the final inlier set is the one that
    /// set the bound. Lower values flag interrupted or capped runs.
    pub confidence: f64,
    /// Whether the returned model comes from refinement.
    pub refined: bool,
    pub termination: TerminationReason,
}

/// Model, score and summary returned by [`SampleConsensus::run`].
#[derive(Debug, Clone)]
pub struct Estimate<M, S> {
    pub model: M,
    pub score: S,
    pub summary: RansacSummary,
}

/// A scored hypothesis.
#[derive(Debug, Clone)]
struct Candidate<M, S> {
    model: M,
    score: S,
    inliers: Vec<usize>,
}

enum SampleOutcome<M, S> {
    Degenerate,
    Scored(Vec<Candidate<M, S>>),
}

/// Solve and score one minimal sample. Candidates below the inlier floor are dropped.
fn evaluate_sample<E, Sc>(
    estimator: &E,
    scoring: &Sc,
    data: &DataMatrix,
    sample: &[usize],
    min_inliers: usize,
) -> SampleOutcome<E::Model, Sc::Score>
where
    E: Estimator,
    Sc: Scoring<E::Model>,
{
    if !estimator.is_valid_sample(data, sample) {
        return SampleOutcome::Degenerate;
    }
    let models = estimator.estimate_model(data, sample);
    if models.is_empty() {
        return SampleOutcome::Degenerate;
    }

    let threshold = scoring.threshold();
    let candidates = models
        .into_iter()
        .filter(|model| estimator.is_valid_model(model, data, sample, threshold))
        .filter_map(|model| {
            let mut inliers = Vec::new();
            let score = scoring.score(data, &model, &mut inliers);
            (inliers.len() >= min_inliers).then_some(Candidate {
                model,
                score,
                inliers,
            })
        })
        .collect();
    SampleOutcome::Scored(candidates)
}

/// Compare-and-set: replace `best` only if `candidate` scores strictly higher.
fn promote<M, S: PartialOrd>(best: &mut Option<Candidate<M, S>>, candidate: Candidate<M, S>) -> bool {
    let better = match best {
        None => true,
        Some(current) => candidate.score > current.score,
    };
    if better {
        *best = Some(candidate);
    }
    better
}

/// Generic sample-consensus pipeline orchestrating the above components.
pub struct SampleConsensus<E, Sa, Sc, LO, T>
where
    E: Estimator,
    Sa: Sampler,
    Sc: Scoring<E::Model>,
    LO: LocalOptimizer<E::Model>,
    T: TerminationCriterion<Sc::Score>,
{
    pub settings: RansacSettings,
    pub estimator: E,
    pub sampler: Sa,
    pub scoring: Sc,
    pub final_optimizer: Option<LO>,
    pub termination: T,
    cancel_flag: Option<Arc<AtomicBool>>,
}

/// Loop state shared by the serial and the batched drivers.
struct LoopState<M, S> {
    best: Option<Candidate<M, S>>,
    iteration: usize,
    required_iterations: usize,
    degenerate: usize,
    reason: Option<TerminationReason>,
}

impl<E, Sa, Sc, LO, T> SampleConsensus<E, Sa, Sc, LO, T>
where
    E: Estimator,
    Sa: Sampler,
    Sc: Scoring<E::Model>,
    LO: LocalOptimizer<E::Model>,
    T: TerminationCriterion<Sc::Score>,
{
    /// Create a new pipeline from its components.
    pub fn new(
        settings: RansacSettings,
        estimator: E,
        sampler: Sa,
        scoring: Sc,
        final_optimizer: Option<LO>,
        termination: T,
    ) -> Self {
        Self {
            settings,
            estimator,
            sampler,
            scoring,
            final_optimizer,
            termination,
            cancel_flag: None,
        }
    }

    /// Stop sampling as soon as `flag` is raised.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// Smallest inlier count a model needs to be promoted.
    pub fn min_inliers(&self) -> usize {
        self.estimator
            .sample_size()
            .max(self.settings.min_inlier_count)
    }

    /// Run the sampling loop on `data`, one sample per iteration.
    pub fn run(&mut self, data: &DataMatrix) -> Result<Estimate<E::Model, Sc::Score>, EstimationError> {
        let started = Instant::now();
        let mut state = self.start(data)?;
        let sample_size = self.estimator.sample_size();
        let min_inliers = self.min_inliers();
        let mut sample = vec![0usize; sample_size];

        while state.iteration < state.required_iterations {
            if let Some(reason) = self.interruption(started) {
                state.reason = Some(reason);
                break;
            }
            state.iteration += 1;

            if !self.sampler.sample(data, sample_size, &mut sample) {
                state.degenerate += 1;
                continue;
            }

            let outcome = evaluate_sample(&self.estimator, &self.scoring, data, &sample, min_inliers);
            if self.absorb(data, &mut state, outcome) {
                break;
            }
        }

        self.finish(data, state)
    }

    fn start(
        &mut self,
        data: &DataMatrix,
    ) -> Result<LoopState<E::Model, Sc::Score>, EstimationError> {
        self.settings.validate()?;
        let sample_size = self.estimator.sample_size();
        let n = data.nrows();
        if n < sample_size {
            return Err(EstimationError::InsufficientData {
                required: sample_size,
                actual: n,
            });
        }
        self.termination.reset();

        Ok(LoopState {
            best: None,
            iteration: 0,
            required_iterations: self.settings.max_iterations,
            degenerate: 0,
            reason: None,
        })
    }

    /// Merge the outcome of one sample into the loop state. Returns `true`
    /// once the stopping criterion reports convergence.
    fn absorb(
        &mut self,
        data: &DataMatrix,
        state: &mut LoopState<E::Model, Sc::Score>,
        outcome: SampleOutcome<E::Model, Sc::Score>,
    ) -> bool {
        let candidates = match outcome {
            SampleOutcome::Degenerate => {
                trace!("degenerate sample at iteration {}", state.iteration);
                state.degenerate += 1;
                return false;
            }
            SampleOutcome::Scored(candidates) => candidates,
        };

        let mut improved = false;
        for candidate in candidates {
            improved |= promote(&mut state.best, candidate);
        }
        if !improved {
            return false;
        }

        let Some(best) = &state.best else {
            return false;
        };
        debug!(
            "new best model at iteration {}: {} inliers",
            state.iteration,
            best.inliers.len()
        );
        let verdict = self.termination.check(
            data,
            &best.score,
            self.estimator.sample_size(),
            state.iteration,
            &mut state.required_iterations,
        );
        if verdict == TerminationState::Converged {
            state.reason = Some(TerminationReason::Converged);
            return true;
        }
        false
    }

    fn interruption(&self, started: Instant) -> Option<TerminationReason> {
        if self
            .cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Some(TerminationReason::Cancelled);
        }
        if self
            .settings
            .max_duration
            .is_some_and(|budget| started.elapsed() >= budget)
        {
            return Some(TerminationReason::Deadline);
        }
        None
    }

    /// Turn the loop state into the final result, refining the best model if configured.
    fn finish(
        &mut self,
        data: &DataMatrix,
        state: LoopState<E::Model, Sc::Score>,
    ) -> Result<Estimate<E::Model, Sc::Score>, EstimationError> {
        let LoopState {
            best,
            iteration,
            required_iterations,
            degenerate,
            reason,
        } = state;

        let termination = reason.unwrap_or(if required_iterations < self.settings.max_iterations {
            TerminationReason::Converged
        } else {
            TerminationReason::MaxIterations
        });

        let Some(mut best) = best else {
            debug!("no viable model after {iteration} iterations ({degenerate} degenerate)");
            return Err(match termination {
                TerminationReason::Cancelled | TerminationReason::Deadline => {
                    EstimationError::Interrupted {
                        iterations: iteration,
                    }
                }
                _ if iteration > 0 && degenerate == iteration => {
                    EstimationError::AllSamplesDegenerate {
                        iterations: iteration,
                    }
                }
                _ => EstimationError::NoViableModel {
                    iterations: iteration,
                },
            });
        };

        let mut refined = false;
        if let Some(optimizer) = self.final_optimizer.as_mut() {
            match optimizer.run(data, &best.inliers, &best.model) {
                Ok(model) => {
                    let mut inliers = Vec::new();
                    let score = self.scoring.score(data, &model, &mut inliers);
                    if score > best.score && inliers.len() >= self.min_inliers() {
                        best = Candidate {
                            model,
                            score,
                            inliers,
                        };
                        refined = true;
                    }
                }
                Err(err) => warn!("refinement failed, keeping the sampled model: {err}"),
            }
        }

        let n = data.nrows();
        let inlier_ratio = best.inliers.len() as f64 / n as f64;
        let summary = RansacSummary {
            confidence: confidence(inlier_ratio, self.estimator.sample_size(), iteration),
            inliers: best.inliers,
            num_input_data_points: n,
            num_iterations: iteration,
            num_degenerate_samples: degenerate,
            refined,
            termination,
        };
        debug!(
            "estimation finished after {} iterations ({:?}): {} / {} inliers, refined: {}",
            summary.num_iterations,
            summary.termination,
            summary.inliers.len(),
            n,
            refined
        );

        Ok(Estimate {
            model: best.model,
            score: best.score,
            summary,
        })
    }
}

impl<E, Sa, Sc, LO, T> SampleConsensus<E, Sa, Sc, LO, T>
where
    E: Estimator + Sync,
    E::Model: Send,
    Sa: Sampler,
    Sc: Scoring<E::Model> + Sync,
    Sc::Score: Send,
    LO: LocalOptimizer<E::Model>,
    T: TerminationCriterion<Sc::Score>,
{
    /// Run the loop with solving and scoring spread over the rayon pool.
    ///
    /// Samples are drawn serially in batches of `batch_size`, so a seeded
    /// sampler gives reproducible results. Cancellation and the deadline are
    /// checked before every draw. Outcomes are merged in draw order through
    /// the same compare-and-set as [`run`](Self::run), and the stopping
    /// criterion is consulted as each outcome is merged.
    pub fn run_parallel(
        &mut self,
        data: &DataMatrix,
        batch_size: usize,
    ) -> Result<Estimate<E::Model, Sc::Score>, EstimationError> {
        let started = Instant::now();
        let mut state = self.start(data)?;
        let sample_size = self.estimator.sample_size();
        let min_inliers = self.min_inliers();
        let batch_size = batch_size.max(1);

        'sampling: while state.iteration < state.required_iterations {
            let batch = batch_size.min(state.required_iterations - state.iteration);
            let mut interrupted = None;
            let mut samples: Vec<Option<Vec<usize>>> = Vec::with_capacity(batch);
            for _ in 0..batch {
                if let Some(reason) = self.interruption(started) {
                    interrupted = Some(reason);
                    break;
                }
                let mut sample = vec![0usize; sample_size];
                let drawn = self.sampler.sample(data, sample_size, &mut sample);
                samples.push(drawn.then_some(sample));
            }

            let estimator = &self.estimator;
            let scoring = &self.scoring;
            let outcomes: Vec<SampleOutcome<E::Model, Sc::Score>> = samples
                .par_iter()
                .map(|sample| match sample {
                    Some(sample) => evaluate_sample(estimator, scoring, data, sample, min_inliers),
                    None => SampleOutcome::Degenerate,
                })
                .collect();

            for outcome in outcomes {
                // The bound may have shrunk within this batch.
                if state.iteration >= state.required_iterations {
                    break 'sampling;
                }
                state.iteration += 1;
                if self.absorb(data, &mut state, outcome) {
                    break 'sampling;
                }
            }
            if interrupted.is_some() {
                state.reason = interrupted;
                break;
            }
        }

        self.finish(data, state)
    }
}
