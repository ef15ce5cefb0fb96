//! Non-linear refinement of a relative position on its inliers.
//!
//! The position lives on the unit sphere. Each Levenberg-Marquardt step is
//! taken in the 2D tangent plane at the current estimate and retracted by
//! normalization. Residuals are signed Sampson distances, so the cost is the
//! same squared Sampson error used to score inliers. Optional per-observation
//! weights scale each squared residual.
//!
//! [`RelativePositionCost`] also implements the `argmin` cost and gradient
//! traits so the same objective can be plugged into an `argmin` solver.

use argmin::core::{ArgminError, CostFunction, Gradient};
use log::trace;
use nalgebra::{DVector, Matrix2, Rotation3, Vector2, Vector3};

use crate::error::RefinementError;
use crate::estimators::relative_position::{essential_matrix, sampson_error};
use crate::settings::RefinementSettings;
use crate::types::{row_features, DataMatrix};

/// Two tangent directions constrain the position.
const MIN_OBSERVATIONS: usize = 2;
const JACOBIAN_STEP: f64 = 1e-7;
const ZERO_COST: f64 = 1e-30;
const INITIAL_DAMPING: f64 = 1e-4;
const MAX_DAMPING: f64 = 1e16;

/// Outcome of a converged refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementSummary {
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
}

/// Weighted sum of squared Sampson errors as a function of a tangent step
/// around `base`.
pub struct RelativePositionCost {
    rotation: Rotation3<f64>,
    observations: Vec<(Vector2<f64>, Vector2<f64>)>,
    /// Square roots of the observation weights.
    scales: Vec<f64>,
    base: Vector3<f64>,
    basis: [Vector3<f64>; 2],
}

impl RelativePositionCost {
    /// Observations with zero weight are dropped. `weights` must have one
    /// entry per inlier when given.
    pub fn new(
        data: &DataMatrix,
        inliers: &[usize],
        weights: Option<&[f64]>,
        rotation: Rotation3<f64>,
        base: Vector3<f64>,
    ) -> Self {
        let (observations, scales): (Vec<_>, Vec<_>) = inliers
            .iter()
            .enumerate()
            .map(|(k, &row)| (row, weights.map_or(1.0, |w| w[k])))
            .filter(|&(_, w)| w > 0.0)
            .map(|(row, w)| (row_features(data, row), w.sqrt()))
            .unzip();
        let mut cost = Self {
            rotation,
            observations,
            scales,
            base,
            basis: [Vector3::zeros(); 2],
        };
        cost.rebase(base);
        cost
    }

    /// Move the tangent plane to `base`, assumed to have unit norm.
    fn rebase(&mut self, base: Vector3<f64>) {
        let helper = if base.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = base.cross(&helper).normalize();
        let v = base.cross(&u);
        self.base = base;
        self.basis = [u, v];
    }

    /// Position reached by the tangent step `delta`.
    pub fn retract(&self, delta: &Vector2<f64>) -> Vector3<f64> {
        (self.base + self.basis[0] * delta.x + self.basis[1] * delta.y).normalize()
    }

    /// Number of observations with a positive weight.
    pub fn num_observations(&self) -> usize {
        self.observations.len()
    }

    /// Weighted signed residual of every observation at `delta`.
    pub fn residuals(&self, delta: &Vector2<f64>) -> DVector<f64> {
        let e = essential_matrix(&self.rotation, &self.retract(delta));
        DVector::from_iterator(
            self.observations.len(),
            self.observations
                .iter()
                .zip(&self.scales)
                .map(|((x1, x2), scale)| scale * sampson_error(&e, x1, x2)),
        )
    }

    /// Residuals at the origin of the tangent plane and their central-difference Jacobian.
    fn linearize(&self) -> (DVector<f64>, [DVector<f64>; 2]) {
        let r0 = self.residuals(&Vector2::zeros());
        let column = |k: usize| {
            let mut step = Vector2::zeros();
            step[k] = JACOBIAN_STEP;
            (self.residuals(&step) - self.residuals(&-step)) / (2.0 * JACOBIAN_STEP)
        };
        (r0, [column(0), column(1)])
    }

    fn tangent(param: &DVector<f64>) -> Result<Vector2<f64>, argmin::core::Error> {
        if param.len() != 2 {
            return Err(ArgminError::InvalidParameter {
                text: format!("expected 2 tangent coordinates, got {}", param.len()),
            }
            .into());
        }
        Ok(Vector2::new(param[0], param[1]))
    }
}

impl CostFunction for RelativePositionCost {
    type Param = DVector<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let delta = Self::tangent(param)?;
        Ok(self.residuals(&delta).norm_squared())
    }
}

impl Gradient for RelativePositionCost {
    type Param = DVector<f64>;
    type Gradient = DVector<f64>;

    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        let mut grad = DVector::<f64>::zeros(param.len());
        for i in 0..param.len() {
            let mut plus = param.clone();
            let mut minus = param.clone();
            plus[i] += JACOBIAN_STEP;
            minus[i] -= JACOBIAN_STEP;
            grad[i] = (self.cost(&plus)? - self.cost(&minus)?) / (2.0 * JACOBIAN_STEP);
        }
        Ok(grad)
    }
}

fn evaluate(cost: &RelativePositionCost, delta: &Vector2<f64>) -> Result<f64, RefinementError> {
    let param = DVector::from_column_slice(delta.as_slice());
    let value = cost
        .cost(&param)
        .map_err(|e| RefinementError::Cost(e.to_string()))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RefinementError::NumericalFailure)
    }
}

/// Refine `position` by minimizing the squared Sampson error of `inliers`,
/// each term scaled by its entry in `weights` when given.
///
/// On success `position` holds the refined unit-norm estimate. On error it is
/// left untouched.
pub fn refine_relative_position(
    data: &DataMatrix,
    inliers: &[usize],
    weights: Option<&[f64]>,
    rotation: &Rotation3<f64>,
    position: &mut Vector3<f64>,
    settings: &RefinementSettings,
) -> Result<RefinementSummary, RefinementError> {
    if let Some(weights) = weights {
        if weights.len() != inliers.len() {
            return Err(RefinementError::WeightMismatch {
                expected: inliers.len(),
                actual: weights.len(),
            });
        }
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(RefinementError::NumericalFailure);
        }
    }
    let start = position
        .try_normalize(f64::EPSILON)
        .filter(|p| p.iter().all(|v| v.is_finite()))
        .ok_or(RefinementError::NumericalFailure)?;

    let mut problem = RelativePositionCost::new(data, inliers, weights, *rotation, start);
    if problem.num_observations() < MIN_OBSERVATIONS {
        return Err(RefinementError::TooFewObservations {
            required: MIN_OBSERVATIONS,
            actual: problem.num_observations(),
        });
    }
    let initial_cost = evaluate(&problem, &Vector2::zeros())?;
    let mut cost = initial_cost;
    let mut damping = INITIAL_DAMPING;

    let outcome = 'solve: {
        for iteration in 0..settings.max_iterations {
            if cost < ZERO_COST {
                break 'solve Some((problem.base, iteration));
            }

            let (r, [j0, j1]) = problem.linearize();
            let hessian = Matrix2::new(j0.dot(&j0), j0.dot(&j1), j1.dot(&j0), j1.dot(&j1));
            let gradient = Vector2::new(j0.dot(&r), j1.dot(&r));

            // Raise the damping until a step lowers the cost.
            let accepted = loop {
                if damping > MAX_DAMPING {
                    break None;
                }
                let mut damped = hessian;
                for k in 0..2 {
                    damped[(k, k)] += damping * hessian[(k, k)].max(f64::EPSILON);
                }
                let Some(step) = damped.lu().solve(&-gradient) else {
                    damping *= 10.0;
                    continue;
                };
                let candidate = evaluate(&problem, &step)?;
                if candidate < cost {
                    damping = (damping / 10.0).max(f64::EPSILON);
                    break Some((step, candidate));
                }
                damping *= 10.0;
            };

            let Some((step, new_cost)) = accepted else {
                trace!("refinement stalled at cost {cost:e} after {iteration} iterations");
                break 'solve Some((problem.base, iteration));
            };

            let decrease = (cost - new_cost) / cost;
            let next = problem.retract(&step);
            problem.rebase(next);
            cost = new_cost;

            if decrease < settings.function_tolerance || step.norm() < settings.step_tolerance {
                break 'solve Some((next, iteration + 1));
            }
        }
        (cost < ZERO_COST).then_some((problem.base, settings.max_iterations))
    };

    let Some((estimate, iterations)) = outcome else {
        return Err(RefinementError::NotConverged {
            iterations: settings.max_iterations,
        });
    };
    *position = estimate;
    Ok(RefinementSummary {
        iterations,
        initial_cost,
        final_cost: cost,
    })
}
