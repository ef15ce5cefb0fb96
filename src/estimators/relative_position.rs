//! Relative camera position from two correspondences and a known rotation.
//!
//! With the orientation of the second camera fixed, every correspondence
//! constrains the camera centre to its epipolar plane, the plane spanned by
//! the two viewing rays. Two planes meet in the baseline direction, so a
//! minimal sample holds two correspondences.

use nalgebra::{Matrix2, Matrix3, Rotation3, Vector2, Vector3};

use crate::core::Estimator;
use crate::error::RefinementError;
use crate::models::RelativePosition;
use crate::refinement::refine_relative_position;
use crate::settings::RefinementSettings;
use crate::types::{row_features, DataMatrix};

/// Norm below which plane normals or their intersection count as degenerate.
const DEGENERACY_TOLERANCE: f64 = 1e-10;

/// Lower bound on the Sampson denominator.
const MIN_SAMPSON_DENOMINATOR: f64 = 1e-20;

/// Essential matrix `[t]x R` of a camera at `position` with world-to-camera `rotation`.
pub fn essential_matrix(rotation: &Rotation3<f64>, position: &Vector3<f64>) -> Matrix3<f64> {
    let t = -(rotation * position);
    t.cross_matrix() * rotation.matrix()
}

/// Signed Sampson distance of a correspondence with respect to `e`.
pub fn sampson_error(e: &Matrix3<f64>, x1: &Vector2<f64>, x2: &Vector2<f64>) -> f64 {
    let (numerator, denominator) = sampson_terms(e, x1, x2);
    numerator / denominator.sqrt()
}

/// Squared Sampson distance, the residual used for inlier classification.
pub fn squared_sampson_error(e: &Matrix3<f64>, x1: &Vector2<f64>, x2: &Vector2<f64>) -> f64 {
    let (numerator, denominator) = sampson_terms(e, x1, x2);
    numerator * numerator / denominator
}

fn sampson_terms(e: &Matrix3<f64>, x1: &Vector2<f64>, x2: &Vector2<f64>) -> (f64, f64) {
    let h1 = Vector3::new(x1.x, x1.y, 1.0);
    let h2 = Vector3::new(x2.x, x2.y, 1.0);
    let e_x1 = e * h1;
    let et_x2 = e.tr_mul(&h2);

    let numerator = h2.dot(&e_x1);
    let denominator = e_x1.x * e_x1.x + e_x1.y * e_x1.y + et_x2.x * et_x2.x + et_x2.y * et_x2.y;
    (numerator, denominator.max(MIN_SAMPSON_DENOMINATOR))
}

/// Minimal solver for the camera position given its orientation.
#[derive(Debug, Clone)]
pub struct RelativePositionEstimator {
    /// World-to-camera rotation of the second camera.
    pub rotation: Rotation3<f64>,
    pub refinement: RefinementSettings,
}

impl RelativePositionEstimator {
    pub fn new(rotation: Rotation3<f64>) -> Self {
        Self {
            rotation,
            refinement: RefinementSettings::default(),
        }
    }

    pub fn with_refinement(mut self, refinement: RefinementSettings) -> Self {
        self.refinement = refinement;
        self
    }

    /// Per-row squared Sampson residual for this orientation.
    pub fn residual_fn(
        &self,
    ) -> impl Fn(&DataMatrix, &RelativePosition, usize) -> f64 + Copy + Send + Sync {
        let rotation = self.rotation;
        move |data: &DataMatrix, model: &RelativePosition, row: usize| {
            let (x1, x2) = row_features(data, row);
            squared_sampson_error(&essential_matrix(&rotation, &model.position), &x1, &x2)
        }
    }

    /// Viewing rays of `row` in the first camera frame.
    fn rays(&self, data: &DataMatrix, row: usize) -> (Vector3<f64>, Vector3<f64>) {
        let (x1, x2) = row_features(data, row);
        let ray1 = Vector3::new(x1.x, x1.y, 1.0);
        let ray2 = self.rotation.inverse_transform_vector(&Vector3::new(x2.x, x2.y, 1.0));
        (ray1, ray2)
    }

    /// Orient `direction` so every sample point lies in front of both cameras.
    ///
    /// Depths come from solving `l1 * ray1 - l2 * ray2 = direction`. The true
    /// centre gives all-positive depths and its negation all-negative ones;
    /// mixed signs reject the sample.
    fn orient(&self, data: &DataMatrix, sample: &[usize], direction: Vector3<f64>) -> Option<Vector3<f64>> {
        let mut positive = 0usize;
        let mut negative = 0usize;

        for &row in sample {
            let (ray1, ray2) = self.rays(data, row);
            let normal = Matrix2::new(
                ray1.dot(&ray1),
                -ray1.dot(&ray2),
                -ray1.dot(&ray2),
                ray2.dot(&ray2),
            );
            let rhs = Vector2::new(ray1.dot(&direction), -ray2.dot(&direction));
            let depths = normal.lu().solve(&rhs)?;

            if depths.iter().all(|&d| d > 0.0) {
                positive += 1;
            } else if depths.iter().all(|&d| d < 0.0) {
                negative += 1;
            }
        }

        if positive == sample.len() {
            Some(direction)
        } else if negative == sample.len() {
            Some(-direction)
        } else {
            None
        }
    }
}

impl Estimator for RelativePositionEstimator {
    type Model = RelativePosition;

    fn sample_size(&self) -> usize {
        2
    }

    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool {
        sample.len() == self.sample_size()
            && data.ncols() >= 4
            && sample[0] != sample[1]
            && sample
                .iter()
                .all(|&row| row < data.nrows() && data.row(row).iter().all(|v| v.is_finite()))
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model> {
        let mut normals = [Vector3::zeros(); 2];
        for (normal, &row) in normals.iter_mut().zip(sample) {
            let (ray1, ray2) = self.rays(data, row);
            match ray1.cross(&ray2).try_normalize(DEGENERACY_TOLERANCE) {
                Some(n) => *normal = n,
                None => return Vec::new(),
            }
        }

        let Some(direction) = normals[0].cross(&normals[1]).try_normalize(DEGENERACY_TOLERANCE)
        else {
            return Vec::new();
        };

        self.orient(data, sample, direction)
            .and_then(RelativePosition::from_direction)
            .into_iter()
            .collect()
    }

    fn estimate_model_nonminimal(
        &self,
        data: &DataMatrix,
        sample: &[usize],
        initial: &Self::Model,
        weights: Option<&[f64]>,
    ) -> Result<Self::Model, RefinementError> {
        let mut position = initial.position;
        refine_relative_position(
            data,
            sample,
            weights,
            &self.rotation,
            &mut position,
            &self.refinement,
        )?;
        RelativePosition::from_direction(position).ok_or(RefinementError::NumericalFailure)
    }
}
