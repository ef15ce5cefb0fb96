//! Core shared types.
//!
//! Estimators, samplers and scoring functions all operate on a row-major
//! [`DataMatrix`], one observation per row. For two-view problems each row is
//! `[x1, y1, x2, y2]`, the normalized image coordinates of a correspondence.

use nalgebra::{DMatrix, Vector2};

/// Dynamic matrix of `f64`, one data point per row.
pub type DataMatrix = DMatrix<f64>;

/// A pair of normalized image observations of the same 3D point.
///
/// `feature1` is observed by the first view, `feature2` by the second. The
/// estimator rejects samples with non-finite values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub feature1: Vector2<f64>,
    pub feature2: Vector2<f64>,
}

impl Correspondence {
    pub fn new(feature1: Vector2<f64>, feature2: Vector2<f64>) -> Self {
        Self { feature1, feature2 }
    }
}

/// Pack correspondences into an `N x 4` data matrix `[x1, y1, x2, y2]`.
pub fn correspondences_to_data(correspondences: &[Correspondence]) -> DataMatrix {
    DataMatrix::from_fn(correspondences.len(), 4, |row, col| {
        let c = &correspondences[row];
        match col {
            0 => c.feature1.x,
            1 => c.feature1.y,
            2 => c.feature2.x,
            _ => c.feature2.y,
        }
    })
}

/// The two observations stored in `row` of an `N x 4` data matrix.
#[inline]
pub fn row_features(data: &DataMatrix, row: usize) -> (Vector2<f64>, Vector2<f64>) {
    (
        Vector2::new(data[(row, 0)], data[(row, 1)]),
        Vector2::new(data[(row, 2)], data[(row, 3)]),
    )
}
