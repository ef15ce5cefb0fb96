//! Geometric models produced by the estimators.

use nalgebra::Vector3;

/// Position of the second camera centre expressed in the first camera frame.
///
/// Two views with known relative orientation fix the baseline only up to
/// scale, so the position is stored with unit norm.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativePosition {
    pub position: Vector3<f64>,
}

impl RelativePosition {
    /// Build a model from any non-zero direction. Returns `None` for vectors
    /// that cannot be normalized.
    pub fn from_direction(direction: Vector3<f64>) -> Option<Self> {
        direction
            .try_normalize(f64::EPSILON)
            .filter(|p| p.iter().all(|v| v.is_finite()))
            .map(|position| Self { position })
    }

    /// Angle in radians between two positions.
    pub fn angle_to(&self, other: &Self) -> f64 {
        self.position.angle(&other.position)
    }
}
