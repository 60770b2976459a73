//! SO(2) - Special Orthogonal Group in 2D
//!
//! Planar rotations, stored as a unit complex number. The tangent is the
//! rotation angle θ ∈ R.

use crate::manifold::{LieGroup, Manifold};
use nalgebra::{DMatrix, DVector, Matrix2, UnitComplex, Vector2};
use std::fmt;

/// SO(2) group element representing rotations in 2D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SO2 {
    complex: UnitComplex<f64>,
}

impl fmt::Display for SO2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SO2(angle: {:.4})", self.angle())
    }
}

impl SO2 {
    /// Create a rotation from an angle in radians.
    pub fn from_angle(angle: f64) -> Self {
        SO2 {
            complex: UnitComplex::new(angle),
        }
    }

    /// Create from an existing unit complex number.
    pub fn from_complex(complex: UnitComplex<f64>) -> Self {
        SO2 { complex }
    }

    /// Rotation angle in (-π, π].
    pub fn angle(&self) -> f64 {
        self.complex.angle()
    }

    pub fn complex(&self) -> UnitComplex<f64> {
        self.complex
    }

    /// 2x2 rotation matrix.
    pub fn matrix(&self) -> Matrix2<f64> {
        self.complex.to_rotation_matrix().into_inner()
    }

    /// Rotate a point.
    pub fn act(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.complex * point
    }
}

impl LieGroup for SO2 {
    const DOF: usize = 1;

    fn identity() -> Self {
        SO2 {
            complex: UnitComplex::identity(),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SO2 {
            complex: self.complex * other.complex,
        }
    }

    fn inverse(&self) -> Self {
        SO2 {
            complex: self.complex.inverse(),
        }
    }

    fn exp(tangent: &DVector<f64>) -> Self {
        SO2::from_angle(tangent[0])
    }

    fn log(&self) -> DVector<f64> {
        DVector::from_element(1, self.angle())
    }

    /// Rotations in the plane commute.
    fn adjoint(&self) -> DMatrix<f64> {
        DMatrix::identity(1, 1)
    }

    fn right_jacobian_inv(_tangent: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::identity(1, 1)
    }
}

impl Manifold for SO2 {
    fn dim(&self) -> usize {
        Self::DOF
    }

    fn retract(&self, delta: &DVector<f64>) -> Self {
        self.compose(&SO2::exp(delta))
    }

    fn local_coordinates(&self, other: &Self) -> DVector<f64> {
        self.between(other).log()
    }
}
