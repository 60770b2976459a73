//! Rⁿ - Euclidean vector spaces
//!
//! Fixed-size vectors use addition as the group operation, so retraction is
//! plain vector addition. `DVector<f64>` is a manifold but not a `LieGroup`,
//! since its identity has no fixed size.

use crate::manifold::{LieGroup, Manifold};
use nalgebra::{DMatrix, DVector, SVector, Vector2, Vector3};

/// 2-D point variable.
pub type Point2 = Vector2<f64>;

/// 3-D point variable.
pub type Point3 = Vector3<f64>;

impl<const D: usize> Manifold for SVector<f64, D> {
    fn dim(&self) -> usize {
        D
    }

    fn retract(&self, delta: &DVector<f64>) -> Self {
        self + SVector::<f64, D>::from_column_slice(delta.as_slice())
    }

    fn local_coordinates(&self, other: &Self) -> DVector<f64> {
        DVector::from_column_slice((other - self).as_slice())
    }
}

impl<const D: usize> LieGroup for SVector<f64, D> {
    const DOF: usize = D;

    fn identity() -> Self {
        SVector::<f64, D>::zeros()
    }

    fn compose(&self, other: &Self) -> Self {
        self + other
    }

    fn inverse(&self) -> Self {
        -*self
    }

    fn exp(tangent: &DVector<f64>) -> Self {
        SVector::<f64, D>::from_column_slice(tangent.as_slice())
    }

    fn log(&self) -> DVector<f64> {
        DVector::from_column_slice(self.as_slice())
    }

    fn adjoint(&self) -> DMatrix<f64> {
        DMatrix::identity(D, D)
    }

    fn right_jacobian_inv(_tangent: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::identity(D, D)
    }
}

impl Manifold for DVector<f64> {
    fn dim(&self) -> usize {
        self.len()
    }

    fn retract(&self, delta: &DVector<f64>) -> Self {
        self + delta
    }

    fn local_coordinates(&self, other: &Self) -> DVector<f64> {
        other - self
    }
}
