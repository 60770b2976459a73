//! Manifold-valued variables for optimization on non-Euclidean spaces.
//!
//! Every variable in a [`Values`](crate::core::Values) lives on a manifold with a
//! fixed intrinsic dimension. The optimizer never adds to a variable directly;
//! it moves it through `retract` and measures displacements through
//! `local_coordinates`:
//!
//! Lie group M,° | dim | X ∈ M              | retract(X, δ)  | local(X, Y)
//! ------------- | --- | ------------------ | -------------- | ---------------
//! n-D vector    | n   | v ∈ Rⁿ             | v + δ          | w - v
//! Rotation      | 1   | SO(2)              | X·Exp(δ)       | Log(X⁻¹Y)
//! Rigid motion  | 3   | SE(2), δ = [ρ, θ]  | X·Exp(δ)       | Log(X⁻¹Y)
//! Rotation      | 3   | SO(3)              | X·Exp(δ)       | Log(X⁻¹Y)
//! Rigid motion  | 6   | SE(3), δ = [ρ, θ]  | X·Exp(δ)       | Log(X⁻¹Y)
//!
//! The group conventions follow the [manif](https://github.com/artivis/manif)
//! library: right perturbations, translational part first in the tangent.
//!
//! Two traits describe a variable:
//! - [`Manifold`]: dimension, retraction and local coordinates. This is all the
//!   optimizer needs.
//! - [`LieGroup`]: identity, composition, inverse, the exponential map, the
//!   adjoint and the inverse right Jacobian. The generic prior and between
//!   factors build their analytic Jacobians from these.
//!
//! [`Value`] is the object-safe view stored inside `Values`. It is implemented
//! for every `Manifold`, so user-defined variable types only implement
//! `Manifold`.

use nalgebra::{DMatrix, DVector};
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

pub mod rn;
pub mod se2;
pub mod se3;
pub mod so2;
pub mod so3;

pub use rn::{Point2, Point3};
pub use se2::SE2;
pub use se3::SE3;
pub use so2::SO2;
pub use so3::SO3;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Invalid tangent vector dimension
    #[error("Invalid tangent dimension: expected {expected}, got {actual}")]
    InvalidTangentDimension { expected: usize, actual: usize },

    /// Two values of different concrete types were combined
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Invalid manifold element
    #[error("Invalid manifold element: {0}")]
    InvalidElement(String),
}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// A variable type the optimizer can move on.
///
/// Implementations must satisfy, within numerical tolerance:
/// - `x.retract(&x.local_coordinates(&y)) == y`
/// - `x.local_coordinates(&x.retract(&d)) == d` for small `d`
///
/// `retract` may assume `delta.len() == self.dim()`; callers going through
/// [`Value`] get the length checked.
pub trait Manifold: Clone + Debug + Send + Sync + 'static {
    /// Intrinsic (tangent space) dimension.
    fn dim(&self) -> usize;

    /// Move by a local perturbation.
    fn retract(&self, delta: &DVector<f64>) -> Self;

    /// Local displacement from `self` to `other`.
    fn local_coordinates(&self, other: &Self) -> DVector<f64>;
}

/// Group structure on top of a [`Manifold`].
///
/// For groups the retraction is `X·Exp(δ)` and the local coordinates are
/// `Log(X⁻¹Y)`.
pub trait LieGroup: Manifold {
    /// Degrees of freedom (tangent dimension).
    const DOF: usize;

    /// Group identity.
    fn identity() -> Self;

    /// Group composition `self ∘ other`.
    fn compose(&self, other: &Self) -> Self;

    /// Group inverse.
    fn inverse(&self) -> Self;

    /// Exponential map from the tangent space at identity.
    fn exp(tangent: &DVector<f64>) -> Self;

    /// Logarithmic map to the tangent space at identity.
    fn log(&self) -> DVector<f64>;

    /// Adjoint matrix, `X·Exp(δ)·X⁻¹ = Exp(Ad(X)·δ)`.
    fn adjoint(&self) -> DMatrix<f64>;

    /// Inverse right Jacobian of the exponential map at `tangent`.
    ///
    /// `Log(Exp(τ)·Exp(δ)) ≈ τ + J_r⁻¹(τ)·δ` for small `δ`, so this is the
    /// derivative of `local(A, X)` with respect to a right perturbation of
    /// `X`, evaluated at `τ = local(A, X)`.
    fn right_jacobian_inv(tangent: &DVector<f64>) -> DMatrix<f64>;

    /// Relative element `self⁻¹ ∘ other`.
    fn between(&self, other: &Self) -> Self {
        self.inverse().compose(other)
    }
}

/// Object-safe view of a [`Manifold`] stored inside `Values`.
pub trait Value: Debug + Send + Sync {
    /// Tangent dimension of the stored value.
    fn tangent_dim(&self) -> usize;

    /// Retract, checking the perturbation length.
    fn retract_dyn(&self, delta: &DVector<f64>) -> ManifoldResult<Arc<dyn Value>>;

    /// Local coordinates towards a value of the same concrete type.
    fn local_coordinates_dyn(&self, other: &dyn Value) -> ManifoldResult<DVector<f64>>;

    /// Name of the concrete type, for diagnostics.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Manifold> Value for T {
    fn tangent_dim(&self) -> usize {
        self.dim()
    }

    fn retract_dyn(&self, delta: &DVector<f64>) -> ManifoldResult<Arc<dyn Value>> {
        if delta.len() != self.dim() {
            return Err(ManifoldError::InvalidTangentDimension {
                expected: self.dim(),
                actual: delta.len(),
            });
        }
        Ok(Arc::new(self.retract(delta)))
    }

    fn local_coordinates_dyn(&self, other: &dyn Value) -> ManifoldResult<DVector<f64>> {
        let other = other
            .as_any()
            .downcast_ref::<T>()
            .ok_or(ManifoldError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                actual: other.type_name(),
            })?;
        Ok(self.local_coordinates(other))
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
