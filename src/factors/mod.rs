//! Generic factors over Lie group variables.
//!
//! - [`PriorFactor`]: unary constraint pulling a variable towards a prior
//! - [`BetweenFactor`]: relative constraint between two variables
//!
//! Both work for any [`LieGroup`](crate::manifold::LieGroup) and build their
//! Jacobians in closed form from the group's adjoint and inverse right
//! Jacobian. Domain-specific factors (projection, odometry models, ...)
//! implement [`Factor`](crate::core::Factor) directly, and may use
//! [`numerical_jacobian`] when no closed form is at hand.

use crate::manifold::Manifold;
use nalgebra::{DMatrix, DVector};

pub mod between_factor;
pub mod prior_factor;

pub use between_factor::BetweenFactor;
pub use prior_factor::PriorFactor;

/// Step used for central differences in the tangent space.
pub const NUMERICAL_DERIVATIVE_STEP: f64 = 1e-5;

/// Jacobian of `f` at `x` with respect to a right perturbation `x.retract(δ)`.
///
/// Central differences: column `i` is `(f(x ⊕ hεᵢ) - f(x ⊕ -hεᵢ)) / 2h`.
pub fn numerical_jacobian<T, F>(x: &T, f: F) -> DMatrix<f64>
where
    T: Manifold,
    F: Fn(&T) -> DVector<f64>,
{
    let dim = x.dim();
    let h = NUMERICAL_DERIVATIVE_STEP;
    let mut columns = Vec::with_capacity(dim);
    for i in 0..dim {
        let mut delta = DVector::zeros(dim);
        delta[i] = h;
        let plus = f(&x.retract(&delta));
        delta[i] = -h;
        let minus = f(&x.retract(&delta));
        columns.push((plus - minus) / (2.0 * h));
    }
    match columns.first() {
        Some(first) => {
            let rows = first.len();
            DMatrix::from_fn(rows, dim, |r, c| columns[c][r])
        }
        None => DMatrix::zeros(0, 0),
    }
}
