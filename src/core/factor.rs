//! The nonlinear factor interface.

use crate::core::{CoreError, CoreResult, Key, NoiseModel, Values};
use crate::linalg::JacobianFactor;
use crate::manifold::Value;
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;

/// A residual term over a small, ordered set of variables.
///
/// Implementors provide the scope, the noise model and the unwhitened residual
/// `r(x)`, optionally filling one Jacobian block per key. Whitening, the
/// scalar error and linearization are provided on top of that.
///
/// A factor must be a pure function of the `Values` it is evaluated at.
pub trait Factor: Debug + Send + Sync {
    /// Variables this factor touches, in Jacobian block order.
    fn keys(&self) -> &[Key];

    fn noise_model(&self) -> &NoiseModel;

    /// Unwhitened residual.
    ///
    /// When `jacobians` is `Some`, it holds one zero matrix per key, sized
    /// `dim() x tangent_dim(key)`, to be overwritten with `∂r/∂δ_key`.
    fn unwhitened_error(
        &self,
        values: &Values,
        jacobians: Option<&mut [DMatrix<f64>]>,
    ) -> CoreResult<DVector<f64>>;

    /// Residual dimension.
    fn dim(&self) -> usize {
        self.noise_model().dim()
    }

    /// `W r(x)`
    fn whitened_error(&self, values: &Values) -> CoreResult<DVector<f64>> {
        let residual = self.unwhitened_error(values, None)?;
        check_residual(self.dim(), &residual)?;
        Ok(self.noise_model().whiten(&residual))
    }

    /// `0.5 * ||W r(x)||²`
    fn error(&self, values: &Values) -> CoreResult<f64> {
        Ok(0.5 * self.whitened_error(values)?.norm_squared())
    }

    /// First-order expansion at `values`: blocks `W J_k` and right-hand side
    /// `-W r(x)`, so that `||Σ A_k δ_k - b||²` approximates `||W r(x ⊕ δ)||²`.
    fn linearize(&self, values: &Values) -> CoreResult<JacobianFactor> {
        let rows = self.dim();
        let mut jacobians = self
            .keys()
            .iter()
            .map(|&key| Ok(DMatrix::zeros(rows, values.value(key)?.tangent_dim())))
            .collect::<CoreResult<Vec<_>>>()?;

        let residual = self.unwhitened_error(values, Some(jacobians.as_mut_slice()))?;
        check_residual(rows, &residual)?;

        let noise = self.noise_model();
        let mut blocks = Vec::with_capacity(jacobians.len());
        for (&key, jacobian) in self.keys().iter().zip(&jacobians) {
            let cols = values.value(key)?.tangent_dim();
            if jacobian.nrows() != rows || jacobian.ncols() != cols {
                return Err(CoreError::JacobianShape {
                    key,
                    expected: (rows, cols),
                    actual: (jacobian.nrows(), jacobian.ncols()),
                });
            }
            blocks.push((key, noise.whiten_matrix(jacobian)));
        }

        Ok(JacobianFactor::new(blocks, -noise.whiten(&residual))?)
    }
}

fn check_residual(expected: usize, residual: &DVector<f64>) -> CoreResult<()> {
    if residual.len() != expected {
        return Err(CoreError::ResidualDimension {
            expected,
            actual: residual.len(),
        });
    }
    Ok(())
}
