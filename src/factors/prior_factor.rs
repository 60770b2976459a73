use crate::core::{CoreResult, Factor, Key, NoiseModel, Values};
use crate::manifold::LieGroup;
use nalgebra::{DMatrix, DVector};

/// Unary prior on a Lie group variable.
///
/// ```text
/// r = local(prior, x) = Log(prior⁻¹ ∘ x)
/// ```
///
/// with Jacobian `J_r⁻¹(r)`. The residual dimension is the group's DOF and
/// must match the noise model.
#[derive(Debug, Clone)]
pub struct PriorFactor<T: LieGroup> {
    keys: [Key; 1],
    prior: T,
    noise_model: NoiseModel,
}

impl<T: LieGroup> PriorFactor<T> {
    pub fn new(key: Key, prior: T, noise_model: NoiseModel) -> Self {
        PriorFactor {
            keys: [key],
            prior,
            noise_model,
        }
    }

    pub fn prior(&self) -> &T {
        &self.prior
    }
}

impl<T: LieGroup> Factor for PriorFactor<T> {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn noise_model(&self) -> &NoiseModel {
        &self.noise_model
    }

    fn unwhitened_error(
        &self,
        values: &Values,
        jacobians: Option<&mut [DMatrix<f64>]>,
    ) -> CoreResult<DVector<f64>> {
        let x = values.get::<T>(self.keys[0])?;
        let residual = self.prior.local_coordinates(x);
        if let Some(jacobians) = jacobians {
            jacobians[0] = T::right_jacobian_inv(&residual);
        }
        Ok(residual)
    }
}
