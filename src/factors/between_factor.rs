use crate::core::{CoreResult, Factor, Key, NoiseModel, Values};
use crate::manifold::LieGroup;
use nalgebra::{DMatrix, DVector};

/// Generic between factor for Lie group pose constraints.
///
/// Represents a relative measurement `T_ij` between two variables of the same
/// Lie group (SE(2), SE(3), SO(2), SO(3) or Rⁿ). The residual is
///
/// ```text
/// r = Log(T_ij⁻¹ ∘ T_i⁻¹ ∘ T_j)
/// ```
///
/// with Jacobians
///
/// ```text
/// ∂r/∂T_j = J_r⁻¹(r)
/// ∂r/∂T_i = -J_r⁻¹(r) · Ad(T_j⁻¹ ∘ T_i)
/// ```
///
/// The residual has the group's DOF as dimension:
/// - **SE(3)**: 6D `[ρ, θ]`
/// - **SE(2)**: 3D `[dx, dy, dθ]`
/// - **SO(3)**: 3D
/// - **SO(2)**: 1D
/// - **Rⁿ**: nD, where the residual reduces to `x_j - x_i - z`
#[derive(Debug, Clone)]
pub struct BetweenFactor<T: LieGroup> {
    keys: [Key; 2],
    measured: T,
    noise_model: NoiseModel,
}

impl<T: LieGroup> BetweenFactor<T> {
    pub fn new(key_i: Key, key_j: Key, measured: T, noise_model: NoiseModel) -> Self {
        BetweenFactor {
            keys: [key_i, key_j],
            measured,
            noise_model,
        }
    }

    pub fn measured(&self) -> &T {
        &self.measured
    }

    fn residual(&self, xi: &T, xj: &T) -> DVector<f64> {
        self.measured.local_coordinates(&xi.between(xj))
    }
}

impl<T: LieGroup> Factor for BetweenFactor<T> {
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
        let xi = values.get::<T>(self.keys[0])?;
        let xj = values.get::<T>(self.keys[1])?;
        let residual = self.residual(xi, xj);
        if let Some(jacobians) = jacobians {
            let jr_inv = T::right_jacobian_inv(&residual);
            jacobians[0] = -(&jr_inv * xj.between(xi).adjoint());
            jacobians[1] = jr_inv;
        }
        Ok(residual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::numerical_jacobian;
    use crate::manifold::{Point2, Point3, SE2, SE3, SO2, SO3};
    use std::f64::consts::PI;

    fn x(i: u64) -> Key {
        Key::symbol('x', i)
    }

    #[test]
    fn test_between_se2_zero_error_for_consistent_poses() {
        let factor = BetweenFactor::new(x(1), x(2), SE2::new(1.0, 0.0, PI / 2.0), NoiseModel::unit(3));
        let mut values = Values::new();
        values.insert(x(1), SE2::new(2.0, 1.0, PI / 2.0)).unwrap();
        values.insert(x(2), SE2::new(2.0, 2.0, PI)).unwrap();
        assert!(factor.error(&values).unwrap() < 1e-20);
    }

    #[test]
    fn test_between_se2_jacobians_at_identity() {
        // at x_i = x_j = identity with z = identity: J_i = -I, J_j = I
        let factor = BetweenFactor::new(x(1), x(2), SE2::new(0.0, 0.0, 0.0), NoiseModel::unit(3));
        let mut values = Values::new();
        values.insert(x(1), SE2::new(0.0, 0.0, 0.0)).unwrap();
        values.insert(x(2), SE2::new(0.0, 0.0, 0.0)).unwrap();
        let linear = factor.linearize(&values).unwrap();
        assert!((&linear.blocks()[0] + DMatrix::<f64>::identity(3, 3)).norm() < 1e-8);
        assert!((&linear.blocks()[1] - DMatrix::<f64>::identity(3, 3)).norm() < 1e-8);
    }

    #[test]
    fn test_between_se3_residual_dimension() {
        let z = SE3::from_translation_euler(1.0, 0.0, 0.0, 0.0, 0.0, 0.1);
        let factor = BetweenFactor::new(x(1), x(2), z, NoiseModel::unit(6));
        let mut values = Values::new();
        values.insert(x(1), SE3::from_translation_euler(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)).unwrap();
        values.insert(x(2), SE3::from_translation_euler(1.0, 0.0, 0.0, 0.0, 0.0, 0.2)).unwrap();
        let r = factor.whitened_error(&values).unwrap();
        assert_eq!(r.len(), 6);
        assert!((r[5] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_between_points_is_difference() {
        let factor = BetweenFactor::new(
            x(1),
            x(2),
            Point2::new(1.0, 1.0),
            NoiseModel::unit(2),
        );
        let mut values = Values::new();
        values.insert(x(1), Point2::new(0.0, 0.0)).unwrap();
        values.insert(x(2), Point2::new(1.5, 1.0)).unwrap();
        let r = factor.whitened_error(&values).unwrap();
        assert!((r - DVector::from_vec(vec![0.5, 0.0])).norm() < 1e-12);
    }

    fn assert_matches_numerical<T: LieGroup>(measured: T, xi: T, xj: T) {
        let factor = BetweenFactor::new(x(1), x(2), measured, NoiseModel::unit(T::DOF));
        let mut values = Values::new();
        values.insert(x(1), xi.clone()).unwrap();
        values.insert(x(2), xj.clone()).unwrap();
        let linear = factor.linearize(&values).unwrap();

        let numerical_i = numerical_jacobian(&xi, |xi| factor.residual(xi, &xj));
        let numerical_j = numerical_jacobian(&xj, |xj| factor.residual(&xi, xj));
        assert!((&linear.blocks()[0] - numerical_i).norm() < 1e-7);
        assert!((&linear.blocks()[1] - numerical_j).norm() < 1e-7);
    }

    #[test]
    fn test_between_jacobians_match_numerical() {
        assert_matches_numerical(
            SE2::new(1.0, 0.2, 0.4),
            SE2::new(0.5, -1.0, 2.8),
            SE2::new(1.7, -0.3, -2.6),
        );
        assert_matches_numerical(
            SE3::from_translation_euler(1.0, 0.0, 0.2, 0.1, -0.2, 0.3),
            SE3::from_translation_euler(0.3, -0.5, 1.0, 0.4, 0.1, -1.2),
            SE3::from_translation_euler(1.2, -0.1, 1.4, 0.6, -0.2, -0.7),
        );
        assert_matches_numerical(
            SO3::from_euler(0.2, 0.1, -0.3),
            SO3::from_euler(-1.0, 0.5, 2.0),
            SO3::from_euler(-0.6, 0.4, 1.5),
        );
        assert_matches_numerical(SO2::from_angle(0.3), SO2::from_angle(3.0), SO2::from_angle(-2.9));
        assert_matches_numerical(
            Point3::new(1.0, 2.0, 3.0),
            Point3::new(-1.0, 0.5, 0.0),
            Point3::new(0.2, 2.0, 2.5),
        );
    }
}
