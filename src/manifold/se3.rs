//! SE(3) - Special Euclidean Group in 3D
//!
//! Rigid body transformations, stored as an SO(3) rotation plus a translation.
//! Tangent elements are `[ρ(3), θ(3)]`: translational part first, then the
//! rotation vector.

use crate::manifold::so3::{self, SO3};
use crate::manifold::{LieGroup, Manifold};
use nalgebra::{
    DMatrix, DVector, Isometry3, Matrix3, Matrix4, Matrix6, Translation3, UnitQuaternion, Vector3,
};
use std::fmt;

/// SE(3) group element representing rigid body transformations in 3D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SE3 {
    rotation: SO3,
    translation: Vector3<f64>,
}

impl fmt::Display for SE3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation;
        let q = self.rotation.quaternion();
        write!(
            f,
            "SE3(translation: [{:.4}, {:.4}, {:.4}], rotation: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

impl SE3 {
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        SE3 {
            rotation: SO3::from_quaternion(rotation),
            translation,
        }
    }

    pub fn from_translation_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        SE3 {
            rotation: SO3::from_euler(roll, pitch, yaw),
            translation: Vector3::new(x, y, z),
        }
    }

    pub fn from_parts(translation: Vector3<f64>, rotation: SO3) -> Self {
        SE3 {
            rotation,
            translation,
        }
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    pub fn rotation(&self) -> SO3 {
        self.rotation
    }

    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            self.rotation.quaternion(),
        )
    }

    /// Homogeneous 4x4 matrix.
    pub fn matrix(&self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    /// Transform a point from the local frame to the world frame.
    pub fn act(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.act(point) + self.translation
    }
}

/// Translation-rotation coupling block Q(ρ, θ) of the SE(3) left Jacobian
/// `J_l = [J_l(θ) Q; 0 J_l(θ)]`.
fn q_block(rho: &Vector3<f64>, theta: &Vector3<f64>) -> Matrix3<f64> {
    let p = so3::hat(rho);
    let t = so3::hat(theta);
    let angle_sq = theta.norm_squared();
    let (b, c, d) = if angle_sq < so3::SERIES_ANGLE_SQ {
        (
            1.0 / 6.0 - angle_sq / 120.0,
            1.0 / 24.0 - angle_sq / 720.0,
            1.0 / 120.0 - angle_sq / 2520.0,
        )
    } else {
        let angle = angle_sq.sqrt();
        let (sin, cos) = angle.sin_cos();
        (
            (angle - sin) / (angle_sq * angle),
            (angle_sq + 2.0 * cos - 2.0) / (2.0 * angle_sq * angle_sq),
            (2.0 * angle - 3.0 * sin + angle * cos) / (2.0 * angle_sq * angle_sq * angle),
        )
    };
    0.5 * p
        + b * (t * p + p * t + t * p * t)
        + c * (t * t * p + p * t * t - 3.0 * t * p * t)
        + d * (t * p * t * t + t * t * p * t)
}

impl LieGroup for SE3 {
    const DOF: usize = 6;

    fn identity() -> Self {
        SE3 {
            rotation: SO3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// M_a M_b = [ R_a*R_b   R_a*t_b + t_a ]
    fn compose(&self, other: &Self) -> Self {
        SE3 {
            rotation: self.rotation.compose(&other.rotation),
            translation: self.rotation.act(&other.translation) + self.translation,
        }
    }

    /// M⁻¹ = [ Rᵀ  -Rᵀt ]
    fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        SE3 {
            translation: -rotation.act(&self.translation),
            rotation,
        }
    }

    /// R = Exp(θ), t = J_l(θ) ρ
    fn exp(tangent: &DVector<f64>) -> Self {
        let rho = Vector3::new(tangent[0], tangent[1], tangent[2]);
        let theta = Vector3::new(tangent[3], tangent[4], tangent[5]);
        SE3 {
            rotation: SO3::from_scaled_axis(&theta),
            translation: so3::left_jacobian(&theta) * rho,
        }
    }

    /// θ = Log(R), ρ = J_l⁻¹(θ) t
    fn log(&self) -> DVector<f64> {
        let theta = self.rotation.scaled_axis();
        let rho = so3::left_jacobian_inv(&theta) * self.translation;
        DVector::from_vec(vec![rho.x, rho.y, rho.z, theta.x, theta.y, theta.z])
    }

    /// Ad = [R  [t]ₓR; 0 R]
    fn adjoint(&self) -> DMatrix<f64> {
        let r = self.rotation.matrix();
        let mut adjoint = Matrix6::zeros();
        adjoint.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        adjoint.fixed_view_mut::<3, 3>(3, 3).copy_from(&r);
        adjoint
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(so3::hat(&self.translation) * r));
        so3::to_dynamic(&adjoint)
    }

    /// J_r⁻¹(ρ, θ) = J_l⁻¹(-ρ, -θ), with
    /// J_l⁻¹ = [J_l⁻¹(θ)  -J_l⁻¹(θ) Q J_l⁻¹(θ); 0 J_l⁻¹(θ)].
    fn right_jacobian_inv(tangent: &DVector<f64>) -> DMatrix<f64> {
        let rho = -Vector3::new(tangent[0], tangent[1], tangent[2]);
        let theta = -Vector3::new(tangent[3], tangent[4], tangent[5]);
        let rotation_inv = so3::left_jacobian_inv(&theta);
        let coupling = -(rotation_inv * q_block(&rho, &theta) * rotation_inv);

        let mut jacobian = Matrix6::zeros();
        jacobian.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation_inv);
        jacobian.fixed_view_mut::<3, 3>(3, 3).copy_from(&rotation_inv);
        jacobian.fixed_view_mut::<3, 3>(0, 3).copy_from(&coupling);
        so3::to_dynamic(&jacobian)
    }
}

impl Manifold for SE3 {
    fn dim(&self) -> usize {
        Self::DOF
    }

    fn retract(&self, delta: &DVector<f64>) -> Self {
        self.compose(&SE3::exp(delta))
    }

    fn local_coordinates(&self, other: &Self) -> DVector<f64> {
        self.between(other).log()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn test_se3_identity() {
        let pose = SE3::identity();
        assert!((pose.matrix() - Matrix4::identity()).norm() < TOLERANCE);
    }

    #[test]
    fn test_se3_compose_matches_matrix_product() {
        let a = SE3::from_translation_euler(1.0, 2.0, 3.0, 0.1, 0.2, 0.3);
        let b = SE3::from_translation_euler(-0.5, 0.4, 1.0, -0.3, 0.7, -1.2);
        let c = a.compose(&b);
        assert!((c.matrix() - a.matrix() * b.matrix()).norm() < 1e-10);
    }

    #[test]
    fn test_se3_inverse() {
        let a = SE3::from_translation_euler(1.0, 2.0, 3.0, 0.1, 0.2, 0.3);
        let i = a.compose(&a.inverse());
        assert!((i.matrix() - Matrix4::identity()).norm() < 1e-10);
    }

    #[test]
    fn test_se3_pure_translation_retract() {
        let pose = SE3::from_translation_euler(1.0, 2.0, 3.0, 0.0, 0.0, 0.0);
        let moved = pose.retract(&DVector::from_vec(vec![0.1, 0.1, 0.1, 0.0, 0.0, 0.0]));
        assert!((moved.translation() - Vector3::new(1.1, 2.1, 3.1)).norm() < TOLERANCE);
    }

    #[test]
    fn test_se3_exp_log_round_trip() {
        let tangent = DVector::from_vec(vec![0.4, -0.3, 1.2, 0.2, -0.6, 0.9]);
        let log = SE3::exp(&tangent).log();
        assert!((log - &tangent).norm() < 1e-10);
    }

    #[test]
    fn test_se3_retract_local_round_trip() {
        let x = SE3::from_translation_euler(0.5, -1.0, 2.0, 0.3, -0.2, 1.4);
        let y = SE3::from_translation_euler(0.8, -0.7, 2.2, 0.1, 0.1, 1.9);
        let d = x.local_coordinates(&y);
        assert!((x.retract(&d).matrix() - y.matrix()).norm() < 1e-10);
    }

    #[test]
    fn test_se3_right_jacobian_inv_matches_numerical() {
        for tangent in [
            DVector::from_vec(vec![0.4, -0.3, 1.2, 0.2, -0.6, 0.9]),
            DVector::from_vec(vec![-1.0, 2.0, 0.5, 1.5, 1.0, -1.2]),
            DVector::from_vec(vec![0.3, 0.1, -0.2, 1e-9, 0.0, -2e-9]),
        ] {
            let x = SE3::exp(&tangent);
            let numerical = crate::factors::numerical_jacobian(&x, |y| y.log());
            let analytic = SE3::right_jacobian_inv(&tangent);
            assert!((analytic - numerical).norm() < 1e-7);
        }
    }

    #[test]
    fn test_se3_adjoint_moves_perturbation_to_the_left() {
        let x = SE3::from_translation_euler(0.5, -1.0, 2.0, 0.3, -0.2, 1.4);
        let delta = DVector::from_vec(vec![0.1, -0.2, 0.3, 0.2, 0.1, -0.3]);
        let conjugated = x.compose(&SE3::exp(&delta)).compose(&x.inverse());
        let moved = SE3::exp(&(x.adjoint() * &delta));
        assert!((conjugated.matrix() - moved.matrix()).norm() < 1e-10);
    }

    #[test]
    fn test_se3_log_of_half_turn_is_finite() {
        let pose = SE3::from_translation_euler(1.0, 2.0, 3.0, 0.0, 0.0, std::f64::consts::PI);
        let log = pose.log();
        assert!(log.iter().all(|v| v.is_finite()));
        assert!((log[5].abs() - std::f64::consts::PI).abs() < 1e-9);
        assert!((SE3::exp(&log).matrix() - pose.matrix()).norm() < 1e-9);

        let start = SE3::from_translation_euler(0.0, 1.0, 0.0, 0.0, 0.0, 0.5);
        let end = start.compose(&pose);
        let local = start.local_coordinates(&end);
        assert!(local.iter().all(|v| v.is_finite()));
        assert!((start.retract(&local).matrix() - end.matrix()).norm() < 1e-9);
    }
}
