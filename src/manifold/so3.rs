//! SO(3) - Special Orthogonal Group in 3D
//!
//! Rotations stored as unit quaternions. The tangent is the rotation vector
//! θ = angle · axis.

use crate::manifold::{LieGroup, Manifold};
use nalgebra::{DMatrix, DVector, Matrix3, Quaternion, UnitQuaternion, Vector3};
use std::fmt;

/// SO(3) group element representing rotations in 3D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SO3 {
    quaternion: UnitQuaternion<f64>,
}

impl fmt::Display for SO3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "SO3(w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4})",
            q.w, q.i, q.j, q.k
        )
    }
}

impl SO3 {
    pub fn from_quaternion(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3 {
            quaternion: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        }
    }

    /// Rotation from a rotation vector.
    pub fn from_scaled_axis(theta: &Vector3<f64>) -> Self {
        let quaternion = if theta.norm_squared() > f64::EPSILON {
            UnitQuaternion::from_scaled_axis(*theta)
        } else {
            UnitQuaternion::from_quaternion(Quaternion::new(
                1.0,
                theta.x / 2.0,
                theta.y / 2.0,
                theta.z / 2.0,
            ))
        };
        SO3 { quaternion }
    }

    /// Rotation vector in the ball of radius π.
    ///
    /// θu = (2 / ||v||) · v · atan2(||v||, w), with q and -q mapped to the
    /// same vector.
    pub fn scaled_axis(&self) -> Vector3<f64> {
        let q = self.quaternion.quaternion();
        let imag = Vector3::new(q.i, q.j, q.k);
        let sin_half_sq = imag.norm_squared();

        let coeff = if sin_half_sq > f64::EPSILON {
            let sin_half = sin_half_sq.sqrt();
            let two_angle = 2.0
                * if q.w < 0.0 {
                    f64::atan2(-sin_half, -q.w)
                } else {
                    f64::atan2(sin_half, q.w)
                };
            two_angle / sin_half
        } else {
            // small-angle approximation
            2.0 / q.w
        };
        imag * coeff
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    pub fn act(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.quaternion * point
    }
}

/// Below this squared angle the Jacobian coefficients use their series.
pub(crate) const SERIES_ANGLE_SQ: f64 = 1e-6;

/// [θ]ₓ = [0 -θz θy; θz 0 -θx; -θy θx 0]
pub fn hat(theta: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -theta.z, theta.y, //
        theta.z, 0.0, -theta.x, //
        -theta.y, theta.x, 0.0,
    )
}

/// Left Jacobian of the SO(3) exponential map.
///
/// J_l(θ) = I + (1 - cos θ)/θ² [θ]ₓ + (θ - sin θ)/θ³ [θ]ₓ²
pub fn left_jacobian(theta: &Vector3<f64>) -> Matrix3<f64> {
    let angle_sq = theta.norm_squared();
    let skew = hat(theta);
    if angle_sq <= f64::EPSILON {
        Matrix3::identity() + 0.5 * skew
    } else {
        let angle = angle_sq.sqrt();
        Matrix3::identity()
            + (1.0 - angle.cos()) / angle_sq * skew
            + (angle - angle.sin()) / (angle_sq * angle) * skew * skew
    }
}

/// Inverse of the left Jacobian.
///
/// J_l⁻¹(θ) = I - ½[θ]ₓ + (1 - (θ/2)·cot(θ/2))/θ² [θ]ₓ²
///
/// The cotangent form stays finite at θ = π, where the coefficient is 1/π².
pub fn left_jacobian_inv(theta: &Vector3<f64>) -> Matrix3<f64> {
    let angle_sq = theta.norm_squared();
    let skew = hat(theta);
    let coeff = if angle_sq < SERIES_ANGLE_SQ {
        1.0 / 12.0 + angle_sq / 720.0
    } else {
        let half = 0.5 * angle_sq.sqrt();
        (1.0 - half * half.cos() / half.sin()) / angle_sq
    };
    Matrix3::identity() - 0.5 * skew + coeff * skew * skew
}

/// Inverse of the right Jacobian, J_r⁻¹(θ) = J_l⁻¹(-θ).
pub fn right_jacobian_inv(theta: &Vector3<f64>) -> Matrix3<f64> {
    left_jacobian_inv(&-theta)
}

/// Copy a fixed-size block into a dynamic matrix.
pub(crate) fn to_dynamic<const R: usize, const C: usize>(
    m: &nalgebra::SMatrix<f64, R, C>,
) -> DMatrix<f64> {
    DMatrix::from_column_slice(R, C, m.as_slice())
}

impl LieGroup for SO3 {
    const DOF: usize = 3;

    fn identity() -> Self {
        SO3 {
            quaternion: UnitQuaternion::identity(),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SO3 {
            quaternion: self.quaternion * other.quaternion,
        }
    }

    fn inverse(&self) -> Self {
        SO3 {
            quaternion: self.quaternion.inverse(),
        }
    }

    fn exp(tangent: &DVector<f64>) -> Self {
        SO3::from_scaled_axis(&Vector3::new(tangent[0], tangent[1], tangent[2]))
    }

    fn log(&self) -> DVector<f64> {
        DVector::from_column_slice(self.scaled_axis().as_slice())
    }

    fn adjoint(&self) -> DMatrix<f64> {
        to_dynamic(&self.matrix())
    }

    fn right_jacobian_inv(tangent: &DVector<f64>) -> DMatrix<f64> {
        to_dynamic(&right_jacobian_inv(&Vector3::new(tangent[0], tangent[1], tangent[2])))
    }
}

impl Manifold for SO3 {
    fn dim(&self) -> usize {
        Self::DOF
    }

    fn retract(&self, delta: &DVector<f64>) -> Self {
        self.compose(&SO3::exp(delta))
    }

    fn local_coordinates(&self, other: &Self) -> DVector<f64> {
        self.between(other).log()
    }
}
