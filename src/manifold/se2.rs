//! SE(2) - Special Euclidean Group in 2D
//!
//! Planar rigid motions, stored as an SO(2) rotation plus a translation.
//! Tangent elements are `[ρx, ρy, θ]`: translational part first.

use crate::manifold::so2::SO2;
use crate::manifold::{LieGroup, Manifold};
use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, Vector2};
use std::fmt;

/// Below this angle the V matrix uses its series expansion.
const SMALL_ANGLE: f64 = 1e-6;

/// SE(2) group element representing rigid body transformations in 2D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SE2 {
    rotation: SO2,
    translation: Vector2<f64>,
}

impl fmt::Display for SE2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SE2(x: {:.4}, y: {:.4}, theta: {:.4})",
            self.x(),
            self.y(),
            self.theta()
        )
    }
}

impl SE2 {
    /// Create a pose from position and heading.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        SE2 {
            rotation: SO2::from_angle(theta),
            translation: Vector2::new(x, y),
        }
    }

    pub fn from_parts(translation: Vector2<f64>, rotation: SO2) -> Self {
        SE2 {
            rotation,
            translation,
        }
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    pub fn theta(&self) -> f64 {
        self.rotation.angle()
    }

    pub fn translation(&self) -> Vector2<f64> {
        self.translation
    }

    pub fn rotation(&self) -> SO2 {
        self.rotation
    }

    /// Homogeneous 3x3 matrix.
    pub fn matrix(&self) -> Matrix3<f64> {
        let mut m = Matrix3::identity();
        m.fixed_view_mut::<2, 2>(0, 0)
            .copy_from(&self.rotation.matrix());
        m.fixed_view_mut::<2, 1>(0, 2).copy_from(&self.translation);
        m
    }

    /// Transform a point from the local frame to the world frame.
    pub fn act(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.rotation.act(point) + self.translation
    }
}

/// Coefficients `(sin θ / θ, (1 - cos θ) / θ)` of the SE(2) V matrix.
fn v_coefficients(theta: f64) -> (f64, f64) {
    if theta.abs() < SMALL_ANGLE {
        (1.0 - theta * theta / 6.0, 0.5 * theta)
    } else {
        (theta.sin() / theta, (1.0 - theta.cos()) / theta)
    }
}

impl LieGroup for SE2 {
    const DOF: usize = 3;

    fn identity() -> Self {
        SE2 {
            rotation: SO2::identity(),
            translation: Vector2::zeros(),
        }
    }

    /// M_a M_b = [ R_a*R_b   R_a*t_b + t_a ]
    fn compose(&self, other: &Self) -> Self {
        SE2 {
            rotation: self.rotation.compose(&other.rotation),
            translation: self.rotation.act(&other.translation) + self.translation,
        }
    }

    /// M⁻¹ = [ Rᵀ  -Rᵀt ]
    fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        SE2 {
            translation: -rotation.act(&self.translation),
            rotation,
        }
    }

    /// t = V(θ) ρ, V = [a -b; b a], a = sin θ / θ, b = (1 - cos θ) / θ
    fn exp(tangent: &DVector<f64>) -> Self {
        let theta = tangent[2];
        let (a, b) = v_coefficients(theta);
        let (rho_x, rho_y) = (tangent[0], tangent[1]);
        SE2 {
            rotation: SO2::from_angle(theta),
            translation: Vector2::new(a * rho_x - b * rho_y, b * rho_x + a * rho_y),
        }
    }

    /// ρ = V(θ)⁻¹ t
    fn log(&self) -> DVector<f64> {
        let theta = self.theta();
        let (a, b) = v_coefficients(theta);
        let det = a * a + b * b;
        let (x, y) = (self.translation.x, self.translation.y);
        DVector::from_vec(vec![(a * x + b * y) / det, (-b * x + a * y) / det, theta])
    }

    /// Ad = [R  (y, -x)ᵀ; 0 1]
    fn adjoint(&self) -> DMatrix<f64> {
        let r = self.rotation.matrix();
        let (x, y) = (self.translation.x, self.translation.y);
        DMatrix::from_row_slice(
            3,
            3,
            &[
                r[(0, 0)], r[(0, 1)], y, //
                r[(1, 0)], r[(1, 1)], -x, //
                0.0, 0.0, 1.0,
            ],
        )
    }

    /// J_r = [M c; 0 1] with M = [a b; -b a] and
    /// c = ((1 - a)ρx - bρy, bρx + (1 - a)ρy) / θ, so
    /// J_r⁻¹ = [M⁻¹  -M⁻¹c; 0 1].
    fn right_jacobian_inv(tangent: &DVector<f64>) -> DMatrix<f64> {
        let (rho_x, rho_y, theta) = (tangent[0], tangent[1], tangent[2]);
        let (a, b) = v_coefficients(theta);
        let (p, q) = if theta.abs() < SMALL_ANGLE {
            (theta / 6.0, 0.5)
        } else {
            ((1.0 - a) / theta, b / theta)
        };
        let c = Vector2::new(p * rho_x - q * rho_y, q * rho_x + p * rho_y);
        let m_inv = Matrix2::new(a, -b, b, a) / (a * a + b * b);
        let top = -(m_inv * c);
        DMatrix::from_row_slice(
            3,
            3,
            &[
                m_inv[(0, 0)], m_inv[(0, 1)], top.x, //
                m_inv[(1, 0)], m_inv[(1, 1)], top.y, //
                0.0, 0.0, 1.0,
            ],
        )
    }
}

impl Manifold for SE2 {
    fn dim(&self) -> usize {
        Self::DOF
    }

    fn retract(&self, delta: &DVector<f64>) -> Self {
        self.compose(&SE2::exp(delta))
    }

    fn local_coordinates(&self, other: &Self) -> DVector<f64> {
        self.between(other).log()
    }
}
