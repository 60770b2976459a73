//! Gaussian noise models.
//!
//! A noise model whitens a residual `r` into `W r` with `WᵀW = Σ⁻¹`, so that
//! `0.5 * ||W r||²` is the negative log-likelihood up to a constant. The same
//! `W` is applied to the Jacobian blocks when a factor is linearized.

use crate::core::{CoreError, CoreResult};
use nalgebra::{DMatrix, DVector};

/// Symmetric positive-definite residual weighting.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseModel {
    /// Identity weighting.
    Unit { dim: usize },
    /// Same standard deviation for every component.
    Isotropic { dim: usize, sigma: f64 },
    /// Independent per-component standard deviations.
    Diagonal { sigmas: DVector<f64> },
    /// Full square-root information matrix `W` (upper triangular).
    Gaussian { sqrt_information: DMatrix<f64> },
}

impl NoiseModel {
    pub fn unit(dim: usize) -> Self {
        NoiseModel::Unit { dim }
    }

    pub fn isotropic(dim: usize, sigma: f64) -> CoreResult<Self> {
        if !(sigma > 0.0 && sigma.is_finite()) {
            return Err(CoreError::InvalidNoiseModel(format!(
                "sigma must be positive and finite, got {sigma}"
            )));
        }
        Ok(NoiseModel::Isotropic { dim, sigma })
    }

    pub fn diagonal(sigmas: DVector<f64>) -> CoreResult<Self> {
        if let Some(bad) = sigmas.iter().find(|s| !(**s > 0.0 && s.is_finite())) {
            return Err(CoreError::InvalidNoiseModel(format!(
                "sigmas must be positive and finite, got {bad}"
            )));
        }
        Ok(NoiseModel::Diagonal { sigmas })
    }

    /// From a covariance Σ = L Lᵀ, with W = L⁻¹.
    pub fn from_covariance(covariance: DMatrix<f64>) -> CoreResult<Self> {
        if !covariance.is_square() {
            return Err(CoreError::InvalidNoiseModel(format!(
                "covariance must be square, got {}x{}",
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        let n = covariance.nrows();
        let cholesky = covariance.cholesky().ok_or_else(|| {
            CoreError::InvalidNoiseModel("covariance is not positive definite".into())
        })?;
        let sqrt_information = cholesky
            .l()
            .solve_lower_triangular(&DMatrix::identity(n, n))
            .ok_or_else(|| CoreError::InvalidNoiseModel("singular covariance factor".into()))?;
        Ok(NoiseModel::Gaussian { sqrt_information })
    }

    /// From an information matrix Λ = L Lᵀ, with W = Lᵀ.
    pub fn from_information(information: DMatrix<f64>) -> CoreResult<Self> {
        if !information.is_square() {
            return Err(CoreError::InvalidNoiseModel(format!(
                "information must be square, got {}x{}",
                information.nrows(),
                information.ncols()
            )));
        }
        let cholesky = information.cholesky().ok_or_else(|| {
            CoreError::InvalidNoiseModel("information is not positive definite".into())
        })?;
        Ok(NoiseModel::Gaussian {
            sqrt_information: cholesky.l().transpose(),
        })
    }

    /// Residual dimension.
    pub fn dim(&self) -> usize {
        match self {
            NoiseModel::Unit { dim } | NoiseModel::Isotropic { dim, .. } => *dim,
            NoiseModel::Diagonal { sigmas } => sigmas.len(),
            NoiseModel::Gaussian { sqrt_information } => sqrt_information.nrows(),
        }
    }

    /// `W r`
    pub fn whiten(&self, residual: &DVector<f64>) -> DVector<f64> {
        match self {
            NoiseModel::Unit { .. } => residual.clone(),
            NoiseModel::Isotropic { sigma, .. } => residual / *sigma,
            NoiseModel::Diagonal { sigmas } => residual.component_div(sigmas),
            NoiseModel::Gaussian { sqrt_information } => sqrt_information * residual,
        }
    }

    /// `W J`, row by row.
    pub fn whiten_matrix(&self, matrix: &DMatrix<f64>) -> DMatrix<f64> {
        match self {
            NoiseModel::Unit { .. } => matrix.clone(),
            NoiseModel::Isotropic { sigma, .. } => matrix / *sigma,
            NoiseModel::Diagonal { sigmas } => {
                let mut whitened = matrix.clone();
                for (mut row, sigma) in whitened.row_iter_mut().zip(sigmas.iter()) {
                    row /= *sigma;
                }
                whitened
            }
            NoiseModel::Gaussian { sqrt_information } => sqrt_information * matrix,
        }
    }

    /// Squared Mahalanobis distance `||W r||²`.
    pub fn mahalanobis_squared(&self, residual: &DVector<f64>) -> f64 {
        self.whiten(residual).norm_squared()
    }
}
