//! Core factor-graph types.
//!
//! - [`Key`]: variable identifiers
//! - [`Values`]: one estimate of every variable
//! - [`NoiseModel`]: residual whitening
//! - [`Factor`]: the nonlinear residual interface
//! - [`FactorGraph`]: the ordered set of factors, with error and linearization

use crate::linalg::LinAlgError;
use crate::manifold::ManifoldError;
use thiserror::Error;

pub mod factor;
pub mod graph;
pub mod key;
pub mod noise;
pub mod values;

pub use factor::Factor;
pub use graph::{FactorGraph, FactorGraphStatistics};
pub use key::Key;
pub use noise::NoiseModel;
pub use values::Values;

/// Errors raised while building or evaluating a factor graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A factor references a key absent from the values being evaluated
    #[error("Missing variable {0}")]
    MissingVariable(Key),

    #[error("Variable {0} already exists")]
    DuplicateKey(Key),

    #[error("Variable {key} holds {actual}, requested {expected}")]
    TypeMismatch {
        key: Key,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Dimension mismatch for {key}: expected {expected}, got {actual}")]
    DimensionMismatch {
        key: Key,
        expected: usize,
        actual: usize,
    },

    #[error("Residual dimension mismatch: noise model expects {expected}, factor returned {actual}")]
    ResidualDimension { expected: usize, actual: usize },

    #[error("Jacobian for {key} is {actual:?}, expected {expected:?}")]
    JacobianShape {
        key: Key,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid noise model: {0}")]
    InvalidNoiseModel(String),

    #[error("Manifold error: {0}")]
    Manifold(#[from] ManifoldError),

    #[error("Linear algebra error: {0}")]
    LinearAlgebra(#[from] LinAlgError),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
