//! Linear layer: Gaussian factor graphs and their solvers.
//!
//! Linearizing a [`FactorGraph`](crate::core::FactorGraph) yields a
//! [`GaussianFactorGraph`]. A [`LinearSolver`] turns it into the delta
//! [`VectorValues`] minimizing `Σ ||A_i x - b_i||²`:
//!
//! - [`SequentialSolver`]: variable-by-variable QR elimination into a
//!   [`GaussianBayesNet`], then back-substitution
//! - [`MultifrontalSolver`]: elimination over a tree of fronts, eliminating
//!   independent subtrees in parallel
//! - [`SparseCholeskySolver`]: faer sparse LLᵀ on the normal equations
//!
//! The elimination order comes from an [`Ordering`].

use crate::core::Key;
use std::fmt;
use thiserror::Error;

pub mod cholesky;
pub mod conditional;
pub mod elimination;
pub mod gaussian;
pub mod multifrontal;
pub mod ordering;
pub mod vector_values;

pub use cholesky::SparseCholeskySolver;
pub use conditional::{GaussianBayesNet, GaussianConditional};
pub use elimination::{SequentialSolver, eliminate_front};
pub use gaussian::{GaussianFactorGraph, JacobianFactor};
pub use multifrontal::MultifrontalSolver;
pub use ordering::{Ordering, OrderingType};
pub use vector_values::VectorValues;

/// Default relative threshold below which a pivot counts as zero.
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-9;

/// Linear algebra specific error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinAlgError {
    /// The system does not determine these variables
    #[error("Rank deficient system, undetermined variables: {keys:?}")]
    RankDeficiency { keys: Vec<Key> },

    #[error("Invalid ordering: {0}")]
    InvalidOrdering(String),

    #[error("Dimension mismatch for {key}: expected {expected}, got {actual}")]
    DimensionMismatch {
        key: Key,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid linear factor: {0}")]
    InvalidFactor(String),

    #[error("No delta for {0}")]
    MissingDelta(Key),

    #[error("Factorization failed: {0}")]
    Factorization(String),
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Solves a linearized system for the delta of every variable it touches.
pub trait LinearSolver: Send + Sync {
    fn solve(&self, graph: &GaussianFactorGraph, ordering: &Ordering)
    -> LinAlgResult<VectorValues>;

    fn name(&self) -> &'static str;
}

/// Linear solver backend
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearSolverType {
    Sequential,
    #[default]
    Multifrontal,
    SparseCholesky,
}

impl LinearSolverType {
    pub fn create(self, rank_tolerance: f64) -> Box<dyn LinearSolver> {
        match self {
            LinearSolverType::Sequential => Box::new(SequentialSolver::new(rank_tolerance)),
            LinearSolverType::Multifrontal => Box::new(MultifrontalSolver::new(rank_tolerance)),
            LinearSolverType::SparseCholesky => Box::new(SparseCholeskySolver::new()),
        }
    }
}

impl fmt::Display for LinearSolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverType::Sequential => write!(f, "Sequential QR"),
            LinearSolverType::Multifrontal => write!(f, "Multifrontal QR"),
            LinearSolverType::SparseCholesky => write!(f, "Sparse Cholesky"),
        }
    }
}
