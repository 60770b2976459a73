//! Nonlinear optimizers over factor graphs.
//!
//! Both optimizers repeat linearize → solve → retract → evaluate:
//! - [`GaussNewtonOptimizer`]: accepts every step
//! - [`LevenbergMarquardtOptimizer`]: damps the linear system and retries with
//!   a larger damping when a step does not decrease the error
//!
//! An optimizer is an immutable snapshot. [`NonlinearOptimizer::iterate`]
//! returns the next snapshot, sharing the graph and ordering;
//! [`NonlinearOptimizer::optimize`] iterates until convergence.

use crate::core::{CoreError, FactorGraph, Key, Values};
use crate::linalg::{DEFAULT_RANK_TOLERANCE, LinAlgError, LinearSolverType, OrderingType};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod gauss_newton;
pub mod levenberg_marquardt;

pub use gauss_newton::GaussNewtonOptimizer;
pub use levenberg_marquardt::{LevenbergMarquardtOptimizer, LevenbergMarquardtParams};

/// Optimizer failures. Each runtime failure carries the iteration it
/// happened in.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// Rejected configuration, reported before the first iteration
    #[error("Invalid optimizer parameters: {0}")]
    InvalidParams(String),

    /// A factor references a variable the estimate does not contain
    #[error("Iteration {iteration}: missing variable {key}")]
    MissingVariable { key: Key, iteration: usize },

    #[error("Iteration {iteration}: linear system is rank deficient in {keys:?}")]
    RankDeficiency { keys: Vec<Key>, iteration: usize },

    /// No damping up to the upper bound produced an acceptable step
    #[error("Iteration {iteration}: no progress, lambda = {lambda:.3e}")]
    NoProgress { iteration: usize, lambda: f64 },

    #[error("Iteration {iteration}: evaluation failed: {source}")]
    Evaluation {
        iteration: usize,
        #[source]
        source: CoreError,
    },

    #[error("Iteration {iteration}: linear solve failed: {source}")]
    LinearSystem {
        iteration: usize,
        #[source]
        source: LinAlgError,
    },
}

impl OptimizerError {
    pub(crate) fn from_core(error: CoreError, iteration: usize) -> Self {
        match error {
            CoreError::MissingVariable(key) => OptimizerError::MissingVariable { key, iteration },
            CoreError::LinearAlgebra(error) => Self::from_linalg(error, iteration),
            source => OptimizerError::Evaluation { iteration, source },
        }
    }

    pub(crate) fn from_linalg(error: LinAlgError, iteration: usize) -> Self {
        match error {
            LinAlgError::RankDeficiency { keys } => {
                OptimizerError::RankDeficiency { keys, iteration }
            }
            source => OptimizerError::LinearSystem { iteration, source },
        }
    }

    pub fn iteration(&self) -> usize {
        match self {
            OptimizerError::InvalidParams(_) => 0,
            OptimizerError::MissingVariable { iteration, .. }
            | OptimizerError::RankDeficiency { iteration, .. }
            | OptimizerError::NoProgress { iteration, .. }
            | OptimizerError::Evaluation { iteration, .. }
            | OptimizerError::LinearSystem { iteration, .. } => *iteration,
        }
    }
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Parameters shared by all nonlinear optimizers.
#[derive(Debug, Clone, PartialEq)]
pub struct NonlinearOptimizerParams {
    pub max_iterations: usize,
    /// Stop when `(e_k - e_k+1) / e_k` falls below this
    pub relative_error_tol: f64,
    /// Stop when `e_k - e_k+1` falls below this
    pub absolute_error_tol: f64,
    /// Stop when the error itself reaches this floor
    pub error_tol: f64,
    pub linear_solver_type: LinearSolverType,
    /// Heuristic used when no explicit ordering is given
    pub ordering_type: OrderingType,
    /// Relative pivot threshold for rank deficiency during elimination
    pub rank_tolerance: f64,
}

impl Default for NonlinearOptimizerParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            relative_error_tol: 1e-5,
            absolute_error_tol: 1e-5,
            error_tol: 0.0,
            linear_solver_type: LinearSolverType::default(),
            ordering_type: OrderingType::default(),
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
        }
    }
}

impl NonlinearOptimizerParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_relative_error_tol(mut self, tol: f64) -> Self {
        self.relative_error_tol = tol;
        self
    }

    pub fn with_absolute_error_tol(mut self, tol: f64) -> Self {
        self.absolute_error_tol = tol;
        self
    }

    pub fn with_error_tol(mut self, tol: f64) -> Self {
        self.error_tol = tol;
        self
    }

    pub fn with_linear_solver_type(mut self, linear_solver_type: LinearSolverType) -> Self {
        self.linear_solver_type = linear_solver_type;
        self
    }

    pub fn with_ordering_type(mut self, ordering_type: OrderingType) -> Self {
        self.ordering_type = ordering_type;
        self
    }

    pub fn with_rank_tolerance(mut self, rank_tolerance: f64) -> Self {
        self.rank_tolerance = rank_tolerance;
        self
    }
}

/// Status of an optimization process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// Error reached the configured floor
    Converged,
    AbsoluteDecreaseReached,
    RelativeDecreaseReached,
    MaxIterationsReached,
    /// Damping exhausted without an accepted step
    NoProgress,
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::Converged => write!(f, "Converged"),
            OptimizationStatus::AbsoluteDecreaseReached => {
                write!(f, "Absolute error decrease below tolerance")
            }
            OptimizationStatus::RelativeDecreaseReached => {
                write!(f, "Relative error decrease below tolerance")
            }
            OptimizationStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            OptimizationStatus::NoProgress => write!(f, "No progress"),
        }
    }
}

/// Snapshot of an optimizer: the estimate, its error and the iteration count.
#[derive(Debug, Clone)]
pub struct OptimizerState {
    pub values: Values,
    pub error: f64,
    pub iterations: usize,
}

impl OptimizerState {
    /// Initial state, evaluating the error of `values` on `graph`.
    pub fn initial(graph: &FactorGraph, values: Values) -> OptimizerResult<Self> {
        let error = graph
            .error(&values)
            .map_err(|e| OptimizerError::from_core(e, 0))?;
        Ok(Self {
            values,
            error,
            iterations: 0,
        })
    }
}

/// Result of [`NonlinearOptimizer::optimize`].
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub values: Values,
    pub status: OptimizationStatus,
    pub optimizer: &'static str,
    pub initial_error: f64,
    pub final_error: f64,
    pub iterations: usize,
    /// Damping at termination, for damped optimizers
    pub final_lambda: Option<f64>,
    pub elapsed_time: Duration,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} Optimization Summary ===", self.optimizer)?;
        writeln!(f, "Status:                    {}", self.status)?;
        writeln!(f, "Initial error:             {:.6e}", self.initial_error)?;
        writeln!(f, "Final error:               {:.6e}", self.final_error)?;
        writeln!(
            f,
            "Error reduction:           {:.6e} ({:.2}%)",
            self.initial_error - self.final_error,
            100.0 * (self.initial_error - self.final_error) / self.initial_error.max(1e-12)
        )?;
        writeln!(f, "Total iterations:          {}", self.iterations)?;
        if let Some(lambda) = self.final_lambda {
            writeln!(f, "Final damping parameter:   {:.6e}", lambda)?;
        }
        writeln!(f, "Total time:                {:?}", self.elapsed_time)?;
        Ok(())
    }
}

/// Convergence test between two successive errors.
///
/// Converged when the new error is at most `error_tol`, or the absolute
/// decrease is below `absolute_error_tol`, or the relative decrease is below
/// `relative_error_tol` (only defined for a positive current error).
pub fn check_convergence(
    params: &NonlinearOptimizerParams,
    current_error: f64,
    new_error: f64,
) -> Option<OptimizationStatus> {
    if new_error <= params.error_tol {
        return Some(OptimizationStatus::Converged);
    }

    let absolute_decrease = current_error - new_error;
    if absolute_decrease < 0.0 {
        warn!(
            "error increased from {:.6e} to {:.6e}",
            current_error, new_error
        );
    }
    if absolute_decrease < params.absolute_error_tol {
        return Some(OptimizationStatus::AbsoluteDecreaseReached);
    }
    if current_error > 0.0 && absolute_decrease / current_error < params.relative_error_tol {
        return Some(OptimizationStatus::RelativeDecreaseReached);
    }
    None
}

/// Iterative nonlinear least-squares optimizer.
pub trait NonlinearOptimizer: Clone {
    fn name(&self) -> &'static str;

    fn state(&self) -> &OptimizerState;

    fn params(&self) -> &NonlinearOptimizerParams;

    /// One outer iteration, returning the next optimizer snapshot.
    fn iterate(&self) -> OptimizerResult<Self>;

    /// Damping of damped optimizers.
    fn lambda(&self) -> Option<f64> {
        None
    }

    fn values(&self) -> &Values {
        &self.state().values
    }

    fn error(&self) -> f64 {
        self.state().error
    }

    fn iterations(&self) -> usize {
        self.state().iterations
    }

    /// Iterate until a convergence criterion holds or the iteration budget is
    /// spent. `NoProgress` ends the run with that status; every other failure
    /// is returned as an error.
    fn optimize(&self) -> OptimizerResult<OptimizationResult> {
        let start_time = Instant::now();
        let params = self.params().clone();
        let initial_error = self.error();
        let mut current = self.clone();

        info!(
            "{}: initial error {:.6e}, max {} iterations",
            self.name(),
            initial_error,
            params.max_iterations
        );

        let status = if initial_error <= params.error_tol {
            OptimizationStatus::Converged
        } else if current.iterations() >= params.max_iterations {
            OptimizationStatus::MaxIterationsReached
        } else {
            loop {
                let next = match current.iterate() {
                    Ok(next) => next,
                    Err(OptimizerError::NoProgress { iteration, lambda }) => {
                        warn!(
                            "{}: no progress at iteration {}, lambda = {:.3e}",
                            self.name(),
                            iteration,
                            lambda
                        );
                        break OptimizationStatus::NoProgress;
                    }
                    Err(e) => return Err(e),
                };
                debug!(
                    "{}: iteration {}, error {:.6e} -> {:.6e}",
                    self.name(),
                    next.iterations(),
                    current.error(),
                    next.error()
                );

                let convergence = check_convergence(&params, current.error(), next.error());
                current = next;
                if let Some(status) = convergence {
                    break status;
                }
                if current.iterations() >= params.max_iterations {
                    break OptimizationStatus::MaxIterationsReached;
                }
            }
        };

        let result = OptimizationResult {
            values: current.values().clone(),
            status,
            optimizer: self.name(),
            initial_error,
            final_error: current.error(),
            iterations: current.iterations(),
            final_lambda: current.lambda(),
            elapsed_time: start_time.elapsed(),
        };
        info!(
            "{}: {} after {} iterations, final error {:.6e}",
            self.name(),
            result.status,
            result.iterations,
            result.final_error
        );
        Ok(result)
    }
}

/// Gauss-Newton with default parameters and a minimum-degree ordering.
pub fn optimize_gauss_newton(
    graph: impl Into<Arc<FactorGraph>>,
    initial: Values,
) -> OptimizerResult<Values> {
    let optimizer = GaussNewtonOptimizer::with_default_ordering(
        graph,
        initial,
        NonlinearOptimizerParams::default(),
    )?;
    Ok(optimizer.optimize()?.values)
}

/// Levenberg-Marquardt with default parameters and a minimum-degree ordering.
pub fn optimize_levenberg_marquardt(
    graph: impl Into<Arc<FactorGraph>>,
    initial: Values,
) -> OptimizerResult<Values> {
    let optimizer = LevenbergMarquardtOptimizer::with_default_ordering(
        graph,
        initial,
        LevenbergMarquardtParams::default(),
    )?;
    Ok(optimizer.optimize()?.values)
}
