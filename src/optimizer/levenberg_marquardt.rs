//! Levenberg-Marquardt optimization.
//!
//! Each outer iteration linearizes once, then tries damped solves
//!
//! ```text
//! min Σ ||A_i δ - b_i||² + λ ||δ||²
//! ```
//!
//! with increasing λ until a step does not increase the error. An accepted
//! step lowers λ (towards Gauss-Newton), a rejected one raises it (towards
//! gradient descent with a shrinking step). With λ = 0 an iteration is exactly
//! a Gauss-Newton iteration.

use crate::core::{FactorGraph, Values};
use crate::linalg::{GaussianFactorGraph, Ordering};
use crate::optimizer::{
    NonlinearOptimizer, NonlinearOptimizerParams, OptimizerError, OptimizerResult, OptimizerState,
};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, warn};

/// Levenberg-Marquardt configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LevenbergMarquardtParams {
    pub base: NonlinearOptimizerParams,
    pub initial_lambda: f64,
    /// Multiplier applied on rejection, divisor on acceptance
    pub lambda_factor: f64,
    pub lambda_upper_bound: f64,
    pub lambda_lower_bound: f64,
    /// Damped solves attempted per linearization
    pub max_inner_iterations: usize,
}

impl Default for LevenbergMarquardtParams {
    fn default() -> Self {
        Self {
            base: NonlinearOptimizerParams::default(),
            initial_lambda: 1e-5,
            lambda_factor: 10.0,
            lambda_upper_bound: 1e5,
            lambda_lower_bound: 0.0,
            max_inner_iterations: 10,
        }
    }
}

impl LevenbergMarquardtParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: NonlinearOptimizerParams) -> Self {
        self.base = base;
        self
    }

    pub fn with_initial_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    pub fn with_lambda_factor(mut self, factor: f64) -> Self {
        self.lambda_factor = factor;
        self
    }

    /// Set the damping parameter bounds.
    pub fn with_lambda_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lambda_lower_bound = lower;
        self.lambda_upper_bound = upper;
        self
    }

    pub fn with_max_inner_iterations(mut self, max_inner_iterations: usize) -> Self {
        self.max_inner_iterations = max_inner_iterations;
        self
    }

    /// Check the damping schedule.
    ///
    /// The factor must be finite and above 1, the bounds must satisfy
    /// `0 <= lower <= upper`, and the initial damping must be finite and
    /// non-negative.
    pub fn validate(&self) -> OptimizerResult<()> {
        let invalid = |reason: String| Err(OptimizerError::InvalidParams(reason));
        if !self.lambda_factor.is_finite() || self.lambda_factor <= 1.0 {
            return invalid(format!(
                "lambda_factor must be finite and > 1, got {}",
                self.lambda_factor
            ));
        }
        if !self.initial_lambda.is_finite() || self.initial_lambda < 0.0 {
            return invalid(format!(
                "initial_lambda must be finite and >= 0, got {}",
                self.initial_lambda
            ));
        }
        if self.lambda_lower_bound.is_nan()
            || self.lambda_upper_bound.is_nan()
            || self.lambda_lower_bound < 0.0
            || self.lambda_lower_bound > self.lambda_upper_bound
        {
            return invalid(format!(
                "lambda bounds must satisfy 0 <= lower <= upper, got [{}, {}]",
                self.lambda_lower_bound, self.lambda_upper_bound
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LevenbergMarquardtOptimizer {
    graph: Arc<FactorGraph>,
    ordering: Arc<Ordering>,
    params: LevenbergMarquardtParams,
    state: OptimizerState,
    lambda: f64,
}

impl LevenbergMarquardtOptimizer {
    /// Fails if `params` does not validate or `values` does not cover every
    /// variable of `graph`.
    pub fn new(
        graph: impl Into<Arc<FactorGraph>>,
        values: Values,
        ordering: impl Into<Arc<Ordering>>,
        params: LevenbergMarquardtParams,
    ) -> OptimizerResult<Self> {
        params.validate()?;
        let graph = graph.into();
        let state = OptimizerState::initial(&graph, values)?;
        Ok(Self {
            graph,
            ordering: ordering.into(),
            lambda: params.initial_lambda,
            params,
            state,
        })
    }

    /// Uses the ordering heuristic configured in `params.base`.
    pub fn with_default_ordering(
        graph: impl Into<Arc<FactorGraph>>,
        values: Values,
        params: LevenbergMarquardtParams,
    ) -> OptimizerResult<Self> {
        let graph = graph.into();
        let ordering = graph.ordering(params.base.ordering_type);
        Self::new(graph, values, ordering, params)
    }

    /// Copy of this optimizer with the damping forced to `lambda`.
    pub fn with_lambda(&self, lambda: f64) -> Self {
        Self {
            lambda,
            ..self.clone()
        }
    }

    pub fn current_lambda(&self) -> f64 {
        self.lambda
    }

    pub fn lm_params(&self) -> &LevenbergMarquardtParams {
        &self.params
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    pub fn ordering(&self) -> &Ordering {
        &self.ordering
    }

    fn advance(&self, values: Values, error: f64, lambda: f64) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            ordering: Arc::clone(&self.ordering),
            params: self.params.clone(),
            state: OptimizerState {
                values,
                error,
                iterations: self.state.iterations + 1,
            },
            lambda,
        }
    }

    /// Solve the damped system and evaluate the resulting candidate.
    fn try_lambda(&self, linear: &GaussianFactorGraph, lambda: f64) -> OptimizerResult<(Values, f64)> {
        let iteration = self.state.iterations;
        let system = if lambda == 0.0 {
            Cow::Borrowed(linear)
        } else {
            Cow::Owned(
                linear
                    .damped(lambda)
                    .map_err(|e| OptimizerError::from_linalg(e, iteration))?,
            )
        };

        let solver = self
            .params
            .base
            .linear_solver_type
            .create(self.params.base.rank_tolerance);
        let delta = solver
            .solve(&system, &self.ordering)
            .map_err(|e| OptimizerError::from_linalg(e, iteration))?;
        let candidate = self
            .state
            .values
            .retract(&delta)
            .map_err(|e| OptimizerError::from_core(e, iteration))?;
        let error = self
            .graph
            .error(&candidate)
            .map_err(|e| OptimizerError::from_core(e, iteration))?;
        Ok((candidate, error))
    }
}

impl NonlinearOptimizer for LevenbergMarquardtOptimizer {
    fn name(&self) -> &'static str {
        "Levenberg-Marquardt"
    }

    fn state(&self) -> &OptimizerState {
        &self.state
    }

    fn params(&self) -> &NonlinearOptimizerParams {
        &self.params.base
    }

    fn lambda(&self) -> Option<f64> {
        Some(self.lambda)
    }

    /// One linearization, then damped solves with growing λ until a candidate
    /// is accepted. A candidate whose error equals the current error is
    /// accepted.
    fn iterate(&self) -> OptimizerResult<Self> {
        let iteration = self.state.iterations;
        let params = &self.params;
        let linear = self
            .graph
            .linearize(&self.state.values)
            .map_err(|e| OptimizerError::from_core(e, iteration))?;

        let mut lambda = self.lambda;
        for attempt in 0..params.max_inner_iterations.max(1) {
            let (candidate, error) = self.try_lambda(&linear, lambda)?;

            if error <= self.state.error {
                let next_lambda = (lambda / params.lambda_factor).max(params.lambda_lower_bound);
                debug!(
                    "LM iteration {} attempt {}: lambda = {:.3e}, error {:.6e} -> {:.6e} [ACCEPTED]",
                    iteration, attempt, lambda, self.state.error, error
                );
                return Ok(self.advance(candidate, error, next_lambda));
            }

            debug!(
                "LM iteration {} attempt {}: lambda = {:.3e}, error {:.6e} -> {:.6e} [REJECTED]",
                iteration, attempt, lambda, self.state.error, error
            );
            if lambda >= params.lambda_upper_bound {
                break;
            }
            lambda = if lambda == 0.0 {
                params.initial_lambda
            } else {
                lambda * params.lambda_factor
            }
            .min(params.lambda_upper_bound);
        }

        warn!(
            "LM iteration {}: no acceptable step, lambda = {:.3e}",
            iteration, lambda
        );
        Err(OptimizerError::NoProgress { iteration, lambda })
    }
}
