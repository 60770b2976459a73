//! Gauss-Newton optimization.
//!
//! Each iteration solves the undamped linearization and takes the full step,
//! without checking whether the error decreased. Fast near a minimum, but
//! may diverge from a poor start; see
//! [`LevenbergMarquardtOptimizer`](crate::optimizer::LevenbergMarquardtOptimizer).

use crate::core::{FactorGraph, Values};
use crate::linalg::Ordering;
use crate::optimizer::{
    NonlinearOptimizer, NonlinearOptimizerParams, OptimizerError, OptimizerResult, OptimizerState,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GaussNewtonOptimizer {
    graph: Arc<FactorGraph>,
    ordering: Arc<Ordering>,
    params: NonlinearOptimizerParams,
    state: OptimizerState,
}

impl GaussNewtonOptimizer {
    /// Fails if `values` does not cover every variable of `graph`.
    pub fn new(
        graph: impl Into<Arc<FactorGraph>>,
        values: Values,
        ordering: impl Into<Arc<Ordering>>,
        params: NonlinearOptimizerParams,
    ) -> OptimizerResult<Self> {
        let graph = graph.into();
        let state = OptimizerState::initial(&graph, values)?;
        Ok(Self {
            graph,
            ordering: ordering.into(),
            params,
            state,
        })
    }

    /// Uses the ordering heuristic configured in `params`.
    pub fn with_default_ordering(
        graph: impl Into<Arc<FactorGraph>>,
        values: Values,
        params: NonlinearOptimizerParams,
    ) -> OptimizerResult<Self> {
        let graph = graph.into();
        let ordering = graph.ordering(params.ordering_type);
        Self::new(graph, values, ordering, params)
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    pub fn ordering(&self) -> &Ordering {
        &self.ordering
    }
}

impl NonlinearOptimizer for GaussNewtonOptimizer {
    fn name(&self) -> &'static str {
        "Gauss-Newton"
    }

    fn state(&self) -> &OptimizerState {
        &self.state
    }

    fn params(&self) -> &NonlinearOptimizerParams {
        &self.params
    }

    fn iterate(&self) -> OptimizerResult<Self> {
        let iteration = self.state.iterations;
        let linear = self
            .graph
            .linearize(&self.state.values)
            .map_err(|e| OptimizerError::from_core(e, iteration))?;

        let solver = self
            .params
            .linear_solver_type
            .create(self.params.rank_tolerance);
        let delta = solver
            .solve(&linear, &self.ordering)
            .map_err(|e| OptimizerError::from_linalg(e, iteration))?;

        let values = self
            .state
            .values
            .retract(&delta)
            .map_err(|e| OptimizerError::from_core(e, iteration))?;
        let error = self
            .graph
            .error(&values)
            .map_err(|e| OptimizerError::from_core(e, iteration))?;
        debug!(
            "Gauss-Newton iteration {}: |delta| = {:.3e}, error = {:.6e}",
            iteration,
            delta.norm(),
            error
        );

        Ok(Self {
            graph: Arc::clone(&self.graph),
            ordering: Arc::clone(&self.ordering),
            params: self.params.clone(),
            state: OptimizerState {
                values,
                error,
                iterations: iteration + 1,
            },
        })
    }
}
