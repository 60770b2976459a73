//! The nonlinear factor graph.

use crate::core::{CoreResult, Factor, Key, Values};
use crate::linalg::{GaussianFactorGraph, Ordering, OrderingType};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Ordered, append-only collection of factors.
///
/// Slots may be empty (`None`). An empty slot contributes zero error and
/// linearizes to an empty slot, so factor positions are stable between the
/// nonlinear and the linear graph.
#[derive(Debug, Clone, Default)]
pub struct FactorGraph {
    factors: Vec<Option<Arc<dyn Factor>>>,
}

/// Summary statistics about a factor graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorGraphStatistics {
    pub num_factors: usize,
    pub num_null_factors: usize,
    pub num_variables: usize,
    pub total_residual_dimension: usize,
}

impl fmt::Display for FactorGraphStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FactorGraph Statistics:\n\
             Factors: {} (null: {})\n\
             Variables: {}\n\
             Residual dimension: {}",
            self.num_factors,
            self.num_null_factors,
            self.num_variables,
            self.total_residual_dimension
        )
    }
}

impl FactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F: Factor + 'static>(&mut self, factor: F) {
        self.factors.push(Some(Arc::new(factor)));
    }

    pub fn add_shared(&mut self, factor: Arc<dyn Factor>) {
        self.factors.push(Some(factor));
    }

    /// Append an empty placeholder slot.
    pub fn add_null(&mut self) {
        self.factors.push(None);
    }

    /// Number of slots, including empty ones.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn Factor>> {
        self.factors.get(index).and_then(|f| f.as_ref())
    }

    /// All slots in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Arc<dyn Factor>>> {
        self.factors.iter().map(|f| f.as_ref())
    }

    /// Every key referenced by some factor.
    pub fn keys(&self) -> BTreeSet<Key> {
        self.factors
            .iter()
            .flatten()
            .flat_map(|f| f.keys().iter().copied())
            .collect()
    }

    /// Total error `Σ 0.5 * ||W_i r_i(x)||²`.
    ///
    /// Factors are evaluated in parallel; the sum is taken in graph order.
    pub fn error(&self, values: &Values) -> CoreResult<f64> {
        let errors = self
            .factors
            .par_iter()
            .map(|slot| match slot {
                Some(factor) => factor.error(values),
                None => Ok(0.0),
            })
            .collect::<CoreResult<Vec<f64>>>()?;
        Ok(errors.iter().sum())
    }

    /// Linearize every factor at `values`, keeping slot positions.
    pub fn linearize(&self, values: &Values) -> CoreResult<GaussianFactorGraph> {
        let factors = self
            .factors
            .par_iter()
            .map(|slot| slot.as_ref().map(|f| f.linearize(values)).transpose())
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(GaussianFactorGraph::from_slots(factors))
    }

    /// Elimination ordering over the keys of this graph.
    pub fn ordering(&self, ordering_type: OrderingType) -> Ordering {
        Ordering::from_scopes(ordering_type, self.factors.iter().flatten().map(|f| f.keys()))
    }

    pub fn statistics(&self) -> FactorGraphStatistics {
        FactorGraphStatistics {
            num_factors: self.factors.len(),
            num_null_factors: self.factors.iter().filter(|f| f.is_none()).count(),
            num_variables: self.keys().len(),
            total_residual_dimension: self.factors.iter().flatten().map(|f| f.dim()).sum(),
        }
    }
}
