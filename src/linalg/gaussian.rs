//! Linearized factors.

use crate::core::Key;
use crate::linalg::{LinAlgError, LinAlgResult, Ordering, OrderingType, VectorValues};
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet};

/// Whitened linear factor `||Σ_k A_k x_k - b||²`.
///
/// Every block has `rows()` rows; block `k` has as many columns as the tangent
/// dimension of `keys()[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor {
    keys: Vec<Key>,
    blocks: Vec<DMatrix<f64>>,
    b: DVector<f64>,
}

impl JacobianFactor {
    pub fn new(blocks: Vec<(Key, DMatrix<f64>)>, b: DVector<f64>) -> LinAlgResult<Self> {
        let mut keys = Vec::with_capacity(blocks.len());
        let mut matrices = Vec::with_capacity(blocks.len());
        for (key, block) in blocks {
            if keys.contains(&key) {
                return Err(LinAlgError::InvalidFactor(format!("key {key} appears twice")));
            }
            if block.nrows() != b.len() {
                return Err(LinAlgError::InvalidFactor(format!(
                    "block for {key} has {} rows, right-hand side has {}",
                    block.nrows(),
                    b.len()
                )));
            }
            keys.push(key);
            matrices.push(block);
        }
        Ok(JacobianFactor {
            keys,
            blocks: matrices,
            b,
        })
    }

    /// Prior `sqrt(λ) I x = 0` on a single variable.
    pub fn damping(key: Key, dim: usize, lambda: f64) -> Self {
        JacobianFactor {
            keys: vec![key],
            blocks: vec![DMatrix::identity(dim, dim) * lambda.sqrt()],
            b: DVector::zeros(dim),
        }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn blocks(&self) -> &[DMatrix<f64>] {
        &self.blocks
    }

    pub fn block(&self, key: Key) -> Option<&DMatrix<f64>> {
        self.keys
            .iter()
            .position(|&k| k == key)
            .map(|i| &self.blocks[i])
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn rows(&self) -> usize {
        self.b.len()
    }

    /// `Σ A_k x_k - b`
    pub fn residual(&self, x: &VectorValues) -> LinAlgResult<DVector<f64>> {
        let mut residual = -&self.b;
        for (&key, block) in self.keys.iter().zip(&self.blocks) {
            let delta = x.get(key).ok_or(LinAlgError::MissingDelta(key))?;
            if delta.len() != block.ncols() {
                return Err(LinAlgError::DimensionMismatch {
                    key,
                    expected: block.ncols(),
                    actual: delta.len(),
                });
            }
            residual += block * delta;
        }
        Ok(residual)
    }

    /// `0.5 * ||Σ A_k x_k - b||²`
    pub fn error(&self, x: &VectorValues) -> LinAlgResult<f64> {
        Ok(0.5 * self.residual(x)?.norm_squared())
    }
}

/// Linearized factor graph. Slots mirror the nonlinear graph, so a null
/// nonlinear factor stays a null linear factor.
#[derive(Debug, Clone, Default)]
pub struct GaussianFactorGraph {
    factors: Vec<Option<JacobianFactor>>,
}

impl GaussianFactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slots(factors: Vec<Option<JacobianFactor>>) -> Self {
        GaussianFactorGraph { factors }
    }

    pub fn push(&mut self, factor: JacobianFactor) {
        self.factors.push(Some(factor));
    }

    pub fn push_null(&mut self) {
        self.factors.push(None);
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&JacobianFactor> {
        self.factors.get(index).and_then(|f| f.as_ref())
    }

    /// All slots, null ones included.
    pub fn iter(&self) -> impl Iterator<Item = Option<&JacobianFactor>> {
        self.factors.iter().map(|f| f.as_ref())
    }

    /// Non-null factors.
    pub fn factors(&self) -> impl Iterator<Item = &JacobianFactor> {
        self.factors.iter().flatten()
    }

    pub fn keys(&self) -> BTreeSet<Key> {
        self.factors().flat_map(|f| f.keys().iter().copied()).collect()
    }

    /// Total number of rows.
    pub fn rows(&self) -> usize {
        self.factors().map(|f| f.rows()).sum()
    }

    /// Column count of every variable, checked for consistency across factors.
    pub fn dims(&self) -> LinAlgResult<BTreeMap<Key, usize>> {
        let mut dims = BTreeMap::new();
        for factor in self.factors() {
            for (&key, block) in factor.keys().iter().zip(factor.blocks()) {
                let dim = *dims.entry(key).or_insert(block.ncols());
                if dim != block.ncols() {
                    return Err(LinAlgError::DimensionMismatch {
                        key,
                        expected: dim,
                        actual: block.ncols(),
                    });
                }
            }
        }
        Ok(dims)
    }

    /// `0.5 * Σ ||A_i x - b_i||²`
    pub fn error(&self, x: &VectorValues) -> LinAlgResult<f64> {
        self.factors().map(|f| f.error(x)).sum()
    }

    /// Copy of this graph with a `sqrt(λ) I` prior appended for every variable.
    pub fn damped(&self, lambda: f64) -> LinAlgResult<Self> {
        let dims = self.dims()?;
        let mut damped = self.clone();
        damped.factors.reserve(dims.len());
        for (key, dim) in dims {
            damped.push(JacobianFactor::damping(key, dim, lambda));
        }
        Ok(damped)
    }

    pub fn ordering(&self, ordering_type: OrderingType) -> Ordering {
        Ordering::from_scopes(ordering_type, self.factors().map(|f| f.keys()))
    }

    /// Keys of `ordering` that occur in this graph, in elimination order.
    ///
    /// Fails if a variable of the graph has no position in `ordering`.
    pub fn elimination_keys(&self, ordering: &Ordering) -> LinAlgResult<Vec<Key>> {
        let keys = self.keys();
        if let Some(missing) = keys.iter().find(|&&k| !ordering.contains(k)) {
            return Err(LinAlgError::InvalidOrdering(format!(
                "variable {missing} has no position"
            )));
        }
        Ok(ordering.iter().filter(|k| keys.contains(k)).collect())
    }
}

impl FromIterator<JacobianFactor> for GaussianFactorGraph {
    fn from_iter<I: IntoIterator<Item = JacobianFactor>>(iter: I) -> Self {
        GaussianFactorGraph {
            factors: iter.into_iter().map(Some).collect(),
        }
    }
}
