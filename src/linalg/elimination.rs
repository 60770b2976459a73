//! Dense QR elimination of a front, and the sequential solver built on it.
//!
//! Eliminating frontal variables `F` from the factors touching them stacks
//! their blocks into `[A_F | A_S | b]` and factors it with Householder QR:
//!
//! ```text
//! Q [A_F | A_S | b] = [ R   S   d ]   <- conditional on the separator
//!                     [ 0   A'  b']   <- new factor on the separator
//! ```

use crate::core::Key;
use crate::linalg::{
    DEFAULT_RANK_TOLERANCE, GaussianBayesNet, GaussianConditional, GaussianFactorGraph,
    JacobianFactor, LinAlgError, LinAlgResult, LinearSolver, Ordering, VectorValues,
};
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Eliminate `frontals` (in order) from `factors`.
///
/// Separator variables are laid out by their position in `ordering`. Returns
/// the conditional on the separator and the remaining factor on it. The
/// remaining factor is kept even when it has no rows so the separator keys
/// stay visible to later eliminations.
///
/// A frontal column whose QR pivot is at most `rank_tolerance` times its
/// column norm fails with [`LinAlgError::RankDeficiency`].
pub fn eliminate_front(
    factors: &[&JacobianFactor],
    frontals: &[Key],
    dims: &BTreeMap<Key, usize>,
    ordering: &Ordering,
    rank_tolerance: f64,
) -> LinAlgResult<(GaussianConditional, JacobianFactor)> {
    let dim_of = |key: Key| {
        dims.get(&key).copied().ok_or_else(|| {
            LinAlgError::InvalidOrdering(format!("variable {key} has no factors"))
        })
    };

    let mut separator: Vec<Key> = factors
        .iter()
        .flat_map(|f| f.keys().iter().copied())
        .filter(|k| !frontals.contains(k))
        .collect();
    separator.sort_by_key(|&k| (ordering.position(k), k));
    separator.dedup();

    let mut offsets = HashMap::new();
    let mut columns = 0;
    for &key in frontals.iter().chain(&separator) {
        offsets.insert(key, columns);
        columns += dim_of(key)?;
    }
    let n_f: usize = frontals.iter().map(|&k| dim_of(k)).sum::<LinAlgResult<usize>>()?;
    let rows: usize = factors.iter().map(|f| f.rows()).sum();

    let mut ab = DMatrix::<f64>::zeros(rows, columns + 1);
    let mut row = 0;
    for factor in factors {
        for (key, block) in factor.keys().iter().zip(factor.blocks()) {
            let col = offsets[key];
            ab.view_mut((row, col), block.shape()).copy_from(block);
        }
        ab.view_mut((row, columns), (factor.rows(), 1))
            .copy_from(factor.b());
        row += factor.rows();
    }

    let column_norms: Vec<f64> = (0..n_f).map(|j| ab.column(j).norm()).collect();
    let r = if rows > 0 {
        ab.qr().r()
    } else {
        DMatrix::zeros(0, columns + 1)
    };

    let mut deficient = Vec::new();
    for (j, &norm) in column_norms.iter().enumerate() {
        let pivot = if j < r.nrows() { r[(j, j)].abs() } else { 0.0 };
        if norm == 0.0 || pivot <= rank_tolerance * norm {
            let key = column_owner(frontals, dims, j);
            if !deficient.contains(&key) {
                deficient.push(key);
            }
        }
    }
    if !deficient.is_empty() {
        debug!("rank deficiency eliminating {:?}", deficient);
        return Err(LinAlgError::RankDeficiency { keys: deficient });
    }

    let n_s = columns - n_f;
    let with_dims = |keys: &[Key]| -> Vec<(Key, usize)> {
        keys.iter().map(|&k| (k, dims[&k])).collect()
    };
    let conditional = GaussianConditional::new(
        with_dims(frontals),
        with_dims(&separator),
        r.view((0, 0), (n_f, n_f)).upper_triangle(),
        r.view((0, n_f), (n_f, n_s)).into_owned(),
        r.view((0, columns), (n_f, 1)).column(0).into_owned(),
    )?;

    let remaining = r.nrows().saturating_sub(n_f);
    let mut blocks = Vec::with_capacity(separator.len());
    for &key in &separator {
        let block = r.view((n_f, offsets[&key]), (remaining, dims[&key]));
        blocks.push((key, block.into_owned()));
    }
    let b: DVector<f64> = r.view((n_f, columns), (remaining, 1)).column(0).into_owned();
    let factor = JacobianFactor::new(blocks, b)?;

    Ok((conditional, factor))
}

/// Frontal key owning stacked column `col`.
fn column_owner(frontals: &[Key], dims: &BTreeMap<Key, usize>, col: usize) -> Key {
    let mut offset = 0;
    for &key in frontals {
        offset += dims[&key];
        if col < offset {
            return key;
        }
    }
    frontals[frontals.len() - 1]
}

/// Eliminates one variable at a time in ordering order, then back-substitutes.
#[derive(Debug, Clone)]
pub struct SequentialSolver {
    rank_tolerance: f64,
}

impl SequentialSolver {
    pub fn new(rank_tolerance: f64) -> Self {
        SequentialSolver { rank_tolerance }
    }

    /// Eliminate every variable of `graph` into a Bayes net.
    pub fn eliminate(
        &self,
        graph: &GaussianFactorGraph,
        ordering: &Ordering,
    ) -> LinAlgResult<GaussianBayesNet> {
        let dims = graph.dims()?;
        let keys = graph.elimination_keys(ordering)?;

        let mut pool: Vec<Option<JacobianFactor>> = graph.factors().cloned().map(Some).collect();
        let mut involved: HashMap<Key, Vec<usize>> = HashMap::new();
        for (i, factor) in pool.iter().flatten().enumerate() {
            for &key in factor.keys() {
                involved.entry(key).or_default().push(i);
            }
        }

        let mut bayes_net = GaussianBayesNet::default();
        for key in keys {
            let gathered: Vec<JacobianFactor> = involved
                .remove(&key)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|i| pool[i].take())
                .collect();
            if gathered.is_empty() {
                return Err(LinAlgError::RankDeficiency { keys: vec![key] });
            }

            let refs: Vec<&JacobianFactor> = gathered.iter().collect();
            let (conditional, remaining) =
                eliminate_front(&refs, &[key], &dims, ordering, self.rank_tolerance)?;
            bayes_net.push(conditional);

            let index = pool.len();
            for &separator_key in remaining.keys() {
                involved.entry(separator_key).or_default().push(index);
            }
            pool.push(Some(remaining));
        }

        Ok(bayes_net)
    }
}

impl Default for SequentialSolver {
    fn default() -> Self {
        Self::new(DEFAULT_RANK_TOLERANCE)
    }
}

impl LinearSolver for SequentialSolver {
    fn solve(&self, graph: &GaussianFactorGraph, ordering: &Ordering) -> LinAlgResult<VectorValues> {
        self.eliminate(graph, ordering)?.back_substitute()
    }

    fn name(&self) -> &'static str {
        "Sequential QR"
    }
}
