use std::collections::HashMap;
use std::ops::Mul;

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::{SparseColMat, Triplet};
use faer::{Mat, Side};
use nalgebra::DVector;
use tracing::debug;

use crate::linalg::{
    GaussianFactorGraph, LinAlgError, LinAlgResult, LinearSolver, Ordering, VectorValues,
};

/// Solves the normal equations `JᵀJ x = Jᵀb` of the stacked whitened
/// Jacobian with faer's sparse LLᵀ. Columns follow the elimination ordering.
///
/// Fails with [`LinAlgError::Factorization`] when `JᵀJ` is not positive
/// definite; unlike elimination it cannot name the offending variable.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver;

impl SparseCholeskySolver {
    pub fn new() -> Self {
        SparseCholeskySolver
    }
}

impl LinearSolver for SparseCholeskySolver {
    fn solve(&self, graph: &GaussianFactorGraph, ordering: &Ordering) -> LinAlgResult<VectorValues> {
        let dims = graph.dims()?;
        let keys = graph.elimination_keys(ordering)?;

        let mut offsets = HashMap::with_capacity(keys.len());
        let mut cols = 0;
        for &key in &keys {
            offsets.insert(key, cols);
            cols += dims[&key];
        }
        let rows = graph.rows();

        let mut triplets = Vec::new();
        let mut rhs = Mat::<f64>::zeros(rows, 1);
        let mut row = 0;
        for factor in graph.factors() {
            for (key, block) in factor.keys().iter().zip(factor.blocks()) {
                let col = offsets[key];
                for c in 0..block.ncols() {
                    for r in 0..block.nrows() {
                        let value = block[(r, c)];
                        if value != 0.0 {
                            triplets.push(Triplet::new(row + r, col + c, value));
                        }
                    }
                }
            }
            for r in 0..factor.rows() {
                rhs[(row + r, 0)] = factor.b()[r];
            }
            row += factor.rows();
        }

        let jacobian = SparseColMat::<usize, f64>::try_new_from_triplets(rows, cols, &triplets)
            .map_err(|e| LinAlgError::Factorization(format!("Jacobian assembly failed: {e:?}")))?;
        let jt = jacobian
            .transpose()
            .to_col_major()
            .map_err(|e| LinAlgError::Factorization(format!("transpose failed: {e:?}")))?;
        let hessian = jt.mul(&jacobian);
        let gradient = jacobian.transpose().mul(&rhs);
        debug!(
            "sparse Cholesky: {}x{} Jacobian, {} non-zeros",
            rows,
            cols,
            triplets.len()
        );

        let symbolic = SymbolicLlt::try_new(hessian.symbolic(), Side::Lower).map_err(|e| {
            LinAlgError::Factorization(format!("symbolic Cholesky failed: {e:?}"))
        })?;
        let llt = Llt::try_new_with_symbolic(symbolic, hessian.as_ref(), Side::Lower)
            .map_err(|e| LinAlgError::Factorization(format!("Cholesky failed: {e:?}")))?;
        let x = llt.solve(&gradient);

        let mut solution = VectorValues::new();
        for key in keys {
            let offset = offsets[&key];
            let dim = dims[&key];
            solution.insert(key, DVector::from_fn(dim, |i, _| x[(offset + i, 0)]));
        }
        Ok(solution)
    }

    fn name(&self) -> &'static str {
        "Sparse Cholesky"
    }
}
