//! Gaussian conditionals produced by elimination.

use crate::core::Key;
use crate::linalg::{LinAlgError, LinAlgResult, VectorValues};
use nalgebra::{DMatrix, DVector};

/// `R x_F + S x_S = d` with `R` upper triangular.
///
/// `x_F` stacks the frontal variables, `x_S` the parents (separator), each in
/// the order of their key lists.
#[derive(Debug, Clone)]
pub struct GaussianConditional {
    frontals: Vec<(Key, usize)>,
    parents: Vec<(Key, usize)>,
    r: DMatrix<f64>,
    s: DMatrix<f64>,
    d: DVector<f64>,
}

impl GaussianConditional {
    pub fn new(
        frontals: Vec<(Key, usize)>,
        parents: Vec<(Key, usize)>,
        r: DMatrix<f64>,
        s: DMatrix<f64>,
        d: DVector<f64>,
    ) -> LinAlgResult<Self> {
        let n_f: usize = frontals.iter().map(|(_, dim)| dim).sum();
        let n_s: usize = parents.iter().map(|(_, dim)| dim).sum();
        if r.shape() != (n_f, n_f) || s.shape() != (n_f, n_s) || d.len() != n_f {
            return Err(LinAlgError::InvalidFactor(format!(
                "conditional shapes R {:?}, S {:?}, d {} do not match {n_f} frontal and {n_s} parent columns",
                r.shape(),
                s.shape(),
                d.len()
            )));
        }
        Ok(GaussianConditional {
            frontals,
            parents,
            r,
            s,
            d,
        })
    }

    pub fn frontals(&self) -> impl Iterator<Item = Key> + '_ {
        self.frontals.iter().map(|(key, _)| *key)
    }

    pub fn parents(&self) -> impl Iterator<Item = Key> + '_ {
        self.parents.iter().map(|(key, _)| *key)
    }

    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    pub fn s(&self) -> &DMatrix<f64> {
        &self.s
    }

    pub fn d(&self) -> &DVector<f64> {
        &self.d
    }

    /// Solve for the frontals given the parents already in `solution`, and
    /// insert them.
    pub fn solve_into(&self, solution: &mut VectorValues) -> LinAlgResult<()> {
        let mut rhs = self.d.clone();
        let mut offset = 0;
        for &(key, dim) in &self.parents {
            let parent = solution.get(key).ok_or(LinAlgError::MissingDelta(key))?;
            rhs -= self.s.columns(offset, dim) * parent;
            offset += dim;
        }

        let x = self.r.solve_upper_triangular(&rhs).ok_or_else(|| {
            LinAlgError::RankDeficiency {
                keys: self.frontals().collect(),
            }
        })?;

        let mut offset = 0;
        for &(key, dim) in &self.frontals {
            solution.insert(key, x.rows(offset, dim).into_owned());
            offset += dim;
        }
        Ok(())
    }
}

/// Conditionals in elimination order. Every conditional's parents are
/// frontals of conditionals later in the sequence.
#[derive(Debug, Clone, Default)]
pub struct GaussianBayesNet {
    conditionals: Vec<GaussianConditional>,
}

impl GaussianBayesNet {
    pub fn new(conditionals: Vec<GaussianConditional>) -> Self {
        GaussianBayesNet { conditionals }
    }

    pub fn push(&mut self, conditional: GaussianConditional) {
        self.conditionals.push(conditional);
    }

    pub fn len(&self) -> usize {
        self.conditionals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    pub fn conditionals(&self) -> &[GaussianConditional] {
        &self.conditionals
    }

    /// Back-substitution, last conditional first.
    pub fn back_substitute(&self) -> LinAlgResult<VectorValues> {
        let mut solution = VectorValues::new();
        for conditional in self.conditionals.iter().rev() {
            conditional.solve_into(&mut solution)?;
        }
        Ok(solution)
    }
}
