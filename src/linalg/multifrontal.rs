//! Multifrontal QR elimination.
//!
//! Symbolic elimination first builds the elimination tree: each factor is
//! assigned to its earliest variable in the ordering, and each variable's
//! parent is the earliest variable of its separator. Chains whose separators
//! nest exactly (`sep(j-1) = {j} ∪ sep(j)`, single child) are merged into one
//! front, eliminated with a single QR. Fronts are then eliminated level by
//! level from the leaves up: fronts of one level share no variables, so each
//! level runs in parallel, and a parent gathers its children's separator
//! factors in child order. The walk is a loop, so a long chain costs no stack.

use crate::core::Key;
use crate::linalg::{
    DEFAULT_RANK_TOLERANCE, GaussianBayesNet, GaussianFactorGraph,
    JacobianFactor, LinAlgResult, LinearSolver, Ordering, VectorValues, eliminate_front,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A front: consecutive variables eliminated together.
#[derive(Debug, Clone)]
struct Front {
    /// Positions of the frontal variables, ascending.
    frontals: Vec<usize>,
    /// Indices of the graph factors assigned to this front.
    factors: Vec<usize>,
    children: Vec<usize>,
}

/// Elimination tree of fronts over one graph and ordering.
#[derive(Debug, Clone)]
pub struct EliminationTree {
    keys: Vec<Key>,
    fronts: Vec<Front>,
    roots: Vec<usize>,
}

impl EliminationTree {
    /// Symbolic elimination of `graph` under `ordering`.
    pub fn new(graph: &GaussianFactorGraph, ordering: &Ordering) -> LinAlgResult<Self> {
        let keys = graph.elimination_keys(ordering)?;
        let position: BTreeMap<Key, usize> = keys.iter().enumerate().map(|(i, &k)| (k, i)).collect();
        let n = keys.len();

        let factors: Vec<&JacobianFactor> = graph.factors().collect();
        let mut assigned: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut scopes: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for (i, factor) in factors.iter().enumerate() {
            let scope: BTreeSet<usize> = factor.keys().iter().map(|k| position[k]).collect();
            if let Some(&first) = scope.first() {
                assigned[first].push(i);
                scopes[first].extend(scope);
            }
        }

        let mut separators: Vec<BTreeSet<usize>> = Vec::with_capacity(n);
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        for j in 0..n {
            let mut separator = std::mem::take(&mut scopes[j]);
            separator.remove(&j);
            if let Some(&p) = separator.first() {
                parent[j] = Some(p);
                children[p].push(j);
                scopes[p].extend(separator.iter().copied().filter(|&s| s != p));
            }
            separators.push(separator);
        }

        let mut fronts: Vec<Front> = Vec::new();
        let mut front_of = vec![0; n];
        for j in 0..n {
            let merge = match children[j].as_slice() {
                [c] => *c + 1 == j && separators[*c].len() == separators[j].len() + 1,
                _ => false,
            };
            if merge {
                let front = front_of[j - 1];
                fronts[front].frontals.push(j);
                fronts[front].factors.extend(assigned[j].iter().copied());
                front_of[j] = front;
            } else {
                front_of[j] = fronts.len();
                fronts.push(Front {
                    frontals: vec![j],
                    factors: assigned[j].clone(),
                    children: children[j].iter().map(|&c| front_of[c]).collect(),
                });
            }
        }

        let roots = (0..n)
            .filter(|&j| parent[j].is_none())
            .map(|j| front_of[j])
            .collect();

        Ok(EliminationTree {
            keys,
            fronts,
            roots,
        })
    }

    pub fn num_fronts(&self) -> usize {
        self.fronts.len()
    }

    pub fn num_roots(&self) -> usize {
        self.roots.len()
    }

    /// Fronts grouped by height above the leaves, lowest first.
    ///
    /// Children are created before their parents, so one forward pass over
    /// the fronts computes every height.
    fn levels(&self) -> Vec<Vec<usize>> {
        let mut height = vec![0usize; self.fronts.len()];
        let mut levels: Vec<Vec<usize>> = Vec::new();
        for (index, front) in self.fronts.iter().enumerate() {
            let h = front
                .children
                .iter()
                .map(|&child| height[child] + 1)
                .max()
                .unwrap_or(0);
            height[index] = h;
            if levels.len() <= h {
                levels.resize_with(h + 1, Vec::new);
            }
            levels[h].push(index);
        }
        levels
    }

    /// Frontal keys of every front, in creation order.
    pub fn front_keys(&self) -> Vec<Vec<Key>> {
        self.fronts
            .iter()
            .map(|front| front.frontals.iter().map(|&p| self.keys[p]).collect())
            .collect()
    }
}

/// Eliminates fronts of the elimination tree bottom-up, one level at a time.
#[derive(Debug, Clone)]
pub struct MultifrontalSolver {
    rank_tolerance: f64,
}

impl MultifrontalSolver {
    pub fn new(rank_tolerance: f64) -> Self {
        MultifrontalSolver { rank_tolerance }
    }

    /// Eliminate every variable of `graph` into a Bayes net.
    ///
    /// Conditionals come out ordered by front height, so every front follows
    /// all of its descendants.
    pub fn eliminate(
        &self,
        graph: &GaussianFactorGraph,
        ordering: &Ordering,
    ) -> LinAlgResult<GaussianBayesNet> {
        let dims = graph.dims()?;
        let tree = EliminationTree::new(graph, ordering)?;
        debug!(
            "elimination tree: {} variables, {} fronts, {} roots",
            tree.keys.len(),
            tree.num_fronts(),
            tree.num_roots()
        );

        let factors: Vec<&JacobianFactor> = graph.factors().collect();
        let frontals: Vec<Vec<Key>> = tree.front_keys();

        // Fronts of equal height share no ancestor relation, so each level is
        // eliminated in parallel once the level below it is done.
        let levels = tree.levels();
        let mut passed_up: Vec<Option<JacobianFactor>> = vec![None; tree.num_fronts()];
        let mut conditionals = Vec::with_capacity(tree.num_fronts());
        for level in levels {
            let work: Vec<(usize, Vec<JacobianFactor>)> = level
                .into_iter()
                .map(|front_index| {
                    let from_children = tree.fronts[front_index]
                        .children
                        .iter()
                        .filter_map(|&child| passed_up[child].take())
                        .collect();
                    (front_index, from_children)
                })
                .collect();

            let eliminated = work
                .into_par_iter()
                .map(|(front_index, from_children)| {
                    let gathered: Vec<&JacobianFactor> = tree.fronts[front_index]
                        .factors
                        .iter()
                        .map(|&i| factors[i])
                        .chain(from_children.iter())
                        .collect();
                    let (conditional, separator_factor) = eliminate_front(
                        &gathered,
                        &frontals[front_index],
                        &dims,
                        ordering,
                        self.rank_tolerance,
                    )?;
                    Ok((front_index, conditional, separator_factor))
                })
                .collect::<LinAlgResult<Vec<_>>>()?;

            for (front_index, conditional, separator_factor) in eliminated {
                conditionals.push(conditional);
                passed_up[front_index] = Some(separator_factor);
            }
        }
        Ok(GaussianBayesNet::new(conditionals))
    }
}

impl Default for MultifrontalSolver {
    fn default() -> Self {
        Self::new(DEFAULT_RANK_TOLERANCE)
    }
}

impl LinearSolver for MultifrontalSolver {
    fn solve(&self, graph: &GaussianFactorGraph, ordering: &Ordering) -> LinAlgResult<VectorValues> {
        self.eliminate(graph, ordering)?.back_substitute()
    }

    fn name(&self) -> &'static str {
        "Multifrontal QR"
    }
}
