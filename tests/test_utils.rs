//! Shared graphs and factors for the integration tests.

#![allow(dead_code)]

use nalgebra::{DMatrix, DVector};
use nlgraph::core::{CoreResult, Factor, FactorGraph, Key, NoiseModel, Values};
use nlgraph::factors::{BetweenFactor, PriorFactor};
use nlgraph::linalg::{GaussianFactorGraph, JacobianFactor};
use nlgraph::manifold::{Point2, SE2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::FRAC_PI_2;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn x(i: u64) -> Key {
    Key::symbol('x', i)
}

/// Unary factor on a 2D point with `h(p) = [cos p.x, sin p.y]`, measured
/// `z = [1, 0]`, σ = 0.1. Minimum error 0 at the origin; the x Jacobian
/// vanishes there, so convergence in x is only linear.
#[derive(Debug)]
pub struct ReallyNonlinearFactor {
    keys: [Key; 1],
    noise_model: NoiseModel,
}

impl ReallyNonlinearFactor {
    pub fn new(key: Key) -> Self {
        Self {
            keys: [key],
            noise_model: NoiseModel::isotropic(2, 0.1).expect("valid sigma"),
        }
    }
}

impl Factor for ReallyNonlinearFactor {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn noise_model(&self) -> &NoiseModel {
        &self.noise_model
    }

    fn unwhitened_error(
        &self,
        values: &Values,
        jacobians: Option<&mut [DMatrix<f64>]>,
    ) -> CoreResult<DVector<f64>> {
        let p = values.get::<Point2>(self.keys[0])?;
        if let Some(jacobians) = jacobians {
            jacobians[0] = DMatrix::from_row_slice(2, 2, &[-p.x.sin(), 0.0, 0.0, p.y.cos()]);
        }
        Ok(DVector::from_vec(vec![p.x.cos() - 1.0, p.y.sin()]))
    }
}

pub fn really_nonlinear_graph() -> FactorGraph {
    let mut graph = FactorGraph::new();
    graph.add(ReallyNonlinearFactor::new(x(1)));
    graph
}

pub fn point_values(px: f64, py: f64) -> Values {
    let mut values = Values::new();
    values
        .insert(x(1), Point2::new(px, py))
        .expect("fresh key");
    values
}

/// Ground truth of a unit square traversed counter-clockwise.
pub fn square_poses() -> Vec<SE2> {
    vec![
        SE2::new(0.0, 0.0, 0.0),
        SE2::new(1.0, 0.0, FRAC_PI_2),
        SE2::new(1.0, 1.0, 2.0 * FRAC_PI_2),
        SE2::new(0.0, 1.0, -FRAC_PI_2),
    ]
}

/// Prior on x1, odometry around the square and a loop closure x4 -> x1.
///
/// With `bias` non-zero every odometry measurement is stretched by it, so the
/// optimum has a positive error.
pub fn square_pose_graph(bias: f64) -> FactorGraph {
    let noise = NoiseModel::diagonal(DVector::from_vec(vec![0.1, 0.1, 0.05])).expect("valid sigmas");
    let step = SE2::new(1.0 + bias, 0.0, FRAC_PI_2);
    let mut graph = FactorGraph::new();
    graph.add(PriorFactor::new(x(1), SE2::new(0.0, 0.0, 0.0), noise.clone()));
    for i in 1..4 {
        graph.add(BetweenFactor::new(x(i), x(i + 1), step.clone(), noise.clone()));
    }
    graph.add(BetweenFactor::new(x(4), x(1), step, noise));
    graph
}

pub fn square_ground_truth() -> Values {
    let mut values = Values::new();
    for (i, pose) in square_poses().into_iter().enumerate() {
        values.insert(x(i as u64 + 1), pose).expect("fresh key");
    }
    values
}

pub fn square_perturbed() -> Values {
    let offsets = [
        (0.1, -0.05, 0.02),
        (-0.15, 0.1, -0.1),
        (0.2, -0.1, 0.15),
        (-0.1, 0.2, -0.05),
    ];
    let mut values = Values::new();
    for (i, (pose, (dx, dy, dt))) in square_poses().into_iter().zip(offsets).enumerate() {
        let perturbed = SE2::new(pose.x() + dx, pose.y() + dy, pose.theta() + dt);
        values.insert(x(i as u64 + 1), perturbed).expect("fresh key");
    }
    values
}

/// Random well-posed linear system: a unary factor on every variable plus
/// `extra` random binary factors, variable dimensions in 1..=3.
pub fn random_linear_system(seed: u64, variables: usize, extra: usize) -> GaussianFactorGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let dims: Vec<usize> = (0..variables).map(|_| rng.random_range(1..=3)).collect();
    let mut graph = GaussianFactorGraph::new();

    let block = |rng: &mut StdRng, rows: usize, cols: usize| {
        DMatrix::from_fn(rows, cols, |_, _| rng.random_range(-1.0..1.0))
    };
    let rhs = |rng: &mut StdRng, rows: usize| {
        DVector::from_fn(rows, |_, _| rng.random_range(-2.0..2.0))
    };

    for (i, &dim) in dims.iter().enumerate() {
        let a = block(&mut rng, dim, dim) + DMatrix::identity(dim, dim) * 3.0;
        let b = rhs(&mut rng, dim);
        graph.push(JacobianFactor::new(vec![(x(i as u64), a)], b).expect("consistent rows"));
    }

    let connect = |rng: &mut StdRng, i: usize, j: usize| {
        let rows = dims[i].max(dims[j]);
        let a_i = block(rng, rows, dims[i]);
        let a_j = block(rng, rows, dims[j]);
        let b = rhs(rng, rows);
        JacobianFactor::new(vec![(x(i as u64), a_i), (x(j as u64), a_j)], b)
            .expect("consistent rows")
    };

    for i in 1..variables {
        graph.push(connect(&mut rng, i - 1, i));
    }
    for _ in 0..extra {
        let i = rng.random_range(0..variables);
        let j = rng.random_range(0..variables);
        if i != j {
            graph.push(connect(&mut rng, i, j));
        }
    }
    graph
}
