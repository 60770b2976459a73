//! Integration tests for Gauss-Newton and Levenberg-Marquardt on small graphs.
//!
//! The strongly nonlinear unary factor `h(p) = [cos p.x, sin p.y]` exercises
//! slow (linear) convergence; the square pose graph exercises orderings,
//! solver backends and loop closures on SE(2).

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

mod test_utils;

use nalgebra::DVector;
use nlgraph::core::{FactorGraph, NoiseModel, Values};
use nlgraph::factors::{BetweenFactor, PriorFactor};
use nlgraph::linalg::{LinearSolverType, Ordering, OrderingType};
use nlgraph::manifold::{Point2, SE2};
use nlgraph::optimizer::{
    GaussNewtonOptimizer, LevenbergMarquardtOptimizer, LevenbergMarquardtParams,
    NonlinearOptimizer, NonlinearOptimizerParams, OptimizationStatus, OptimizerError,
    optimize_gauss_newton, optimize_levenberg_marquardt,
};
use test_utils::*;

fn tight_params() -> NonlinearOptimizerParams {
    NonlinearOptimizerParams::default()
        .with_relative_error_tol(1e-5)
        .with_absolute_error_tol(1e-5)
}

// ============================================================================
// Strongly nonlinear factor
// ============================================================================

#[test]
fn test_error_at_minimum_and_far_away() -> TestResult {
    let graph = really_nonlinear_graph();
    assert!(graph.error(&point_values(0.0, 0.0))?.abs() < 1e-12);
    // 0.5 * ((cos 3 - 1)² + sin² 3) / 0.01
    assert!((graph.error(&point_values(3.0, 3.0))? - 199.0).abs() < 1e-3);
    Ok(())
}

#[test]
fn test_gauss_newton_converges() -> TestResult {
    let graph = really_nonlinear_graph();
    let ordering = Ordering::from_keys([x(1)])?;
    let optimizer =
        GaussNewtonOptimizer::new(graph, point_values(3.0, 3.0), ordering, tight_params())?;
    let result = optimizer.optimize()?;

    assert!(result.final_error < 1e-5);
    assert!(result.final_error < result.initial_error);
    assert!(result.iterations > 1);
    assert!(result.final_lambda.is_none());
    Ok(())
}

#[test]
fn test_levenberg_marquardt_converges() -> TestResult {
    let graph = really_nonlinear_graph();
    let ordering = Ordering::from_keys([x(1)])?;
    let params = LevenbergMarquardtParams::default().with_base(tight_params());
    let optimizer =
        LevenbergMarquardtOptimizer::new(graph, point_values(3.0, 3.0), ordering, params)?;
    let result = optimizer.optimize()?;

    assert!(result.final_error < 1e-5);
    assert!(result.final_lambda.is_some());
    Ok(())
}

#[test]
fn test_convenience_functions_converge() -> TestResult {
    let graph = really_nonlinear_graph();

    let gn = optimize_gauss_newton(graph.clone(), point_values(3.0, 3.0))?;
    assert!(graph.error(&gn)? < 1e-5);

    let lm = optimize_levenberg_marquardt(graph.clone(), point_values(3.0, 3.0))?;
    assert!(graph.error(&lm)? < 1e-5);
    Ok(())
}

#[test]
fn test_null_factor_is_ignored() -> TestResult {
    let plain = really_nonlinear_graph();
    let mut with_null = really_nonlinear_graph();
    with_null.add_null();
    assert_eq!(with_null.len(), 2);

    let start = point_values(3.0, 3.0);
    assert_eq!(plain.error(&start)?, with_null.error(&start)?);

    let linear = with_null.linearize(&start)?;
    assert_eq!(linear.len(), 2);
    assert!(linear.get(1).is_none());

    let ordering = Ordering::from_keys([x(1)])?;
    let a = GaussNewtonOptimizer::new(plain, start.clone(), ordering.clone(), tight_params())?
        .optimize()?;
    let b = GaussNewtonOptimizer::new(with_null, start, ordering, tight_params())?.optimize()?;
    assert_eq!(a.iterations, b.iterations);
    assert!(a.values.equals(&b.values, 1e-12));
    Ok(())
}

#[test]
fn test_undamped_levenberg_marquardt_step_equals_gauss_newton() -> TestResult {
    let graph = really_nonlinear_graph();
    let ordering = Ordering::from_keys([x(1)])?;
    let start = point_values(3.0, 0.0);

    let gn = GaussNewtonOptimizer::new(
        graph.clone(),
        start.clone(),
        ordering.clone(),
        NonlinearOptimizerParams::default(),
    )?;
    let lm = LevenbergMarquardtOptimizer::new(
        graph,
        start,
        ordering,
        LevenbergMarquardtParams::default(),
    )?
    .with_lambda(0.0);

    let gn_next = gn.iterate()?;
    let lm_next = lm.iterate()?;
    assert!(lm_next.values().equals(gn_next.values(), 1e-9));
    assert!(lm_next.error() < lm.error());

    // x ← x - tan(x / 2), y stays at the minimum
    let p = lm_next.values().get::<Point2>(x(1))?;
    assert!((p.x - (3.0 - 1.5f64.tan())).abs() < 1e-9);
    assert!(p.y.abs() < 1e-12);
    Ok(())
}

#[test]
fn test_levenberg_marquardt_retries_after_overshoot() -> TestResult {
    // From x = 2.8 the Gauss-Newton step x - tan(x / 2) lands near -3.0,
    // past the far side of the cosine well.
    let graph = really_nonlinear_graph();
    let ordering = Ordering::from_keys([x(1)])?;
    let start = point_values(2.8, 0.0);

    let gn = GaussNewtonOptimizer::new(
        graph.clone(),
        start.clone(),
        ordering.clone(),
        NonlinearOptimizerParams::default(),
    )?;
    assert!(gn.iterate()?.error() > gn.error());

    // damped step is 65.06 / (11.22 + λ): rejected up to λ = 0.1, accepted at 1
    let params = LevenbergMarquardtParams::default().with_initial_lambda(1e-4);
    let lm = LevenbergMarquardtOptimizer::new(graph, start, ordering, params)?;
    let next = lm.iterate()?;

    assert!(next.error() < lm.error());
    assert_eq!(next.iterations(), 1);
    assert!((next.current_lambda() - 0.1).abs() < 1e-12);
    assert!(next.current_lambda() > 1e-4 / 10.0);

    let p = next.values().get::<Point2>(x(1))?;
    assert!(p.x > -2.8 && p.x < 2.8);
    assert!((p.x - 2.8).abs() > 1.0);
    assert!(p.y.abs() < 1e-12);
    Ok(())
}

// ============================================================================
// Pose graphs
// ============================================================================

#[test]
fn test_single_step_with_tight_prior() -> TestResult {
    let mut graph = FactorGraph::new();
    graph.add(PriorFactor::new(
        x(1),
        SE2::new(0.0, 0.0, 0.0),
        NoiseModel::isotropic(3, 1e-10)?,
    ));
    graph.add(BetweenFactor::new(
        x(1),
        x(2),
        SE2::new(1.0, 0.0, 0.0),
        NoiseModel::unit(3),
    ));

    let mut start = Values::new();
    start.insert(x(1), SE2::new(0.0, 0.0, 0.0))?;
    start.insert(x(2), SE2::new(1.5, 0.0, 0.0))?;

    let params = LevenbergMarquardtParams::default().with_base(
        NonlinearOptimizerParams::default().with_linear_solver_type(LinearSolverType::Sequential),
    );
    let optimizer =
        LevenbergMarquardtOptimizer::new(graph, start, Ordering::from_keys([x(1), x(2)])?, params)?;
    let next = optimizer.iterate()?;

    let x1 = next.values().get::<SE2>(x(1))?;
    let x2 = next.values().get::<SE2>(x(2))?;
    assert!(x1.x().abs() < 1e-9 && x1.y().abs() < 1e-9 && x1.theta().abs() < 1e-9);
    assert!((x2.x() - 1.0).abs() < 1e-5);
    assert!(x2.y().abs() < 1e-5);
    assert!(x2.theta().abs() < 1e-5);
    Ok(())
}

#[test]
fn test_ground_truth_is_a_fixed_point() -> TestResult {
    let graph = square_pose_graph(0.0);
    let truth = square_ground_truth();
    assert!(graph.error(&truth)? < 1e-20);

    let result = LevenbergMarquardtOptimizer::with_default_ordering(
        graph,
        truth.clone(),
        LevenbergMarquardtParams::default(),
    )?
    .optimize()?;
    assert!(result.values.equals(&truth, 1e-9));
    assert!(result.final_error < 1e-12);
    Ok(())
}

#[test]
fn test_single_iteration_at_optimum_keeps_values() -> TestResult {
    let graph = square_pose_graph(0.0);
    let truth = square_ground_truth();
    let ordering = graph.ordering(OrderingType::MinimumDegree);

    let gn = GaussNewtonOptimizer::new(
        graph.clone(),
        truth.clone(),
        ordering.clone(),
        NonlinearOptimizerParams::default(),
    )?
    .iterate()?;
    assert!(gn.values().equals(&truth, 1e-9));

    let lm = LevenbergMarquardtOptimizer::new(
        graph,
        truth.clone(),
        ordering,
        LevenbergMarquardtParams::default(),
    )?
    .with_lambda(0.0)
    .iterate()?;
    assert!(lm.values().equals(&truth, 1e-9));
    Ok(())
}

#[test]
fn test_square_recovered_from_perturbed_start() -> TestResult {
    let graph = square_pose_graph(0.0);
    let result = GaussNewtonOptimizer::with_default_ordering(
        graph,
        square_perturbed(),
        NonlinearOptimizerParams::default(),
    )?
    .optimize()?;
    assert!(result.final_error < 1e-10);
    assert!(result.values.equals(&square_ground_truth(), 1e-5));
    assert_ne!(result.status, OptimizationStatus::MaxIterationsReached);
    Ok(())
}

#[test]
fn test_result_independent_of_ordering_and_backend() -> TestResult {
    // Stretched odometry makes the loop inconsistent, so the optimum is not
    // the ground truth and has a positive error.
    let graph = square_pose_graph(0.05);
    let base = NonlinearOptimizerParams::default()
        .with_relative_error_tol(1e-14)
        .with_absolute_error_tol(1e-14);

    let natural = graph.ordering(OrderingType::Natural);
    let orderings = [
        natural.clone(),
        natural.reversed(),
        graph.ordering(OrderingType::MinimumDegree),
        Ordering::from_keys([x(3), x(1), x(4), x(2)])?,
    ];
    let backends = [
        LinearSolverType::Sequential,
        LinearSolverType::Multifrontal,
        LinearSolverType::SparseCholesky,
    ];

    let reference = GaussNewtonOptimizer::new(
        graph.clone(),
        square_perturbed(),
        natural.clone(),
        base.clone(),
    )?
    .optimize()?;
    assert!(reference.final_error > 1e-6);

    for ordering in &orderings {
        for backend in backends {
            let params = base.clone().with_linear_solver_type(backend);
            let result =
                GaussNewtonOptimizer::new(graph.clone(), square_perturbed(), ordering.clone(), params)?
                    .optimize()?;
            assert!(
                result.values.equals(&reference.values, 1e-6),
                "{backend} with ordering {ordering} diverged from the reference"
            );
            assert!((result.final_error - reference.final_error).abs() < 1e-9);
        }
    }
    Ok(())
}

#[test]
fn test_unanchored_graph_reports_rank_deficiency() -> TestResult {
    let mut graph = FactorGraph::new();
    graph.add(BetweenFactor::new(
        x(1),
        x(2),
        SE2::new(1.0, 0.0, 0.0),
        NoiseModel::unit(3),
    ));
    let mut start = Values::new();
    start.insert(x(1), SE2::new(0.0, 0.0, 0.0))?;
    start.insert(x(2), SE2::new(0.5, 0.0, 0.0))?;

    let params =
        NonlinearOptimizerParams::default().with_linear_solver_type(LinearSolverType::Sequential);
    let optimizer =
        GaussNewtonOptimizer::new(graph, start, Ordering::from_keys([x(1), x(2)])?, params)?;

    match optimizer.iterate() {
        Err(OptimizerError::RankDeficiency { keys, iteration }) => {
            assert_eq!(keys, vec![x(2)]);
            assert_eq!(iteration, 0);
        }
        other => panic!("expected rank deficiency, got {other:?}"),
    }
    assert!(matches!(
        optimizer.optimize(),
        Err(OptimizerError::RankDeficiency { iteration: 0, .. })
    ));
    Ok(())
}

#[test]
fn test_missing_variable_is_reported() {
    let graph = square_pose_graph(0.0);
    let mut partial = Values::new();
    for (i, pose) in square_poses().into_iter().take(3).enumerate() {
        partial.insert(x(i as u64 + 1), pose).unwrap();
    }
    let err = LevenbergMarquardtOptimizer::with_default_ordering(
        graph,
        partial,
        LevenbergMarquardtParams::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        OptimizerError::MissingVariable {
            key: x(4),
            iteration: 0
        }
    );
}

#[test]
fn test_diagonal_noise_weights_conflicting_priors() -> TestResult {
    // Each prior is tight in one coordinate only; the optimum is the
    // information-weighted mean per coordinate.
    let mut graph = FactorGraph::new();
    graph.add(PriorFactor::new(
        x(1),
        Point2::new(0.0, 0.0),
        NoiseModel::diagonal(DVector::from_vec(vec![0.1, 1.0]))?,
    ));
    graph.add(PriorFactor::new(
        x(1),
        Point2::new(1.0, 1.0),
        NoiseModel::diagonal(DVector::from_vec(vec![1.0, 0.1]))?,
    ));

    let values = optimize_gauss_newton(graph, point_values(5.0, -5.0))?;
    let p = values.get::<Point2>(x(1))?;
    assert!((p.x - 1.0 / 101.0).abs() < 1e-8);
    assert!((p.y - 100.0 / 101.0).abs() < 1e-8);
    Ok(())
}

#[test]
fn test_long_point_chain_with_multifrontal_solver() -> TestResult {
    // The elimination tree of an odometry chain is as deep as the chain.
    let n = 10_000u64;
    let mut graph = FactorGraph::new();
    graph.add(PriorFactor::new(x(0), Point2::new(0.0, 0.0), NoiseModel::unit(2)));
    let mut start = Values::new();
    start.insert(x(0), Point2::new(0.3, -0.2))?;
    for i in 1..n {
        graph.add(BetweenFactor::new(
            x(i - 1),
            x(i),
            Point2::new(1.0, 0.0),
            NoiseModel::unit(2),
        ));
        start.insert(x(i), Point2::new(i as f64 + 0.1, 0.05 * (i % 7) as f64))?;
    }

    let params = NonlinearOptimizerParams::default()
        .with_linear_solver_type(LinearSolverType::Multifrontal)
        .with_ordering_type(OrderingType::Natural);
    let result = GaussNewtonOptimizer::with_default_ordering(graph, start, params)?.optimize()?;

    assert!(result.final_error < 1e-12);
    let last = result.values.get::<Point2>(x(n - 1))?;
    assert!((last.x - (n - 1) as f64).abs() < 1e-6);
    assert!(last.y.abs() < 1e-6);
    Ok(())
}
