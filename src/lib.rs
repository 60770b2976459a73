//! Nonlinear least-squares optimization on factor graphs.
//!
//! A [`FactorGraph`] holds residual terms ([`Factor`]s) over manifold-valued
//! variables stored in [`Values`]. Optimizers linearize the graph at the current
//! estimate, solve the sparse linear system by variable elimination, and
//! retract the estimate along the solution:
//!
//! ```text
//! Values ──linearize──▶ GaussianFactorGraph ──eliminate(Ordering)──▶ VectorValues
//!   ▲                                                                   │
//!   └──────────────────────────── retract ◀─────────────────────────────┘
//! ```
//!
//! # Example
//! ```no_run
//! use nlgraph::core::{FactorGraph, Key, NoiseModel, Values};
//! use nlgraph::factors::{BetweenFactor, PriorFactor};
//! use nlgraph::manifold::SE2;
//! use nlgraph::optimizer::optimize_levenberg_marquardt;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (x1, x2) = (Key::symbol('x', 1), Key::symbol('x', 2));
//! let noise = NoiseModel::isotropic(3, 0.1)?;
//!
//! let mut graph = FactorGraph::new();
//! graph.add(PriorFactor::new(x1, SE2::new(0.0, 0.0, 0.0), noise.clone()));
//! graph.add(BetweenFactor::new(x1, x2, SE2::new(1.0, 0.0, 0.1), noise));
//!
//! let mut initial = Values::new();
//! initial.insert(x1, SE2::new(0.1, 0.1, 0.0))?;
//! initial.insert(x2, SE2::new(0.8, -0.2, 0.3))?;
//!
//! let result = optimize_levenberg_marquardt(graph, initial)?;
//! println!("{:?}", result.get::<SE2>(x2)?);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod factors;
pub mod linalg;
pub mod logger;
pub mod manifold;
pub mod optimizer;

pub use crate::core::{Factor, FactorGraph, Key, NoiseModel, Values};
pub use error::{NlGraphError, NlGraphResult};
pub use linalg::{LinearSolverType, Ordering, OrderingType, VectorValues};
pub use logger::{init_logger, init_logger_with_level};
pub use optimizer::{
    GaussNewtonOptimizer, LevenbergMarquardtOptimizer, LevenbergMarquardtParams,
    NonlinearOptimizer, NonlinearOptimizerParams, OptimizationResult, OptimizationStatus,
};
