//! Error types for the nlgraph library
//!
//! Each module reports failures through its own `thiserror` enum. This module
//! gathers them into [`NlGraphError`] for callers that only want one error type.

use crate::{
    core::CoreError, linalg::LinAlgError, manifold::ManifoldError, optimizer::OptimizerError,
};
use thiserror::Error;

/// Main result type used throughout the nlgraph library
pub type NlGraphResult<T> = Result<T, NlGraphError>;

/// Main error type for the nlgraph library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NlGraphError {
    /// Manifold operations errors
    #[error("Manifold error: {0}")]
    Manifold(#[from] ManifoldError),

    /// Graph construction and evaluation errors
    #[error("Factor graph error: {0}")]
    Core(#[from] CoreError),

    /// Linear algebra related errors
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(#[from] LinAlgError),

    /// Optimizer errors, tagged with the failing iteration
    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Key;

    #[test]
    fn test_error_display() {
        let error = NlGraphError::from(LinAlgError::InvalidOrdering("x1 twice".to_string()));
        assert_eq!(
            error.to_string(),
            "Linear algebra error: Invalid ordering: x1 twice"
        );
    }

    #[test]
    fn test_question_mark_conversion() {
        fn lookup() -> NlGraphResult<()> {
            let lookup: Result<(), CoreError> = Err(CoreError::MissingVariable(Key::symbol('x', 7)));
            lookup?;
            Ok(())
        }

        match lookup() {
            Err(NlGraphError::Core(CoreError::MissingVariable(key))) => {
                assert_eq!(key, Key::symbol('x', 7))
            }
            other => panic!("Expected missing variable, got {other:?}"),
        }
    }

    #[test]
    fn test_optimizer_error_keeps_iteration() {
        let error: NlGraphError = OptimizerError::NoProgress {
            iteration: 3,
            lambda: 1e5,
        }
        .into();
        assert!(error.to_string().contains("Iteration 3"));
    }
}
