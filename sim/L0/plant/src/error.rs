//! Error types for plant evaluation.

use sim_stability::NumericalInstabilityError;
use thiserror::Error;

/// Errors raised by plant models and the matrix adapter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlantError {
    /// Physical parameters are out of range.
    #[error("invalid plant parameters: {reason}")]
    InvalidParameters {
        /// Description of the violated constraint.
        reason: String,
    },

    /// A state, control or batch input has the wrong length.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The guarded mass-matrix solve failed.
    #[error(transparent)]
    Instability(#[from] NumericalInstabilityError),
}

impl PlantError {
    /// Create an invalid-parameters error.
    #[must_use]
    pub fn invalid_parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            reason: reason.into(),
        }
    }

    /// Create a dimension-mismatch error.
    #[must_use]
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// The underlying instability error, if this is one.
    #[must_use]
    pub fn instability(&self) -> Option<&NumericalInstabilityError> {
        match self {
            Self::Instability(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the caller may retry (smaller step, stronger policy).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.instability()
            .is_some_and(NumericalInstabilityError::is_retryable)
    }
}
