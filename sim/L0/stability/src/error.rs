//! Error types for guarded solves and policy construction.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What stopped a solve or inversion from producing a trustworthy result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InstabilityCause {
    /// Matrix is not square, or the right-hand side length does not match.
    DimensionMismatch,
    /// Matrix or right-hand side contains `NaN` or `Inf`.
    NonFiniteInput,
    /// The unregularized matrix is numerically rank-deficient.
    RankDeficient,
    /// Condition number after regularization is above the hard ceiling.
    ConditionCeiling,
    /// Factorization hit an exactly zero pivot.
    SingularPivot,
    /// The solve produced `NaN` or `Inf`.
    NonFiniteResult,
}

impl InstabilityCause {
    /// Whether the caller may reasonably retry (smaller step, stronger policy).
    ///
    /// Shape and input errors are programming errors and will fail again.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::DimensionMismatch | Self::NonFiniteInput)
    }
}

impl std::fmt::Display for InstabilityCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DimensionMismatch => write!(f, "dimension mismatch"),
            Self::NonFiniteInput => write!(f, "non-finite input"),
            Self::RankDeficient => write!(f, "rank-deficient matrix"),
            Self::ConditionCeiling => write!(f, "condition ceiling exceeded"),
            Self::SingularPivot => write!(f, "singular pivot"),
            Self::NonFiniteResult => write!(f, "non-finite result"),
        }
    }
}

/// The single failure a guarded solve or inversion can report.
///
/// Always carries the condition number that was being attempted when the
/// call gave up (`+inf` when the matrix was never estimated).
#[derive(Debug, Error, Clone, PartialEq)]
#[error("numerical instability ({cause}, condition number {condition_number:.3e}): {reason}")]
pub struct NumericalInstabilityError {
    /// Condition number of the matrix the call was working on.
    pub condition_number: f64,
    /// Category of the failure.
    pub cause: InstabilityCause,
    /// Human-readable description.
    pub reason: String,
}

impl NumericalInstabilityError {
    /// Create an instability error.
    #[must_use]
    pub fn new(cause: InstabilityCause, condition_number: f64, reason: impl Into<String>) -> Self {
        Self {
            condition_number,
            cause,
            reason: reason.into(),
        }
    }

    /// Create a dimension-mismatch error.
    #[must_use]
    pub fn dimension_mismatch(reason: impl Into<String>) -> Self {
        Self::new(InstabilityCause::DimensionMismatch, f64::INFINITY, reason)
    }

    /// Whether the caller may reasonably retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.cause.is_retryable()
    }
}

/// Errors raised when a [`RegularizationPolicy`](crate::RegularizationPolicy)
/// is built from invalid settings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    /// Floor regularization must be positive and finite.
    #[error("min_regularization must be positive and finite, got {0}")]
    InvalidMinRegularization(f64),

    /// Activation threshold must be finite and greater than one.
    #[error("max_condition_number must be finite and greater than 1, got {0}")]
    InvalidMaxConditionNumber(f64),

    /// Any other out-of-range setting.
    #[error("invalid policy parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Field name.
        name: &'static str,
        /// Description of the constraint that was violated.
        reason: String,
    },
}

impl PolicyError {
    /// Create an invalid-parameter error.
    #[must_use]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
