//! Numerical-stability layer for small dense mass-matrix solves.
//!
//! Multi-body plants solve `M(q)·q̈ = τ − C(q,q̇)·q̇ − G(q)` once per step.
//! Near aligned-link configurations `M(q)` becomes ill-conditioned and a
//! naive inverse returns divergent or NaN accelerations. This crate guards
//! that solve:
//!
//! - [`ConditionEstimator`]: exact (SVD) or fast (power/inverse iteration)
//!   condition numbers
//! - [`AdaptiveRegularizer`]: `M + εI` with ε sized from the estimate and a
//!   [`RegularizationPolicy`]
//! - [`MatrixInverter`]: regularize, factor, solve, refine; typed
//!   [`NumericalInstabilityError`] on failure
//! - [`StabilityMonitor`]: per-owner counters and derived rates
//!
//! # Ownership
//!
//! Each dynamics model owns one [`MatrixInverter`], which owns its
//! regularizer and monitor. There is no global state, so independent
//! inverters can run on independent threads without locking.
//! [`SharedStabilityMonitor`] is available when several owners must feed one
//! set of counters.
//!
//! # Kernel Backends
//!
//! Factorizations run on heap `DMatrix` storage ([`KernelBackend::Dense`]) or,
//! for order-3 input, on stack `Matrix3` storage ([`KernelBackend::Static`]).
//! The `static-kernel` feature makes the static backend the default. Results
//! are identical either way.
//!
//! # Example
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use sim_stability::{InstabilityCause, MatrixInverter, RegularizationPolicy};
//!
//! let mut inverter = MatrixInverter::new(RegularizationPolicy::default());
//!
//! let m = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 0.5, 0.0, 0.5, 2.0]);
//! let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
//! let x = inverter.solve_linear_system(&m, &b).unwrap();
//! assert!((&m * &x - &b).norm() < 1e-10);
//!
//! // Two identical rows: rejected, never a normal-looking answer
//! let singular = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 0.0, 1.0, 1.0]);
//! let err = inverter.solve_linear_system(&singular, &b).unwrap_err();
//! assert_eq!(err.cause, InstabilityCause::RankDeficient);
//!
//! let stats = inverter.statistics();
//! assert_eq!(stats.total_inversions, 2);
//! assert_eq!(stats.failure_rate, 0.5);
//! ```
//!
//! # Logging
//!
//! Uses `tracing`: `warn` for failed calls, `debug` for adaptive
//! regularization and factorization fallbacks, `trace` for refinement.
//! No subscriber is installed here.

#![doc(html_root_url = "https://docs.rs/sim-stability/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod condition;
mod error;
mod inverter;
mod kernel;
mod linalg;
mod monitor;
mod policy;
mod regularizer;

pub use condition::{ConditionEstimate, ConditionEstimator};
pub use error::{InstabilityCause, NumericalInstabilityError, PolicyError};
pub use inverter::{MatrixInverter, MatrixStructure};
pub use kernel::KernelBackend;
pub use monitor::{InversionOutcome, MonitorStatistics, SharedStabilityMonitor, StabilityMonitor};
pub use policy::{EstimationMode, PolicyBuilder, RegularizationPolicy};
pub use regularizer::{AdaptiveRegularizer, Regularization};

use nalgebra::{DMatrix, DVector};

/// Result alias for guarded solves.
pub type Result<T> = std::result::Result<T, NumericalInstabilityError>;

/// One-shot guarded solve of `M·x = b` under `policy`.
///
/// Statistics of a one-shot call are discarded; keep a [`MatrixInverter`]
/// when they matter.
///
/// # Errors
///
/// See [`MatrixInverter::solve_linear_system`].
pub fn solve(
    m: &DMatrix<f64>,
    b: &DVector<f64>,
    policy: &RegularizationPolicy,
) -> Result<DVector<f64>> {
    MatrixInverter::new(policy.clone()).solve_linear_system(m, b)
}

/// One-shot guarded inverse of `M` under `policy`.
///
/// # Errors
///
/// See [`MatrixInverter::invert_matrix`].
pub fn invert(m: &DMatrix<f64>, policy: &RegularizationPolicy) -> Result<DMatrix<f64>> {
    MatrixInverter::new(policy.clone()).invert_matrix(m)
}

/// Statistics of a monitor.
#[must_use]
pub fn statistics(monitor: &StabilityMonitor) -> MonitorStatistics {
    monitor.statistics()
}
