//! Guarded linear solves and inversions.
//!
//! Pipeline per call:
//!
//! 1. Shape and finiteness checks on `M` and the right-hand side.
//! 2. Condition estimate of `M` in the policy's mode.
//! 3. Rank check on the unregularized matrix (relative LU pivot).
//! 4. Regularization `M + εI`.
//! 5. Post-regularization condition check against the hard ceiling.
//! 6. Factorization (Cholesky for declared SPD input, LU otherwise).
//! 7. Solve, then optional iterative refinement against the original `M`.
//! 8. Finiteness check on the result.
//!
//! Each call records exactly one [`InversionOutcome`] in the owning
//! [`StabilityMonitor`], on success and on every failure path.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, trace, warn};

use crate::error::{InstabilityCause, NumericalInstabilityError};
use crate::kernel::{FactorMethod, Factorization, KernelBackend};
use crate::monitor::{InversionOutcome, MonitorStatistics, StabilityMonitor};
use crate::policy::RegularizationPolicy;
use crate::regularizer::AdaptiveRegularizer;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the caller guarantees about the matrices it passes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MatrixStructure {
    /// No structure assumed; LU with partial pivoting.
    #[default]
    General,
    /// Symmetric positive definite (mass matrices); Cholesky first.
    SymmetricPositiveDefinite,
}

/// Failed call: the error for the caller plus the outcome for the monitor.
struct Rejection {
    error: NumericalInstabilityError,
    outcome: InversionOutcome,
}

impl Rejection {
    /// Failure before any condition estimate was taken.
    fn unestimated(error: NumericalInstabilityError) -> Self {
        Self {
            error,
            outcome: InversionOutcome::failure(f64::INFINITY, false, 0.0),
        }
    }
}

/// Regularizing solver that owns its statistics.
///
/// One instance per dynamics model (or per worker thread). Methods take
/// `&mut self` because every call updates the monitor.
#[derive(Debug, Clone, Default)]
pub struct MatrixInverter {
    regularizer: AdaptiveRegularizer,
    monitor: StabilityMonitor,
    structure: MatrixStructure,
    backend: KernelBackend,
    last_outcome: Option<InversionOutcome>,
}

impl MatrixInverter {
    /// Create an inverter for general matrices on the default backend.
    #[must_use]
    pub fn new(policy: RegularizationPolicy) -> Self {
        Self {
            regularizer: AdaptiveRegularizer::new(policy),
            ..Self::default()
        }
    }

    /// Select the kernel backend.
    #[must_use]
    pub fn with_backend(mut self, backend: KernelBackend) -> Self {
        self.regularizer = self.regularizer.with_backend(backend);
        self.backend = backend;
        self
    }

    /// Declare the structure of incoming matrices.
    #[must_use]
    pub fn with_structure(mut self, structure: MatrixStructure) -> Self {
        self.structure = structure;
        self
    }

    /// Replace the monitor (e.g. one with history enabled).
    #[must_use]
    pub fn with_monitor(mut self, monitor: StabilityMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Policy in effect.
    #[must_use]
    pub fn policy(&self) -> &RegularizationPolicy {
        self.regularizer.policy()
    }

    /// The regularizer used on every call.
    #[must_use]
    pub fn regularizer(&self) -> &AdaptiveRegularizer {
        &self.regularizer
    }

    /// The owned monitor.
    #[must_use]
    pub fn monitor(&self) -> &StabilityMonitor {
        &self.monitor
    }

    /// Declared matrix structure.
    #[must_use]
    pub fn structure(&self) -> MatrixStructure {
        self.structure
    }

    /// Kernel backend in use.
    #[must_use]
    pub fn backend(&self) -> KernelBackend {
        self.backend
    }

    /// Statistics over every call so far.
    #[must_use]
    pub fn statistics(&self) -> MonitorStatistics {
        self.monitor.statistics()
    }

    /// Outcome of the most recent call, if any since the last reset.
    #[must_use]
    pub fn last_outcome(&self) -> Option<InversionOutcome> {
        self.last_outcome
    }

    /// Zero the monitor. The policy is untouched.
    pub fn reset_statistics(&mut self) {
        self.monitor.reset();
        self.last_outcome = None;
    }

    /// Solve `M·x = b`. Preferred over [`invert_matrix`](Self::invert_matrix).
    ///
    /// # Errors
    ///
    /// Returns [`NumericalInstabilityError`] when the input is malformed,
    /// rank-deficient, still too ill-conditioned after regularization, or the
    /// solve produces non-finite values.
    pub fn solve_linear_system(
        &mut self,
        m: &DMatrix<f64>,
        b: &DVector<f64>,
    ) -> Result<DVector<f64>, NumericalInstabilityError> {
        let rhs = DMatrix::from_column_slice(b.len(), 1, b.as_slice());
        let x = self.solve_columns(m, rhs)?;
        Ok(x.column(0).into_owned())
    }

    /// Explicit inverse of `M`, for diagnostics.
    ///
    /// # Errors
    ///
    /// Same conditions as [`solve_linear_system`](Self::solve_linear_system).
    pub fn invert_matrix(
        &mut self,
        m: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, NumericalInstabilityError> {
        let n = m.nrows();
        self.solve_columns(m, DMatrix::identity(n, n))
    }

    fn solve_columns(
        &mut self,
        m: &DMatrix<f64>,
        rhs: DMatrix<f64>,
    ) -> Result<DMatrix<f64>, NumericalInstabilityError> {
        match self.try_solve(m, rhs) {
            Ok((x, outcome)) => {
                self.record(outcome);
                Ok(x)
            }
            Err(Rejection { error, outcome }) => {
                warn!(
                    cause = %error.cause,
                    condition_number = error.condition_number,
                    "guarded solve failed: {}",
                    error.reason
                );
                self.record(outcome);
                Err(error)
            }
        }
    }

    fn record(&mut self, outcome: InversionOutcome) {
        self.monitor.record_inversion(outcome);
        self.last_outcome = Some(outcome);
    }

    fn try_solve(
        &self,
        m: &DMatrix<f64>,
        rhs: DMatrix<f64>,
    ) -> Result<(DMatrix<f64>, InversionOutcome), Rejection> {
        let n = m.nrows();
        if n == 0 || !m.is_square() {
            return Err(Rejection::unestimated(
                NumericalInstabilityError::dimension_mismatch(format!(
                    "expected a non-empty square matrix, got {}x{}",
                    m.nrows(),
                    m.ncols()
                )),
            ));
        }
        if rhs.nrows() != n {
            return Err(Rejection::unestimated(
                NumericalInstabilityError::dimension_mismatch(format!(
                    "right-hand side has {} rows, matrix order is {n}",
                    rhs.nrows()
                )),
            ));
        }
        if !m.iter().chain(rhs.iter()).all(|v| v.is_finite()) {
            return Err(Rejection::unestimated(NumericalInstabilityError::new(
                InstabilityCause::NonFiniteInput,
                f64::INFINITY,
                "matrix or right-hand side contains NaN or Inf",
            )));
        }

        let policy = self.regularizer.policy();
        let estimate = self.regularizer.estimate(m);
        let condition_number = estimate.condition_number;

        let relative_pivot = self.backend.min_relative_pivot(m);
        if relative_pivot <= policy.rank_tolerance() {
            return Err(Rejection {
                error: NumericalInstabilityError::new(
                    InstabilityCause::RankDeficient,
                    condition_number,
                    format!(
                        "relative pivot {relative_pivot:.3e} at or below rank tolerance {:.3e}",
                        policy.rank_tolerance()
                    ),
                ),
                outcome: InversionOutcome::failure(condition_number, false, 0.0),
            });
        }

        let regularized = self.regularizer.regularize_with_estimate(m, estimate);
        let was_regularized = regularized.adaptive;
        let epsilon = regularized.epsilon;
        let reject = |cause, attempted: f64, reason: String| Rejection {
            error: NumericalInstabilityError::new(cause, attempted, reason),
            outcome: InversionOutcome::failure(condition_number, was_regularized, epsilon),
        };

        let attempted = self
            .regularizer
            .estimate(&regularized.matrix)
            .condition_number;
        if was_regularized {
            debug!(
                before = condition_number,
                after = attempted,
                epsilon,
                "regularized ill-conditioned matrix"
            );
        }
        // Negated comparison so an infinite estimate is rejected too.
        if !(attempted <= policy.hard_ceiling()) {
            return Err(reject(
                InstabilityCause::ConditionCeiling,
                attempted,
                format!(
                    "condition number after regularization (epsilon {epsilon:.3e}) exceeds ceiling {:.3e}",
                    policy.hard_ceiling()
                ),
            ));
        }

        let factorization = self
            .factor(&regularized.matrix)
            .map_err(|reason| reject(InstabilityCause::SingularPivot, attempted, reason))?;

        let mut x = rhs.clone();
        factorization.solve_columns_in_place(&mut x);
        if policy.iterative_refinement() {
            refine(m, &rhs, &factorization, &mut x, policy);
        }

        if !x.iter().all(|v| v.is_finite()) {
            return Err(reject(
                InstabilityCause::NonFiniteResult,
                attempted,
                "solve produced NaN or Inf".to_string(),
            ));
        }

        Ok((
            x,
            InversionOutcome::success(condition_number, was_regularized, epsilon),
        ))
    }

    fn factor(&self, m: &DMatrix<f64>) -> Result<Factorization, String> {
        if self.structure == MatrixStructure::SymmetricPositiveDefinite {
            match self.backend.factor(m, FactorMethod::Cholesky) {
                Ok(f) => return Ok(f),
                Err(e) => debug!("{e} on matrix declared SPD, falling back to LU"),
            }
        }
        self.backend
            .factor(m, FactorMethod::Lu)
            .map_err(|e| e.to_string())
    }
}

/// Correct `x` towards the solution of the *unregularized* system.
///
/// Each pass reuses the factorization of `M + εI`. A correction at least as
/// large as `x` itself is discarded and ends refinement.
fn refine(
    m: &DMatrix<f64>,
    rhs: &DMatrix<f64>,
    factorization: &Factorization,
    x: &mut DMatrix<f64>,
    policy: &RegularizationPolicy,
) {
    let tolerance = policy.refinement_tolerance();
    for pass in 0..policy.refinement_iterations() {
        let mut delta = rhs - m * &*x;
        factorization.solve_columns_in_place(&mut delta);

        let x_norm = x.norm();
        let ratio = if x_norm > 0.0 {
            delta.norm() / x_norm
        } else {
            delta.norm()
        };
        if !(ratio < 1.0) {
            trace!(pass, ratio, "refinement diverging, keeping previous iterate");
            return;
        }

        *x += &delta;
        if ratio < tolerance {
            trace!(pass, ratio, "refinement converged");
            return;
        }
    }
    trace!(passes = policy.refinement_iterations(), "refinement budget exhausted");
}
