//! Per-owner inversion statistics.
//!
//! Every guarded solve or inversion produces exactly one [`InversionOutcome`].
//! The owning [`StabilityMonitor`] folds outcomes into counters; rates are
//! derived on demand. [`SharedStabilityMonitor`] is the atomic variant for
//! centralized telemetry across threads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Record of a single solve or inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InversionOutcome {
    /// Condition number of the input matrix (`+∞` when never estimated).
    pub condition_number: f64,
    /// Whether the adaptive branch chose a shift above the floor.
    pub was_regularized: bool,
    /// Whether the call returned an error.
    pub failed: bool,
    /// Diagonal shift actually applied (`0.0` if the call failed before
    /// regularization).
    pub epsilon: f64,
}

impl InversionOutcome {
    /// A call that returned a result.
    #[must_use]
    pub const fn success(condition_number: f64, was_regularized: bool, epsilon: f64) -> Self {
        Self {
            condition_number,
            was_regularized,
            failed: false,
            epsilon,
        }
    }

    /// A call that returned an error.
    #[must_use]
    pub const fn failure(condition_number: f64, was_regularized: bool, epsilon: f64) -> Self {
        Self {
            condition_number,
            was_regularized,
            failed: true,
            epsilon,
        }
    }
}

/// Aggregate statistics over recorded outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MonitorStatistics {
    /// Number of recorded calls.
    pub total_inversions: u64,
    /// Calls that needed adaptive regularization.
    pub regularized_count: u64,
    /// Calls that failed.
    pub failed_count: u64,
    /// Largest condition number recorded (`0.0` before the first record).
    pub max_condition_number_seen: f64,
    /// `regularized_count / total_inversions`, `0.0` when empty.
    pub regularization_rate: f64,
    /// `failed_count / total_inversions`, `0.0` when empty.
    pub failure_rate: f64,
}

impl MonitorStatistics {
    /// Derive rates from raw counters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_counts(total: u64, regularized: u64, failed: u64, max_seen: f64) -> Self {
        let rate = |count: u64| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            }
        };
        Self {
            total_inversions: total,
            regularized_count: regularized,
            failed_count: failed,
            max_condition_number_seen: max_seen,
            regularization_rate: rate(regularized),
            failure_rate: rate(failed),
        }
    }
}

impl std::fmt::Display for MonitorStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inversions, {} regularized ({:.2}%), {} failed ({:.2}%), max condition {:.3e}",
            self.total_inversions,
            self.regularized_count,
            self.regularization_rate * 100.0,
            self.failed_count,
            self.failure_rate * 100.0,
            self.max_condition_number_seen,
        )
    }
}

/// Single-owner outcome recorder. No locking; one per inverter.
#[derive(Debug, Clone, Default)]
pub struct StabilityMonitor {
    total: u64,
    regularized: u64,
    failed: u64,
    max_seen: f64,
    history: Option<VecDeque<InversionOutcome>>,
    history_capacity: usize,
}

impl StabilityMonitor {
    /// Create an empty monitor without history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain the last `capacity` outcomes. Zero disables history.
    #[must_use]
    pub fn with_history(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self.history = (capacity > 0).then(|| VecDeque::with_capacity(capacity));
        self
    }

    /// Fold one outcome into the counters.
    pub fn record_inversion(&mut self, outcome: InversionOutcome) {
        if outcome.failed && self.failed == 0 {
            tracing::warn!(
                condition_number = outcome.condition_number,
                "first failed inversion since reset"
            );
        }
        if outcome.was_regularized && self.regularized == 0 {
            tracing::debug!(
                condition_number = outcome.condition_number,
                epsilon = outcome.epsilon,
                "first adaptive regularization since reset"
            );
        }

        self.total += 1;
        self.regularized += u64::from(outcome.was_regularized);
        self.failed += u64::from(outcome.failed);
        // NaN never enters: f64::max keeps the finite operand.
        self.max_seen = self.max_seen.max(outcome.condition_number);

        if let Some(history) = &mut self.history {
            if history.len() == self.history_capacity {
                history.pop_front();
            }
            history.push_back(outcome);
        }
    }

    /// Current statistics.
    #[must_use]
    pub fn statistics(&self) -> MonitorStatistics {
        MonitorStatistics::from_counts(self.total, self.regularized, self.failed, self.max_seen)
    }

    /// Zero all counters and clear the history. History capacity is kept.
    pub fn reset(&mut self) {
        self.total = 0;
        self.regularized = 0;
        self.failed = 0;
        self.max_seen = 0.0;
        if let Some(history) = &mut self.history {
            history.clear();
        }
    }

    /// Retained outcomes, oldest first. Empty when history is disabled.
    pub fn history(&self) -> impl Iterator<Item = &InversionOutcome> + '_ {
        self.history.iter().flatten()
    }
}

/// Lock-free monitor that can be shared by reference across threads.
///
/// Inverters keep their own [`StabilityMonitor`]; feed a shared monitor from
/// [`MatrixInverter::last_outcome`](crate::MatrixInverter::last_outcome)
/// after each call:
///
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use sim_stability::{MatrixInverter, RegularizationPolicy, SharedStabilityMonitor};
///
/// let shared = SharedStabilityMonitor::new();
/// let mut inverter = MatrixInverter::new(RegularizationPolicy::default());
/// let m = DMatrix::<f64>::identity(2, 2);
/// let _ = inverter.solve_linear_system(&m, &DVector::from_vec(vec![1.0, 2.0]));
/// if let Some(outcome) = inverter.last_outcome() {
///     shared.record_inversion(outcome);
/// }
/// assert_eq!(shared.statistics().total_inversions, 1);
/// ```
///
/// Counters are updated independently, so a concurrent `statistics` call may
/// observe one outcome partially applied. `reset` is likewise not atomic as a
/// whole.
#[derive(Debug, Default)]
pub struct SharedStabilityMonitor {
    total: AtomicU64,
    regularized: AtomicU64,
    failed: AtomicU64,
    max_seen_bits: AtomicU64,
}

impl SharedStabilityMonitor {
    /// Create an empty shared monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one outcome into the counters.
    pub fn record_inversion(&self, outcome: InversionOutcome) {
        let previous_failed = self
            .failed
            .fetch_add(u64::from(outcome.failed), Ordering::Relaxed);
        if outcome.failed && previous_failed == 0 {
            tracing::warn!(
                condition_number = outcome.condition_number,
                "first failed inversion since reset"
            );
        }
        let previous_regularized = self
            .regularized
            .fetch_add(u64::from(outcome.was_regularized), Ordering::Relaxed);
        if outcome.was_regularized && previous_regularized == 0 {
            tracing::debug!(
                condition_number = outcome.condition_number,
                epsilon = outcome.epsilon,
                "first adaptive regularization since reset"
            );
        }
        self.total.fetch_add(1, Ordering::Relaxed);

        let cond = outcome.condition_number;
        if !cond.is_nan() {
            // Err means the stored maximum is already at least `cond`.
            let _ = self
                .max_seen_bits
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                    let current = f64::from_bits(bits);
                    (cond > current).then(|| cond.to_bits())
                });
        }
    }

    /// Current statistics.
    #[must_use]
    pub fn statistics(&self) -> MonitorStatistics {
        MonitorStatistics::from_counts(
            self.total.load(Ordering::Relaxed),
            self.regularized.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            f64::from_bits(self.max_seen_bits.load(Ordering::Relaxed)),
        )
    }

    /// Zero all counters.
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.regularized.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.max_seen_bits.store(0.0_f64.to_bits(), Ordering::Relaxed);
    }
}
