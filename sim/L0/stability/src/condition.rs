//! Condition-number estimation.
//!
//! Two modes share one result type:
//!
//! - **Exact**: 2-norm condition number σ_max/σ_min from a singular value
//!   decomposition.
//! - **Fast**: power iteration on MᵀM for σ_max and inverse iteration on
//!   (MᵀM)⁻¹ through a single LU factorization for σ_min. No SVD.
//!
//! Every estimate is non-negative and never NaN. Input that is empty,
//! non-square or non-finite reports `+∞`, as does a matrix that is exactly
//! singular (zero σ_min or a zero LU pivot).

use nalgebra::{DMatrix, DVector};

use crate::kernel::{FactorMethod, KernelBackend};
use crate::policy::EstimationMode;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Singular-value summary of a square matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConditionEstimate {
    /// σ_max / σ_min, or `+∞`.
    pub condition_number: f64,
    /// Largest singular value (or its estimate).
    pub sigma_max: f64,
    /// Smallest singular value (or its estimate), `0.0` when singular.
    pub sigma_min: f64,
}

impl ConditionEstimate {
    /// Estimate reported for input that cannot be analysed.
    #[must_use]
    pub const fn unusable() -> Self {
        Self {
            condition_number: f64::INFINITY,
            sigma_max: f64::INFINITY,
            sigma_min: 0.0,
        }
    }

    /// Build from singular-value extremes.
    ///
    /// Only an exactly zero σ_min (or a ratio that overflows) yields `+∞`;
    /// a tiny but positive σ_min keeps its finite ratio.
    #[must_use]
    pub fn from_extremes(sigma_max: f64, sigma_min: f64) -> Self {
        let ratio = sigma_max / sigma_min;
        if sigma_min > 0.0 && ratio.is_finite() {
            Self {
                condition_number: ratio,
                sigma_max,
                sigma_min,
            }
        } else {
            Self {
                condition_number: f64::INFINITY,
                sigma_max,
                sigma_min: 0.0,
            }
        }
    }

    /// Whether the matrix was found to be invertible.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.condition_number.is_finite()
    }
}

/// Computes exact or fast condition estimates. Stateless apart from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionEstimator {
    backend: KernelBackend,
    fast_iterations: usize,
}

impl Default for ConditionEstimator {
    fn default() -> Self {
        Self {
            backend: KernelBackend::default(),
            fast_iterations: 12,
        }
    }
}

impl ConditionEstimator {
    /// Create an estimator on the given backend.
    #[must_use]
    pub fn new(backend: KernelBackend) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Set the iteration budget of the fast estimate (at least one).
    #[must_use]
    pub fn with_fast_iterations(mut self, iterations: usize) -> Self {
        self.fast_iterations = iterations.max(1);
        self
    }

    /// Kernel backend in use.
    #[must_use]
    pub fn backend(&self) -> KernelBackend {
        self.backend
    }

    /// Iteration budget of the fast estimate.
    #[must_use]
    pub fn fast_iterations(&self) -> usize {
        self.fast_iterations
    }

    /// True 2-norm condition number.
    #[must_use]
    pub fn exact_condition(&self, m: &DMatrix<f64>) -> f64 {
        self.exact(m).condition_number
    }

    /// Cheap approximation of the condition number.
    #[must_use]
    pub fn fast_estimate(&self, m: &DMatrix<f64>) -> f64 {
        self.fast(m).condition_number
    }

    /// Estimate in the requested mode.
    #[must_use]
    pub fn estimate(&self, m: &DMatrix<f64>, mode: EstimationMode) -> ConditionEstimate {
        match mode {
            EstimationMode::Exact => self.exact(m),
            EstimationMode::Fast => self.fast(m),
        }
    }

    /// SVD-based estimate.
    #[must_use]
    pub fn exact(&self, m: &DMatrix<f64>) -> ConditionEstimate {
        if !is_analysable(m) {
            return ConditionEstimate::unusable();
        }
        let singular = self.backend.singular_values(m);
        let sigma_max = singular.iter().copied().fold(0.0, f64::max);
        let sigma_min = singular.iter().copied().fold(f64::INFINITY, f64::min);

        // SVD rounding can leave a tiny nonzero σ_min for exactly
        // rank-deficient input; a zero pivot settles it.
        if self.backend.factor(m, FactorMethod::Lu).is_err() {
            return ConditionEstimate {
                condition_number: f64::INFINITY,
                sigma_max,
                sigma_min: 0.0,
            };
        }
        ConditionEstimate::from_extremes(sigma_max, sigma_min)
    }

    /// Power/inverse-iteration estimate.
    #[must_use]
    pub fn fast(&self, m: &DMatrix<f64>) -> ConditionEstimate {
        if !is_analysable(m) {
            return ConditionEstimate::unusable();
        }
        let n = m.nrows();
        let sigma_max = self.power_sigma_max(m);

        let Ok(fact) = self.backend.factor(m, FactorMethod::Lu) else {
            return ConditionEstimate {
                condition_number: f64::INFINITY,
                sigma_max,
                sigma_min: 0.0,
            };
        };

        // ‖M⁻¹‖₂ by power iteration on M⁻¹M⁻ᵀ = (MᵀM)⁻¹
        let mut x = start_vector(n);
        let mut inverse_norm = 0.0;
        for _ in 0..self.fast_iterations {
            let mut w = x.clone();
            fact.solve_transposed_in_place(&mut w);
            inverse_norm = w.norm();
            let mut y = w;
            fact.solve_in_place(&mut y);
            let len = y.norm();
            if !(len > 0.0 && len.is_finite()) {
                break;
            }
            x = y / len;
        }

        if !(inverse_norm > 0.0 && inverse_norm.is_finite()) {
            return ConditionEstimate {
                condition_number: f64::INFINITY,
                sigma_max,
                sigma_min: 0.0,
            };
        }
        ConditionEstimate::from_extremes(sigma_max, 1.0 / inverse_norm)
    }

    /// ‖M‖₂ by power iteration on MᵀM.
    fn power_sigma_max(&self, m: &DMatrix<f64>) -> f64 {
        let mut x = start_vector(m.nrows());
        let mut sigma = 0.0;
        for _ in 0..self.fast_iterations {
            let v = m * &x;
            sigma = v.norm();
            let next = m.tr_mul(&v);
            let len = next.norm();
            if !(len > 0.0 && len.is_finite()) {
                break;
            }
            x = next / len;
        }
        sigma
    }
}

/// Deterministic start vector with distinct components.
///
/// A uniform start would be orthogonal to antisymmetric modes like (1, −1, 0),
/// which are exactly the near-null directions of aligned links.
#[allow(clippy::cast_precision_loss)]
fn start_vector(n: usize) -> DVector<f64> {
    let v = DVector::from_fn(n, |i, _| 1.0 / ((i + 1) as f64).sqrt());
    let len = v.norm();
    v / len
}

fn is_analysable(m: &DMatrix<f64>) -> bool {
    m.nrows() > 0 && m.is_square() && m.iter().all(|v| v.is_finite())
}
