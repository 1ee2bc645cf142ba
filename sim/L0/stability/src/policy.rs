//! Regularization policy: thresholds, floors and refinement settings.
//!
//! A [`RegularizationPolicy`] is immutable once built. All settings are
//! checked by [`PolicyBuilder::build`], so an invalid configuration is a
//! construction-time error rather than a per-call surprise.

use crate::error::PolicyError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How condition numbers are estimated on the solve path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EstimationMode {
    /// Singular-value decomposition (exact 2-norm condition number).
    #[default]
    Exact,
    /// Bounded power / inverse iteration through a single LU factorization.
    Fast,
}

impl std::fmt::Display for EstimationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Fast => write!(f, "fast"),
        }
    }
}

/// Validated regularization policy.
///
/// Construct with [`RegularizationPolicy::default`], one of the presets, or
/// [`RegularizationPolicy::builder`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "PolicyBuilder", into = "PolicyBuilder")
)]
pub struct RegularizationPolicy {
    alpha: f64,
    max_condition_number: f64,
    min_regularization: f64,
    use_fixed_regularization: bool,
    estimation: EstimationMode,
    max_relative_perturbation: f64,
    hard_ceiling_factor: f64,
    rank_tolerance: f64,
    iterative_refinement: bool,
    refinement_iterations: usize,
    refinement_tolerance: f64,
    fast_estimate_iterations: usize,
}

impl Default for RegularizationPolicy {
    fn default() -> Self {
        Self {
            alpha: 1e-6,
            max_condition_number: 1e14,
            min_regularization: 1e-8,
            use_fixed_regularization: false,
            estimation: EstimationMode::Exact,
            max_relative_perturbation: 0.1,
            hard_ceiling_factor: 100.0,
            rank_tolerance: 0.0,
            iterative_refinement: true,
            refinement_iterations: 2,
            refinement_tolerance: 1e-12,
            fast_estimate_iterations: 12,
        }
    }
}

impl RegularizationPolicy {
    /// Start from the default settings and customize.
    #[must_use]
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::from(Self::default())
    }

    /// Build a policy from the four core settings, everything else default.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if any setting fails [`PolicyBuilder::build`]
    /// validation.
    pub fn new(
        alpha: f64,
        max_condition_number: f64,
        min_regularization: f64,
        use_fixed_regularization: bool,
    ) -> Result<Self, PolicyError> {
        Self::builder()
            .alpha(alpha)
            .max_condition_number(max_condition_number)
            .min_regularization(min_regularization)
            .fixed_regularization(use_fixed_regularization)
            .build()
    }

    /// Tighter threshold and smaller bias for accuracy-critical analysis.
    #[must_use]
    pub fn high_precision() -> Self {
        Self {
            max_condition_number: 1e12,
            min_regularization: 1e-12,
            refinement_iterations: 3,
            ..Default::default()
        }
    }

    /// Cheap estimates and a single refinement pass for hot loops.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            estimation: EstimationMode::Fast,
            refinement_iterations: 1,
            ..Default::default()
        }
    }

    /// Always add `epsilon` to the diagonal, independent of conditioning.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidMinRegularization`] if `epsilon` is not
    /// finite and positive.
    pub fn fixed(epsilon: f64) -> Result<Self, PolicyError> {
        Self::builder()
            .min_regularization(epsilon)
            .fixed_regularization(true)
            .build()
    }

    /// Adaptive scale factor.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Condition number above which adaptive regularization activates.
    #[must_use]
    pub fn max_condition_number(&self) -> f64 {
        self.max_condition_number
    }

    /// Diagonal floor applied on every call.
    #[must_use]
    pub fn min_regularization(&self) -> f64 {
        self.min_regularization
    }

    /// Whether the fixed (non-adaptive) rule is in effect.
    #[must_use]
    pub fn use_fixed_regularization(&self) -> bool {
        self.use_fixed_regularization
    }

    /// Estimator used on the solve path.
    #[must_use]
    pub fn estimation(&self) -> EstimationMode {
        self.estimation
    }

    /// Cap on ε as a fraction of the largest absolute diagonal entry.
    #[must_use]
    pub fn max_relative_perturbation(&self) -> f64 {
        self.max_relative_perturbation
    }

    /// Multiplier on `max_condition_number` giving the failure ceiling.
    #[must_use]
    pub fn hard_ceiling_factor(&self) -> f64 {
        self.hard_ceiling_factor
    }

    /// Post-regularization condition number above which a call fails.
    #[must_use]
    pub fn hard_ceiling(&self) -> f64 {
        self.max_condition_number * self.hard_ceiling_factor
    }

    /// Relative pivot at or below which a matrix counts as rank-deficient.
    ///
    /// The default `0.0` rejects only an exact zero pivot; badly scaled but
    /// invertible matrices go on to regularization.
    #[must_use]
    pub fn rank_tolerance(&self) -> f64 {
        self.rank_tolerance
    }

    /// Whether refinement passes run after the initial solve.
    #[must_use]
    pub fn iterative_refinement(&self) -> bool {
        self.iterative_refinement
    }

    /// Upper bound on refinement passes.
    #[must_use]
    pub fn refinement_iterations(&self) -> usize {
        self.refinement_iterations
    }

    /// Relative correction `‖Δ‖/‖x‖` below which refinement stops early.
    #[must_use]
    pub fn refinement_tolerance(&self) -> f64 {
        self.refinement_tolerance
    }

    /// Power-iteration budget for [`EstimationMode::Fast`].
    #[must_use]
    pub fn fast_estimate_iterations(&self) -> usize {
        self.fast_estimate_iterations
    }
}

/// Mutable settings that become a [`RegularizationPolicy`] once validated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct PolicyBuilder {
    /// Adaptive scale factor.
    pub alpha: f64,
    /// Activation threshold.
    pub max_condition_number: f64,
    /// Diagonal floor.
    pub min_regularization: f64,
    /// Fixed-ε mode.
    pub use_fixed_regularization: bool,
    /// Estimator on the solve path.
    pub estimation: EstimationMode,
    /// Cap on ε relative to the largest diagonal entry.
    pub max_relative_perturbation: f64,
    /// Failure ceiling multiplier.
    pub hard_ceiling_factor: f64,
    /// Relative pivot tolerance for the rank check.
    pub rank_tolerance: f64,
    /// Refinement on/off.
    pub iterative_refinement: bool,
    /// Refinement pass budget.
    pub refinement_iterations: usize,
    /// Early-stop threshold for refinement.
    pub refinement_tolerance: f64,
    /// Fast-estimate iteration budget.
    pub fast_estimate_iterations: usize,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::from(RegularizationPolicy::default())
    }
}

impl From<RegularizationPolicy> for PolicyBuilder {
    fn from(policy: RegularizationPolicy) -> Self {
        Self {
            alpha: policy.alpha,
            max_condition_number: policy.max_condition_number,
            min_regularization: policy.min_regularization,
            use_fixed_regularization: policy.use_fixed_regularization,
            estimation: policy.estimation,
            max_relative_perturbation: policy.max_relative_perturbation,
            hard_ceiling_factor: policy.hard_ceiling_factor,
            rank_tolerance: policy.rank_tolerance,
            iterative_refinement: policy.iterative_refinement,
            refinement_iterations: policy.refinement_iterations,
            refinement_tolerance: policy.refinement_tolerance,
            fast_estimate_iterations: policy.fast_estimate_iterations,
        }
    }
}

impl TryFrom<PolicyBuilder> for RegularizationPolicy {
    type Error = PolicyError;

    fn try_from(builder: PolicyBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

impl PolicyBuilder {
    /// Set the adaptive scale factor.
    #[must_use]
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the activation threshold.
    #[must_use]
    pub fn max_condition_number(mut self, max_condition_number: f64) -> Self {
        self.max_condition_number = max_condition_number;
        self
    }

    /// Set the diagonal floor.
    #[must_use]
    pub fn min_regularization(mut self, min_regularization: f64) -> Self {
        self.min_regularization = min_regularization;
        self
    }

    /// Switch between the fixed and adaptive rules.
    #[must_use]
    pub fn fixed_regularization(mut self, fixed: bool) -> Self {
        self.use_fixed_regularization = fixed;
        self
    }

    /// Select the estimator.
    #[must_use]
    pub fn estimation(mut self, mode: EstimationMode) -> Self {
        self.estimation = mode;
        self
    }

    /// Set the ε cap relative to the largest diagonal entry.
    #[must_use]
    pub fn max_relative_perturbation(mut self, fraction: f64) -> Self {
        self.max_relative_perturbation = fraction;
        self
    }

    /// Set the failure ceiling multiplier.
    #[must_use]
    pub fn hard_ceiling_factor(mut self, factor: f64) -> Self {
        self.hard_ceiling_factor = factor;
        self
    }

    /// Set the relative pivot tolerance for the rank check.
    #[must_use]
    pub fn rank_tolerance(mut self, tolerance: f64) -> Self {
        self.rank_tolerance = tolerance;
        self
    }

    /// Configure refinement: pass budget and early-stop tolerance.
    #[must_use]
    pub fn refinement(mut self, iterations: usize, tolerance: f64) -> Self {
        self.iterative_refinement = iterations > 0;
        self.refinement_iterations = iterations;
        self.refinement_tolerance = tolerance;
        self
    }

    /// Disable refinement.
    #[must_use]
    pub fn without_refinement(mut self) -> Self {
        self.iterative_refinement = false;
        self
    }

    /// Set the fast-estimate iteration budget.
    #[must_use]
    pub fn fast_estimate_iterations(mut self, iterations: usize) -> Self {
        self.fast_estimate_iterations = iterations;
        self
    }

    /// Validate and freeze the settings.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if `min_regularization <= 0`,
    /// `max_condition_number <= 1`, or an auxiliary field is non-finite or out
    /// of range.
    pub fn build(self) -> Result<RegularizationPolicy, PolicyError> {
        if !self.min_regularization.is_finite() || self.min_regularization <= 0.0 {
            return Err(PolicyError::InvalidMinRegularization(
                self.min_regularization,
            ));
        }

        if !self.max_condition_number.is_finite() || self.max_condition_number <= 1.0 {
            return Err(PolicyError::InvalidMaxConditionNumber(
                self.max_condition_number,
            ));
        }

        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(PolicyError::invalid(
                "alpha",
                format!("must be finite and non-negative, got {}", self.alpha),
            ));
        }

        if !(self.max_relative_perturbation > 0.0 && self.max_relative_perturbation <= 1.0) {
            return Err(PolicyError::invalid(
                "max_relative_perturbation",
                format!("must be in (0, 1], got {}", self.max_relative_perturbation),
            ));
        }

        // Infinity is allowed and disables the ceiling.
        if self.hard_ceiling_factor.is_nan() || self.hard_ceiling_factor < 1.0 {
            return Err(PolicyError::invalid(
                "hard_ceiling_factor",
                format!("must be at least 1, got {}", self.hard_ceiling_factor),
            ));
        }

        if !(self.rank_tolerance >= 0.0 && self.rank_tolerance < 1.0) {
            return Err(PolicyError::invalid(
                "rank_tolerance",
                format!("must be in [0, 1), got {}", self.rank_tolerance),
            ));
        }

        if !self.refinement_tolerance.is_finite() || self.refinement_tolerance < 0.0 {
            return Err(PolicyError::invalid(
                "refinement_tolerance",
                format!(
                    "must be finite and non-negative, got {}",
                    self.refinement_tolerance
                ),
            ));
        }

        if self.fast_estimate_iterations == 0 {
            return Err(PolicyError::invalid(
                "fast_estimate_iterations",
                "must be at least 1",
            ));
        }

        Ok(RegularizationPolicy {
            alpha: self.alpha,
            max_condition_number: self.max_condition_number,
            min_regularization: self.min_regularization,
            use_fixed_regularization: self.use_fixed_regularization,
            estimation: self.estimation,
            max_relative_perturbation: self.max_relative_perturbation,
            hard_ceiling_factor: self.hard_ceiling_factor,
            rank_tolerance: self.rank_tolerance,
            iterative_refinement: self.iterative_refinement,
            refinement_iterations: self.refinement_iterations,
            refinement_tolerance: self.refinement_tolerance,
            fast_estimate_iterations: self.fast_estimate_iterations,
        })
    }
}
