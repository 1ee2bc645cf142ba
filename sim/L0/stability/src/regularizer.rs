//! Adaptive diagonal regularization.
//!
//! `M' = M + εI` with ε chosen from the condition estimate:
//!
//! | Situation                          | ε                                             |
//! |------------------------------------|-----------------------------------------------|
//! | fixed policy                       | `min_regularization`                          |
//! | `cond <= max_condition_number`     | `min_regularization`                          |
//! | `cond >  max_condition_number`     | `max(α·cond/max, σ_max/(max−1))`, capped      |
//! | `cond = +∞` (exactly singular)     | `σ_max/(max−1)`, capped                       |
//!
//! The cap is `max_relative_perturbation · max|diag(M)|` and the floor
//! `min_regularization` always wins over the cap.

use nalgebra::DMatrix;
use tracing::debug;

use crate::condition::{ConditionEstimate, ConditionEstimator};
use crate::kernel::KernelBackend;
use crate::policy::RegularizationPolicy;

/// A regularized matrix together with the decision that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Regularization {
    /// `M + εI`.
    pub matrix: DMatrix<f64>,
    /// Diagonal shift that was applied.
    pub epsilon: f64,
    /// Estimate of the unregularized matrix.
    pub estimate: ConditionEstimate,
    /// Whether the adaptive branch (above threshold) chose ε.
    pub adaptive: bool,
}

/// Chooses and applies diagonal shifts under a [`RegularizationPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveRegularizer {
    policy: RegularizationPolicy,
    estimator: ConditionEstimator,
}

impl Default for AdaptiveRegularizer {
    fn default() -> Self {
        Self::new(RegularizationPolicy::default())
    }
}

impl AdaptiveRegularizer {
    /// Create a regularizer on the default kernel backend.
    #[must_use]
    pub fn new(policy: RegularizationPolicy) -> Self {
        let estimator = ConditionEstimator::default()
            .with_fast_iterations(policy.fast_estimate_iterations());
        Self { policy, estimator }
    }

    /// Use a specific kernel backend for estimation.
    #[must_use]
    pub fn with_backend(mut self, backend: KernelBackend) -> Self {
        self.estimator = ConditionEstimator::new(backend)
            .with_fast_iterations(self.policy.fast_estimate_iterations());
        self
    }

    /// Policy in effect.
    #[must_use]
    pub fn policy(&self) -> &RegularizationPolicy {
        &self.policy
    }

    /// Estimator in effect.
    #[must_use]
    pub fn estimator(&self) -> &ConditionEstimator {
        &self.estimator
    }

    /// True iff the exact condition number is within the activation threshold.
    #[must_use]
    pub fn check_conditioning(&self, m: &DMatrix<f64>) -> bool {
        self.estimator.exact_condition(m) <= self.policy.max_condition_number()
    }

    /// Estimate in the policy's mode.
    #[must_use]
    pub fn estimate(&self, m: &DMatrix<f64>) -> ConditionEstimate {
        self.estimator.estimate(m, self.policy.estimation())
    }

    /// `M + εI`.
    #[must_use]
    pub fn regularize_matrix(&self, m: &DMatrix<f64>) -> DMatrix<f64> {
        self.regularize(m).matrix
    }

    /// Estimate, choose ε and apply it.
    #[must_use]
    pub fn regularize(&self, m: &DMatrix<f64>) -> Regularization {
        let estimate = self.estimate(m);
        self.regularize_with_estimate(m, estimate)
    }

    /// Apply the shift chosen for an already computed estimate.
    #[must_use]
    pub fn regularize_with_estimate(
        &self,
        m: &DMatrix<f64>,
        estimate: ConditionEstimate,
    ) -> Regularization {
        let adaptive = !self.policy.use_fixed_regularization()
            && estimate.condition_number > self.policy.max_condition_number();
        let epsilon = self.epsilon_for(m, &estimate);

        if adaptive {
            debug!(
                condition_number = estimate.condition_number,
                epsilon, "adaptive regularization"
            );
        }

        let mut matrix = m.clone();
        for i in 0..m.nrows().min(m.ncols()) {
            matrix[(i, i)] += epsilon;
        }
        Regularization {
            matrix,
            epsilon,
            estimate,
            adaptive,
        }
    }

    /// Diagonal shift for `m` given its estimate.
    #[must_use]
    pub fn epsilon_for(&self, m: &DMatrix<f64>, estimate: &ConditionEstimate) -> f64 {
        let policy = &self.policy;
        let floor = policy.min_regularization();
        if policy.use_fixed_regularization()
            || estimate.condition_number <= policy.max_condition_number()
        {
            return floor;
        }

        let max_cond = policy.max_condition_number();
        // An exactly singular estimate has no ratio to scale; the threshold
        // shift from σ_max alone sizes ε.
        let proportional = if estimate.condition_number.is_finite() {
            policy.alpha() * estimate.condition_number / max_cond
        } else {
            0.0
        };
        // Shift that brings an SPD matrix to the threshold: (σ+ε)/ε <= max.
        let to_threshold = estimate.sigma_max / (max_cond - 1.0);

        let n = m.nrows().min(m.ncols());
        let max_diag = (0..n).map(|i| m[(i, i)].abs()).fold(0.0, f64::max);
        let cap = (policy.max_relative_perturbation() * max_diag).max(floor);

        // f64::max/min drop a NaN operand (∞/∞ for unusable input).
        proportional.max(to_threshold).min(cap).max(floor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn aligned_links() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            3,
            3,
            &[1.0, 0.999_999_999, 0.5, 0.999_999_999, 1.0, 0.5, 0.5, 0.5, 0.3],
        )
    }

    /// SPD matrix with prescribed eigenvalues in a random orthonormal basis.
    fn spd_with_spectrum(rng: &mut StdRng, eigenvalues: &[f64]) -> DMatrix<f64> {
        let n = eigenvalues.len();
        let a = DMatrix::from_fn(n, n, |_, _| rng.gen_range(-1.0..1.0));
        let q = a.qr().q();
        let d = DMatrix::from_diagonal(&DVector::from_column_slice(eigenvalues));
        let m = &q * d * q.transpose();
        (&m + m.transpose()) * 0.5
    }

    #[test]
    fn test_healthy_input_only_gets_floor() {
        let mut rng = StdRng::seed_from_u64(3);
        let reg = AdaptiveRegularizer::default();
        let floor = reg.policy().min_regularization();
        for _ in 0..50 {
            let spectrum = [
                rng.gen_range(1.0..10.0),
                rng.gen_range(0.1..1.0),
                rng.gen_range(1e-6..0.1),
            ];
            let m = spd_with_spectrum(&mut rng, &spectrum);
            assert!(reg.check_conditioning(&m));

            let out = reg.regularize(&m);
            assert!(!out.adaptive);
            assert_eq!(out.epsilon, floor);
            for i in 0..3 {
                for j in 0..3 {
                    let delta = (out.matrix[(i, j)] - m[(i, j)]).abs();
                    if i == j {
                        assert!(delta <= floor * (1.0 + 1e-6) + 1e-15);
                    } else {
                        assert_eq!(delta, 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_ill_conditioned_input_improves() {
        let mut rng = StdRng::seed_from_u64(4);
        let reg = AdaptiveRegularizer::default();
        let est = reg.estimator();
        for _ in 0..50 {
            // Diagonal input keeps the tiny eigenvalue exact.
            let mut spectrum = [rng.gen_range(1.0..5.0), 0.5, rng.gen_range(1e-16..5e-15)];
            spectrum.swap(2, rng.gen_range(0..3));
            let m = DMatrix::from_diagonal(&DVector::from_column_slice(&spectrum));
            let before = est.exact_condition(&m);
            if before <= reg.policy().max_condition_number() {
                continue;
            }
            let out = reg.regularize(&m);
            assert!(out.adaptive);
            let after = est.exact_condition(&out.matrix);
            assert!(after < before);
            assert!(after <= reg.policy().max_condition_number() * (1.0 + 1e-6));
        }
    }

    #[test]
    fn test_aligned_links_scenario() {
        let reg = AdaptiveRegularizer::default();
        let m = aligned_links();
        let before = reg.estimator().exact_condition(&m);
        let out = reg.regularize(&m);
        let after = reg.estimator().exact_condition(&out.matrix);

        // Below the activation threshold: the floor alone fixes it.
        assert!(!out.adaptive);
        assert_eq!(out.epsilon, 1e-8);
        assert!(after * 10.0 < before, "before {before:e}, after {after:e}");
        assert!(after > 1e7 && after < 1e9);
    }

    #[test]
    fn test_fixed_mode_ignores_conditioning() {
        let reg = AdaptiveRegularizer::new(RegularizationPolicy::fixed(1e-6).unwrap());
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let out = reg.regularize(&singular);
        assert!(!out.adaptive);
        assert_eq!(out.epsilon, 1e-6);
        assert!(out.estimate.condition_number.is_infinite());
        assert_relative_eq!(out.matrix[(0, 0)], 1.0 + 1e-6);
    }

    #[test]
    fn test_tiny_eigenvalue_gets_proportional_shift() {
        let reg = AdaptiveRegularizer::default();
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0, 5e-16]));
        let out = reg.regularize(&m);
        assert!(out.adaptive);
        assert!(out.estimate.is_finite());
        // alpha · 2e15 / 1e14, far below the 0.1 cap
        assert_relative_eq!(out.epsilon, 2e-5, max_relative = 1e-6);

        let after = reg.estimator().exact_condition(&out.matrix);
        assert!(after <= reg.policy().max_condition_number());
    }

    #[test]
    fn test_epsilon_capped_by_diagonal() {
        let policy = RegularizationPolicy::builder()
            .alpha(1.0)
            .max_relative_perturbation(1e-6)
            .build()
            .unwrap();
        let reg = AdaptiveRegularizer::new(policy);
        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 1.0, 1e-16]));
        let out = reg.regularize(&m);
        assert!(out.adaptive);
        // alpha · 2e16 / 1e14 = 200, capped at 1e-6 · 2
        assert_relative_eq!(out.epsilon, 2e-6, max_relative = 1e-12);
    }

    #[test]
    fn test_singular_input_sized_from_sigma_max() {
        let policy = RegularizationPolicy::builder()
            .min_regularization(1e-20)
            .build()
            .unwrap();
        let reg = AdaptiveRegularizer::new(policy);
        let singular = DMatrix::from_row_slice(2, 2, &[2.0, 2.0, 2.0, 2.0]);
        let out = reg.regularize(&singular);
        assert!(out.adaptive);
        assert!(out.estimate.condition_number.is_infinite());
        assert_relative_eq!(out.epsilon, 4.0 / (1e14 - 1.0), max_relative = 1e-9);
    }

    #[test]
    fn test_floor_wins_over_cap() {
        let reg = AdaptiveRegularizer::default();
        let zeros = DMatrix::<f64>::zeros(3, 3);
        let out = reg.regularize(&zeros);
        assert!(out.adaptive);
        assert_eq!(out.epsilon, reg.policy().min_regularization());
    }

    #[test]
    fn test_zero_alpha_still_reaches_threshold() {
        let policy = RegularizationPolicy::new(0.0, 1e14, 1e-8, false).unwrap();
        let reg = AdaptiveRegularizer::new(policy);
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let out = reg.regularize(&singular);
        assert!(out.epsilon.is_finite());
        assert!(out.epsilon >= 2.0 / (1e14 - 1.0));
    }

    #[test]
    fn test_regularization_is_deterministic() {
        let m = aligned_links();
        for backend in [KernelBackend::Dense, KernelBackend::Static] {
            let reg = AdaptiveRegularizer::default().with_backend(backend);
            let a = reg.regularize_matrix(&m);
            let b = reg.regularize_matrix(&m);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_non_square_input_does_not_panic() {
        let reg = AdaptiveRegularizer::default();
        let rect = DMatrix::<f64>::from_element(2, 3, 1.0);
        let out = reg.regularize(&rect);
        assert!(out.estimate.condition_number.is_infinite());
        assert_eq!(out.matrix.shape(), (2, 3));
    }
}
