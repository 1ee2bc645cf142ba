//! Batched evaluation: N independent adapters over clones of one model.
//!
//! Every instance owns its own [`PhysicsMatrixAdapter`], so solver state and
//! statistics never cross instances. Evaluation is parallelized via rayon
//! when the `parallel` feature is enabled; sequential fallback otherwise.
//!
//! # Examples
//!
//! ```
//! use sim_plant::{PlantBatch, PlantState, SimplifiedDip};
//! use sim_stability::RegularizationPolicy;
//!
//! let mut batch = PlantBatch::new(SimplifiedDip::default(), RegularizationPolicy::default(), 8);
//! let states = vec![PlantState::zeros(3); 8];
//! let controls = vec![0.5; 8];
//!
//! let results = batch.evaluate_all(&states, &controls).unwrap();
//! assert!(results.iter().all(|r| r.success));
//! assert_eq!(batch.aggregate_statistics().total_inversions, 8);
//! ```

use sim_stability::{MonitorStatistics, RegularizationPolicy};

use crate::adapter::{DynamicsResult, PhysicsMatrixAdapter, PlantState};
use crate::error::PlantError;
use crate::model::DynamicsModel;

/// N independent plant instances sharing one parameter set.
///
/// # Determinism
///
/// Each instance's result is a pure function of its own adapter and inputs.
/// Output is independent of thread count and scheduling order.
#[derive(Debug, Clone)]
pub struct PlantBatch<D: DynamicsModel> {
    adapters: Vec<PhysicsMatrixAdapter<D>>,
}

impl<D: DynamicsModel + Clone> PlantBatch<D> {
    /// Create `n` adapters, each with its own clone of `model` and its own
    /// inverter under `policy`.
    #[must_use]
    pub fn new(model: D, policy: RegularizationPolicy, n: usize) -> Self {
        let adapters = (0..n)
            .map(|_| PhysicsMatrixAdapter::with_policy(model.clone(), policy.clone()))
            .collect();
        Self { adapters }
    }
}

impl<D: DynamicsModel> PlantBatch<D> {
    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Adapter `i`, or `None` if `i >= len()`.
    #[must_use]
    pub fn adapter(&self, i: usize) -> Option<&PhysicsMatrixAdapter<D>> {
        self.adapters.get(i)
    }

    /// Iterator over all adapters.
    pub fn adapters(&self) -> impl ExactSizeIterator<Item = &PhysicsMatrixAdapter<D>> {
        self.adapters.iter()
    }

    /// Mutable iterator over all adapters.
    pub fn adapters_mut(
        &mut self,
    ) -> impl ExactSizeIterator<Item = &mut PhysicsMatrixAdapter<D>> {
        self.adapters.iter_mut()
    }

    /// Evaluate `[q̇, q̈]` for every instance.
    ///
    /// Instability in one instance is reported in its [`DynamicsResult`] and
    /// never affects the others.
    ///
    /// # Errors
    ///
    /// [`PlantError::DimensionMismatch`] if `states` or `controls` does not
    /// have one entry per instance.
    pub fn evaluate_all(
        &mut self,
        states: &[PlantState],
        controls: &[f64],
    ) -> Result<Vec<DynamicsResult>, PlantError> {
        if states.len() != self.len() {
            return Err(PlantError::dimension_mismatch(self.len(), states.len()));
        }
        if controls.len() != self.len() {
            return Err(PlantError::dimension_mismatch(self.len(), controls.len()));
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::iter::{
                IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator,
            };
            Ok(self
                .adapters
                .par_iter_mut()
                .zip(states)
                .zip(controls)
                .map(|((adapter, state), &u)| adapter.compute_dynamics(state, u))
                .collect())
        }

        #[cfg(not(feature = "parallel"))]
        {
            Ok(self
                .adapters
                .iter_mut()
                .zip(states)
                .zip(controls)
                .map(|((adapter, state), &u)| adapter.compute_dynamics(state, u))
                .collect())
        }
    }

    /// Per-instance statistics, in instance order.
    #[must_use]
    pub fn statistics(&self) -> Vec<MonitorStatistics> {
        self.adapters.iter().map(PhysicsMatrixAdapter::statistics).collect()
    }

    /// Statistics summed over all instances.
    #[must_use]
    pub fn aggregate_statistics(&self) -> MonitorStatistics {
        let (total, regularized, failed, max_seen) = self.adapters.iter().fold(
            (0, 0, 0, 0.0_f64),
            |(t, r, f, m), adapter| {
                let s = adapter.statistics();
                (
                    t + s.total_inversions,
                    r + s.regularized_count,
                    f + s.failed_count,
                    m.max(s.max_condition_number_seen),
                )
            },
        );
        MonitorStatistics::from_counts(total, regularized, failed, max_seen)
    }

    /// Zero every instance's statistics.
    pub fn reset_statistics_all(&mut self) {
        for adapter in &mut self.adapters {
            adapter.reset_statistics();
        }
    }
}
