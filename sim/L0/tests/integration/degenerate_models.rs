//! Adapter behavior for mass matrices the reference plant never produces.
//!
//! Test-local [`DynamicsModel`]s return fixed matrices so each path of the
//! guarded solve can be driven through the adapter.

use nalgebra::{DMatrix, DVector};
use sim_plant::{DynamicsModel, PhysicsMatrixAdapter, PlantState};
use sim_stability::InstabilityCause;

/// Constant mass matrix, unit gravity on every coordinate, force on the first.
#[derive(Debug, Clone)]
struct FixedMassModel {
    mass: DMatrix<f64>,
}

impl FixedMassModel {
    fn aligned_links() -> Self {
        Self {
            mass: DMatrix::from_row_slice(
                3,
                3,
                &[1.0, 0.999_999_999, 0.5, 0.999_999_999, 1.0, 0.5, 0.5, 0.5, 0.3],
            ),
        }
    }

    fn duplicated_coordinate() -> Self {
        Self {
            mass: DMatrix::from_row_slice(3, 3, &[1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
        }
    }
}

impl DynamicsModel for FixedMassModel {
    fn dof(&self) -> usize {
        self.mass.nrows()
    }

    fn mass_matrix(&self, _q: &DVector<f64>) -> DMatrix<f64> {
        self.mass.clone()
    }

    fn coriolis_matrix(&self, _q: &DVector<f64>, _qd: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::zeros(self.dof(), self.dof())
    }

    fn gravity_vector(&self, _q: &DVector<f64>) -> DVector<f64> {
        DVector::from_element(self.dof(), -1.0)
    }

    fn input_vector(&self, u: f64) -> DVector<f64> {
        let mut tau = DVector::zeros(self.dof());
        tau[0] = u;
        tau
    }
}

#[test]
fn aligned_links_yield_finite_accelerations() {
    let mut adapter = PhysicsMatrixAdapter::new(FixedMassModel::aligned_links());
    let result = adapter.compute_dynamics(&PlantState::zeros(3), 0.5);

    assert!(result.success, "{:?}", result.error);
    assert!(result.state_derivative.iter().all(|v| v.is_finite()));
    assert!(result.condition_number > 1e9 && result.condition_number < 1e10);
    // Below the activation threshold: only the floor is applied.
    assert!(!result.was_regularized);

    let stats = adapter.statistics();
    assert_eq!(stats.total_inversions, 1);
    assert_eq!(stats.failed_count, 0);
    assert_eq!(stats.max_condition_number_seen, result.condition_number);
}

#[test]
fn duplicated_coordinate_is_reported_not_integrated() {
    let mut adapter = PhysicsMatrixAdapter::new(FixedMassModel::duplicated_coordinate());
    let result = adapter.compute_dynamics(&PlantState::zeros(3), 1.0);

    assert!(!result.success);
    assert_eq!(result.cause, Some(InstabilityCause::RankDeficient));
    assert!(result.error.is_some());
    assert!(result.state_derivative.iter().all(|v| *v == 0.0));

    let err = adapter
        .accelerations(&DVector::zeros(3), &DVector::zeros(3), 1.0)
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(
        err.instability().map(|e| e.cause),
        Some(InstabilityCause::RankDeficient)
    );

    let stats = adapter.statistics();
    assert_eq!(stats.total_inversions, 2);
    assert_eq!(stats.failed_count, 2);
    assert_eq!(stats.failure_rate, 1.0);
}

#[test]
fn failure_does_not_poison_later_steps() {
    let mut adapter = PhysicsMatrixAdapter::new(FixedMassModel::duplicated_coordinate());
    assert!(!adapter.compute_dynamics(&PlantState::zeros(3), 0.0).success);

    let mut healthy = PhysicsMatrixAdapter::with_inverter(
        FixedMassModel {
            mass: DMatrix::identity(3, 3),
        },
        adapter.inverter().clone(),
    );
    let result = healthy.compute_dynamics(&PlantState::zeros(3), 2.0);
    assert!(result.success);
    let qdd = result.accelerations();
    assert!((qdd[0] - 3.0).abs() < 1e-7);
    assert!((qdd[1] - 1.0).abs() < 1e-7);

    // The cloned inverter carried the earlier failure into its own counters.
    let stats = healthy.statistics();
    assert_eq!(stats.total_inversions, 2);
    assert_eq!(stats.failed_count, 1);
}
