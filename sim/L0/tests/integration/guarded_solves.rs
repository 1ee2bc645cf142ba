//! Guarded solves through the public `sim-stability` surface.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use sim_stability::{
    EstimationMode, InstabilityCause, KernelBackend, MatrixInverter, MatrixStructure,
    RegularizationPolicy, StabilityMonitor,
};

fn presets() -> Vec<RegularizationPolicy> {
    vec![
        RegularizationPolicy::default(),
        RegularizationPolicy::high_precision(),
        RegularizationPolicy::realtime(),
    ]
}

fn well_conditioned() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        4,
        4,
        &[
            5.0, 1.0, 0.5, 0.0, //
            1.0, 4.0, 0.2, 0.3, //
            0.5, 0.2, 3.0, 0.1, //
            0.0, 0.3, 0.1, 2.0,
        ],
    )
}

#[test]
fn presets_solve_well_conditioned_system() {
    let m = well_conditioned();
    let expected = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
    let b = &m * &expected;

    for policy in presets() {
        let x = sim_stability::solve(&m, &b, &policy).unwrap();
        for i in 0..4 {
            assert_relative_eq!(x[i], expected[i], epsilon = 1e-8);
        }
    }
}

#[test]
fn inverse_round_trips_to_identity() {
    let m = well_conditioned();
    for policy in presets() {
        let inv = sim_stability::invert(&m, &policy).unwrap();
        let product = &m * inv;
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(product[(i, j)], expected, epsilon = 1e-8);
            }
        }
    }
}

#[test]
fn singular_matrix_never_returns_a_value() {
    let singular = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 0.0, 1.0, 1.0]);
    let b = DVector::from_vec(vec![1.0, 1.0, 1.0]);
    for policy in presets() {
        let err = sim_stability::solve(&singular, &b, &policy).unwrap_err();
        assert_eq!(err.cause, InstabilityCause::RankDeficient);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("rank-deficient"));
    }
}

#[test]
fn configurations_agree_on_healthy_input() {
    let m = well_conditioned();
    let b = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let reference = sim_stability::solve(&m, &b, &RegularizationPolicy::default()).unwrap();

    for backend in [KernelBackend::Dense, KernelBackend::Static] {
        for structure in [MatrixStructure::General, MatrixStructure::SymmetricPositiveDefinite] {
            for mode in [EstimationMode::Exact, EstimationMode::Fast] {
                let policy = RegularizationPolicy::builder()
                    .estimation(mode)
                    .build()
                    .unwrap();
                let mut inverter = MatrixInverter::new(policy)
                    .with_backend(backend)
                    .with_structure(structure);
                let x = inverter.solve_linear_system(&m, &b).unwrap();
                for i in 0..4 {
                    assert_relative_eq!(x[i], reference[i], epsilon = 1e-10);
                }
            }
        }
    }
}

#[test]
fn statistics_track_a_mixed_workload() {
    let mut inverter = MatrixInverter::new(RegularizationPolicy::default())
        .with_monitor(StabilityMonitor::new().with_history(8));
    let healthy = well_conditioned();
    let b = DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0]);
    let singular = DMatrix::<f64>::from_element(4, 4, 1.0);
    let nan = DMatrix::from_element(4, 4, f64::NAN);

    for _ in 0..6 {
        inverter.solve_linear_system(&healthy, &b).unwrap();
    }
    assert!(inverter.solve_linear_system(&singular, &b).is_err());
    assert!(inverter.invert_matrix(&nan).is_err());

    let stats = sim_stability::statistics(inverter.monitor());
    assert_eq!(stats, inverter.statistics());
    assert_eq!(stats.total_inversions, 8);
    assert_eq!(stats.failed_count, 2);
    assert_eq!(stats.regularized_count, 0);
    assert_eq!(stats.failure_rate, 0.25);
    assert_eq!(inverter.monitor().history().count(), 8);

    inverter.reset_statistics();
    assert_eq!(inverter.statistics().total_inversions, 0);
}
