//! Independent adapters on independent threads.
//!
//! Each worker owns its adapter, so results and statistics must match a
//! sequential run exactly and never leak between workers.

use nalgebra::DVector;
use sim_plant::{DynamicsResult, PhysicsMatrixAdapter, PlantState, SimplifiedDip};
use sim_stability::MonitorStatistics;

const WORKERS: usize = 6;

fn workload(worker: usize) -> Vec<(PlantState, f64)> {
    (0..=worker * 3)
        .map(|step| {
            let angle = 0.01 * (worker * 10 + step) as f64;
            let mut q = DVector::from_vec(vec![0.0, angle, -0.5 * angle]);
            // Worker 3 feeds a corrupted state on its first step.
            if worker == 3 && step == 0 {
                q[2] = f64::NAN;
            }
            let qd = DVector::from_vec(vec![0.1, -angle, angle]);
            (PlantState::new(q, qd), step as f64)
        })
        .collect()
}

fn run(worker: usize) -> (Vec<DynamicsResult>, MonitorStatistics) {
    let mut adapter = PhysicsMatrixAdapter::new(SimplifiedDip::default());
    let results = workload(worker)
        .iter()
        .map(|(state, u)| adapter.compute_dynamics(state, *u))
        .collect();
    (results, adapter.statistics())
}

#[test]
fn threaded_adapters_match_sequential_runs() {
    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| std::thread::spawn(move || run(worker)))
        .collect();
    let threaded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for (worker, (results, stats)) in threaded.iter().enumerate() {
        let (expected_results, expected_stats) = run(worker);
        assert_eq!(results, &expected_results, "worker {worker} results");
        assert_eq!(stats, &expected_stats, "worker {worker} statistics");
    }
}

#[test]
fn statistics_never_cross_workers() {
    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| std::thread::spawn(move || run(worker).1))
        .collect();

    for (worker, handle) in handles.into_iter().enumerate() {
        let stats = handle.join().unwrap();
        assert_eq!(stats.total_inversions, (worker * 3 + 1) as u64);
        let expected_failures = u64::from(worker == 3);
        assert_eq!(stats.failed_count, expected_failures, "worker {worker}");
    }
}
