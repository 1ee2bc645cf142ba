//! Batched evaluation (`PlantBatch`) with the `parallel` feature enabled.

use nalgebra::DVector;
use sim_plant::{PhysicsMatrixAdapter, PlantBatch, PlantState, SimplifiedDip};
use sim_stability::RegularizationPolicy;

fn states(n: usize) -> Vec<PlantState> {
    (0..n)
        .map(|i| {
            let angle = 0.1 * i as f64;
            PlantState::new(
                DVector::from_vec(vec![0.0, angle, angle - 0.2]),
                DVector::from_vec(vec![0.0, 0.5, -0.5]),
            )
        })
        .collect()
}

#[test]
fn parallel_batch_matches_sequential_adapters() {
    let n = 32;
    let policy = RegularizationPolicy::realtime();
    let mut batch = PlantBatch::new(SimplifiedDip::default(), policy.clone(), n);
    let states = states(n);
    let controls: Vec<f64> = (0..n).map(|i| i as f64 - 16.0).collect();

    for _ in 0..3 {
        let results = batch.evaluate_all(&states, &controls).unwrap();
        for (i, result) in results.iter().enumerate() {
            let mut adapter =
                PhysicsMatrixAdapter::with_policy(SimplifiedDip::default(), policy.clone());
            assert_eq!(result, &adapter.compute_dynamics(&states[i], controls[i]));
        }
    }

    let per_instance = batch.statistics();
    assert!(per_instance.iter().all(|s| s.total_inversions == 3));
    assert_eq!(batch.aggregate_statistics().total_inversions, 3 * n as u64);
}

#[test]
fn corrupted_instances_fail_alone() {
    let n = 16;
    let mut batch = PlantBatch::new(SimplifiedDip::default(), RegularizationPolicy::default(), n);
    let mut states = states(n);
    for i in [1, 7, 12] {
        states[i].qd[1] = f64::INFINITY;
    }
    let results = batch.evaluate_all(&states, &vec![0.0; n]).unwrap();

    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.success, ![1, 7, 12].contains(&i), "instance {i}");
    }
    let total = batch.aggregate_statistics();
    assert_eq!(total.failed_count, 3);
    assert_eq!(batch.adapter(7).map(|a| a.statistics().failed_count), Some(1));

    batch.reset_statistics_all();
    assert_eq!(batch.aggregate_statistics().total_inversions, 0);
}
