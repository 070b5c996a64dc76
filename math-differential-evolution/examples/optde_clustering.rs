use math_differential_evolution::{
    DEConfig, DifferentialEvolution, KMeans, PopulationReduction, SnapshotContent,
    UniformInitializer,
};
use ndarray::Array1;

fn main() {
    // Ackley function (2D)
    let ackley = |x: &Array1<f64>| {
        let x0 = x[0];
        let x1 = x[1];
        let s = 0.5 * (x0 * x0 + x1 * x1);
        let c = 0.5
            * ((2.0 * std::f64::consts::PI * x0).cos() + (2.0 * std::f64::consts::PI * x1).cos());
        -20.0 * (-0.2 * s.sqrt()).exp() - c.exp() + 20.0 + std::f64::consts::E
    };

    let init = UniformInitializer::cube(-5.0, 5.0, 2).expect("valid bounds");

    let cfg = DEConfig {
        iterations: 150,
        population_size: 40,
        seed: Some(42),
        snapshot: SnapshotContent {
            population: false,
            labels: true,
        },
        ..DEConfig::default()
    };

    // Cluster the initial population into 6 groups and keep the best of
    // each group at iteration 50.
    let engine = DifferentialEvolution::new(&ackley, &init)
        .with_reduction(PopulationReduction::clustering_best(KMeans::new(6), 50));

    let report = engine.run(&cfg).expect("optimization failed");

    for event in &report.reductions {
        println!(
            "iteration {:3}: population {} -> {}",
            event.iteration, event.size_before, event.size_after
        );
    }
    for snap in report.snapshots.iter().step_by(25) {
        println!(
            "iter {:4}  best_f={:.6e}  labels={:?}",
            snap.iteration,
            snap.optimal_value,
            snap.labels.as_deref().unwrap_or(&[])
        );
    }
    println!(
        "best f={:.6e}\nbest x={:?}\nevaluations={}",
        report.fun, report.x, report.nfev
    );
}
