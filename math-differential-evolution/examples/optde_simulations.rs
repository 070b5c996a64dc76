use math_differential_evolution::simulation::successful_traces;
use math_differential_evolution::{
    DEConfig, DifferentialEvolution, PopulationReduction, SimulationStatistics, Simulations,
    UniformInitializer, write_traces_csv,
};
use ndarray::Array1;
use std::time::Instant;

fn main() {
    // Rastrigin function with artificial compute delay to simulate expensive evaluations
    let dimension = 10;
    let rastrigin = move |x: &Array1<f64>| -> f64 {
        let mut sum = 0.0;
        for _ in 0..1000 {
            for &xi in x.iter() {
                sum += xi.sin().cos().exp().ln_1p();
            }
        }

        let a = 10.0;
        let n = x.len() as f64;
        let result = a * n
            + x.iter()
                .map(|&xi| xi * xi - a * (2.0 * std::f64::consts::PI * xi).cos())
                .sum::<f64>();
        result + sum * 1e-10
    };

    let init = UniformInitializer::cube(-5.12, 5.12, dimension).expect("valid bounds");
    let cfg = DEConfig::randomized(100, 30);

    let plain = DifferentialEvolution::new(&rastrigin, &init);
    let regrow = DifferentialEvolution::new(&rastrigin, &init)
        .with_reduction(PopulationReduction::reduction_kmeans_regrow());

    for (name, engine) in [("randomized", &plain), ("kmeans_regrow", &regrow)] {
        for jobs in [1, 4] {
            let start = Instant::now();
            let results = Simulations::new(8)
                .with_seed(42)
                .with_jobs(jobs)
                .run(engine, &cfg);
            let elapsed = start.elapsed();

            if let Some(stats) = SimulationStatistics::from_results(&results) {
                println!(
                    "{name:>14} | {jobs} job(s) | {:.3} s | mean {:.4e} | std {:.4e} | best {:.4e}",
                    elapsed.as_secs_f64(),
                    stats.mean,
                    stats.std,
                    stats.min
                );
            }

            if jobs == 1 {
                let path = std::env::temp_dir().join(format!("optde_{name}.csv"));
                write_traces_csv(&path, &successful_traces(results)).expect("write traces");
                println!("{name:>14} | traces in {}", path.display());
            }
        }
    }
}
