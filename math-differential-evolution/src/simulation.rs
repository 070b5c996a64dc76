//! Repeated independent runs of one engine configuration.
//!
//! Each run gets its own seed (`seed + run index` when a base seed is set)
//! and its own state; a failing run is reported in its slot and does not stop
//! the others.

use log::{info, warn};

use crate::objective::{ObjectiveFunction, PopulationInitializer};
use crate::parallel_eval::{ParallelConfig, run_indexed};
use crate::{DEConfig, DifferentialEvolution, Result};

/// Repeated-run driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulations {
    /// Number of independent runs.
    pub runs: usize,
    /// Worker threads; 1 runs sequentially.
    pub jobs: usize,
    /// Base seed; `None` seeds every run from the OS.
    pub seed: Option<u64>,
}

impl Default for Simulations {
    fn default() -> Self {
        Self {
            runs: 30,
            jobs: 1,
            seed: None,
        }
    }
}

impl Simulations {
    /// `runs` sequential, unseeded runs.
    pub fn new(runs: usize) -> Self {
        Self {
            runs,
            ..Self::default()
        }
    }

    /// Sets the number of worker threads.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Sets the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Runs the engine `runs` times and returns each run's optimal-value
    /// trace (or its error), in run order.
    pub fn run<F, I>(
        &self,
        engine: &DifferentialEvolution<'_, F, I>,
        config: &DEConfig,
    ) -> Vec<Result<Vec<f64>>>
    where
        F: ObjectiveFunction + Sync + ?Sized,
        I: PopulationInitializer + Sync + ?Sized,
    {
        info!("running {} simulations on {} jobs", self.runs, self.jobs);
        let parallel = ParallelConfig::with_jobs(self.jobs);
        run_indexed(self.runs, &parallel, |run| {
            let mut cfg = config.clone();
            cfg.seed = self.seed.map(|s| s.wrapping_add(run as u64));
            let outcome = engine.run(&cfg).map(|report| report.optimal_values());
            if let Err(e) = &outcome {
                warn!("simulation run {run} failed: {e}");
            }
            outcome
        })
    }
}

/// Summary of the final optimal values of successful runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationStatistics {
    /// Successful runs.
    pub runs: usize,
    /// Failed runs.
    pub failures: usize,
    /// Mean final value.
    pub mean: f64,
    /// Population standard deviation of final values.
    pub std: f64,
    /// Best final value.
    pub min: f64,
    /// Worst final value.
    pub max: f64,
}

impl SimulationStatistics {
    /// Statistics over the last value of each successful trace; `None` when
    /// no run succeeded.
    pub fn from_results(results: &[Result<Vec<f64>>]) -> Option<Self> {
        let finals: Vec<f64> = results
            .iter()
            .filter_map(|r| r.as_ref().ok().and_then(|trace| trace.last().copied()))
            .collect();
        if finals.is_empty() {
            return None;
        }
        let n = finals.len() as f64;
        let mean = finals.iter().sum::<f64>() / n;
        let var = finals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            runs: finals.len(),
            failures: results.len() - finals.len(),
            mean,
            std: var.sqrt(),
            min: finals.iter().copied().fold(f64::INFINITY, f64::min),
            max: finals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Traces of the successful runs, in run order.
pub fn successful_traces(results: Vec<Result<Vec<f64>>>) -> Vec<Vec<f64>> {
    results.into_iter().filter_map(|r| r.ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEError, Fallible, UniformInitializer};
    use approx::assert_relative_eq;
    use ndarray::Array1;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_seeded_runs_reproducible_across_jobs() {
        let sphere = |x: &Array1<f64>| x.dot(x);
        let init = UniformInitializer::cube(-5.0, 5.0, 3).unwrap();
        let engine = DifferentialEvolution::new(&sphere, &init);
        let config = DEConfig {
            iterations: 20,
            population_size: 10,
            ..DEConfig::default()
        };

        let seq = Simulations::new(4).with_seed(7).run(&engine, &config);
        let par = Simulations::new(4).with_seed(7).with_jobs(3).run(&engine, &config);
        let seq = successful_traces(seq);
        let par = successful_traces(par);
        assert_eq!(seq.len(), 4);
        assert_eq!(seq, par);
        assert!(seq.iter().all(|t| t.len() == 21));
        assert_ne!(seq[0], seq[1]);
    }

    #[test]
    fn test_failed_run_does_not_abort_others() {
        let init = UniformInitializer::cube(-1.0, 1.0, 2).unwrap();
        // 4 initial + 2 x 4 trial evaluations per run: call 15 lands in run 1
        let calls = AtomicUsize::new(0);
        let objective = Fallible(|x: &Array1<f64>| {
            if calls.fetch_add(1, Ordering::SeqCst) == 15 {
                Err("out of domain")
            } else {
                Ok(x.dot(x))
            }
        });
        let engine = DifferentialEvolution::new(&objective, &init);
        let config = DEConfig {
            iterations: 2,
            population_size: 4,
            ..DEConfig::default()
        };
        let results = Simulations::new(3).with_seed(1).run(&engine, &config);
        assert_eq!(results.len(), 3);

        let failed: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_err())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(failed, vec![1]);
        assert!(matches!(
            results[1],
            Err(DEError::ObjectiveEvaluation { .. })
        ));
        for i in [0, 2] {
            assert_eq!(results[i].as_ref().unwrap().len(), config.iterations + 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 12 + 4 + 12);

        let stats = SimulationStatistics::from_results(&results).unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_statistics() {
        let results: Vec<Result<Vec<f64>>> = vec![
            Ok(vec![5.0, 1.0]),
            Err(DEError::NoCompletedTrials),
            Ok(vec![4.0, 3.0]),
        ];
        let stats = SimulationStatistics::from_results(&results).unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.failures, 1);
        assert_relative_eq!(stats.mean, 2.0);
        assert_relative_eq!(stats.std, 1.0);
        assert_relative_eq!(stats.min, 1.0);
        assert_relative_eq!(stats.max, 3.0);
        assert!(SimulationStatistics::from_results(&[]).is_none());
    }
}
