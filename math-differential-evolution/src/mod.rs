//! Differential Evolution with clustering-based population reduction.
//!
//! This crate provides a DE/rand/1/bin optimizer whose population can be
//! periodically partitioned by a pluggable clustering algorithm and replaced by
//! per-cluster representatives. Variants (single-shot clustering, periodic
//! reduction, regrowth, randomized control parameters) are composed from a
//! small set of strategies handed to one engine type rather than subclassed.
//!
//! # Features
//!
//! - Vectorised DE/rand/1 mutation and binomial crossover
//! - Per-iteration snapshot trace of the best value (optionally population and labels)
//! - K-Means, agglomerative and DBSCAN clustering, or any closure
//! - Representative policies: best, average, best-including-noise, random sample
//! - Reduction triggers: fixed iteration, midpoint, periodic, arbitrary predicate
//! - TPE hyperparameter tuning and parallel repeated simulations
//! - CSV persistence of traces
//!
//! # Example
//!
//! ```rust
//! use math_differential_evolution::{differential_evolution, DEConfigBuilder};
//!
//! // Minimize the sphere function: f(x) = sum(x_i^2)
//! let bounds = vec![(-5.0, 5.0), (-5.0, 5.0)];
//! let config = DEConfigBuilder::new()
//!     .iterations(200)
//!     .population_size(30)
//!     .seed(42)
//!     .build()
//!     .expect("invalid config");
//!
//! let result = differential_evolution(
//!     &|x: &ndarray::Array1<f64>| x.iter().map(|&xi| xi * xi).sum::<f64>(),
//!     &bounds,
//!     &config,
//! ).expect("optimization should succeed");
//!
//! assert!(result.fun < 1e-3);
//! assert_eq!(result.snapshots.len(), 201);
//! ```
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod error;
pub use error::{DEError, Result};

use std::fmt;

use log::{debug, info};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

mod argmin;
/// Per-dimension search bounds.
pub mod bounds;
/// Clustering algorithms used by population reduction.
pub mod cluster;
/// Binomial (uniform) crossover implementation.
mod crossover_binomial;
/// Utilities for selecting distinct random indices from a population.
mod distinct_indices;
/// Latin Hypercube Sampling initialization strategy.
pub mod init_latin_hypercube;
/// Random uniform initialization strategy.
pub mod init_random;
/// Rand/1 mutation strategy: uses random individual plus one difference vector.
mod mutant_rand1;
/// Objective function and population initializer contracts.
pub mod objective;
/// Population reduction strategies and their named variants.
pub mod reduction;

/// Convenience entry point over box bounds.
pub mod differential_evolution;
/// Registry of standard test functions for benchmarking.
pub mod function_registry;
/// Internal helper functions for DE implementation.
mod impl_helpers;
/// Parallel execution of independent runs.
pub mod parallel_eval;
/// Trace persistence (CSV).
pub mod recorder;
/// Repeated independent runs and their statistics.
pub mod simulation;
/// Hyperparameter tuning over a TPE study.
pub mod tuning;

pub use bounds::Bounds;
pub use cluster::{
    Agglomerative, ClusterFit, ClusterLabel, ClusteringAlgorithm, ClusteringArgs, Dbscan, KMeans,
    Linkage, NOISE,
};
pub use differential_evolution::differential_evolution;
pub use init_latin_hypercube::LatinHypercubeInitializer;
pub use init_random::UniformInitializer;
pub use objective::{Fallible, ObjectiveFunction, PopulationInitializer};
pub use parallel_eval::ParallelConfig;
pub use recorder::{read_traces_csv, write_traces_csv};
pub use reduction::{
    ClusterCount, ClusterSpace, PopulationReduction, Regrowth, ReductionTrigger,
    RepresentativePolicy,
};
pub use simulation::{SimulationStatistics, Simulations};
pub use tuning::{FineTuner, Hyperparameter, SearchSpace, TuningReport};

use impl_helpers::PopulationState;

/// Smallest population a run may be configured with.
pub const MIN_POPULATION_SIZE: usize = 4;

/// How the scaling factor F and crossover rate CR are chosen each iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterSchedule {
    /// The same F and CR for every iteration.
    Fixed {
        /// Differential weight F (> 0).
        scaling_factor: f64,
        /// Crossover probability CR in [0, 1].
        crossover_rate: f64,
    },
    /// F and CR redrawn independently from U[0, 1) before every iteration.
    Randomized,
}

impl Default for ParameterSchedule {
    fn default() -> Self {
        ParameterSchedule::Fixed {
            scaling_factor: 0.5,
            crossover_rate: 0.5,
        }
    }
}

impl ParameterSchedule {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        match *self {
            ParameterSchedule::Fixed {
                scaling_factor,
                crossover_rate,
            } => (scaling_factor, crossover_rate),
            ParameterSchedule::Randomized => {
                let f = rng.random::<f64>();
                let cr = rng.random::<f64>();
                (f, cr)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let ParameterSchedule::Fixed {
            scaling_factor,
            crossover_rate,
        } = *self
        {
            if !(scaling_factor > 0.0 && scaling_factor.is_finite()) {
                return Err(DEError::InvalidScalingFactor {
                    factor: scaling_factor,
                });
            }
            if !(0.0..=1.0).contains(&crossover_rate) {
                return Err(DEError::InvalidCrossoverRate {
                    rate: crossover_rate,
                });
            }
        }
        Ok(())
    }
}

/// Optional copies stored in every snapshot besides the best value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotContent {
    /// Copy of the population.
    pub population: bool,
    /// Copy of the cluster labels (when a clustering has run).
    pub labels: bool,
}

/// Configuration for the Differential Evolution optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct DEConfig {
    /// Number of loop iterations.
    pub iterations: usize,
    /// Number of individuals at the start of the run (>= 4).
    pub population_size: usize,
    /// F / CR schedule.
    pub parameters: ParameterSchedule,
    /// Optional random seed for reproducibility.
    pub seed: Option<u64>,
    /// What each snapshot records.
    pub snapshot: SnapshotContent,
}

impl Default for DEConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            population_size: 50,
            parameters: ParameterSchedule::default(),
            seed: None,
            snapshot: SnapshotContent::default(),
        }
    }
}

impl DEConfig {
    /// Randomized-parameter configuration: only iterations and population size.
    pub fn randomized(iterations: usize, population_size: usize) -> Self {
        Self {
            iterations,
            population_size,
            parameters: ParameterSchedule::Randomized,
            ..Self::default()
        }
    }

    /// Checks the preconditions of a run.
    ///
    /// # Errors
    ///
    /// Returns `DEError::PopulationTooSmall`, `DEError::InvalidScalingFactor`
    /// or `DEError::InvalidCrossoverRate`.
    pub fn validate(&self) -> Result<()> {
        if self.population_size < MIN_POPULATION_SIZE {
            return Err(DEError::PopulationTooSmall {
                pop_size: self.population_size,
            });
        }
        self.parameters.validate()
    }
}

/// Fluent builder for `DEConfig` for ergonomic configuration.
///
/// # Example
///
/// ```rust
/// use math_differential_evolution::DEConfigBuilder;
///
/// let config = DEConfigBuilder::new()
///     .iterations(500)
///     .population_size(20)
///     .scaling_factor(0.8)
///     .crossover_rate(0.9)
///     .seed(42)
///     .build()
///     .unwrap();
/// assert_eq!(config.population_size, 20);
/// ```
#[derive(Debug, Default)]
pub struct DEConfigBuilder {
    cfg: DEConfig,
}

impl DEConfigBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            cfg: DEConfig::default(),
        }
    }
    /// Sets the number of iterations.
    pub fn iterations(mut self, v: usize) -> Self {
        self.cfg.iterations = v;
        self
    }
    /// Sets the population size.
    pub fn population_size(mut self, v: usize) -> Self {
        self.cfg.population_size = v;
        self
    }
    /// Sets a fixed scaling factor F.
    pub fn scaling_factor(mut self, v: f64) -> Self {
        let crossover_rate = match self.cfg.parameters {
            ParameterSchedule::Fixed { crossover_rate, .. } => crossover_rate,
            ParameterSchedule::Randomized => 0.5,
        };
        self.cfg.parameters = ParameterSchedule::Fixed {
            scaling_factor: v,
            crossover_rate,
        };
        self
    }
    /// Sets a fixed crossover rate CR.
    pub fn crossover_rate(mut self, v: f64) -> Self {
        let scaling_factor = match self.cfg.parameters {
            ParameterSchedule::Fixed { scaling_factor, .. } => scaling_factor,
            ParameterSchedule::Randomized => 0.5,
        };
        self.cfg.parameters = ParameterSchedule::Fixed {
            scaling_factor,
            crossover_rate: v,
        };
        self
    }
    /// Redraws F and CR every iteration.
    pub fn randomized(mut self) -> Self {
        self.cfg.parameters = ParameterSchedule::Randomized;
        self
    }
    /// Sets the random seed for reproducibility.
    pub fn seed(mut self, v: u64) -> Self {
        self.cfg.seed = Some(v);
        self
    }
    /// Records a population copy in every snapshot.
    pub fn record_population(mut self, v: bool) -> Self {
        self.cfg.snapshot.population = v;
        self
    }
    /// Records the cluster labels in every snapshot.
    pub fn record_labels(mut self, v: bool) -> Self {
        self.cfg.snapshot.labels = v;
        self
    }
    /// Builds and returns the configuration.
    ///
    /// # Errors
    ///
    /// Same as [`DEConfig::validate`].
    pub fn build(self) -> Result<DEConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// State of a run recorded after one iteration (or after initialization).
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// 0 for the initial population, `t + 1` after loop iteration `t`.
    pub iteration: usize,
    /// Best fitness known at that point.
    pub optimal_value: f64,
    /// Population copy, when requested.
    pub population: Option<Array2<f64>>,
    /// Cluster labels, when requested and available.
    pub labels: Option<Vec<ClusterLabel>>,
}

/// One reduction event of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionEvent {
    /// Loop iteration at whose start the reduction ran.
    pub iteration: usize,
    /// Population size before.
    pub size_before: usize,
    /// Population size after (including regrowth).
    pub size_after: usize,
}

/// Result/report of a DE optimization run.
#[derive(Clone)]
pub struct DEReport {
    /// The best solution vector.
    pub x: Array1<f64>,
    /// The objective function value at the best solution.
    pub fun: f64,
    /// Number of iterations performed.
    pub nit: usize,
    /// Number of function evaluations performed.
    pub nfev: usize,
    /// Final population matrix.
    pub population: Array2<f64>,
    /// Fitness values for each population member.
    pub population_energies: Array1<f64>,
    /// Cluster labels of the final population, if any clustering ran.
    pub labels: Option<Vec<ClusterLabel>>,
    /// `nit + 1` snapshots; the first describes the initial population.
    pub snapshots: Vec<Snapshot>,
    /// Reduction events, in order.
    pub reductions: Vec<ReductionEvent>,
}

impl DEReport {
    /// Best value of every snapshot.
    pub fn optimal_values(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.optimal_value).collect()
    }

    /// Best value of the last snapshot.
    pub fn final_value(&self) -> f64 {
        self.snapshots.last().map_or(self.fun, |s| s.optimal_value)
    }
}

impl fmt::Debug for DEReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DEReport")
            .field("x", &format!("len={}", self.x.len()))
            .field("fun", &self.fun)
            .field("nit", &self.nit)
            .field("nfev", &self.nfev)
            .field(
                "population",
                &format!("{}x{}", self.population.nrows(), self.population.ncols()),
            )
            .field("snapshots", &format!("len={}", self.snapshots.len()))
            .field("reductions", &self.reductions.len())
            .finish()
    }
}

/// Differential Evolution optimizer.
///
/// Borrows an objective and an initializer; optionally owns a
/// [`PopulationReduction`]. [`run`](Self::run) takes `&self` and keeps every
/// piece of run state local, so one engine may serve many independent runs,
/// including concurrent ones.
pub struct DifferentialEvolution<'a, F, I>
where
    F: ObjectiveFunction + ?Sized,
    I: PopulationInitializer + ?Sized,
{
    func: &'a F,
    init: &'a I,
    reduction: Option<PopulationReduction>,
}

impl<'a, F, I> DifferentialEvolution<'a, F, I>
where
    F: ObjectiveFunction + ?Sized,
    I: PopulationInitializer + ?Sized,
{
    /// Creates a plain DE/rand/1/bin optimizer.
    pub fn new(func: &'a F, init: &'a I) -> Self {
        Self {
            func,
            init,
            reduction: None,
        }
    }

    /// Attaches a population reduction strategy.
    pub fn with_reduction(mut self, reduction: PopulationReduction) -> Self {
        self.reduction = Some(reduction);
        self
    }

    /// The attached reduction strategy.
    pub fn reduction(&self) -> Option<&PopulationReduction> {
        self.reduction.as_ref()
    }

    /// Runs the optimization and returns a report.
    ///
    /// # Errors
    ///
    /// Configuration errors before anything is evaluated; objective and
    /// clustering errors abort the run.
    pub fn run(&self, config: &DEConfig) -> Result<DEReport> {
        use crossover_binomial::binomial_crossover_population;
        use mutant_rand1::{draw_donors, mutant_rand1};

        config.validate()?;
        if let Some(reduction) = &self.reduction {
            reduction.validate()?;
        }

        let mut rng: StdRng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => {
                let mut thread_rng = rand::rng();
                StdRng::from_rng(&mut thread_rng)
            }
        };

        info!(
            "DE run: iterations={}, population={}, parameters={:?}, reduction={}",
            config.iterations,
            config.population_size,
            config.parameters,
            self.reduction.is_some()
        );

        let mut state: PopulationState = self.initial_state(config, &mut rng)?;
        let initial_size = state.size();
        let mut snapshots = Vec::with_capacity(config.iterations + 1);
        let mut reductions = Vec::new();
        snapshots.push(state.snapshot(0, &config.snapshot));

        for t in 0..config.iterations {
            if let Some(reduction) = &self.reduction {
                if reduction.trigger().fires(t, config.iterations) {
                    let size_before = state.size();
                    let survivors = reduction.reduce(
                        t,
                        &state.population,
                        &state.fitness,
                        initial_size,
                        &mut rng,
                        |x| self.evaluate(x),
                    )?;
                    state.replace(survivors);
                    reductions.push(ReductionEvent {
                        iteration: t,
                        size_before,
                        size_after: state.size(),
                    });
                }
            }

            let (f, cr) = config.parameters.draw(&mut rng);
            let npop = state.size();

            // Mutants and trials come from the population as it stood at the
            // start of the iteration.
            let donors = draw_donors(npop, &mut rng);
            let mutants = mutant_rand1(&state.population, &donors, f);
            let trials = binomial_crossover_population(&state.population, &mutants, cr, &mut rng);

            let mut accepted = 0usize;
            for (i, trial) in trials.rows().into_iter().enumerate() {
                let trial = trial.to_owned();
                let trial_f = self.evaluate(&trial)?;
                state.nfev += 1;
                if trial_f <= state.fitness[i] {
                    state.population.row_mut(i).assign(&trial);
                    state.fitness[i] = trial_f;
                    accepted += 1;
                    if trial_f < state.best_f {
                        state.best_f = trial_f;
                        state.best_x = trial;
                    }
                }
            }

            debug!(
                "DE iter {:4}  best_f={:.6e}  accepted={}/{}  F={:.3} CR={:.3}",
                t, state.best_f, accepted, npop, f, cr
            );
            snapshots.push(state.snapshot(t + 1, &config.snapshot));
        }

        info!(
            "DE done: best_f={:.6e}, nfev={}, reductions={}, final population={}",
            state.best_f,
            state.nfev,
            reductions.len(),
            state.size()
        );
        Ok(self.finish_report(state, snapshots, reductions, config.iterations))
    }
}
