//! Hyperparameter tuning.
//!
//! A [`SearchSpace`] maps the engine's tunable options to a [`Hyperparameter`]
//! range. [`FineTuner`] drives an [`optimizer::Study`] (TPE sampler,
//! minimizing) over that space: every trial runs the engine with the
//! suggested configuration and is scored by the best value of its last
//! snapshot.
//!
//! Search spaces can be read from JSON:
//!
//! ```rust
//! use math_differential_evolution::SearchSpace;
//!
//! let space = SearchSpace::from_json(r#"{
//!     "PopulationSize": {"kind": "int", "values": [10, 40]},
//!     "ScalingFactor": {"kind": "float", "values": [0.2, 1.0]},
//!     "CrossoverRate": {"kind": "categorical", "values": [0.1, 0.5, 0.9]}
//! }"#).unwrap();
//! assert_eq!(space.len(), 3);
//!
//! assert!(SearchSpace::from_json(r#"{"ScalingFactor": {"kind": "loguniform", "values": [0.1, 1.0]}}"#).is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use optimizer::parameter::{CategoricalParam, FloatParam, IntParam, Parameter};
use optimizer::sampler::tpe::TpeSamplerBuilder;
use optimizer::{Study, Trial};
use serde::Deserialize;

use crate::error::{DEError, Result};
use crate::objective::{ObjectiveFunction, PopulationInitializer};
use crate::parallel_eval::{ParallelConfig, run_indexed};
use crate::{DEConfig, DifferentialEvolution, MIN_POPULATION_SIZE, ParameterSchedule};

/// Options of the engine a search space may tune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TunedParameter {
    /// Population size (integer).
    PopulationSize,
    /// Scaling factor F.
    ScalingFactor,
    /// Crossover rate CR.
    CrossoverRate,
}

impl FromStr for TunedParameter {
    type Err = DEError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PopulationSize" => Ok(TunedParameter::PopulationSize),
            "ScalingFactor" => Ok(TunedParameter::ScalingFactor),
            "CrossoverRate" => Ok(TunedParameter::CrossoverRate),
            other => Err(DEError::UnrecognizedHyperparameter {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TunedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TunedParameter::PopulationSize => "PopulationSize",
            TunedParameter::ScalingFactor => "ScalingFactor",
            TunedParameter::CrossoverRate => "CrossoverRate",
        };
        f.write_str(name)
    }
}

/// Range of one hyperparameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Hyperparameter {
    /// Uniform real in `[low, high]`.
    Float {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Uniform integer in `[low, high]`.
    Int {
        /// Lower bound.
        low: i64,
        /// Upper bound (inclusive).
        high: i64,
    },
    /// One of the listed values.
    Categorical(Vec<f64>),
}

/// A value drawn from a [`Hyperparameter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Suggestion {
    /// From a float or categorical range.
    Float(f64),
    /// From an int range.
    Int(i64),
}

impl Hyperparameter {
    /// Builds a range from its kind name (`float`, `int`, `categorical`) and
    /// values (`[low, high]`, or the choices).
    ///
    /// # Errors
    ///
    /// `UnrecognizedHyperparameterKind` for any other kind,
    /// `InvalidHyperparameterRange` for malformed values.
    pub fn from_kind(name: &str, kind: &str, values: &[f64]) -> Result<Self> {
        let range_error = |reason: String| DEError::InvalidHyperparameterRange {
            name: name.to_string(),
            reason,
        };
        let param = match kind {
            "float" | "int" => {
                let &[low, high] = values else {
                    return Err(range_error(format!(
                        "expected [low, high], got {} values",
                        values.len()
                    )));
                };
                if kind == "float" {
                    Hyperparameter::Float { low, high }
                } else {
                    if low.fract() != 0.0 || high.fract() != 0.0 {
                        return Err(range_error(format!("int bounds {low}, {high} are not integers")));
                    }
                    Hyperparameter::Int {
                        low: low as i64,
                        high: high as i64,
                    }
                }
            }
            "categorical" => Hyperparameter::Categorical(values.to_vec()),
            other => {
                return Err(DEError::UnrecognizedHyperparameterKind {
                    name: name.to_string(),
                    kind: other.to_string(),
                });
            }
        };
        param.validate(name)?;
        Ok(param)
    }

    fn validate(&self, name: &str) -> Result<()> {
        let reason = match self {
            Hyperparameter::Float { low, high } if !(low.is_finite() && high.is_finite()) => {
                Some(format!("bounds [{low}, {high}] are not finite"))
            }
            Hyperparameter::Float { low, high } if low > high => {
                Some(format!("low {low} exceeds high {high}"))
            }
            Hyperparameter::Int { low, high } if low > high => {
                Some(format!("low {low} exceeds high {high}"))
            }
            Hyperparameter::Categorical(choices) if choices.is_empty() => {
                Some("no choices".to_string())
            }
            _ => None,
        };
        match reason {
            Some(reason) => Err(DEError::InvalidHyperparameterRange {
                name: name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// The study parameter sampling this range.
    fn study_param(&self) -> StudyParam {
        match self {
            Hyperparameter::Float { low, high } => StudyParam::Float(FloatParam::new(*low, *high)),
            Hyperparameter::Int { low, high } => StudyParam::Int(IntParam::new(*low, *high)),
            Hyperparameter::Categorical(choices) => {
                StudyParam::Categorical(CategoricalParam::new(choices.clone()))
            }
        }
    }

    fn min_value(&self) -> f64 {
        match self {
            Hyperparameter::Float { low, .. } => *low,
            Hyperparameter::Int { low, .. } => *low as f64,
            Hyperparameter::Categorical(choices) => {
                choices.iter().copied().fold(f64::INFINITY, f64::min)
            }
        }
    }

    fn is_integral(&self) -> bool {
        match self {
            Hyperparameter::Float { .. } => false,
            Hyperparameter::Int { .. } => true,
            Hyperparameter::Categorical(choices) => choices.iter().all(|c| c.fract() == 0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawHyperparameter {
    kind: String,
    #[serde(default)]
    values: Vec<f64>,
}

/// A [`Hyperparameter`] bound to one parameter of a study.
///
/// The parameter keeps its id across trials, which is what lets the sampler
/// relate the values of successive trials.
#[derive(Debug, Clone)]
enum StudyParam {
    Float(FloatParam),
    Int(IntParam),
    Categorical(CategoricalParam<f64>),
}

impl StudyParam {
    fn suggest(&self, trial: &mut Trial) -> Result<Suggestion> {
        Ok(match self {
            StudyParam::Float(p) => Suggestion::Float(p.suggest(trial)?),
            StudyParam::Int(p) => Suggestion::Int(p.suggest(trial)?),
            StudyParam::Categorical(p) => Suggestion::Float(p.suggest(trial)?),
        })
    }
}

/// Tunable options and their ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSpace {
    params: BTreeMap<TunedParameter, Hyperparameter>,
}

impl SearchSpace {
    /// An empty space.
    pub fn new() -> Self {
        Self::default()
    }

    /// PopulationSize int [10, 100], ScalingFactor float [0.1, 1.5],
    /// CrossoverRate float [0, 1].
    pub fn default_for(parameters: &ParameterSchedule) -> Self {
        let mut space = Self::new();
        space.params.insert(
            TunedParameter::PopulationSize,
            Hyperparameter::Int { low: 10, high: 100 },
        );
        if matches!(parameters, ParameterSchedule::Fixed { .. }) {
            space.params.insert(
                TunedParameter::ScalingFactor,
                Hyperparameter::Float {
                    low: 0.1,
                    high: 1.5,
                },
            );
            space.params.insert(
                TunedParameter::CrossoverRate,
                Hyperparameter::Float {
                    low: 0.0,
                    high: 1.0,
                },
            );
        }
        space
    }

    /// Adds (or replaces) the range of a named option.
    ///
    /// # Errors
    ///
    /// `UnrecognizedHyperparameter` for an unknown name,
    /// `HyperparameterType` when a population size would not be an integer,
    /// `InvalidHyperparameterRange` for malformed ranges and for population
    /// sizes that could fall below the minimum a run accepts.
    pub fn insert(&mut self, name: &str, param: Hyperparameter) -> Result<()> {
        let key: TunedParameter = name.parse()?;
        param.validate(name)?;
        if key == TunedParameter::PopulationSize {
            if !param.is_integral() {
                return Err(DEError::HyperparameterType {
                    name: name.to_string(),
                    expected: "integer",
                });
            }
            let low = param.min_value();
            if low < MIN_POPULATION_SIZE as f64 {
                return Err(DEError::InvalidHyperparameterRange {
                    name: name.to_string(),
                    reason: format!("population size {low} is below {MIN_POPULATION_SIZE}"),
                });
            }
        }
        self.params.insert(key, param);
        Ok(())
    }

    /// Parses a JSON object `{name: {"kind": .., "values": [..]}}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawHyperparameter> = serde_json::from_str(json)?;
        let mut space = Self::new();
        for (name, entry) in raw {
            let param = Hyperparameter::from_kind(&name, &entry.kind, &entry.values)?;
            space.insert(&name, param)?;
        }
        Ok(space)
    }

    /// Number of tuned options.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether nothing is tuned.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Fails when `base` cannot take every option of the space: a randomized
    /// schedule has no F or CR to tune.
    pub fn check(&self, base: &DEConfig) -> Result<()> {
        if base.parameters != ParameterSchedule::Randomized {
            return Ok(());
        }
        match self
            .params
            .keys()
            .find(|k| **k != TunedParameter::PopulationSize)
        {
            Some(key) => Err(DEError::UnrecognizedHyperparameter {
                name: key.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn study_params(&self) -> Vec<(TunedParameter, StudyParam)> {
        self.params
            .iter()
            .map(|(key, param)| (*key, param.study_param()))
            .collect()
    }
}

/// Copies `base` with every option of `params` suggested by `trial`.
fn sample_config(
    params: &[(TunedParameter, StudyParam)],
    base: &DEConfig,
    trial: &mut Trial,
) -> Result<DEConfig> {
    let mut cfg = base.clone();
    for (key, param) in params {
        let value = param.suggest(trial)?;
        match key {
            TunedParameter::PopulationSize => {
                cfg.population_size = match value {
                    Suggestion::Int(v) => v.max(0) as usize,
                    Suggestion::Float(v) => v.max(0.0) as usize,
                };
            }
            TunedParameter::ScalingFactor | TunedParameter::CrossoverRate => {
                let v = match value {
                    Suggestion::Int(v) => v as f64,
                    Suggestion::Float(v) => v,
                };
                let ParameterSchedule::Fixed {
                    scaling_factor,
                    crossover_rate,
                } = cfg.parameters
                else {
                    return Err(DEError::UnrecognizedHyperparameter {
                        name: key.to_string(),
                    });
                };
                cfg.parameters = if *key == TunedParameter::ScalingFactor {
                    ParameterSchedule::Fixed {
                        scaling_factor: v,
                        crossover_rate,
                    }
                } else {
                    ParameterSchedule::Fixed {
                        scaling_factor,
                        crossover_rate: v,
                    }
                };
            }
        }
    }
    Ok(cfg)
}

/// One evaluated trial.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    /// Trial index.
    pub number: usize,
    /// Configuration the trial ran with.
    pub config: DEConfig,
    /// Final best value, or the error that ended the run.
    pub score: std::result::Result<f64, String>,
}

/// Outcome of a tuning session.
#[derive(Debug, Clone)]
pub struct TuningReport {
    /// Configuration of the best trial.
    pub best_config: DEConfig,
    /// Score of the best trial.
    pub best_score: f64,
    /// Every trial, in index order.
    pub trials: Vec<TrialRecord>,
}

/// TPE-driven tuner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FineTuner {
    /// Number of trials.
    pub trials: usize,
    /// Trials evaluated concurrently; 1 runs sequentially.
    pub jobs: usize,
    /// Seeds the sampler; trial `i` runs the engine with `seed + i`.
    pub seed: Option<u64>,
}

impl Default for FineTuner {
    fn default() -> Self {
        Self {
            trials: 50,
            jobs: 1,
            seed: None,
        }
    }
}

impl FineTuner {
    /// Tunes `base` over `space`, minimizing the final best value.
    ///
    /// Trials are asked from the study in batches of `jobs`; a batch runs in
    /// parallel and its results are told back before the next batch is
    /// sampled. A failed run is recorded and told to the study as a failure.
    ///
    /// # Errors
    ///
    /// Space errors are raised before any trial runs (e.g. tuning F for a
    /// randomized configuration). `NoCompletedTrials` when every trial failed.
    pub fn tune<F, I>(
        &self,
        engine: &DifferentialEvolution<'_, F, I>,
        base: &DEConfig,
        space: &SearchSpace,
    ) -> Result<TuningReport>
    where
        F: ObjectiveFunction + Sync + ?Sized,
        I: PopulationInitializer + Sync + ?Sized,
    {
        space.check(base)?;

        let mut sampler = TpeSamplerBuilder::new();
        if let Some(seed) = self.seed {
            sampler = sampler.seed(seed);
        }
        let study: Study<f64> = Study::minimize(sampler.build()?);
        let params = space.study_params();

        info!("tuning over {} parameters, {} trials", space.len(), self.trials);
        let parallel = ParallelConfig::with_jobs(self.jobs);
        let batch = self.jobs.max(1);
        let mut trials: Vec<TrialRecord> = Vec::with_capacity(self.trials);
        let mut study_ids = Vec::with_capacity(self.trials);

        while trials.len() < self.trials {
            let first = trials.len();
            let n = batch.min(self.trials - first);
            let mut asked = Vec::with_capacity(n);
            let mut configs = Vec::with_capacity(n);
            for k in 0..n {
                let mut trial = study.ask();
                let mut config = sample_config(&params, base, &mut trial)?;
                config.seed = self
                    .seed
                    .map(|s| s.wrapping_add((first + k) as u64))
                    .or(base.seed);
                asked.push(trial);
                configs.push(config);
            }

            let scores = run_indexed(n, &parallel, |k| match engine.run(&configs[k]) {
                Ok(report) => Ok(report.final_value()),
                Err(e) => {
                    warn!("trial {} failed: {e}", first + k);
                    Err(e.to_string())
                }
            });

            for ((trial, config), score) in asked.into_iter().zip(configs).zip(scores) {
                study_ids.push(trial.id());
                study.tell(trial, score.clone());
                let number = trials.len();
                trials.push(TrialRecord {
                    number,
                    config,
                    score,
                });
            }
        }

        let best = study.best_trial().map_err(|e| match e {
            optimizer::Error::NoCompletedTrials => DEError::NoCompletedTrials,
            other => DEError::Study(other),
        })?;
        let best_index = study_ids
            .iter()
            .position(|&id| id == best.id)
            .ok_or(DEError::NoCompletedTrials)?;
        info!("best trial {} scored {:.6e}", best_index, best.value);

        Ok(TuningReport {
            best_config: trials[best_index].config.clone(),
            best_score: best.value,
            trials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UniformInitializer;
    use ndarray::Array1;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unrecognized_kind() {
        let err = Hyperparameter::from_kind("ScalingFactor", "loguniform", &[0.1, 1.0]).unwrap_err();
        assert!(matches!(err, DEError::UnrecognizedHyperparameterKind { .. }));
        assert!(err.is_hyperparameter_error());
    }

    #[test]
    fn test_ranges_validated() {
        assert!(Hyperparameter::from_kind("CrossoverRate", "float", &[1.0, 0.0]).is_err());
        assert!(Hyperparameter::from_kind("PopulationSize", "int", &[4.5, 10.0]).is_err());
        assert!(Hyperparameter::from_kind("CrossoverRate", "categorical", &[]).is_err());
        assert!(Hyperparameter::from_kind("CrossoverRate", "float", &[0.5]).is_err());
    }

    #[test]
    fn test_unknown_name_and_wrong_type() {
        let mut space = SearchSpace::new();
        let err = space
            .insert("Temperature", Hyperparameter::Float { low: 0.0, high: 1.0 })
            .unwrap_err();
        assert!(matches!(err, DEError::UnrecognizedHyperparameter { .. }));
        let err = space
            .insert("PopulationSize", Hyperparameter::Float { low: 4.0, high: 9.0 })
            .unwrap_err();
        assert!(matches!(err, DEError::HyperparameterType { .. }));
    }

    #[test]
    fn test_population_range_below_minimum_rejected() {
        let mut space = SearchSpace::new();
        let err = space
            .insert("PopulationSize", Hyperparameter::Int { low: 2, high: 20 })
            .unwrap_err();
        assert!(matches!(err, DEError::InvalidHyperparameterRange { .. }));
        let err = space
            .insert(
                "PopulationSize",
                Hyperparameter::Categorical(vec![10.0, 3.0, 40.0]),
            )
            .unwrap_err();
        assert!(matches!(err, DEError::InvalidHyperparameterRange { .. }));
        assert!(
            SearchSpace::from_json(r#"{"PopulationSize": {"kind": "int", "values": [1, 8]}}"#)
                .is_err()
        );
        assert!(
            space
                .insert("PopulationSize", Hyperparameter::Int { low: 4, high: 20 })
                .is_ok()
        );
    }

    #[test]
    fn test_sample_stays_in_range() {
        let params = SearchSpace::default_for(&ParameterSchedule::default()).study_params();
        for id in 0..100 {
            let mut trial = Trial::new(id);
            let cfg = sample_config(&params, &DEConfig::default(), &mut trial).unwrap();
            assert!((10..=100).contains(&cfg.population_size));
            let ParameterSchedule::Fixed {
                scaling_factor,
                crossover_rate,
            } = cfg.parameters
            else {
                panic!("fixed schedule expected");
            };
            assert!((0.1..=1.5).contains(&scaling_factor));
            assert!((0.0..=1.0).contains(&crossover_rate));
        }
    }

    #[test]
    fn test_categorical_suggests_listed_values() {
        let mut space = SearchSpace::new();
        space
            .insert(
                "CrossoverRate",
                Hyperparameter::Categorical(vec![0.1, 0.5, 0.9]),
            )
            .unwrap();
        let params = space.study_params();
        for id in 0..20 {
            let mut trial = Trial::new(id);
            let cfg = sample_config(&params, &DEConfig::default(), &mut trial).unwrap();
            let ParameterSchedule::Fixed { crossover_rate, .. } = cfg.parameters else {
                panic!("fixed schedule expected");
            };
            assert!([0.1, 0.5, 0.9].contains(&crossover_rate));
        }
    }

    #[test]
    fn test_randomized_rejects_scaling_factor() {
        let sphere = |x: &Array1<f64>| x.dot(x);
        let init = UniformInitializer::cube(-1.0, 1.0, 2).unwrap();
        let engine = DifferentialEvolution::new(&sphere, &init);
        let space = SearchSpace::default_for(&ParameterSchedule::default());
        let tuner = FineTuner {
            trials: 2,
            jobs: 1,
            seed: Some(0),
        };
        let err = tuner
            .tune(&engine, &DEConfig::randomized(5, 10), &space)
            .unwrap_err();
        assert!(matches!(err, DEError::UnrecognizedHyperparameter { .. }));

        // population size alone is fine
        let space = SearchSpace::default_for(&ParameterSchedule::Randomized);
        let report = tuner
            .tune(&engine, &DEConfig::randomized(5, 10), &space)
            .unwrap();
        assert_eq!(report.trials.len(), 2);
    }

    #[test]
    fn test_tune_picks_lowest_score() {
        let sphere = |x: &Array1<f64>| x.dot(x);
        let init = UniformInitializer::cube(-5.0, 5.0, 2).unwrap();
        let engine = DifferentialEvolution::new(&sphere, &init);
        let base = DEConfig {
            iterations: 10,
            ..DEConfig::default()
        };
        let tuner = FineTuner {
            trials: 6,
            jobs: 2,
            seed: Some(42),
        };
        let report = tuner
            .tune(&engine, &base, &SearchSpace::default_for(&base.parameters))
            .unwrap();
        assert_eq!(report.trials.len(), 6);
        let min = report
            .trials
            .iter()
            .filter_map(|t| t.score.as_ref().ok().copied())
            .fold(f64::INFINITY, f64::min);
        assert_eq!(report.best_score, min);
        assert!(
            report
                .trials
                .iter()
                .any(|t| t.score == Ok(min) && t.config == report.best_config)
        );
        assert_eq!(report.trials[3].number, 3);
        assert_eq!(report.trials[3].config.seed, Some(45));
    }

    #[test]
    fn test_failed_trials_are_recorded() {
        let calls = AtomicUsize::new(0);
        let init = UniformInitializer::cube(-1.0, 1.0, 2).unwrap();
        // first trial (10 initial evaluations) fails at its first evaluation
        let objective = crate::Fallible(|x: &Array1<f64>| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("first call fails")
            } else {
                Ok(x.dot(x))
            }
        });
        let engine = DifferentialEvolution::new(&objective, &init);
        let mut space = SearchSpace::new();
        space
            .insert("ScalingFactor", Hyperparameter::Float { low: 0.3, high: 0.9 })
            .unwrap();
        let base = DEConfig {
            iterations: 3,
            population_size: 10,
            ..DEConfig::default()
        };
        let tuner = FineTuner {
            trials: 3,
            jobs: 1,
            seed: Some(5),
        };
        let report = tuner.tune(&engine, &base, &space).unwrap();
        assert!(report.trials[0].score.is_err());
        assert!(report.trials[1..].iter().all(|t| t.score.is_ok()));
        assert!(report.best_score.is_finite());
    }

    #[test]
    fn test_all_trials_failing() {
        let init = UniformInitializer::cube(-1.0, 1.0, 2).unwrap();
        let objective = crate::Fallible(|_: &Array1<f64>| Err::<f64, _>("always"));
        let engine = DifferentialEvolution::new(&objective, &init);
        let base = DEConfig {
            iterations: 2,
            ..DEConfig::default()
        };
        let tuner = FineTuner {
            trials: 2,
            jobs: 1,
            seed: Some(1),
        };
        let err = tuner
            .tune(&engine, &base, &SearchSpace::default_for(&base.parameters))
            .unwrap_err();
        assert!(matches!(err, DEError::NoCompletedTrials));
    }
}
