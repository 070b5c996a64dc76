//! Population reduction: cluster the population, keep representatives.
//!
//! A [`PopulationReduction`] is attached to the engine with
//! [`DifferentialEvolution::with_reduction`](crate::DifferentialEvolution::with_reduction).
//! At the start of every loop iteration for which its [`ReductionTrigger`]
//! fires, the current population is partitioned by a [`ClusteringAlgorithm`],
//! the [`RepresentativePolicy`] picks (or synthesizes) the survivors of each
//! cluster, and the population, fitness values and cluster labels are replaced
//! wholesale by the survivors. An optional [`Regrowth`] then refills the
//! population from random combinations of the survivors.
//!
//! The engine re-derives its running best from whatever is left; the best
//! seen before the reduction is not carried over.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::info;
use ndarray::{Array1, Array2, Axis, concatenate};
use rand::Rng;
use rand::rngs::StdRng;

use crate::cluster::{
    Agglomerative, ClusterLabel, ClusteringAlgorithm, ClusteringArgs, KMeans, NOISE, fit_labels,
};
use crate::distinct_indices::distinct_indices;
use crate::error::{DEError, Result};

/// Trigger iteration of the single-shot clustering variants.
pub const DEFAULT_CLUSTERING_ITERATION: usize = 63;

/// Upper bound on survivors per cluster for [`RepresentativePolicy::RandomSample`].
pub const DEFAULT_SAMPLE_PER_CLUSTER: usize = 3;

/// Period of [`PopulationReduction::reduction_kmeans_regrow`].
pub const DEFAULT_REGROW_PERIOD: usize = 20;

/// Predicate over the 0-based loop iteration.
pub type TriggerFn = Arc<dyn Fn(usize) -> bool + Send + Sync>;

/// Decides at which loop iterations a reduction runs.
#[derive(Clone)]
pub enum ReductionTrigger {
    /// Once, at the given loop iteration.
    AtIteration(usize),
    /// Once, at loop iteration `iterations / 2`.
    Midpoint,
    /// At every non-zero multiple of the period.
    Every(usize),
    /// Whenever the predicate answers `true`.
    Predicate(TriggerFn),
}

impl ReductionTrigger {
    /// Wraps a closure as a trigger.
    pub fn predicate<P>(p: P) -> Self
    where
        P: Fn(usize) -> bool + Send + Sync + 'static,
    {
        ReductionTrigger::Predicate(Arc::new(p))
    }

    /// Whether the reduction runs at the start of loop iteration `t` of a run
    /// with `iterations` iterations.
    pub fn fires(&self, t: usize, iterations: usize) -> bool {
        match self {
            ReductionTrigger::AtIteration(at) => t == *at,
            ReductionTrigger::Midpoint => t == iterations / 2,
            ReductionTrigger::Every(k) => *k > 0 && t != 0 && t % k == 0,
            ReductionTrigger::Predicate(p) => p(t),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            ReductionTrigger::Every(0) => Err(DEError::InvalidReductionTrigger {
                reason: "period must be at least 1".into(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for ReductionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionTrigger::AtIteration(t) => f.debug_tuple("AtIteration").field(t).finish(),
            ReductionTrigger::Midpoint => f.write_str("Midpoint"),
            ReductionTrigger::Every(k) => f.debug_tuple("Every").field(k).finish(),
            ReductionTrigger::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// How the survivors of each cluster are chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepresentativePolicy {
    /// Lowest-fitness member of every cluster; noise rows are dropped.
    BestPerCluster,
    /// Coordinate-wise mean of every cluster, re-evaluated by the objective;
    /// noise rows are dropped.
    AveragePerCluster,
    /// Lowest-fitness member of every label, the noise label included.
    BestAcrossAll,
    /// Up to `max_per_cluster` members drawn uniformly without replacement
    /// from every cluster; noise rows are dropped.
    RandomSample {
        /// Clusters larger than this are sampled down to exactly this size.
        max_per_cluster: usize,
    },
}

/// Matrix the clustering algorithm sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClusterSpace {
    /// The candidates only, `N x D`.
    #[default]
    Solutions,
    /// Candidates with their fitness appended as a last column, `N x (D + 1)`.
    SolutionsWithFitness,
}

/// Number of clusters requested from the algorithm, resolved against the
/// population size at the time of the reduction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClusterCount {
    /// Leave it to the algorithm's own setting.
    #[default]
    Algorithm,
    /// Exactly `k`.
    Fixed(usize),
    /// `N / 2`.
    HalfPopulation,
    /// `floor(sqrt(N))`.
    SqrtFloor,
    /// `ceil(sqrt(N))`.
    SqrtCeil,
}

impl ClusterCount {
    /// Cluster count for a population of `n` rows; `None` leaves it to the
    /// algorithm.
    pub fn resolve(&self, n: usize) -> Option<usize> {
        let k = match self {
            ClusterCount::Algorithm => return None,
            ClusterCount::Fixed(k) => *k,
            ClusterCount::HalfPopulation => n / 2,
            ClusterCount::SqrtFloor => (n as f64).sqrt().floor() as usize,
            ClusterCount::SqrtCeil => (n as f64).sqrt().ceil() as usize,
        };
        Some(k.max(1))
    }

    /// `base` with the cluster count resolved for `n` rows.
    pub fn args(&self, base: &ClusteringArgs, n: usize) -> ClusteringArgs {
        let mut args = base.clone();
        if let Some(k) = self.resolve(n) {
            args.n_clusters = Some(k);
        }
        args
    }
}

/// Refills the population after a reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Regrowth {
    /// New individuals are `sum_k w_k * rep_k` with `w_k ~ U[weight_low, weight_high)`.
    WeightedCombination {
        /// Size to regrow to; `None` regrows to the size the run started with.
        target_size: Option<usize>,
        /// Lower end of the weight range.
        weight_low: f64,
        /// Upper end of the weight range (exclusive).
        weight_high: f64,
    },
}

impl Default for Regrowth {
    fn default() -> Self {
        Regrowth::WeightedCombination {
            target_size: None,
            weight_low: -10.0,
            weight_high: 10.0,
        }
    }
}

/// A reduction strategy: clustering algorithm, cadence, survivor policy.
#[derive(Clone)]
pub struct PopulationReduction {
    algorithm: Arc<dyn ClusteringAlgorithm + Send + Sync>,
    cluster_count: ClusterCount,
    args: ClusteringArgs,
    trigger: ReductionTrigger,
    policy: RepresentativePolicy,
    space: ClusterSpace,
    regrow: Option<Regrowth>,
    cluster_on_init: bool,
}

impl fmt::Debug for PopulationReduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopulationReduction")
            .field("cluster_count", &self.cluster_count)
            .field("args", &self.args)
            .field("trigger", &self.trigger)
            .field("policy", &self.policy)
            .field("space", &self.space)
            .field("regrow", &self.regrow)
            .field("cluster_on_init", &self.cluster_on_init)
            .finish_non_exhaustive()
    }
}

impl PopulationReduction {
    /// Best-per-cluster reduction at the midpoint, clustering the candidates.
    pub fn new<C>(algorithm: C) -> Self
    where
        C: ClusteringAlgorithm + Send + Sync + 'static,
    {
        Self {
            algorithm: Arc::new(algorithm),
            cluster_count: ClusterCount::Algorithm,
            args: ClusteringArgs::default(),
            trigger: ReductionTrigger::Midpoint,
            policy: RepresentativePolicy::BestPerCluster,
            space: ClusterSpace::Solutions,
            regrow: None,
            cluster_on_init: false,
        }
    }

    /// Single reduction at iteration `at`, keeping the best of each cluster.
    pub fn clustering_best<C>(algorithm: C, at: usize) -> Self
    where
        C: ClusteringAlgorithm + Send + Sync + 'static,
    {
        Self::new(algorithm)
            .with_trigger(ReductionTrigger::AtIteration(at))
            .with_cluster_on_init(true)
    }

    /// Single reduction at iteration `at`, replacing each cluster by its mean.
    pub fn clustering_average<C>(algorithm: C, at: usize) -> Self
    where
        C: ClusteringAlgorithm + Send + Sync + 'static,
    {
        Self::clustering_best(algorithm, at).with_policy(RepresentativePolicy::AveragePerCluster)
    }

    /// Single reduction at iteration `at`, best of every label including noise.
    pub fn clustering_best_all<C>(algorithm: C, at: usize) -> Self
    where
        C: ClusteringAlgorithm + Send + Sync + 'static,
    {
        Self::clustering_best(algorithm, at).with_policy(RepresentativePolicy::BestAcrossAll)
    }

    /// Ward clustering into `N / 2` groups over (candidate, fitness) at the
    /// midpoint, best of each group.
    pub fn reduction_agglomerative() -> Self {
        Self::new(Agglomerative::default())
            .with_cluster_count(ClusterCount::HalfPopulation)
            .with_space(ClusterSpace::SolutionsWithFitness)
    }

    /// K-Means into `floor(sqrt(N))` groups over (candidate, fitness) at the
    /// midpoint, up to three random survivors per group.
    pub fn reduction_random_sample() -> Self {
        Self::new(KMeans::default())
            .with_cluster_count(ClusterCount::SqrtFloor)
            .with_space(ClusterSpace::SolutionsWithFitness)
            .with_policy(RepresentativePolicy::RandomSample {
                max_per_cluster: DEFAULT_SAMPLE_PER_CLUSTER,
            })
    }

    /// Every twenty iterations: K-Means into `ceil(sqrt(N))` groups, best of
    /// each, then regrow to the starting size.
    pub fn reduction_kmeans_regrow() -> Self {
        Self::new(KMeans::default())
            .with_cluster_count(ClusterCount::SqrtCeil)
            .with_trigger(ReductionTrigger::Every(DEFAULT_REGROW_PERIOD))
            .with_regrowth(Regrowth::default())
    }

    /// Sets when the reduction runs.
    pub fn with_trigger(mut self, trigger: ReductionTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Sets the survivor policy.
    pub fn with_policy(mut self, policy: RepresentativePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the matrix handed to the clustering algorithm.
    pub fn with_space(mut self, space: ClusterSpace) -> Self {
        self.space = space;
        self
    }

    /// Sets the cluster-count rule.
    pub fn with_cluster_count(mut self, count: ClusterCount) -> Self {
        self.cluster_count = count;
        self
    }

    /// Forwards call-time arguments to the algorithm on every fit. An
    /// explicit `n_clusters` becomes a [`ClusterCount::Fixed`] rule; the
    /// extras are passed through as given.
    pub fn with_args(mut self, mut args: ClusteringArgs) -> Self {
        if let Some(k) = args.n_clusters.take() {
            self.cluster_count = ClusterCount::Fixed(k);
        }
        self.args = args;
        self
    }

    /// Refills the population after every reduction.
    pub fn with_regrowth(mut self, regrow: Regrowth) -> Self {
        self.regrow = Some(regrow);
        self
    }

    /// Also labels the initial population, so that snapshots carry cluster
    /// labels from the start.
    pub fn with_cluster_on_init(mut self, enable: bool) -> Self {
        self.cluster_on_init = enable;
        self
    }

    /// The configured trigger.
    pub fn trigger(&self) -> &ReductionTrigger {
        &self.trigger
    }

    /// The configured survivor policy.
    pub fn policy(&self) -> RepresentativePolicy {
        self.policy
    }

    pub(crate) fn clusters_on_init(&self) -> bool {
        self.cluster_on_init
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.trigger.validate()?;
        if let RepresentativePolicy::RandomSample { max_per_cluster: 0 } = self.policy {
            return Err(DEError::InvalidReductionTrigger {
                reason: "random sample must keep at least one member per cluster".into(),
            });
        }
        match self.regrow {
            Some(Regrowth::WeightedCombination {
                weight_low,
                weight_high,
                ..
            }) if !(weight_low < weight_high
                && weight_low.is_finite()
                && weight_high.is_finite()) =>
            {
                Err(DEError::InvalidReductionTrigger {
                    reason: format!("regrowth weights [{weight_low}, {weight_high}) are empty"),
                })
            }
            _ => Ok(()),
        }
    }

    /// Labels the rows of `pop` without reducing anything.
    pub(crate) fn label(
        &self,
        pop: &Array2<f64>,
        fitness: &Array1<f64>,
        rng: &mut StdRng,
    ) -> Result<Vec<ClusterLabel>> {
        let data = self.clustering_input(pop, fitness)?;
        let args = self.cluster_count.args(&self.args, pop.nrows());
        fit_labels(self.algorithm.as_ref(), &data, &args, rng)
    }

    /// Runs one reduction event. `evaluate` scores synthesized individuals.
    pub(crate) fn reduce<E>(
        &self,
        iteration: usize,
        pop: &Array2<f64>,
        fitness: &Array1<f64>,
        initial_size: usize,
        rng: &mut StdRng,
        mut evaluate: E,
    ) -> Result<Survivors>
    where
        E: FnMut(&Array1<f64>) -> Result<f64>,
    {
        let labels = self.label(pop, fitness, rng)?;
        let include_noise = self.policy == RepresentativePolicy::BestAcrossAll;
        let table = RepresentativeTable::build(&labels, include_noise);

        let mut survivors = Survivors::default();
        for (label, members) in table.groups() {
            match self.policy {
                RepresentativePolicy::BestPerCluster | RepresentativePolicy::BestAcrossAll => {
                    let best = best_member(members, fitness);
                    survivors.push(pop.row(best).to_owned(), fitness[best], *label);
                }
                RepresentativePolicy::AveragePerCluster => {
                    let rows = pop.select(Axis(0), members);
                    let Some(mean) = rows.mean_axis(Axis(0)) else {
                        continue;
                    };
                    let f = evaluate(&mean)?;
                    survivors.evaluations += 1;
                    survivors.push(mean, f, *label);
                }
                RepresentativePolicy::RandomSample { max_per_cluster } => {
                    let kept: Vec<usize> = if members.len() > max_per_cluster {
                        let mut picks = distinct_indices(members.len(), max_per_cluster, rng);
                        picks.sort_unstable();
                        picks.into_iter().map(|p| members[p]).collect()
                    } else {
                        members.clone()
                    };
                    for i in kept {
                        survivors.push(pop.row(i).to_owned(), fitness[i], *label);
                    }
                }
            }
        }

        if survivors.is_empty() {
            return Err(DEError::EmptyReduction { iteration });
        }
        let reduced = survivors.len();

        if let Some(Regrowth::WeightedCombination {
            target_size,
            weight_low,
            weight_high,
        }) = self.regrow
        {
            let target = target_size.unwrap_or(initial_size);
            let reps: Vec<Array1<f64>> = survivors.rows.clone();
            while survivors.len() < target {
                let mut child = Array1::<f64>::zeros(pop.ncols());
                for rep in &reps {
                    let w = rng.random_range(weight_low..weight_high);
                    child.scaled_add(w, rep);
                }
                let f = evaluate(&child)?;
                survivors.evaluations += 1;
                survivors.push(child, f, NOISE);
            }
        }

        info!(
            "reduction at iteration {}: {} clusters, population {} -> {} (regrown to {})",
            iteration,
            table.len(),
            pop.nrows(),
            reduced,
            survivors.len()
        );
        Ok(survivors)
    }

    fn clustering_input(&self, pop: &Array2<f64>, fitness: &Array1<f64>) -> Result<Array2<f64>> {
        match self.space {
            ClusterSpace::Solutions => Ok(pop.clone()),
            ClusterSpace::SolutionsWithFitness => {
                let column = fitness.view().insert_axis(Axis(1));
                concatenate(Axis(1), &[pop.view(), column]).map_err(|e| DEError::Clustering {
                    message: format!("cannot append fitness column: {e}"),
                })
            }
        }
    }
}

/// First member with strictly lowest fitness.
fn best_member(members: &[usize], fitness: &Array1<f64>) -> usize {
    let mut best = members[0];
    for &i in &members[1..] {
        if fitness[i] < fitness[best] {
            best = i;
        }
    }
    best
}

/// Row indices grouped by label, labels in order of first appearance.
#[derive(Debug, Default)]
pub(crate) struct RepresentativeTable {
    groups: Vec<(ClusterLabel, Vec<usize>)>,
}

impl RepresentativeTable {
    pub(crate) fn build(labels: &[ClusterLabel], include_noise: bool) -> Self {
        let mut position: HashMap<ClusterLabel, usize> = HashMap::new();
        let mut groups: Vec<(ClusterLabel, Vec<usize>)> = Vec::new();
        for (i, &label) in labels.iter().enumerate() {
            if label == NOISE && !include_noise {
                continue;
            }
            let slot = *position.entry(label).or_insert_with(|| {
                groups.push((label, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(i);
        }
        Self { groups }
    }

    pub(crate) fn groups(&self) -> &[(ClusterLabel, Vec<usize>)] {
        &self.groups
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }
}

/// Population left after a reduction, index-aligned.
#[derive(Debug, Default)]
pub(crate) struct Survivors {
    pub(crate) rows: Vec<Array1<f64>>,
    pub(crate) fitness: Vec<f64>,
    pub(crate) labels: Vec<ClusterLabel>,
    pub(crate) evaluations: usize,
}

impl Survivors {
    fn push(&mut self, row: Array1<f64>, fitness: f64, label: ClusterLabel) {
        self.rows.push(row);
        self.fitness.push(fitness);
        self.labels.push(label);
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stacks the rows into a population matrix of dimension `dim`.
    pub(crate) fn population(&self, dim: usize) -> Array2<f64> {
        let mut pop = Array2::<f64>::zeros((self.rows.len(), dim));
        for (mut dst, src) in pop.axis_iter_mut(Axis(0)).zip(self.rows.iter()) {
            dst.assign(src);
        }
        pop
    }
}
