use crate::argmin::argmin;
use crate::cluster::ClusterLabel;
use crate::objective::{ObjectiveFunction, PopulationInitializer};
use crate::reduction::Survivors;
use crate::{
    DEConfig, DEError, DEReport, DifferentialEvolution, ReductionEvent, Result, Snapshot,
    SnapshotContent,
};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;

// ------------------------------ Run state ------------------------------

/// Everything one call to `run` owns. Rebuilt from scratch on every call.
pub(crate) struct PopulationState {
    pub(crate) population: Array2<f64>,
    pub(crate) fitness: Array1<f64>,
    pub(crate) labels: Option<Vec<ClusterLabel>>,
    pub(crate) best_x: Array1<f64>,
    pub(crate) best_f: f64,
    pub(crate) nfev: usize,
}

impl PopulationState {
    pub(crate) fn size(&self) -> usize {
        self.population.nrows()
    }

    /// Re-derives the running best from the current population only.
    pub(crate) fn rederive_best(&mut self) {
        if let Some((i, f)) = argmin(self.fitness.view()) {
            self.best_x = self.population.row(i).to_owned();
            self.best_f = f;
        }
    }

    /// Replaces population, fitness and labels with the survivors of a reduction.
    pub(crate) fn replace(&mut self, survivors: Survivors) {
        let dim = self.population.ncols();
        self.population = survivors.population(dim);
        self.fitness = Array1::from(survivors.fitness);
        self.labels = Some(survivors.labels);
        self.nfev += survivors.evaluations;
        self.rederive_best();
    }

    pub(crate) fn snapshot(&self, iteration: usize, content: &SnapshotContent) -> Snapshot {
        Snapshot {
            iteration,
            optimal_value: self.best_f,
            population: content.population.then(|| self.population.clone()),
            labels: if content.labels {
                self.labels.clone()
            } else {
                None
            },
        }
    }
}

// ------------------------------ Internal helpers ------------------------------

impl<'a, F, I> DifferentialEvolution<'a, F, I>
where
    F: ObjectiveFunction + ?Sized,
    I: PopulationInitializer + ?Sized,
{
    pub(crate) fn evaluate(&self, x: &Array1<f64>) -> Result<f64> {
        self.func.evaluate(x)
    }

    pub(crate) fn evaluate_population(&self, pop: &Array2<f64>) -> Result<Array1<f64>> {
        let mut energies = Array1::<f64>::zeros(pop.nrows());
        for (i, row) in pop.rows().into_iter().enumerate() {
            energies[i] = self.evaluate(&row.to_owned())?;
        }
        Ok(energies)
    }

    /// Builds, checks and evaluates the initial population.
    pub(crate) fn initial_state(
        &self,
        config: &DEConfig,
        rng: &mut StdRng,
    ) -> Result<PopulationState> {
        let population = self.init.initialize(config.population_size, rng);
        let (rows, cols) = population.dim();
        if rows != config.population_size || cols == 0 {
            return Err(DEError::InvalidInitialPopulation {
                expected: config.population_size,
                rows,
                cols,
            });
        }

        let fitness = self.evaluate_population(&population)?;
        let (best_i, best_f) = argmin(fitness.view()).ok_or(DEError::InvalidInitialPopulation {
            expected: config.population_size,
            rows,
            cols,
        })?;
        let best_x = population.row(best_i).to_owned();

        let mut state = PopulationState {
            population,
            fitness,
            labels: None,
            best_x,
            best_f,
            nfev: rows,
        };

        if let Some(reduction) = &self.reduction {
            if reduction.clusters_on_init() {
                state.labels = Some(reduction.label(&state.population, &state.fitness, rng)?);
            }
        }
        Ok(state)
    }

    pub(crate) fn finish_report(
        &self,
        state: PopulationState,
        snapshots: Vec<Snapshot>,
        reductions: Vec<ReductionEvent>,
        nit: usize,
    ) -> DEReport {
        DEReport {
            x: state.best_x,
            fun: state.best_f,
            nit,
            nfev: state.nfev,
            population: state.population,
            population_energies: state.fitness,
            labels: state.labels,
            snapshots,
            reductions,
        }
    }
}
