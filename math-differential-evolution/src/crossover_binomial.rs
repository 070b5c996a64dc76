use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;

/// Binomial crossover of one target with its mutant.
///
/// Each coordinate takes the mutant value when `U[0,1) <= cr`. The index
/// `jrand`, drawn before the coin flips, always takes the mutant value.
pub(crate) fn binomial_crossover<R: Rng + ?Sized>(
    target: ArrayView1<f64>,
    mutant: ArrayView1<f64>,
    cr: f64,
    rng: &mut R,
) -> Array1<f64> {
    let n = target.len();
    let jrand = rng.random_range(0..n);
    let mut trial = target.to_owned();
    for j in 0..n {
        let coin = rng.random::<f64>();
        if coin <= cr || j == jrand {
            trial[j] = mutant[j];
        }
    }
    trial
}

/// Row-wise binomial crossover of a whole population with its mutants.
pub(crate) fn binomial_crossover_population<R: Rng + ?Sized>(
    pop: &Array2<f64>,
    mutants: &Array2<f64>,
    cr: f64,
    rng: &mut R,
) -> Array2<f64> {
    let mut trials = Array2::<f64>::zeros(pop.raw_dim());
    for i in 0..pop.nrows() {
        let trial = binomial_crossover(pop.row(i), mutants.row(i), cr, rng);
        trials.row_mut(i).assign(&trial);
    }
    trials
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_zero_rate_changes_exactly_one_dimension() {
        let target = Array1::<f64>::zeros(8);
        let mutant = Array1::<f64>::ones(8);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let trial = binomial_crossover(target.view(), mutant.view(), 0.0, &mut rng);
            let changed = trial.iter().filter(|&&v| v == 1.0).count();
            assert_eq!(changed, 1, "seed {} changed {} dimensions", seed, changed);
        }
    }

    #[test]
    fn test_full_rate_copies_mutant() {
        let target = Array1::<f64>::zeros(5);
        let mutant = Array1::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut rng = StdRng::seed_from_u64(1);
        let trial = binomial_crossover(target.view(), mutant.view(), 1.0, &mut rng);
        assert_eq!(trial, mutant);
    }

    #[test]
    fn test_population_shape_preserved() {
        let pop = Array2::<f64>::zeros((6, 3));
        let mutants = Array2::<f64>::ones((6, 3));
        let mut rng = StdRng::seed_from_u64(2);
        let trials = binomial_crossover_population(&pop, &mutants, 0.5, &mut rng);
        assert_eq!(trials.dim(), (6, 3));
        for row in trials.rows() {
            assert!(row.iter().any(|&v| v == 1.0));
        }
    }
}
