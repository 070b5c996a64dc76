use ndarray::{Array2, Zip};
use rand::Rng;

/// Donor triple `(r1, r2, r3)` for one target index.
pub type Donors = [usize; 3];

/// Draws one donor triple per individual, uniformly and with replacement.
///
/// All triples are drawn up front for the whole population, so a triple may
/// repeat an index or coincide with its own target.
pub(crate) fn draw_donors<R: Rng + ?Sized>(npop: usize, rng: &mut R) -> Vec<Donors> {
    (0..npop)
        .map(|_| {
            [
                rng.random_range(0..npop),
                rng.random_range(0..npop),
                rng.random_range(0..npop),
            ]
        })
        .collect()
}

/// DE/rand/1 mutants: `pop[r1] + f * (pop[r2] - pop[r3])`, one row per donor triple.
pub(crate) fn mutant_rand1(pop: &Array2<f64>, donors: &[Donors], f: f64) -> Array2<f64> {
    let mut mutants = Array2::<f64>::zeros((donors.len(), pop.ncols()));
    for (i, &[r1, r2, r3]) in donors.iter().enumerate() {
        Zip::from(mutants.row_mut(i))
            .and(pop.row(r1))
            .and(pop.row(r2))
            .and(pop.row(r3))
            .for_each(|m, &x1, &x2, &x3| *m = x1 + f * (x2 - x3));
    }
    mutants
}
