use ndarray::{Array1, Array2};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::bounds::Bounds;
use crate::objective::PopulationInitializer;

pub(crate) fn init_latin_hypercube<R: Rng + ?Sized>(
    npop: usize,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
    rng: &mut R,
) -> Array2<f64> {
    let n = lower.len();
    let mut samples = Array2::<f64>::zeros((npop, n));
    // One stratum per individual on every axis, strata permuted independently
    for j in 0..n {
        let mut vals = Vec::with_capacity(npop);
        for k in 0..npop {
            let u: f64 = rng.random::<f64>();
            vals.push(((k as f64) + u) / (npop as f64));
        }
        vals.shuffle(rng);
        for i in 0..npop {
            samples[(i, j)] = lower[j] + vals[i] * (upper[j] - lower[j]);
        }
    }
    samples
}

/// Latin Hypercube sampling inside [`Bounds`] for better space coverage.
#[derive(Debug, Clone)]
pub struct LatinHypercubeInitializer {
    bounds: Bounds,
}

impl LatinHypercubeInitializer {
    /// Initializer stratifying every axis of `bounds`.
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }
}

impl PopulationInitializer for LatinHypercubeInitializer {
    fn initialize(&self, size: usize, rng: &mut StdRng) -> Array2<f64> {
        init_latin_hypercube(size, self.bounds.lower(), self.bounds.upper(), rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_one_sample_per_stratum() {
        let npop = 10;
        let init = LatinHypercubeInitializer::new(Bounds::cube(0.0, 1.0, 3).unwrap());
        let pop = init.initialize(npop, &mut StdRng::seed_from_u64(5));
        for j in 0..3 {
            let mut seen = vec![false; npop];
            for i in 0..npop {
                let stratum = (pop[(i, j)] * npop as f64).floor() as usize;
                seen[stratum.min(npop - 1)] = true;
            }
            assert!(seen.iter().all(|&s| s), "axis {} misses a stratum", j);
        }
    }
}
