use ndarray::{Array1, Array2};
use rand::Rng;
use rand::rngs::StdRng;

use crate::bounds::Bounds;
use crate::objective::PopulationInitializer;

pub(crate) fn init_random<R: Rng + ?Sized>(
    npop: usize,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
    rng: &mut R,
) -> Array2<f64> {
    let n = lower.len();
    let mut pop = Array2::<f64>::zeros((npop, n));
    for i in 0..npop {
        for j in 0..n {
            let u: f64 = rng.random::<f64>();
            pop[(i, j)] = lower[j] + u * (upper[j] - lower[j]);
        }
    }
    pop
}

/// Real-valued individuals drawn uniformly inside [`Bounds`].
///
/// ```rust
/// use math_differential_evolution::{PopulationInitializer, UniformInitializer};
/// use rand::{SeedableRng, rngs::StdRng};
///
/// let init = UniformInitializer::cube(-100.0, 100.0, 2).unwrap();
/// let pop = init.initialize(10, &mut StdRng::seed_from_u64(1));
/// assert_eq!(pop.dim(), (10, 2));
/// ```
#[derive(Debug, Clone)]
pub struct UniformInitializer {
    bounds: Bounds,
}

impl UniformInitializer {
    /// Initializer sampling uniformly in `bounds`.
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    /// Same `[low, high]` interval on every dimension.
    pub fn cube(low: f64, high: f64, dim: usize) -> crate::Result<Self> {
        Ok(Self::new(Bounds::cube(low, high, dim)?))
    }

    /// The sampling box.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }
}

impl PopulationInitializer for UniformInitializer {
    fn initialize(&self, size: usize, rng: &mut StdRng) -> Array2<f64> {
        init_random(size, self.bounds.lower(), self.bounds.upper(), rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_within_bounds() {
        let bounds = Bounds::from_pairs(&[(-1.0, 1.0), (10.0, 20.0), (5.0, 5.0)]).unwrap();
        let init = UniformInitializer::new(bounds);
        let mut rng = StdRng::seed_from_u64(3);
        let pop = init.initialize(200, &mut rng);
        for row in pop.rows() {
            assert!((-1.0..=1.0).contains(&row[0]));
            assert!((10.0..=20.0).contains(&row[1]));
            assert_eq!(row[2], 5.0);
        }
    }

    #[test]
    fn test_uniform_is_reproducible() {
        let init = UniformInitializer::cube(-100.0, 100.0, 4).unwrap();
        let a = init.initialize(8, &mut StdRng::seed_from_u64(11));
        let b = init.initialize(8, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }
}
