//! Caller-supplied collaborators of the engine: the objective function and
//! the population initializer.

use std::fmt;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;

use crate::error::{DEError, Result};

/// Objective function minimized by the optimizer.
///
/// Any `Fn(&Array1<f64>) -> f64` is an infallible objective. Objectives that
/// can fail are wrapped in [`Fallible`]; their error aborts the run.
pub trait ObjectiveFunction {
    /// Evaluates one candidate. Lower is better.
    fn evaluate(&self, x: &Array1<f64>) -> Result<f64>;
}

impl<F> ObjectiveFunction for F
where
    F: Fn(&Array1<f64>) -> f64,
{
    fn evaluate(&self, x: &Array1<f64>) -> Result<f64> {
        Ok(self(x))
    }
}

/// Adapter for objectives returning `Result<f64, E>`.
///
/// ```rust
/// use math_differential_evolution::{Fallible, ObjectiveFunction};
/// use ndarray::{Array1, array};
///
/// let positive_only = Fallible(|x: &Array1<f64>| {
///     if x.iter().all(|&v| v >= 0.0) {
///         Ok(x.sum())
///     } else {
///         Err("negative coordinate")
///     }
/// });
/// assert!(positive_only.evaluate(&array![1.0, 2.0]).is_ok());
/// assert!(positive_only.evaluate(&array![-1.0, 2.0]).is_err());
/// ```
#[derive(Clone, Copy)]
pub struct Fallible<F>(pub F);

impl<F, E> ObjectiveFunction for Fallible<F>
where
    F: Fn(&Array1<f64>) -> std::result::Result<f64, E>,
    E: fmt::Display,
{
    fn evaluate(&self, x: &Array1<f64>) -> Result<f64> {
        (self.0)(x).map_err(|e| DEError::ObjectiveEvaluation {
            message: e.to_string(),
        })
    }
}

/// Builds the initial population: `size` rows, one candidate per row.
///
/// The number of columns fixes the problem dimension for the whole run.
/// Closures `Fn(usize, &mut StdRng) -> Array2<f64>` implement this trait;
/// they receive the run's random source so seeded runs stay reproducible.
pub trait PopulationInitializer {
    /// Returns a `(size, D)` matrix of candidates.
    fn initialize(&self, size: usize, rng: &mut StdRng) -> Array2<f64>;
}

impl<F> PopulationInitializer for F
where
    F: Fn(usize, &mut StdRng) -> Array2<f64>,
{
    fn initialize(&self, size: usize, rng: &mut StdRng) -> Array2<f64> {
        self(size, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_plain_closure_is_infallible() {
        let sphere = |x: &Array1<f64>| x.iter().map(|&v| v * v).sum::<f64>();
        assert_eq!(sphere.evaluate(&array![1.0, 2.0]).unwrap(), 5.0);
    }

    #[test]
    fn test_fallible_maps_error_message() {
        let failing = Fallible(|_: &Array1<f64>| -> std::result::Result<f64, String> {
            Err("domain error".to_string())
        });
        match failing.evaluate(&array![0.0]) {
            Err(DEError::ObjectiveEvaluation { message }) => assert_eq!(message, "domain error"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_closure_initializer() {
        let init = |n: usize, _rng: &mut StdRng| Array2::<f64>::ones((n, 3));
        let mut rng = StdRng::seed_from_u64(0);
        let pop = init.initialize(5, &mut rng);
        assert_eq!(pop.dim(), (5, 3));
    }
}
