use crate::{
    Bounds, DEConfig, DEReport, DifferentialEvolution, ObjectiveFunction, Result,
    UniformInitializer,
};

/// Runs Differential Evolution on a function over box bounds.
///
/// This is a convenience function: the initial population is drawn uniformly
/// inside `bounds`, and no reduction is attached.
///
/// # Arguments
///
/// * `func` - The objective function to minimize
/// * `bounds` - Vector of (lower, upper) bound pairs for each dimension
/// * `config` - DE configuration (use `DEConfigBuilder` to construct)
///
/// # Errors
///
/// Returns `DEError::InvalidBounds` if any bound pair has upper < lower, and
/// any error of [`DifferentialEvolution::run`].
///
/// # Example
///
/// ```rust
/// use math_differential_evolution::{differential_evolution, DEConfigBuilder};
/// use ndarray::Array1;
///
/// let result = differential_evolution(
///     &|x: &Array1<f64>| x[0].powi(2) + x[1].powi(2),
///     &[(-5.0, 5.0), (-5.0, 5.0)],
///     &DEConfigBuilder::new().iterations(100).seed(42).build().unwrap(),
/// ).expect("optimization failed");
///
/// assert!(result.fun < 0.01);
/// ```
pub fn differential_evolution<F>(
    func: &F,
    bounds: &[(f64, f64)],
    config: &DEConfig,
) -> Result<DEReport>
where
    F: ObjectiveFunction + ?Sized,
{
    let init = UniformInitializer::new(Bounds::from_pairs(bounds)?);
    DifferentialEvolution::new(func, &init).run(config)
}
