//! Shared function registry for differential evolution benchmarks and the CLI
use ndarray::Array1;
use std::collections::HashMap;
use std::f64::consts::{E, PI};

/// Test function type definition
pub type TestFunction = fn(&Array1<f64>) -> f64;

/// Sphere: `sum x_i^2`, minimum 0 at the origin.
pub fn sphere(x: &Array1<f64>) -> f64 {
    x.iter().map(|&xi| xi * xi).sum()
}

/// Rosenbrock valley, minimum 0 at `(1, ..., 1)`.
pub fn rosenbrock(x: &Array1<f64>) -> f64 {
    x.windows(2)
        .into_iter()
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}

/// Rastrigin, minimum 0 at the origin.
pub fn rastrigin(x: &Array1<f64>) -> f64 {
    10.0 * x.len() as f64
        + x.iter()
            .map(|&xi| xi * xi - 10.0 * (2.0 * PI * xi).cos())
            .sum::<f64>()
}

/// Ackley, minimum 0 at the origin.
pub fn ackley(x: &Array1<f64>) -> f64 {
    let n = x.len().max(1) as f64;
    let sum_sq = x.iter().map(|&xi| xi * xi).sum::<f64>();
    let sum_cos = x.iter().map(|&xi| (2.0 * PI * xi).cos()).sum::<f64>();
    -20.0 * (-0.2 * (sum_sq / n).sqrt()).exp() - (sum_cos / n).exp() + 20.0 + E
}

/// Griewank, minimum 0 at the origin.
pub fn griewank(x: &Array1<f64>) -> f64 {
    let sum = x.iter().map(|&xi| xi * xi).sum::<f64>() / 4000.0;
    let prod = x
        .iter()
        .enumerate()
        .map(|(i, &xi)| (xi / ((i + 1) as f64).sqrt()).cos())
        .product::<f64>();
    sum - prod + 1.0
}

/// A registered function with its customary search box.
#[derive(Clone, Copy, Debug)]
pub struct BenchmarkFunction {
    /// The objective.
    pub function: TestFunction,
    /// Lower bound on every dimension.
    pub low: f64,
    /// Upper bound on every dimension.
    pub high: f64,
    /// Global minimum value.
    pub minimum: f64,
}

/// Configuration for a benchmark run.
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    /// Descriptive name for the benchmark.
    pub name: String,
    /// Name of the test function.
    pub function_name: String,
    /// Problem dimension.
    pub dim: usize,
    /// Iterations of the run.
    pub iterations: usize,
    /// Population size.
    pub population_size: usize,
    /// Random seed for reproducibility.
    pub seed: u64,
}

/// Function registry mapping names to actual function pointers.
pub struct FunctionRegistry {
    functions: HashMap<String, BenchmarkFunction>,
}

impl FunctionRegistry {
    /// Creates a new registry with all standard test functions.
    pub fn new() -> Self {
        let mut functions = HashMap::new();
        let mut add = |name: &str, function: TestFunction, low: f64, high: f64| {
            functions.insert(
                name.to_string(),
                BenchmarkFunction {
                    function,
                    low,
                    high,
                    minimum: 0.0,
                },
            );
        };

        // Unimodal functions
        add("sphere", sphere, -100.0, 100.0);
        add("rosenbrock", rosenbrock, -2.048, 2.048);

        // Multimodal functions
        add("rastrigin", rastrigin, -5.12, 5.12);
        add("ackley", ackley, -32.768, 32.768);
        add("griewank", griewank, -600.0, 600.0);

        Self { functions }
    }

    /// Gets a test function by name.
    pub fn get(&self, name: &str) -> Option<BenchmarkFunction> {
        self.functions.get(name).copied()
    }

    /// Lists all available function names, sorted alphabetically.
    pub fn list_functions(&self) -> Vec<String> {
        let mut names: Vec<_> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns an iterator over all (name, function) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BenchmarkFunction)> {
        self.functions.iter()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Benchmark configurations used by the criterion benches.
pub fn generate_benchmark_configs() -> Vec<BenchmarkConfig> {
    let config = |function_name: &str, dim: usize, seed: u64| BenchmarkConfig {
        name: format!("{}_{}d", function_name, dim),
        function_name: function_name.to_string(),
        dim,
        iterations: 100,
        population_size: 40,
        seed,
    };
    vec![
        config("sphere", 5, 42),
        config("rosenbrock", 2, 48),
        config("rastrigin", 5, 43),
        config("ackley", 2, 44),
        config("griewank", 5, 45),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_minima() {
        let zero = Array1::<f64>::zeros(4);
        assert_abs_diff_eq!(sphere(&zero), 0.0);
        assert_abs_diff_eq!(rastrigin(&zero), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ackley(&zero), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(griewank(&zero), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rosenbrock(&Array1::ones(4)), 0.0);
    }

    #[test]
    fn test_known_values() {
        assert_abs_diff_eq!(sphere(&array![1.0, 2.0]), 5.0);
        assert_abs_diff_eq!(rosenbrock(&array![0.0, 0.0]), 1.0);
    }

    #[test]
    fn test_registry() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            registry.list_functions(),
            vec!["ackley", "griewank", "rastrigin", "rosenbrock", "sphere"]
        );
        assert!(registry.get("sphere").is_some());
        assert!(registry.get("unknown").is_none());
        for config in generate_benchmark_configs() {
            assert!(registry.get(&config.function_name).is_some());
        }
    }
}
