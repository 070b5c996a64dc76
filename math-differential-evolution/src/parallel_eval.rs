use log::warn;
use rayon::prelude::*;

/// Parallel execution configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Enable parallel execution
    pub enabled: bool,
    /// Number of threads to use (None = use rayon default)
    pub num_threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_threads: None, // Use rayon's default (typically num_cpus)
        }
    }
}

impl ParallelConfig {
    /// Configuration for `jobs` workers; `jobs <= 1` runs sequentially.
    pub fn with_jobs(jobs: usize) -> Self {
        Self {
            enabled: jobs > 1,
            num_threads: Some(jobs.max(1)),
        }
    }
}

/// Runs `job(0..count)` and returns the results in index order.
///
/// Jobs must be independent: each receives only its index. With an explicit
/// thread count a dedicated pool is built for the call, otherwise rayon's
/// global pool is used.
///
/// # Arguments
/// * `count` - Number of jobs
/// * `config` - Parallel configuration
/// * `job` - Work for one index
pub fn run_indexed<T, G>(count: usize, config: &ParallelConfig, job: G) -> Vec<T>
where
    T: Send,
    G: Fn(usize) -> T + Send + Sync,
{
    if !config.enabled || count < 2 {
        return (0..count).map(job).collect();
    }

    match config.num_threads {
        Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
            Ok(pool) => pool.install(|| (0..count).into_par_iter().map(&job).collect()),
            Err(e) => {
                warn!("cannot build a {n}-thread pool ({e}), running sequentially");
                (0..count).map(job).collect()
            }
        },
        None => (0..count).into_par_iter().map(job).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_in_index_order() {
        let config = ParallelConfig {
            enabled: true,
            num_threads: Some(4),
        };
        let out = run_indexed(50, &config, |i| i * i);
        assert_eq!(out, (0..50).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let seq = run_indexed(20, &ParallelConfig::with_jobs(1), |i| i as f64 * 0.5);
        let par = run_indexed(20, &ParallelConfig::default(), |i| i as f64 * 0.5);
        assert_eq!(seq, par);
        assert!(!ParallelConfig::with_jobs(1).enabled);
    }
}
