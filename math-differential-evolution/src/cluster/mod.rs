//! Clustering collaborators used by population reduction.
//!
//! A [`ClusteringAlgorithm`] partitions the rows of a matrix and reports one
//! label per row. Algorithms may answer with plain labels or with labels plus
//! cluster centres (the shape of a k-means fit); [`ClusterFit::into_labels`]
//! reduces both to the labels the engine consumes. The label [`NOISE`] marks
//! a row that belongs to no cluster.
//!
//! Built-in algorithms: [`KMeans`], [`Agglomerative`] and [`Dbscan`]. Any
//! closure `Fn(&Array2<f64>, &ClusteringArgs) -> Result<ClusterFit>` is also
//! accepted.

mod agglomerative;
mod dbscan;
mod kmeans;

pub use agglomerative::{Agglomerative, Linkage};
pub use dbscan::Dbscan;
pub use kmeans::KMeans;

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;

use crate::error::{DEError, Result};

/// Cluster label of one row.
pub type ClusterLabel = i64;

/// Label of rows that belong to no cluster.
pub const NOISE: ClusterLabel = -1;

/// Call-time arguments forwarded to the clustering algorithm.
///
/// Besides the cluster count, named numeric options (`eps`, `min_samples`,
/// `max_iter`, `n_init`, or anything a closure algorithm understands) travel
/// in `extras`; built-in algorithms override their own settings with the keys
/// they know and ignore the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusteringArgs {
    /// Number of clusters; overrides the algorithm's own setting when present.
    pub n_clusters: Option<usize>,
    /// Further named options.
    pub extras: BTreeMap<String, f64>,
}

impl ClusteringArgs {
    /// Arguments requesting exactly `k` clusters.
    pub fn with_clusters(k: usize) -> Self {
        Self {
            n_clusters: Some(k),
            ..Self::default()
        }
    }

    /// Adds (or replaces) a named option.
    pub fn with_extra(mut self, key: impl Into<String>, value: f64) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// Value of a named option.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.extras.get(key).copied()
    }

    /// A named option read as a count, or `default` when absent.
    ///
    /// # Errors
    ///
    /// `Clustering` when the value is negative or not a whole number.
    pub(crate) fn count_or(&self, algorithm: &str, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(v) if v >= 0.0 && v.fract() == 0.0 && v.is_finite() => Ok(v as usize),
            Some(v) => Err(DEError::Clustering {
                message: format!("{algorithm}: {key} must be a non-negative integer, got {v}"),
            }),
        }
    }
}

/// Output of a clustering fit, in one of the two shapes algorithms produce.
#[derive(Debug, Clone)]
pub enum ClusterFit {
    /// One label per row.
    Labels(Vec<ClusterLabel>),
    /// Centres plus one label per row.
    WithCenters {
        /// Cluster centres, one row per cluster.
        centers: Array2<f64>,
        /// One label per row.
        labels: Vec<ClusterLabel>,
    },
}

impl ClusterFit {
    /// Drops everything but the labels.
    pub fn into_labels(self) -> Vec<ClusterLabel> {
        match self {
            ClusterFit::Labels(labels) => labels,
            ClusterFit::WithCenters { labels, .. } => labels,
        }
    }
}

/// A clustering capability over the rows of a matrix.
pub trait ClusteringAlgorithm {
    /// Partitions the rows of `data`. Randomized algorithms draw from `rng`.
    fn fit(&self, data: &Array2<f64>, args: &ClusteringArgs, rng: &mut StdRng)
    -> Result<ClusterFit>;
}

impl<F> ClusteringAlgorithm for F
where
    F: Fn(&Array2<f64>, &ClusteringArgs) -> Result<ClusterFit>,
{
    fn fit(
        &self,
        data: &Array2<f64>,
        args: &ClusteringArgs,
        _rng: &mut StdRng,
    ) -> Result<ClusterFit> {
        self(data, args)
    }
}

/// Runs `algorithm` on `data` and checks that every row received a label.
pub(crate) fn fit_labels<C>(
    algorithm: &C,
    data: &Array2<f64>,
    args: &ClusteringArgs,
    rng: &mut StdRng,
) -> Result<Vec<ClusterLabel>>
where
    C: ClusteringAlgorithm + ?Sized,
{
    let labels = algorithm.fit(data, args, rng)?.into_labels();
    if labels.len() != data.nrows() {
        return Err(DEError::ClusterLabelMismatch {
            expected: data.nrows(),
            got: labels.len(),
        });
    }
    Ok(labels)
}

/// Resolves the requested cluster count and checks it against the row count.
pub(crate) fn resolve_cluster_count(
    algorithm: &str,
    configured: usize,
    args: &ClusteringArgs,
    nrows: usize,
) -> Result<usize> {
    let k = args.n_clusters.unwrap_or(configured);
    if k == 0 || k > nrows {
        return Err(DEError::Clustering {
            message: format!("{algorithm}: n_clusters must be between 1 and {nrows}, got {k}"),
        });
    }
    Ok(k)
}

pub(crate) fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&ai, &bi)| {
            let diff = ai - bi;
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_both_shapes_reduce_to_labels() {
        let plain = ClusterFit::Labels(vec![0, 1, NOISE]);
        let tuple = ClusterFit::WithCenters {
            centers: array![[0.0], [1.0]],
            labels: vec![0, 1, NOISE],
        };
        assert_eq!(plain.into_labels(), tuple.into_labels());
    }

    #[test]
    fn test_label_count_checked() {
        let short = |_: &Array2<f64>, _: &ClusteringArgs| -> Result<ClusterFit> {
            Ok(ClusterFit::Labels(vec![0, 0]))
        };
        let data = Array2::<f64>::zeros((3, 2));
        let mut rng = StdRng::seed_from_u64(0);
        let err = fit_labels(&short, &data, &ClusteringArgs::default(), &mut rng).unwrap_err();
        assert!(matches!(
            err,
            DEError::ClusterLabelMismatch {
                expected: 3,
                got: 2
            }
        ));
    }

    #[test]
    fn test_cluster_count_resolution() {
        let args = ClusteringArgs::with_clusters(4);
        assert_eq!(resolve_cluster_count("kmeans", 2, &args, 10).unwrap(), 4);
        assert_eq!(
            resolve_cluster_count("kmeans", 2, &ClusteringArgs::default(), 10).unwrap(),
            2
        );
        assert!(resolve_cluster_count("kmeans", 11, &ClusteringArgs::default(), 10).is_err());
    }

    #[test]
    fn test_extras_read_as_counts() {
        let args = ClusteringArgs::with_clusters(3)
            .with_extra("max_iter", 7.0)
            .with_extra("eps", 0.25)
            .with_extra("n_init", -1.0);
        assert_eq!(args.n_clusters, Some(3));
        assert_eq!(args.get("eps"), Some(0.25));
        assert_eq!(args.get("missing"), None);
        assert_eq!(args.count_or("kmeans", "max_iter", 300).unwrap(), 7);
        assert_eq!(args.count_or("kmeans", "tol", 300).unwrap(), 300);
        assert!(args.count_or("kmeans", "n_init", 10).is_err());
        assert!(args.count_or("dbscan", "eps", 5).is_err());
    }
}
