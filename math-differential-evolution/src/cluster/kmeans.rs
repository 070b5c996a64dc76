//! K-Means clustering (k-means++ seeding, Lloyd iterations).

use ndarray::{Array2, Axis};
use rand::Rng;
use rand::rngs::StdRng;

use super::{
    ClusterFit, ClusterLabel, ClusteringAlgorithm, ClusteringArgs, resolve_cluster_count,
    squared_distance,
};
use crate::error::{DEError, Result};

/// K-Means clustering.
///
/// Answers with centres and labels, like a k-means call that returns
/// `(centroids, labels, inertia)`. The best of `n_init` restarts (lowest
/// within-cluster sum of squares) is kept. The call-time options `max_iter`
/// and `n_init` override the configured values.
#[derive(Debug, Clone)]
pub struct KMeans {
    /// Number of clusters when the call does not override it.
    pub n_clusters: usize,
    /// Maximum Lloyd iterations per restart.
    pub max_iter: usize,
    /// Stop when no centre moves more than this (Euclidean).
    pub tol: f64,
    /// Number of restarts.
    pub n_init: usize,
}

impl KMeans {
    /// K-Means with `n_clusters` clusters and default iteration settings.
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-6,
            n_init: 4,
        }
    }

    /// Sets the maximum number of Lloyd iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the number of restarts.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(8)
    }
}

impl ClusteringAlgorithm for KMeans {
    fn fit(
        &self,
        data: &Array2<f64>,
        args: &ClusteringArgs,
        rng: &mut StdRng,
    ) -> Result<ClusterFit> {
        let k = resolve_cluster_count("kmeans", self.n_clusters, args, data.nrows())?;
        let max_iter = args.count_or("kmeans", "max_iter", self.max_iter)?;
        let n_init = args.count_or("kmeans", "n_init", self.n_init)?;
        if data.iter().any(|v| !v.is_finite()) {
            return Err(DEError::Clustering {
                message: "kmeans: data contains non-finite values".into(),
            });
        }

        let mut best: Option<(Array2<f64>, Vec<usize>, f64)> = None;
        for _ in 0..n_init.max(1) {
            let run = self.fit_once(data, k, max_iter, rng);
            if best.as_ref().is_none_or(|b| run.2 < b.2) {
                best = Some(run);
            }
        }
        let (centers, labels, _wcss) = best.ok_or_else(|| DEError::Clustering {
            message: "kmeans: no restart completed".into(),
        })?;

        Ok(ClusterFit::WithCenters {
            centers,
            labels: labels.into_iter().map(|l| l as ClusterLabel).collect(),
        })
    }
}

impl KMeans {
    fn fit_once(
        &self,
        data: &Array2<f64>,
        k: usize,
        max_iter: usize,
        rng: &mut StdRng,
    ) -> (Array2<f64>, Vec<usize>, f64) {
        let n = data.nrows();
        let mut centroids = kmeans_plus_plus(data, k, rng);
        let mut labels = vec![0usize; n];

        for _ in 0..max_iter {
            for (i, point) in data.axis_iter(Axis(0)).enumerate() {
                let mut min_dist = f64::INFINITY;
                for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
                    let dist = squared_distance(point, centroid);
                    if dist < min_dist {
                        min_dist = dist;
                        labels[i] = c;
                    }
                }
            }

            let mut new_centroids = Array2::<f64>::zeros(centroids.raw_dim());
            let mut counts = vec![0usize; k];
            for (i, point) in data.axis_iter(Axis(0)).enumerate() {
                counts[labels[i]] += 1;
                let mut row = new_centroids.row_mut(labels[i]);
                row += &point;
            }
            for c in 0..k {
                if counts[c] > 0 {
                    new_centroids
                        .row_mut(c)
                        .mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // empty cluster keeps its centre
                    new_centroids.row_mut(c).assign(&centroids.row(c));
                }
            }

            let max_shift = centroids
                .axis_iter(Axis(0))
                .zip(new_centroids.axis_iter(Axis(0)))
                .map(|(old, new)| squared_distance(old, new).sqrt())
                .fold(0.0f64, f64::max);

            centroids = new_centroids;
            if max_shift < self.tol {
                break;
            }
        }

        let wcss = data
            .axis_iter(Axis(0))
            .zip(labels.iter())
            .map(|(point, &c)| squared_distance(point, centroids.row(c)))
            .sum();

        (centroids, labels, wcss)
    }
}

/// Distance-proportional seeding (Arthur & Vassilvitskii, 2007).
fn kmeans_plus_plus(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut centroids = Array2::<f64>::zeros((k, data.ncols()));
    let first = rng.random_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));

    let mut min_dists = vec![f64::INFINITY; n];
    for c in 1..k {
        for (i, point) in data.axis_iter(Axis(0)).enumerate() {
            min_dists[i] = min_dists[i].min(squared_distance(point, centroids.row(c - 1)));
        }

        let total: f64 = min_dists.iter().sum();
        let chosen = if total < 1e-15 {
            rng.random_range(0..n)
        } else {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = n - 1;
            for (i, &dist) in min_dists.iter().enumerate() {
                cumulative += dist;
                if cumulative >= target && dist > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centroids.row_mut(c).assign(&data.row(chosen));
    }
    centroids
}
