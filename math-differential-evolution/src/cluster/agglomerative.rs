//! Bottom-up hierarchical clustering with Lance-Williams updates.

use std::collections::HashMap;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;

use super::{
    ClusterFit, ClusterLabel, ClusteringAlgorithm, ClusteringArgs, resolve_cluster_count,
    squared_distance,
};
use crate::error::{DEError, Result};

/// Inter-cluster distance used when merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Linkage {
    /// Minimum pairwise distance.
    Single,
    /// Maximum pairwise distance.
    Complete,
    /// Mean pairwise distance (UPGMA).
    Average,
    /// Minimum increase of within-cluster variance.
    #[default]
    Ward,
}

/// Agglomerative clustering: every row starts alone, the two closest clusters
/// merge until `n_clusters` remain. Deterministic; never labels noise.
#[derive(Debug, Clone)]
pub struct Agglomerative {
    /// Number of clusters when the call does not override it.
    pub n_clusters: usize,
    /// Merge criterion.
    pub linkage: Linkage,
}

impl Agglomerative {
    /// Ward-linkage clustering into `n_clusters` clusters.
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            linkage: Linkage::Ward,
        }
    }

    /// Sets the merge criterion.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }
}

impl Default for Agglomerative {
    fn default() -> Self {
        Self::new(2)
    }
}

impl ClusteringAlgorithm for Agglomerative {
    fn fit(
        &self,
        data: &Array2<f64>,
        args: &ClusteringArgs,
        _rng: &mut StdRng,
    ) -> Result<ClusterFit> {
        let n = data.nrows();
        let k = resolve_cluster_count("agglomerative", self.n_clusters, args, n)?;
        if data.iter().any(|v| !v.is_finite()) {
            return Err(DEError::Clustering {
                message: "agglomerative: data contains non-finite values".into(),
            });
        }

        // Ward works on squared distances, the others on Euclidean ones.
        let mut dist = Array2::<f64>::zeros((n, n));
        for (i, a) in data.axis_iter(Axis(0)).enumerate() {
            for (j, b) in data.axis_iter(Axis(0)).enumerate().skip(i + 1) {
                let d2 = squared_distance(a, b);
                let d = if self.linkage == Linkage::Ward {
                    d2
                } else {
                    d2.sqrt()
                };
                dist[[i, j]] = d;
                dist[[j, i]] = d;
            }
        }

        // owner[i] is the representative slot of row i's cluster
        let mut owner: Vec<usize> = (0..n).collect();
        let mut sizes = vec![1usize; n];
        let mut active = vec![true; n];
        let mut remaining = n;

        while remaining > k {
            let mut best = (usize::MAX, usize::MAX, f64::INFINITY);
            for i in 0..n {
                if !active[i] {
                    continue;
                }
                for j in (i + 1)..n {
                    if active[j] && dist[[i, j]] < best.2 {
                        best = (i, j, dist[[i, j]]);
                    }
                }
            }
            let (a, b, d_ab) = best;
            if a == usize::MAX {
                break;
            }

            let (na, nb) = (sizes[a] as f64, sizes[b] as f64);
            for c in 0..n {
                if !active[c] || c == a || c == b {
                    continue;
                }
                let (d_ac, d_bc) = (dist[[a, c]], dist[[b, c]]);
                let merged = match self.linkage {
                    Linkage::Single => d_ac.min(d_bc),
                    Linkage::Complete => d_ac.max(d_bc),
                    Linkage::Average => (na * d_ac + nb * d_bc) / (na + nb),
                    Linkage::Ward => {
                        let nc = sizes[c] as f64;
                        ((na + nc) * d_ac + (nb + nc) * d_bc - nc * d_ab) / (na + nb + nc)
                    }
                };
                dist[[a, c]] = merged;
                dist[[c, a]] = merged;
            }

            sizes[a] += sizes[b];
            active[b] = false;
            for o in owner.iter_mut() {
                if *o == b {
                    *o = a;
                }
            }
            remaining -= 1;
        }

        // number clusters in order of first appearance
        let mut renumber: HashMap<usize, ClusterLabel> = HashMap::new();
        let labels = owner
            .iter()
            .map(|o| {
                let next = renumber.len() as ClusterLabel;
                *renumber.entry(*o).or_insert(next)
            })
            .collect();
        Ok(ClusterFit::Labels(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn three_groups() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [5.0, 5.0],
            [0.1, 0.0],
            [9.0, 0.0],
            [5.1, 5.0],
            [9.0, 0.1],
        ]
    }

    #[test]
    fn test_all_linkages_find_groups() {
        let mut rng = StdRng::seed_from_u64(0);
        for linkage in [
            Linkage::Single,
            Linkage::Complete,
            Linkage::Average,
            Linkage::Ward,
        ] {
            let labels = Agglomerative::new(3)
                .with_linkage(linkage)
                .fit(&three_groups(), &ClusteringArgs::default(), &mut rng)
                .unwrap()
                .into_labels();
            assert_eq!(labels, vec![0, 1, 0, 2, 1, 2], "{linkage:?}");
        }
    }

    #[test]
    fn test_single_cluster() {
        let mut rng = StdRng::seed_from_u64(0);
        let labels = Agglomerative::new(3)
            .fit(&three_groups(), &ClusteringArgs::with_clusters(1), &mut rng)
            .unwrap()
            .into_labels();
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_one_cluster_per_row() {
        let mut rng = StdRng::seed_from_u64(0);
        let labels = Agglomerative::new(6)
            .fit(&three_groups(), &ClusteringArgs::default(), &mut rng)
            .unwrap()
            .into_labels();
        assert_eq!(labels, vec![0, 1, 2, 3, 4, 5]);
    }
}
