//! Density-based clustering. Rows in sparse regions are labelled [`NOISE`].

use std::collections::VecDeque;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;

use super::{ClusterFit, ClusterLabel, ClusteringAlgorithm, ClusteringArgs, NOISE, squared_distance};
use crate::error::{DEError, Result};

/// DBSCAN over Euclidean distance.
///
/// The cluster count is discovered from the data, so
/// [`ClusteringArgs::n_clusters`] is ignored. The call-time options `eps` and
/// `min_samples` override the configured values.
#[derive(Debug, Clone)]
pub struct Dbscan {
    /// Neighbourhood radius.
    pub eps: f64,
    /// Neighbours (the row itself included) needed for a core point.
    pub min_samples: usize,
}

impl Dbscan {
    /// DBSCAN with radius `eps` and core threshold `min_samples`.
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }
}

impl ClusteringAlgorithm for Dbscan {
    fn fit(
        &self,
        data: &Array2<f64>,
        args: &ClusteringArgs,
        _rng: &mut StdRng,
    ) -> Result<ClusterFit> {
        let eps = args.get("eps").unwrap_or(self.eps);
        let min_samples = args.count_or("dbscan", "min_samples", self.min_samples)?;
        if !(eps > 0.0 && eps.is_finite()) || min_samples == 0 {
            return Err(DEError::Clustering {
                message: format!(
                    "dbscan: eps must be positive and min_samples >= 1, got eps={eps} min_samples={min_samples}"
                ),
            });
        }

        let n = data.nrows();
        let eps_sq = eps * eps;
        let neighbors: Vec<Vec<usize>> = data
            .axis_iter(Axis(0))
            .map(|p| {
                data.axis_iter(Axis(0))
                    .enumerate()
                    .filter(|(_, q)| squared_distance(p, *q) <= eps_sq)
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        let mut labels: Vec<Option<ClusterLabel>> = vec![None; n];
        let mut cluster: ClusterLabel = 0;

        for i in 0..n {
            if labels[i].is_some() {
                continue;
            }
            if neighbors[i].len() < min_samples {
                labels[i] = Some(NOISE);
                continue;
            }

            labels[i] = Some(cluster);
            let mut queue: VecDeque<usize> = neighbors[i].iter().copied().collect();
            while let Some(j) = queue.pop_front() {
                match labels[j] {
                    // border point previously taken for noise
                    Some(NOISE) => labels[j] = Some(cluster),
                    Some(_) => continue,
                    None => {
                        labels[j] = Some(cluster);
                        if neighbors[j].len() >= min_samples {
                            queue.extend(neighbors[j].iter().copied());
                        }
                    }
                }
            }
            cluster += 1;
        }

        Ok(ClusterFit::Labels(
            labels.into_iter().map(|l| l.unwrap_or(NOISE)).collect(),
        ))
    }
}
