//! K-Means clustering model implementation

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

/// Fitted K-Means centroids plus training statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster centroids in standardized space
    pub centroids: Array2<f64>,
    /// Training rows assigned to each cluster
    pub sizes: Vec<usize>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
    /// Cluster assignments for the rows the model was fit on
    #[serde(skip)]
    pub labels: Array1<usize>,
}

impl KMeansModel {
    /// Assign a standardized row to its nearest centroid
    pub fn predict(&self, features: ArrayView1<f64>) -> crate::Result<usize> {
        if features.len() != self.centroids.ncols() {
            anyhow::bail!(
                "Feature vector must have exactly {} dimensions, got {}",
                self.centroids.ncols(),
                features.len()
            );
        }

        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = euclidean_distance(&features, &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        Ok(closest_cluster)
    }

    pub fn n_features(&self) -> usize {
        self.centroids.ncols()
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Mean silhouette over the first `sample_size` fitted rows
    pub fn compute_silhouette_sample(&self, features: &Array2<f64>, sample_size: usize) -> f64 {
        let n_samples = features.nrows().min(sample_size).min(self.labels.len());
        if n_samples < 2 {
            return 0.0;
        }

        let total: f64 = (0..n_samples)
            .map(|i| self.point_silhouette(features, i, n_samples))
            .sum();
        total / n_samples as f64
    }

    /// Silhouette of row `i` against the other sampled rows
    fn point_silhouette(&self, features: &Array2<f64>, i: usize, n_samples: usize) -> f64 {
        let own = self.labels[i];
        let means = self.mean_distance_per_cluster(features, i, n_samples);

        // A point alone in its cluster has no cohesion term
        let cohesion = means.get(own).copied().flatten().unwrap_or(0.0);
        let separation = means
            .iter()
            .enumerate()
            .filter(|&(label, _)| label != own)
            .filter_map(|(_, mean)| *mean)
            .fold(f64::INFINITY, f64::min);

        if separation.is_infinite() || (cohesion == 0.0 && separation == 0.0) {
            return 0.0;
        }
        (separation - cohesion) / cohesion.max(separation)
    }

    /// Mean distance from row `i` to the sampled rows of each cluster;
    /// `None` for clusters with no other sampled row
    fn mean_distance_per_cluster(
        &self,
        features: &Array2<f64>,
        i: usize,
        n_samples: usize,
    ) -> Vec<Option<f64>> {
        let point = features.row(i);
        let mut sums = vec![0.0; self.n_clusters];
        let mut counts = vec![0usize; self.n_clusters];

        for j in (0..n_samples).filter(|&j| j != i) {
            let label = self.labels[j];
            if label < self.n_clusters {
                sums[label] += euclidean_distance(&point, &features.row(j));
                counts[label] += 1;
            }
        }

        sums.into_iter()
            .zip(counts)
            .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
            .collect()
    }
}

/// Fit K-Means on standardized movie features
///
/// # Arguments
/// * `features` - Standardized feature matrix (n_movies, n_features)
/// * `n_clusters` - Number of clusters
/// * `max_iters` - Maximum iterations for convergence
/// * `tolerance` - Convergence tolerance
/// * `seed` - Seed for centroid initialisation
pub fn fit_kmeans(
    features: &Array2<f64>,
    n_clusters: usize,
    max_iters: usize,
    tolerance: f64,
    seed: u64,
) -> crate::Result<KMeansModel> {
    if n_clusters == 0 {
        anyhow::bail!("Number of clusters must be at least 1");
    }

    if features.nrows() < n_clusters {
        anyhow::bail!(
            "Number of data points ({}) must be at least equal to number of clusters ({})",
            features.nrows(),
            n_clusters
        );
    }

    let n_samples = features.nrows();
    let targets: Array1<usize> = Array1::zeros(n_samples);
    let dataset = Dataset::new(features.clone(), targets);

    let rng = Xoshiro256Plus::seed_from_u64(seed);
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(max_iters as u64)
        .tolerance(tolerance)
        .fit(&dataset)?;

    let labels = model.predict(features);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(features, &labels, &centroids);

    let mut sizes = vec![0; n_clusters];
    for &label in labels.iter() {
        if label < n_clusters {
            sizes[label] += 1;
        }
    }

    Ok(KMeansModel {
        n_clusters,
        centroids,
        sizes,
        inertia,
        labels,
    })
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    labels
        .iter()
        .enumerate()
        .filter(|(_, &cluster)| cluster < centroids.nrows())
        .map(|(i, &cluster)| euclidean_distance(&features.row(i), &centroids.row(cluster)).powi(2))
        .sum()
}

fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}
