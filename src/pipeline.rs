//! Offline training pipeline
//!
//! Load → filter → engineer → scale → split → fit regressor → report R² →
//! fit clusterer → persist. Any failing step aborts the whole run.

use crate::artifacts::ArtifactSet;
use crate::booster::{BoostingConfig, GradientBoostingRegressor};
use crate::data::{load_training_movies, StandardScaler, FEATURE_NAMES};
use crate::model::fit_kmeans;
use crate::viz;
use clap::ValueEnum;
use ndarray::Axis;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Number of marketing clusters
pub const N_CLUSTERS: usize = 4;

/// Rows used when sampling the silhouette score
const SILHOUETTE_SAMPLE: usize = 100;

/// Rows the clusterer is fit on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ClusterScope {
    /// Training partition only
    #[default]
    Train,
    /// Training and test partitions combined
    Full,
}

/// Everything the pipeline needs for one run
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub dataset: PathBuf,
    pub models_dir: PathBuf,
    /// Fraction of rows held out for the test R²
    pub test_size: f64,
    /// Seed for the split and the clusterer
    pub seed: u64,
    pub n_clusters: usize,
    pub max_iters: usize,
    pub tolerance: f64,
    pub cluster_scope: ClusterScope,
    pub booster: BoostingConfig,
    /// Optional PNG scatter of the fitted clusters
    pub plot: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("tmdb_5000_movies.csv"),
            models_dir: PathBuf::from("models"),
            test_size: 0.2,
            seed: 42,
            n_clusters: N_CLUSTERS,
            max_iters: 300,
            tolerance: 1e-4,
            cluster_scope: ClusterScope::default(),
            booster: BoostingConfig::default(),
            plot: None,
        }
    }
}

/// Diagnostics from one pipeline run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_r2: f64,
    pub test_r2: f64,
    pub cluster_sizes: Vec<usize>,
    pub inertia: f64,
    pub silhouette: f64,
    pub mean_popularity_vote_ratio: f64,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Working with {} valid movies after filtering ({} dropped)",
            self.kept_rows,
            self.total_rows - self.kept_rows
        )?;
        writeln!(f, "Train/test rows: {}/{}", self.train_rows, self.test_rows)?;
        writeln!(
            f,
            "Model R² score - Training: {:.4}, Test: {:.4}",
            self.train_r2, self.test_r2
        )?;
        writeln!(f, "\n=== Cluster Statistics ===")?;
        let clustered: usize = self.cluster_sizes.iter().sum();
        for (i, &size) in self.cluster_sizes.iter().enumerate() {
            let percentage = (size as f64 / clustered.max(1) as f64) * 100.0;
            writeln!(f, "Cluster {}: {} movies ({:.1}%)", i, size, percentage)?;
        }
        writeln!(f, "Within-cluster sum of squares: {:.2}", self.inertia)?;
        write!(f, "Silhouette score (sample): {:.3}", self.silhouette)
    }
}

/// Run the pipeline end to end and persist the artifact set
pub fn run_training(config: &TrainingConfig) -> crate::Result<TrainingReport> {
    info!("Loading dataset from {}", config.dataset.display());
    let table = load_training_movies(&config.dataset)?;

    info!("Engineering features");
    let raw_features = table.feature_matrix()?;
    let revenue = table.revenue();
    let mean_ratio = table.mean_popularity_vote_ratio();
    info!(mean_popularity_vote_ratio = mean_ratio, "Popularity/vote diagnostic");

    info!("Scaling features and training models");
    let scaler = StandardScaler::fit(&raw_features)?;
    let scaled = scaler.transform(&raw_features)?;

    let (train_idx, test_idx) = train_test_split(table.len(), config.test_size, config.seed)?;
    let x_train = scaled.select(Axis(0), &train_idx);
    let y_train = revenue.select(Axis(0), &train_idx);
    let x_test = scaled.select(Axis(0), &test_idx);
    let y_test = revenue.select(Axis(0), &test_idx);

    let regressor = GradientBoostingRegressor::fit(&x_train, &y_train, config.booster.clone())?;
    let train_r2 = regressor.score(&x_train, &y_train)?;
    let test_r2 = regressor.score(&x_test, &y_test)?;
    info!(train_r2, test_r2, "Revenue model fitted");

    let cluster_matrix = match config.cluster_scope {
        ClusterScope::Train => &x_train,
        ClusterScope::Full => &scaled,
    };
    info!(
        rows = cluster_matrix.nrows(),
        scope = ?config.cluster_scope,
        "Fitting {} clusters",
        config.n_clusters
    );
    let clusterer = fit_kmeans(
        cluster_matrix,
        config.n_clusters,
        config.max_iters,
        config.tolerance,
        config.seed,
    )?;
    let silhouette = clusterer.compute_silhouette_sample(cluster_matrix, SILHOUETTE_SAMPLE);

    if let Some(plot_path) = &config.plot {
        viz::create_cluster_visualization(cluster_matrix, &clusterer, plot_path)?;
        info!("Cluster plot saved to {}", plot_path.display());
    }

    let report = TrainingReport {
        total_rows: table.total_rows,
        kept_rows: table.len(),
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        train_r2,
        test_r2,
        cluster_sizes: clusterer.cluster_sizes().to_vec(),
        inertia: clusterer.inertia,
        silhouette,
        mean_popularity_vote_ratio: mean_ratio,
    };

    let artifacts = ArtifactSet {
        scaler,
        regressor,
        clusterer,
        feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
    };
    info!("Saving models to {}", config.models_dir.display());
    artifacts.save(&config.models_dir)?;

    Ok(report)
}

/// Seeded shuffle split into (train, test) row indices.
///
/// The test partition gets `ceil(test_size * n)` rows.
pub fn train_test_split(
    n: usize,
    test_size: f64,
    seed: u64,
) -> crate::Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        anyhow::bail!("test_size must be in (0, 1), got {}", test_size);
    }

    let n_test = ((n as f64) * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        anyhow::bail!(
            "Cannot split {} rows with test_size {}: need at least one row on each side",
            n,
            test_size
        );
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let (train, test) = train_test_split(11, 0.2, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn test_split_partitions_rows() {
        let (train, test) = train_test_split(50, 0.2, 7).unwrap();
        let all: HashSet<usize> = train.iter().chain(test.iter()).copied().collect();
        assert_eq!(all.len(), 50);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(
            train_test_split(30, 0.2, 42).unwrap(),
            train_test_split(30, 0.2, 42).unwrap()
        );
    }

    #[test]
    fn test_split_rejects_degenerate_input() {
        assert!(train_test_split(1, 0.2, 42).is_err());
        assert!(train_test_split(10, 0.0, 42).is_err());
        assert!(train_test_split(10, 1.0, 42).is_err());
    }

    #[test]
    fn test_missing_dataset_aborts() {
        let config = TrainingConfig {
            dataset: PathBuf::from("no/such/movies.csv"),
            ..Default::default()
        };
        assert!(run_training(&config).is_err());
    }
}
