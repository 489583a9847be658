//! BoxOffice: movie revenue prediction and marketing-strategy clustering
//!
//! The library has two halves sharing one artifact contract: a training
//! pipeline that fits a scaler, a gradient-boosted revenue regressor and a
//! K-Means clusterer from historical TMDB-style data, and a predictor that
//! loads those artifacts and answers single-movie requests.

pub mod artifacts;
pub mod booster;
pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod viz;

// Re-export public items for easier access
pub use artifacts::ArtifactSet;
pub use booster::{BoostingConfig, GradientBoostingRegressor};
pub use cli::{Cli, Command};
pub use data::{
    load_training_movies, to_canonical_order, FeatureVector, MovieTable, RawMovie,
    StandardScaler, FEATURE_NAMES,
};
pub use error::{ArtifactError, RequestError};
pub use model::{fit_kmeans, KMeansModel};
pub use pipeline::{run_training, ClusterScope, TrainingConfig, TrainingReport};
pub use predict::{MovieInput, PredictionReport, Predictor, RoiBand};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
