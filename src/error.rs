//! Typed errors for the prediction service

use std::path::PathBuf;
use thiserror::Error;

/// Failure to load the persisted artifact set. Fatal at startup.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact not found: {0} (run `boxoffice train` first)")]
    Missing(PathBuf),

    #[error("Failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt artifact {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Inconsistent artifacts: {0}")]
    Inconsistent(String),
}

/// Failure scoped to one prediction request. The service stays available.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Feature row rejected: {0}")]
    FeatureRow(String),

    #[error("Error making prediction: {0}")]
    Prediction(String),
}
