//! Persisted artifact set shared by training and prediction

use crate::booster::GradientBoostingRegressor;
use crate::data::StandardScaler;
use crate::error::ArtifactError;
use crate::model::KMeansModel;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const SCALER_FILE: &str = "scaler.json";
pub const REGRESSOR_FILE: &str = "revenue_model.json";
pub const CLUSTERER_FILE: &str = "clustering_model.json";
pub const FEATURE_LIST_FILE: &str = "feature_list.json";

/// Scaler, regressor, clusterer and the ordered feature-name list
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub scaler: StandardScaler,
    pub regressor: GradientBoostingRegressor,
    pub clusterer: KMeansModel,
    pub feature_names: Vec<String>,
}

impl ArtifactSet {
    /// Write all four artifacts into `dir`, overwriting previous ones
    pub fn save(&self, dir: &Path) -> crate::Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create models directory {}", dir.display()))?;

        write_json(&dir.join(SCALER_FILE), &self.scaler)?;
        write_json(&dir.join(REGRESSOR_FILE), &self.regressor)?;
        write_json(&dir.join(CLUSTERER_FILE), &self.clusterer)?;
        write_json(&dir.join(FEATURE_LIST_FILE), &self.feature_names)?;
        Ok(())
    }

    /// Read all four artifacts from `dir` and check they agree on width
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let artifacts = Self {
            scaler: read_json(&dir.join(SCALER_FILE))?,
            regressor: read_json(&dir.join(REGRESSOR_FILE))?,
            clusterer: read_json(&dir.join(CLUSTERER_FILE))?,
            feature_names: read_json(&dir.join(FEATURE_LIST_FILE))?,
        };
        artifacts.check_consistency()?;
        Ok(artifacts)
    }

    fn check_consistency(&self) -> Result<(), ArtifactError> {
        let width = self.feature_names.len();
        let widths = [
            ("scaler", self.scaler.n_features()),
            ("revenue model", self.regressor.n_features()),
            ("clustering model", self.clusterer.n_features()),
        ];

        for (name, actual) in widths {
            if actual != width {
                return Err(ArtifactError::Inconsistent(format!(
                    "{} expects {} features but the feature list has {}",
                    name, actual, width
                )));
            }
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> crate::Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::Missing(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| ArtifactError::Io {
        path: PathBuf::from(path),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactError::Corrupt {
        path: PathBuf::from(path),
        source,
    })
}
