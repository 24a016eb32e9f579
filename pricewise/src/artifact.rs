//! Trained model bundle and its on-disk store
//!
//! The regressor, scaler and encoder registry travel as one JSON document.
//! Saving writes a temporary file next to the target and renames it into
//! place, so a reader sees either the previous bundle or the new one.

use crate::error::{PricewiseError, Result};
use crate::encoding::{CategoricalField, EncoderRegistry};
use crate::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use crate::training::TrainingMetrics;
use chrono::{DateTime, Duration, Utc};
use price_math::{RandomForestRegressor, StandardScaler};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Bumped whenever the persisted layout or feature set changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Everything a forecast needs, published as one immutable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub regressor: RandomForestRegressor,
    pub scaler: StandardScaler,
    pub encoders: EncoderRegistry,
    pub trained_at: DateTime<Utc>,
    pub metrics: TrainingMetrics,
}

impl ModelArtifact {
    /// Bundle freshly fitted parts, stamped with the current time
    pub fn new(
        regressor: RandomForestRegressor,
        scaler: StandardScaler,
        encoders: EncoderRegistry,
        metrics: TrainingMetrics,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            regressor,
            scaler,
            encoders,
            trained_at: Utc::now(),
            metrics,
        }
    }

    /// Reject bundles written for a different layout or feature set
    pub fn check_compatible(&self) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(PricewiseError::Artifact(format!(
                "Unsupported artifact version {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(PricewiseError::Artifact(
                "Artifact feature names do not match this build".to_string(),
            ));
        }
        if self.scaler.width() != FEATURE_COUNT || self.regressor.n_features() != FEATURE_COUNT {
            return Err(PricewiseError::Artifact(format!(
                "Artifact expects {} / {} columns, this build produces {}",
                self.scaler.width(),
                self.regressor.n_features(),
                FEATURE_COUNT
            )));
        }
        self.regressor
            .validate()
            .map_err(|e| PricewiseError::Artifact(format!("Malformed regressor: {}", e)))?;
        for field in CategoricalField::ALL {
            let sorted = self
                .encoders
                .encoder(field)
                .map(|e| e.classes().windows(2).all(|w| w[0] < w[1]));
            if sorted != Some(true) {
                return Err(PricewiseError::Artifact(format!(
                    "Encoder for {} is missing or unsorted",
                    field.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Scale a feature row and run the regressor
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        if !features.is_finite() {
            return Err(PricewiseError::FeatureConstruction(
                "Feature row contains non-finite values".to_string(),
            ));
        }
        let scaled = self
            .scaler
            .transform_row(&features.to_array())
            .map_err(|e| PricewiseError::FeatureConstruction(e.to_string()))?;
        let prediction = self
            .regressor
            .predict_row(&scaled)
            .map_err(|e| PricewiseError::FeatureConstruction(e.to_string()))?;

        if !prediction.is_finite() {
            return Err(PricewiseError::FeatureConstruction(format!(
                "Regressor returned {}",
                prediction
            )));
        }
        Ok(prediction)
    }

    /// Time since training
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.trained_at
    }
}

/// When a published artifact is due for replacement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrainPolicy {
    max_age: Option<Duration>,
}

impl RetrainPolicy {
    /// Artifacts older than `max_age_hours` are stale; `None` never expires
    pub fn new(max_age_hours: Option<u64>) -> Self {
        Self {
            max_age: max_age_hours.map(|h| Duration::hours(h as i64)),
        }
    }

    /// Whether `artifact` should be retrained at `now`
    pub fn is_stale(&self, artifact: &ModelArtifact, now: DateTime<Utc>) -> bool {
        self.max_age
            .map_or(false, |max_age| artifact.age(now) > max_age)
    }
}

/// File-backed artifact persistence
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    /// Store the bundle at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Bundle location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted bundle. A missing file is `Ok(None)`; an unreadable
    /// or incompatible one is an error.
    pub fn load(&self) -> Result<Option<ModelArtifact>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No persisted artifact");
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let artifact: ModelArtifact = serde_json::from_reader(reader)
            .map_err(|e| PricewiseError::Artifact(format!("Corrupted artifact: {}", e)))?;
        artifact.check_compatible()?;

        info!(
            path = %self.path.display(),
            trained_at = %artifact.trained_at,
            "Loaded model artifact"
        );
        Ok(Some(artifact))
    }

    /// Persist all parts of the bundle in one atomic replace
    pub fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, artifact)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PricewiseError::Io(e.error))?;

        info!(path = %self.path.display(), "Saved model artifact");
        Ok(())
    }
}
