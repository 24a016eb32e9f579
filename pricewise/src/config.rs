//! Engine configuration
//!
//! Defaults reproduce the reference behaviour; a TOML file may override any
//! subset of fields.
//!
//! ```toml
//! [training]
//! n_trees = 100
//!
//! [forecast]
//! history_window = 60
//!
//! [artifact]
//! path = "models/laptops.json"
//! max_age_hours = 24
//! ```

use crate::error::{PricewiseError, Result};
use price_math::{ForestParams, TreeParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Training pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Raw observations required before features are built
    pub min_raw_observations: usize,
    /// Finite feature rows required after cleaning
    pub min_clean_rows: usize,
    /// Share of the chronological tail held out for evaluation
    pub test_ratio: f64,
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Seed for bootstrap sampling and fallback noise
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_raw_observations: 100,
            min_clean_rows: 50,
            test_ratio: 0.2,
            n_trees: 50,
            max_depth: 10,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Forest hyperparameters derived from this config
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            tree: TreeParams {
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: 1,
            },
            seed: self.seed,
        }
    }
}

/// Forecast simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Most recent observations used for the clamp band and volatility
    pub history_window: usize,
    /// Lower clamp as a multiple of the window mean
    pub clamp_lower: f64,
    /// Upper clamp as a multiple of the window mean
    pub clamp_upper: f64,
    /// Interval widening per forecast day
    pub band_growth_per_day: f64,
    pub base_confidence: f64,
    pub confidence_decay_per_day: f64,
    pub min_confidence: f64,
    /// Standard deviation of the multiplicative noise in the trend fallback
    pub fallback_noise_std: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            history_window: 30,
            clamp_lower: 0.5,
            clamp_upper: 1.5,
            band_growth_per_day: 0.02,
            base_confidence: 0.95,
            confidence_decay_per_day: 0.05,
            min_confidence: 0.5,
            fallback_noise_std: 0.02,
        }
    }
}

/// Artifact persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Bundle file; `None` keeps artifacts in memory only
    pub path: Option<PathBuf>,
    /// Age after which an artifact is due for retraining
    pub max_age_hours: Option<u64>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("models/price_predictor.json")),
            max_age_hours: None,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub training: TrainingConfig,
    pub forecast: ForecastConfig,
    pub artifact: ArtifactConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Defaults with persistence disabled
    pub fn in_memory() -> Self {
        Self {
            artifact: ArtifactConfig {
                path: None,
                max_age_hours: None,
            },
            ..Self::default()
        }
    }

    /// Reject values that would make training or forecasting meaningless
    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        if !(t.test_ratio > 0.0 && t.test_ratio < 1.0) {
            return Err(PricewiseError::Config(format!(
                "test_ratio must be in (0, 1), got {}",
                t.test_ratio
            )));
        }
        if t.n_trees == 0 || t.max_depth == 0 {
            return Err(PricewiseError::Config(
                "n_trees and max_depth must be positive".to_string(),
            ));
        }
        if t.min_clean_rows < 2 {
            return Err(PricewiseError::Config(
                "min_clean_rows must be at least 2 to allow a split".to_string(),
            ));
        }

        let f = &self.forecast;
        if f.history_window == 0 {
            return Err(PricewiseError::Config(
                "history_window must be positive".to_string(),
            ));
        }
        if !(f.clamp_lower > 0.0 && f.clamp_lower <= f.clamp_upper) {
            return Err(PricewiseError::Config(format!(
                "clamp band must satisfy 0 < lower <= upper, got [{}, {}]",
                f.clamp_lower, f.clamp_upper
            )));
        }
        if f.band_growth_per_day < 0.0 || f.confidence_decay_per_day < 0.0 {
            return Err(PricewiseError::Config(
                "band growth and confidence decay cannot be negative".to_string(),
            ));
        }
        if !(f.min_confidence > 0.0
            && f.min_confidence <= f.base_confidence
            && f.base_confidence <= 1.0)
        {
            return Err(PricewiseError::Config(
                "confidence must satisfy 0 < min_confidence <= base_confidence <= 1".to_string(),
            ));
        }
        if f.fallback_noise_std < 0.0 {
            return Err(PricewiseError::Config(
                "fallback_noise_std cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}
