//! Training pipeline: history → features → scaler + forest → artifact

use crate::artifact::ModelArtifact;
use crate::config::TrainingConfig;
use crate::data::HistorySource;
use crate::encoding::EncoderRegistry;
use crate::error::{PricewiseError, Result};
use crate::features::{build_features, FeatureRow};
use price_math::metrics::{mean_absolute_error, mean_absolute_percentage_error, r2_score};
use price_math::{RandomForestRegressor, StandardScaler};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, instrument};

/// Hold-out evaluation of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Mean absolute error
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
    /// Mean absolute percentage error, in percent
    pub mape: f64,
    pub training_samples: usize,
    pub test_samples: usize,
}

impl std::fmt::Display for TrainingMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Training Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  R2:    {:.4}", self.r2)?;
        writeln!(f, "  MAPE:  {:.4}%", self.mape)?;
        writeln!(
            f,
            "  Rows:  {} train / {} test",
            self.training_samples, self.test_samples
        )?;
        Ok(())
    }
}

/// Result of a training request
#[derive(Debug)]
pub enum TrainingOutcome {
    /// A valid artifact was already published and retraining was not forced
    AlreadyTrained,
    /// A new artifact was published
    Trained(TrainingMetrics),
    /// Nothing was published; the previous artifact, if any, stays live
    Failed(PricewiseError),
}

impl TrainingOutcome {
    /// Whether a usable artifact exists after this outcome
    pub fn is_success(&self) -> bool {
        !matches!(self, TrainingOutcome::Failed(_))
    }

    /// Metrics of a fresh fit
    pub fn metrics(&self) -> Option<&TrainingMetrics> {
        match self {
            TrainingOutcome::Trained(metrics) => Some(metrics),
            _ => None,
        }
    }

    /// Failure cause
    pub fn error(&self) -> Option<&PricewiseError> {
        match self {
            TrainingOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Short human-readable status
    pub fn status(&self) -> &'static str {
        match self {
            TrainingOutcome::AlreadyTrained => "Model already trained",
            TrainingOutcome::Trained(_) => "Training successful",
            TrainingOutcome::Failed(PricewiseError::InsufficientData { .. }) => {
                "Insufficient data for training"
            }
            TrainingOutcome::Failed(_) => "Training failed",
        }
    }
}

/// Fits a fresh artifact from the full available history
#[derive(Debug, Clone)]
pub struct TrainingPipeline<'a> {
    config: &'a TrainingConfig,
}

fn split_point(n: usize, test_ratio: f64) -> usize {
    let test = ((n as f64) * test_ratio).ceil() as usize;
    n - test.clamp(1, n.saturating_sub(1).max(1))
}

fn unzip(rows: &[FeatureRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    rows.iter()
        .map(|row| (row.features.to_vec(), row.target))
        .unzip()
}

impl<'a> TrainingPipeline<'a> {
    pub fn new(config: &'a TrainingConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline
    #[instrument(skip_all, fields(n_trees = self.config.n_trees))]
    pub fn run(&self, source: &dyn HistorySource) -> Result<ModelArtifact> {
        let observations = source.all_observations();
        if observations.len() < self.config.min_raw_observations {
            return Err(PricewiseError::InsufficientData {
                observed: observations.len(),
                required: self.config.min_raw_observations,
            });
        }

        let attributes = source.all_attributes();
        let mut encoders = EncoderRegistry::new();
        let rows = build_features(&observations, &attributes, &mut encoders)?;

        let built = rows.len();
        let rows: Vec<FeatureRow> = rows
            .into_iter()
            .filter(|row| row.features.is_finite() && row.target.is_finite())
            .collect();
        debug!(built, kept = rows.len(), "Dropped non-finite feature rows");

        if rows.len() < self.config.min_clean_rows {
            return Err(PricewiseError::InsufficientData {
                observed: rows.len(),
                required: self.config.min_clean_rows,
            });
        }

        // rows are chronological; the tail is held out
        let cut = split_point(rows.len(), self.config.test_ratio);
        let (train_x, train_y) = unzip(&rows[..cut]);
        let (test_x, test_y) = unzip(&rows[cut..]);

        let scaler = StandardScaler::fit(&train_x)?;
        let train_scaled = scaler.transform(&train_x)?;
        let test_scaled = scaler.transform(&test_x)?;

        let regressor =
            RandomForestRegressor::fit(&train_scaled, &train_y, self.config.forest_params())?;
        let predicted = regressor.predict(&test_scaled)?;

        let metrics = TrainingMetrics {
            mae: mean_absolute_error(&test_y, &predicted)?,
            r2: r2_score(&test_y, &predicted)?,
            mape: mean_absolute_percentage_error(&test_y, &predicted)?,
            training_samples: train_y.len(),
            test_samples: test_y.len(),
        };
        info!(
            mae = metrics.mae,
            r2 = metrics.r2,
            mape = metrics.mape,
            train = metrics.training_samples,
            test = metrics.test_samples,
            "Model fitted"
        );

        Ok(ModelArtifact::new(regressor, scaler, encoders, metrics))
    }

    /// Run the pipeline, turning a panic anywhere inside it into
    /// [`PricewiseError::TrainingFailed`]
    pub fn run_guarded(&self, source: &dyn HistorySource) -> Result<ModelArtifact> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(source))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(PricewiseError::TrainingFailed(message))
            }
        }
    }
}
