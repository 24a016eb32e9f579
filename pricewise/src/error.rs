//! Error types for the pricewise crate

use crate::data::EntityId;
use price_math::MathError;
use thiserror::Error;

/// Custom error types for the pricewise crate
#[derive(Debug, Error)]
pub enum PricewiseError {
    /// Too few rows to train; retry once more data has been ingested
    #[error("Insufficient data for training: {observed} rows available, {required} required")]
    InsufficientData { observed: usize, required: usize },

    /// No usable artifact and an automatic training attempt failed
    #[error("Model not trained: {0}")]
    ModelNotTrained(String),

    /// The entity has zero recorded observations
    #[error("No price history available for entity {0}")]
    NoHistory(EntityId),

    /// A single forecast day could not be built or scored
    #[error("Feature construction error: {0}")]
    FeatureConstruction(String),

    /// Any other failure inside the training pipeline
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error in engine configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Persisted artifact is unreadable or incompatible
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from numeric routines
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error reading CSV exports
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error (de)serializing JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, PricewiseError>;

impl From<toml::de::Error> for PricewiseError {
    fn from(err: toml::de::Error) -> Self {
        PricewiseError::Config(err.to_string())
    }
}
