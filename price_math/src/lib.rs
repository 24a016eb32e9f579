//! # Price Math
//!
//! Numeric building blocks for price forecasting.
//! This crate provides descriptive and rolling statistics, feature scaling,
//! regression metrics, a least-squares trend line and a bagged regression
//! tree ensemble.

use thiserror::Error;

pub mod forest;
pub mod metrics;
pub mod rolling;
pub mod scaling;
pub mod stats;
pub mod trend;
pub mod tree;

pub use forest::{ForestParams, RandomForestRegressor};
pub use scaling::StandardScaler;
pub use tree::{RegressionTree, TreeParams};

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model has not been fitted")]
    NotFitted,
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Check that every row of a feature matrix has `width` columns.
pub(crate) fn check_width(rows: &[Vec<f64>], width: usize) -> Result<()> {
    match rows.iter().find(|row| row.len() != width) {
        Some(row) => Err(MathError::DimensionMismatch {
            expected: width,
            actual: row.len(),
        }),
        None => Ok(()),
    }
}
