//! # Pricewise
//!
//! Price forecasting and buy/wait recommendation engine for tracked products.
//!
//! ## Features
//!
//! - Calendar, categorical, hardware-spec and lag features per observation
//! - Bagged regression-tree model trained on a chronological split
//! - Autoregressive day-by-day forecasts with clamped estimates and widening intervals
//! - BUY / WAIT / HOLD recommendations and best-time-to-buy search
//! - Parallel batch forecasts with per-entity failures
//! - Atomically persisted model artifacts
//!
//! ## Quick Start
//!
//! ```no_run
//! use pricewise::{EngineConfig, InMemoryHistory, PriceEngine};
//!
//! # fn main() -> pricewise::Result<()> {
//! // Load exported history
//! let history = InMemoryHistory::from_csv("prices.csv", Some("products.csv"))?;
//!
//! // Build the engine; a persisted artifact is picked up if present
//! let engine = PriceEngine::new(history, EngineConfig::default())?;
//!
//! // Train once, then forecast
//! let outcome = engine.train(false);
//! println!("{}", outcome.status());
//!
//! let forecast = engine.forecast(42, 7)?;
//! println!("{}: {}", forecast.summary.recommendation, forecast.summary.reason);
//!
//! let best = engine.best_time_to_buy(42, 30)?;
//! println!("{}", best.recommendation);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod data;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod features;
pub mod forecast;
pub mod recommendation;
pub mod training;

// Re-export commonly used types
pub use crate::artifact::{ArtifactStore, ModelArtifact, RetrainPolicy};
pub use crate::config::{ArtifactConfig, EngineConfig, ForecastConfig, TrainingConfig};
pub use crate::data::{EntityAttributes, EntityId, HistorySource, InMemoryHistory, PriceObservation};
pub use crate::engine::PriceEngine;
pub use crate::error::{PricewiseError, Result};
pub use crate::forecast::{ForecastPoint, ForecastResult, ForecastSummary};
pub use crate::recommendation::{BestTimeResult, Recommendation};
pub use crate::training::{TrainingMetrics, TrainingOutcome};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
