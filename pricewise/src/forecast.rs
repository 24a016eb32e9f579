//! Autoregressive day-by-day price simulation
//!
//! Each future day is scored from a hypothetical feature row whose lag input
//! is the previous day's own prediction. The raw prediction is clamped into a
//! band around the recent historical mean, and the interval widens linearly
//! with the horizon. A day whose features or inference fail is filled by a
//! linear-trend extrapolation instead of aborting the forecast.

use crate::artifact::ModelArtifact;
use crate::config::ForecastConfig;
use crate::data::{EntityAttributes, EntityId, PriceObservation};
use crate::error::{PricewiseError, Result};
use crate::features::build_point;
use crate::recommendation::{recommend, Recommendation};
use chrono::{Duration, NaiveDate};
use price_math::trend::LinearTrend;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, warn};

/// One simulated day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_price: f64,
    /// `predicted_price - std × (1 + growth × day)`, floored at zero
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence: f64,
}

/// Horizon-level view of a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    /// Prediction for the last day of the horizon
    pub horizon_price: f64,
    /// `horizon_price` minus the current observed price
    pub expected_change: f64,
    /// `expected_change` relative to the current observed price, in percent
    pub expected_change_pct: f64,
    pub recommendation: Recommendation,
    pub reason: String,
}

/// Forecast for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub entity_id: EntityId,
    /// Most recent observed price
    pub current_price: f64,
    /// One point per day, in increasing date order
    pub predictions: Vec<ForecastPoint>,
    pub summary: ForecastSummary,
    /// Days filled by the trend fallback
    pub fallback_days: usize,
}

impl ForecastResult {
    /// Whether every day came from the regressor
    pub fn is_model_only(&self) -> bool {
        self.fallback_days == 0
    }
}

/// Statistics of the recent history window
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    /// Mean of the window; centre of the clamp band
    pub mean: f64,
    /// Population standard deviation; half-width of the day-0 interval
    pub std_dev: f64,
    trend: LinearTrend,
}

impl HistoryWindow {
    /// Summarize the last `window` prices of a chronological history
    pub fn from_history(history: &[PriceObservation], window: usize) -> Result<Self> {
        let start = history.len().saturating_sub(window);
        let prices: Vec<f64> = history[start..].iter().map(|o| o.price).collect();
        if prices.is_empty() {
            return Err(PricewiseError::InvalidParameter(
                "History window is empty".to_string(),
            ));
        }

        let mean = prices.iter().mean();
        let std_dev = if prices.len() > 1 {
            prices.iter().population_std_dev()
        } else {
            0.0
        };
        let trend = LinearTrend::fit(&prices)?;

        Ok(Self {
            mean,
            std_dev,
            trend,
        })
    }

    /// Per-day drift of the recent history
    pub fn slope(&self) -> f64 {
        self.trend.slope()
    }
}

/// Runs the simulation against one published artifact
#[derive(Debug, Clone, Copy)]
pub struct ForecastSimulator<'a> {
    artifact: &'a ModelArtifact,
    config: &'a ForecastConfig,
    seed: u64,
}

impl<'a> ForecastSimulator<'a> {
    /// `seed` drives the fallback noise
    pub fn new(artifact: &'a ModelArtifact, config: &'a ForecastConfig, seed: u64) -> Self {
        Self {
            artifact,
            config,
            seed,
        }
    }

    /// Simulate `days_ahead` days after `as_of` from a chronological history
    pub fn simulate(
        &self,
        entity_id: EntityId,
        history: &[PriceObservation],
        attributes: Option<&EntityAttributes>,
        days_ahead: usize,
        as_of: NaiveDate,
    ) -> Result<ForecastResult> {
        if days_ahead == 0 {
            return Err(PricewiseError::InvalidParameter(
                "days_ahead must be at least 1".to_string(),
            ));
        }
        let observed_price = history
            .last()
            .map(|o| o.price)
            .ok_or(PricewiseError::NoHistory(entity_id))?;

        let window = HistoryWindow::from_history(history, self.config.history_window)?;
        let band_low = window.mean * self.config.clamp_lower;
        let band_high = window.mean * self.config.clamp_upper;

        let mut current_price = observed_price;
        let mut predictions = Vec::with_capacity(days_ahead);
        let mut fallback_days = 0;

        for day in 1..=days_ahead {
            let date = as_of + Duration::days(day as i64);
            let features = build_point(date, current_price, attributes, &self.artifact.encoders);

            let raw = match self.artifact.predict(&features) {
                Ok(price) => price,
                Err(err) => {
                    warn!(entity_id, day, error = %err, "Falling back to trend extrapolation");
                    fallback_days += 1;
                    self.trend_fallback(entity_id, day, current_price, &window)
                }
            };

            let predicted_price = raw.max(band_low).min(band_high);
            predictions.push(self.point(date, day, predicted_price, window.std_dev));
            current_price = predicted_price;
        }

        let horizon_price = current_price;
        let expected_change = horizon_price - observed_price;
        let expected_change_pct = expected_change / observed_price * 100.0;
        let (recommendation, reason) = recommend(expected_change_pct);

        debug!(
            entity_id,
            days_ahead,
            fallback_days,
            expected_change_pct,
            "Forecast simulated"
        );

        Ok(ForecastResult {
            entity_id,
            current_price: observed_price,
            predictions,
            summary: ForecastSummary {
                horizon_price,
                expected_change,
                expected_change_pct,
                recommendation,
                reason,
            },
            fallback_days,
        })
    }

    fn point(&self, date: NaiveDate, day: usize, predicted_price: f64, std_dev: f64) -> ForecastPoint {
        let d = day as f64;
        let half_width = std_dev * (1.0 + self.config.band_growth_per_day * d);
        let confidence = (self.config.base_confidence - self.config.confidence_decay_per_day * d)
            .max(self.config.min_confidence);

        ForecastPoint {
            date,
            predicted_price,
            lower_bound: (predicted_price - half_width).max(0.0),
            upper_bound: predicted_price + half_width,
            confidence,
        }
    }

    /// `current + slope × day × noise`, noise ~ N(1, fallback_noise_std)
    fn trend_fallback(
        &self,
        entity_id: EntityId,
        day: usize,
        current_price: f64,
        window: &HistoryWindow,
    ) -> f64 {
        let seed = self
            .seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(entity_id.rotate_left(32))
            .wrapping_add(day as u64);
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(1.0, self.config.fallback_noise_std)
            .map(|normal| normal.sample(&mut rng))
            .unwrap_or(1.0);

        let predicted = current_price + window.slope() * day as f64 * noise;
        if predicted.is_finite() {
            predicted
        } else {
            current_price
        }
    }
}
