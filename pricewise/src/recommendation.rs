//! Buy / wait / hold policy and best-time-to-buy search

use crate::data::EntityId;
use crate::forecast::{ForecastPoint, ForecastResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected moves within this many percent either way are "stable"
pub const STABLE_BAND_PCT: f64 = 5.0;

/// Action derived from a forecast's expected change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    /// Price is expected to rise; buy now
    Buy,
    /// Price is expected to fall; wait
    Wait,
    /// No significant move expected
    Hold,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Recommendation::Buy => "BUY",
            Recommendation::Wait => "WAIT",
            Recommendation::Hold => "HOLD",
        };
        f.write_str(label)
    }
}

/// Map an expected percentage change to an action and a reason.
///
/// Both boundaries (exactly -5 and +5) are HOLD, as is NaN.
///
/// ```
/// use pricewise::recommendation::{recommend, Recommendation};
///
/// assert_eq!(recommend(-7.5).0, Recommendation::Wait);
/// assert_eq!(recommend(5.0).0, Recommendation::Hold);
/// ```
pub fn recommend(expected_change_pct: f64) -> (Recommendation, String) {
    if expected_change_pct < -STABLE_BAND_PCT {
        (
            Recommendation::Wait,
            format!(
                "Price expected to drop by {:.1}%",
                expected_change_pct.abs()
            ),
        )
    } else if expected_change_pct > STABLE_BAND_PCT {
        (
            Recommendation::Buy,
            format!("Price expected to increase by {:.1}%", expected_change_pct),
        )
    } else {
        (
            Recommendation::Hold,
            "Price expected to remain stable".to_string(),
        )
    }
}

/// Cheapest forecast day and the savings against today's price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestTimeResult {
    pub entity_id: EntityId,
    pub date: NaiveDate,
    /// 1-based offset of the chosen day within the forecast
    pub days_from_now: usize,
    pub expected_price: f64,
    pub current_price: f64,
    /// Current price minus the cheapest predicted price; may be negative
    pub expected_savings: f64,
    pub savings_percentage: f64,
    pub recommendation: String,
}

impl BestTimeResult {
    /// Scan every forecast point for the minimum predicted price.
    ///
    /// Ties keep the earliest day. Returns `None` only for an empty forecast.
    pub fn from_forecast(forecast: &ForecastResult) -> Option<Self> {
        let (index, best) = forecast
            .predictions
            .iter()
            .enumerate()
            .fold(None, |acc: Option<(usize, &ForecastPoint)>, (i, point)| match acc {
                Some((_, b)) if b.predicted_price <= point.predicted_price => acc,
                _ => Some((i, point)),
            })?;

        let days_from_now = index + 1;
        let current_price = forecast.current_price;
        let expected_savings = current_price - best.predicted_price;
        let savings_percentage = if current_price != 0.0 {
            expected_savings / current_price * 100.0
        } else {
            0.0
        };

        let recommendation = if expected_savings > 0.0 {
            format!(
                "Wait {} days to save {:.0} ({:.1}%)",
                days_from_now, expected_savings, savings_percentage
            )
        } else {
            "Buy now - prices expected to rise".to_string()
        };

        Some(Self {
            entity_id: forecast.entity_id,
            date: best.date,
            days_from_now,
            expected_price: best.predicted_price,
            current_price,
            expected_savings,
            savings_percentage,
            recommendation,
        })
    }
}
