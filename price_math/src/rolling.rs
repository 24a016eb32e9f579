//! Trailing-window statistics
//!
//! Windows admit partial fills: the first value already yields a mean, while
//! the sample standard deviation needs at least two values.

use crate::stats;
use crate::{MathError, Result};
use std::collections::VecDeque;

/// Fixed-size trailing window over a stream of values
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    /// Create a new rolling window with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
        })
    }

    /// Push a new value, evicting the oldest once the window is full
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.period {
            self.values.pop_front();
        }
    }

    /// Mean of the values currently in the window
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Sample standard deviation of the values currently in the window
    pub fn sample_std(&self) -> Option<f64> {
        let (front, back) = self.values.as_slices();
        if back.is_empty() {
            stats::sample_std(front)
        } else {
            let contiguous: Vec<f64> = self.values.iter().copied().collect();
            stats::sample_std(&contiguous)
        }
    }

    /// Number of values in the window
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window has seen no values yet
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
