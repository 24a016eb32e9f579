//! Least-squares trend line for short extrapolations

use crate::{MathError, Result};

/// Straight line fitted to a series indexed 0, 1, 2, ...
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    slope: f64,
    intercept: f64,
    len: usize,
}

impl LinearTrend {
    /// Fit the line to `values`.
    ///
    /// A single value gives a flat line through it.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(MathError::InsufficientData(
                "Need at least one value to fit a trend".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Trend input contains non-finite values".to_string(),
            ));
        }

        let n = values.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let dx = i as f64 - x_mean;
            numerator += dx * (y - y_mean);
            denominator += dx * dx;
        }

        let slope = if denominator.abs() < 1e-10 {
            0.0
        } else {
            numerator / denominator
        };

        Ok(Self {
            slope,
            intercept: y_mean - slope * x_mean,
            len: values.len(),
        })
    }

    /// Change per step
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Fitted value at index 0
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Value `periods_ahead` steps past the last fitted point
    pub fn forecast(&self, periods_ahead: usize) -> f64 {
        let x = (self.len - 1 + periods_ahead) as f64;
        self.slope * x + self.intercept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_exact_line() {
        let trend = LinearTrend::fit(&[10.0, 12.0, 14.0, 16.0]).unwrap();
        assert_relative_eq!(trend.slope(), 2.0);
        assert_relative_eq!(trend.intercept(), 10.0);
        assert_relative_eq!(trend.forecast(1), 18.0);
    }

    #[test]
    fn test_single_value_is_flat() {
        let trend = LinearTrend::fit(&[42.0]).unwrap();
        assert_eq!(trend.slope(), 0.0);
        assert_relative_eq!(trend.forecast(5), 42.0);
    }

    #[rstest]
    #[case(&[5.0, 5.0, 5.0, 5.0], 0.0)]
    #[case(&[10.0, 9.0, 8.0], -1.0)]
    #[case(&[1.0, 3.0, 2.0, 4.0], 0.8)]
    fn test_slope(#[case] values: &[f64], #[case] expected: f64) {
        let trend = LinearTrend::fit(values).unwrap();
        assert_relative_eq!(trend.slope(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(LinearTrend::fit(&[]).is_err());
        assert!(LinearTrend::fit(&[1.0, f64::NAN]).is_err());
    }
}
