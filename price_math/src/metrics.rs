//! Regression accuracy metrics

use crate::stats;
use crate::{MathError, Result};

fn check_pair(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return Err(MathError::InvalidInput(format!(
            "Actual ({}) and predicted ({}) must have the same non-zero length",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

/// Mean absolute error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Coefficient of determination.
///
/// A constant target yields 1.0 for a perfect fit and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot = stats::sum_squared_deviation(actual);

    if ss_tot <= f64::EPSILON {
        return Ok(if ss_res <= f64::EPSILON { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Mean absolute percentage error, in percent.
///
/// Points whose actual value is zero are skipped.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();

    Ok(stats::mean(&terms).map_or(0.0, |m| m * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_perfect_prediction() {
        let actual = [100.0, 110.0, 120.0];
        assert_relative_eq!(mean_absolute_error(&actual, &actual).unwrap(), 0.0);
        assert_relative_eq!(r2_score(&actual, &actual).unwrap(), 1.0);
        assert_relative_eq!(
            mean_absolute_percentage_error(&actual, &actual).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_known_values() {
        let actual = [100.0, 200.0];
        let predicted = [110.0, 180.0];
        assert_relative_eq!(mean_absolute_error(&actual, &predicted).unwrap(), 15.0);
        assert_relative_eq!(
            mean_absolute_percentage_error(&actual, &predicted).unwrap(),
            10.0
        );
        // ss_res = 500, ss_tot = 5000
        assert_relative_eq!(r2_score(&actual, &predicted).unwrap(), 0.9);
    }

    #[rstest]
    #[case(&[5.0, 5.0, 5.0], &[5.0, 5.0, 5.0], 1.0)]
    #[case(&[5.0, 5.0, 5.0], &[4.0, 5.0, 6.0], 0.0)]
    #[case(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0], 0.0)]
    #[case(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0], -3.0)]
    fn test_r2_edge_cases(#[case] actual: &[f64], #[case] predicted: &[f64], #[case] expected: f64) {
        assert_relative_eq!(r2_score(actual, predicted).unwrap(), expected);
    }

    #[test]
    fn test_mape_skips_zero_actuals() {
        let mape = mean_absolute_percentage_error(&[0.0, 100.0], &[5.0, 90.0]).unwrap();
        assert_relative_eq!(mape, 10.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(mean_absolute_error(&[1.0], &[]).is_err());
        assert!(r2_score(&[], &[]).is_err());
    }
}
