//! Bagged ensemble of regression trees

use crate::tree::{RegressionTree, TreeParams};
use crate::{check_width, MathError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Hyperparameters for [`RandomForestRegressor`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of bootstrap-trained trees
    pub n_trees: usize,
    /// Per-tree growth limits
    pub tree: TreeParams,
    /// Base seed; tree `i` samples with `seed + i`
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 50,
            tree: TreeParams::default(),
            seed: 42,
        }
    }
}

/// Random forest regressor: each tree is fitted on a bootstrap resample and
/// predictions are averaged.
///
/// Fitting is parallel across trees but fully determined by the seed.
///
/// # Examples
///
/// ```
/// use price_math::{ForestParams, RandomForestRegressor};
///
/// let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
/// let targets: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
/// let forest = RandomForestRegressor::fit(&rows, &targets, ForestParams::default()).unwrap();
///
/// let guess = forest.predict_row(&[20.0]).unwrap();
/// assert!(guess > 110.0 && guess < 130.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    /// Fit the ensemble on a row-major feature matrix
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], params: ForestParams) -> Result<Self> {
        if params.n_trees == 0 {
            return Err(MathError::InvalidInput(
                "A forest needs at least one tree".to_string(),
            ));
        }
        let n_features = match rows.first() {
            Some(row) => row.len(),
            None => {
                return Err(MathError::InsufficientData(
                    "Cannot fit a forest without samples".to_string(),
                ))
            }
        };
        check_width(rows, n_features)?;
        if rows.len() != targets.len() {
            return Err(MathError::InvalidInput(format!(
                "Rows ({}) and targets ({}) differ in length",
                rows.len(),
                targets.len()
            )));
        }
        if targets.iter().any(|t| !t.is_finite()) || rows.iter().flatten().any(|v| !v.is_finite())
        {
            return Err(MathError::InvalidInput(
                "Training data contains non-finite values".to_string(),
            ));
        }

        let n = rows.len();
        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit_indices(rows, targets, &mut sample, params.tree)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            params,
            n_features,
            trees,
        })
    }

    /// Check every tree of a forest that did not come from `fit`
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(MathError::NotFitted);
        }
        for tree in &self.trees {
            if tree.n_features() != self.n_features {
                return Err(MathError::DimensionMismatch {
                    expected: self.n_features,
                    actual: tree.n_features(),
                });
            }
            tree.validate()?;
        }
        Ok(())
    }

    /// Average prediction of all trees for one row
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(MathError::NotFitted);
        }
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict_row(row)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Predict every row of a matrix
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Number of input columns
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of fitted trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Hyperparameters used for fitting
    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_line(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows = (0..n).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let targets = (0..n)
            .map(|i| 500.0 + 2.0 * i as f64 + ((i * 37) % 11) as f64)
            .collect();
        (rows, targets)
    }

    #[test]
    fn test_same_seed_same_model() {
        let (rows, targets) = noisy_line(120);
        let params = ForestParams {
            n_trees: 10,
            ..ForestParams::default()
        };
        let a = RandomForestRegressor::fit(&rows, &targets, params).unwrap();
        let b = RandomForestRegressor::fit(&rows, &targets, params).unwrap();

        assert_eq!(a, b);
        assert_eq!(
            a.predict_row(&[33.0, 5.0]).unwrap(),
            b.predict_row(&[33.0, 5.0]).unwrap()
        );
    }

    #[test]
    fn test_predictions_within_target_range() {
        let (rows, targets) = noisy_line(120);
        let forest = RandomForestRegressor::fit(&rows, &targets, ForestParams::default()).unwrap();
        let min = targets.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = targets.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        for p in forest.predict(&rows).unwrap() {
            assert!(p >= min && p <= max);
        }
        assert_eq!(forest.n_trees(), 50);
    }

    #[test]
    fn test_fitted_forest_validates() {
        let (rows, targets) = noisy_line(60);
        let params = ForestParams {
            n_trees: 4,
            ..ForestParams::default()
        };
        let mut forest = RandomForestRegressor::fit(&rows, &targets, params).unwrap();
        assert!(forest.validate().is_ok());

        forest.trees.clear();
        assert_eq!(forest.validate(), Err(MathError::NotFitted));
    }

    #[test]
    fn test_invalid_inputs() {
        let params = ForestParams::default();
        assert!(RandomForestRegressor::fit(&[], &[], params).is_err());
        assert!(RandomForestRegressor::fit(&[vec![1.0]], &[f64::NAN], params).is_err());
        let zero = ForestParams {
            n_trees: 0,
            ..params
        };
        assert!(RandomForestRegressor::fit(&[vec![1.0]], &[1.0], zero).is_err());
    }
}
