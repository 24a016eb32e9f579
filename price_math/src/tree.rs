//! CART regression tree with a squared-error split criterion

use crate::{check_width, MathError, Result};
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; the root is depth 0
    pub max_depth: usize,
    /// Minimum number of samples a node needs before it may split
    pub min_samples_split: usize,
    /// Minimum number of samples on each side of a split
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree stored as a flat node arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    n_features: usize,
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

struct Builder<'a> {
    rows: &'a [Vec<f64>],
    targets: &'a [f64],
    params: TreeParams,
    n_features: usize,
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit a tree on every row
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], params: TreeParams) -> Result<Self> {
        let mut indices: Vec<usize> = (0..rows.len()).collect();
        Self::fit_indices(rows, targets, &mut indices, params)
    }

    /// Fit a tree on the rows selected by `indices` (repeats allowed, as in a
    /// bootstrap sample)
    pub fn fit_indices(
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &mut [usize],
        params: TreeParams,
    ) -> Result<Self> {
        if rows.is_empty() || indices.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit a tree without samples".to_string(),
            ));
        }
        if rows.len() != targets.len() {
            return Err(MathError::InvalidInput(format!(
                "Rows ({}) and targets ({}) differ in length",
                rows.len(),
                targets.len()
            )));
        }
        let n_features = rows[0].len();
        check_width(rows, n_features)?;

        let mut builder = Builder {
            rows,
            targets,
            params,
            n_features,
            nodes: Vec::new(),
        };
        builder.grow(indices, 0);

        Ok(Self {
            n_features,
            nodes: builder.nodes,
        })
    }

    /// Check the node arena of a tree that did not come from `fit`.
    ///
    /// Children must sit after their parent and inside the arena, and split
    /// features must be in range. Every fitted tree satisfies this, so a
    /// tree that passes cannot cycle during prediction.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(MathError::NotFitted);
        }
        for (slot, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= self.n_features {
                    return Err(MathError::InvalidInput(format!(
                        "Node {} splits on feature {} of {}",
                        slot, feature, self.n_features
                    )));
                }
                for child in [*left, *right] {
                    if child <= slot || child >= self.nodes.len() {
                        return Err(MathError::InvalidInput(format!(
                            "Node {} has out-of-order child {}",
                            slot, child
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Predict the target for one row
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(MathError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }

        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return Ok(*value),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let next = if row.get(*feature).map_or(false, |v| v <= threshold) {
                        *left
                    } else {
                        *right
                    };
                    if next <= idx {
                        return Err(MathError::InvalidInput(format!(
                            "Node {} has out-of-order child {}",
                            idx, next
                        )));
                    }
                    idx = next;
                }
                None => return Err(MathError::NotFitted),
            }
        }
    }

    /// Number of input columns
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of nodes, leaves included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf
    pub fn depth(&self) -> usize {
        // children always follow their parent, so one reverse pass suffices
        let mut depths = vec![0usize; self.nodes.len()];
        for (slot, node) in self.nodes.iter().enumerate().rev() {
            if let Node::Split { left, right, .. } = node {
                let child = |i: usize| if i > slot { depths.get(i).copied().unwrap_or(0) } else { 0 };
                let depth = 1 + child(*left).max(child(*right));
                depths[slot] = depth;
            }
        }
        depths.first().copied().unwrap_or(0)
    }
}

impl Builder<'_> {
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let slot = self.nodes.len();
        let value = self.mean(indices);
        self.nodes.push(Node::Leaf { value });

        if depth >= self.params.max_depth
            || indices.len() < self.params.min_samples_split.max(2)
        {
            return slot;
        }

        let Some(split) = self.best_split(indices) else {
            return slot;
        };

        // partition in place: left side first
        let mut boundary = 0;
        for i in 0..indices.len() {
            if self.rows[indices[i]][split.feature] <= split.threshold {
                indices.swap(i, boundary);
                boundary += 1;
            }
        }
        if boundary == 0 || boundary == indices.len() {
            return slot;
        }

        let (left_idx, right_idx) = indices.split_at_mut(boundary);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        slot
    }

    fn mean(&self, indices: &[usize]) -> f64 {
        indices.iter().map(|&i| self.targets[i]).sum::<f64>() / indices.len() as f64
    }

    fn best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let total: f64 = indices.iter().map(|&i| self.targets[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.targets[i].powi(2)).sum();
        let parent_sse = total_sq - total * total / n as f64;
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<usize> = indices.to_vec();

        for feature in 0..self.n_features {
            order.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..n - 1 {
                let y = self.targets[order[pos]];
                left_sum += y;
                left_sq += y * y;

                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let here = self.rows[order[pos]][feature];
                let next = self.rows[order[pos + 1]][feature];
                if here >= next {
                    continue;
                }

                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n as f64)
                    + (right_sq - right_sum * right_sum / right_n as f64);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        sse,
                    });
                }
            }
        }

        best.filter(|b| b.sse < parent_sse - 1e-12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 1.0]).collect();
        let targets = (0..20).map(|i| if i < 10 { 5.0 } else { 15.0 }).collect();
        (rows, targets)
    }

    #[test]
    fn test_learns_step_function() {
        let (rows, targets) = step_data();
        let tree = RegressionTree::fit(&rows, &targets, TreeParams::default()).unwrap();

        assert_relative_eq!(tree.predict_row(&[2.0, 1.0]).unwrap(), 5.0);
        assert_relative_eq!(tree.predict_row(&[17.0, 1.0]).unwrap(), 15.0);
        // a single split separates the two plateaus
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_depth_limit() {
        let rows: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let params = TreeParams {
            max_depth: 3,
            ..TreeParams::default()
        };
        let tree = RegressionTree::fit(&rows, &targets, params).unwrap();
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets = vec![7.0; 10];
        let tree = RegressionTree::fit(&rows, &targets, TreeParams::default()).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_relative_eq!(tree.predict_row(&[100.0]).unwrap(), 7.0);
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let (rows, targets) = step_data();
        let mut tree = RegressionTree::fit(&rows, &targets, TreeParams::default()).unwrap();
        assert!(tree.validate().is_ok());

        if let Node::Split { left, .. } = &mut tree.nodes[0] {
            *left = 0;
        }
        assert!(matches!(tree.validate(), Err(MathError::InvalidInput(_))));
        // prediction stops instead of looping
        assert!(tree.predict_row(&[2.0, 1.0]).is_err());
        assert!(tree.depth() <= tree.node_count());
    }

    #[test]
    fn test_rejects_wrong_width() {
        let (rows, targets) = step_data();
        let tree = RegressionTree::fit(&rows, &targets, TreeParams::default()).unwrap();
        assert!(matches!(
            tree.predict_row(&[1.0]),
            Err(MathError::DimensionMismatch { .. })
        ));
    }
}
