//! Bagged regression trees (random-forest regressor).
//!
//! Each tree is a CART regressor grown on a bootstrap resample of the
//! training rows, splitting on the feature/threshold pair with the largest
//! squared-error reduction. The forest prediction is the mean over trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::algo::scaler::validate_rows;
use crate::error::{DetectionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for RegressionParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 16,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
enum RegNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<RegNode>,
        right: Box<RegNode>,
    },
    Leaf {
        value: f64,
    },
}

impl RegNode {
    fn predict(&self, x: &[f64]) -> f64 {
        match self {
            RegNode::Leaf { value } => *value,
            RegNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[*feature] <= *threshold {
                    left.predict(x)
                } else {
                    right.predict(x)
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    max_depth: usize,
    min_samples_split: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: &mut [usize], depth: usize) -> RegNode {
        let n = indices.len() as f64;
        let mean = indices.iter().map(|&i| self.y[i]).sum::<f64>() / n;

        if depth >= self.max_depth || indices.len() < self.min_samples_split {
            return RegNode::Leaf { value: mean };
        }

        let Some((feature, threshold)) = self.best_split(indices) else {
            return RegNode::Leaf { value: mean };
        };

        // In-place partition: left side first
        let mut boundary = 0;
        for k in 0..indices.len() {
            if self.x[indices[k]][feature] <= threshold {
                indices.swap(k, boundary);
                boundary += 1;
            }
        }
        if boundary == 0 || boundary == indices.len() {
            return RegNode::Leaf { value: mean };
        }

        let (left, right) = indices.split_at_mut(boundary);
        RegNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    /// Feature/threshold with the lowest summed squared error, if any split
    /// improves on the parent.
    fn best_split(&self, indices: &[usize]) -> Option<(usize, f64)> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order: Vec<usize> = indices.to_vec();

        for feature in 0..self.x[indices[0]].len() {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..n - 1 {
                let yi = self.y[order[k]];
                left_sum += yi;
                left_sq += yi * yi;

                let here = self.x[order[k]][feature];
                let next = self.x[order[k + 1]][feature];
                if next <= here {
                    continue;
                }

                let nl = (k + 1) as f64;
                let nr = (n - k - 1) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / nl) + (right_sq - right_sum * right_sum / nr);

                if best.is_none_or(|(_, _, b)| sse < b) {
                    best = Some((feature, (here + next) / 2.0, sse));
                }
            }
        }

        match best {
            Some((feature, threshold, sse)) if sse < parent_sse - 1e-12 => Some((feature, threshold)),
            _ => None,
        }
    }
}

/// Bagged ensemble of regression trees.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RegressionForest {
    trees: Vec<RegNode>,
    n_features: usize,
}

impl RegressionForest {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &RegressionParams) -> Result<Self> {
        let n_features = validate_rows(x)?;
        if x.len() != y.len() {
            return Err(DetectionError::Retrain(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::Retrain("targets contain a non-finite value".into()));
        }

        let builder = TreeBuilder {
            x,
            y,
            max_depth: params.max_depth.max(1),
            min_samples_split: params.min_samples_split.max(2),
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = x.len();
        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let mut bootstrap: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                builder.build(&mut bootstrap, 0)
            })
            .collect();

        Ok(Self { trees, n_features })
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features {
            return Err(DetectionError::invalid(
                "features",
                format!("expected {} features, got {}", self.n_features, features.len()),
            ));
        }
        let total: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        Ok(total / self.trees.len() as f64)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let y: Vec<f64> = x.iter().map(|r| if r[0] < 30.0 { 2.0 } else { 20.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_learns_step_function() {
        let (x, y) = step_data();
        let forest = RegressionForest::fit(&x, &y, &RegressionParams::default()).unwrap();

        let low = forest.predict(&[5.0, 1.0]).unwrap();
        let high = forest.predict(&[55.0, 1.0]).unwrap();
        assert!(low < 5.0, "low side predicted {low}");
        assert!(high > 17.0, "high side predicted {high}");
    }

    #[test]
    fn test_constant_target_predicts_constant() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y = vec![7.5; 20];
        let forest = RegressionForest::fit(&x, &y, &RegressionParams::default()).unwrap();
        assert!((forest.predict(&[3.0]).unwrap() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_within_target_range() {
        let (x, y) = step_data();
        let forest = RegressionForest::fit(&x, &y, &RegressionParams::default()).unwrap();
        for x in [-100.0, 0.0, 29.5, 1000.0] {
            let p = forest.predict(&[x, 3.0]).unwrap();
            assert!((2.0..=20.0).contains(&p), "{p} out of target range");
        }
    }

    #[test]
    fn test_rejects_mismatched_targets() {
        let (x, _) = step_data();
        assert!(RegressionForest::fit(&x, &[1.0, 2.0], &RegressionParams::default()).is_err());
    }

    #[test]
    fn test_predict_dimension_check() {
        let (x, y) = step_data();
        let forest = RegressionForest::fit(&x, &y, &RegressionParams::default()).unwrap();
        assert!(forest.predict(&[1.0]).is_err());
    }
}
