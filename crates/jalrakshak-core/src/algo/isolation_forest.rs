//! Isolation Forest for Multivariate Outlier Scoring
//!
//! Each tree isolates points by recursive random axis-aligned cuts over a
//! subsample of the training data. Outliers sit in sparse regions and are cut
//! off after few splits, so a short average path length across the forest
//! means "anomalous".
//!
//! Key properties:
//! - Trees are fitted once from a fixed seed, so scoring is deterministic
//! - Scores are normalized by the expected path length of the subsample size
//! - The decision threshold is the training-score quantile implied by the
//!   configured contamination fraction
//! - Each tree keeps the bounding box of its subsample; a point outside it is
//!   separated by the first cut and scores as isolated at the root, so
//!   readings past the training range are not mistaken for boundary points
//!
//! Reference: "Isolation Forest" (Liu, Ting, Zhou, ICDM 2008)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::algo::scaler::validate_rows;
use crate::error::{DetectionError, Result};
use crate::stats;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Forest shape and decision parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Upper bound on the per-tree subsample size
    pub max_samples: usize,
    /// Expected outlier fraction in the training data, (0, 0.5]
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

/// A node in an isolation tree
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
enum IsoNode {
    /// Internal node with the cut dimension and value
    Internal {
        split_dim: usize,
        split_value: f64,
        left: Box<IsoNode>,
        right: Box<IsoNode>,
    },
    /// External node; `size` training points ended here
    Leaf { size: usize },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct IsoTree {
    root: IsoNode,
    /// Per-dimension minimum of the subsample
    lower: Vec<f64>,
    /// Per-dimension maximum of the subsample
    upper: Vec<f64>,
}

impl IsoTree {
    fn fit(rows: &[Vec<f64>], indices: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let dims = rows[indices[0]].len();
        let mut lower = vec![f64::INFINITY; dims];
        let mut upper = vec![f64::NEG_INFINITY; dims];
        for &i in &indices {
            for (d, &v) in rows[i].iter().enumerate() {
                lower[d] = lower[d].min(v);
                upper[d] = upper[d].max(v);
            }
        }
        Self {
            root: build_recursive(rows, indices, 0, max_depth, rng),
            lower,
            upper,
        }
    }

    fn contains(&self, point: &[f64]) -> bool {
        point
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(v, (lo, hi))| lo <= v && v <= hi)
    }

    fn path_length(&self, point: &[f64]) -> f64 {
        if !self.contains(point) {
            return 1.0;
        }
        path_length_recursive(&self.root, point, 0.0)
    }
}

/// Recursive tree construction
fn build_recursive(
    rows: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> IsoNode {
    if depth >= max_depth || indices.len() <= 1 {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    // Only dimensions with spread can be cut
    let dims = rows[indices[0]].len();
    let mut candidates: Vec<(usize, f64, f64)> = Vec::with_capacity(dims);
    for d in 0..dims {
        let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            (lo.min(rows[i][d]), hi.max(rows[i][d]))
        });
        if hi > lo {
            candidates.push((d, lo, hi));
        }
    }

    if candidates.is_empty() {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    let (split_dim, lo, hi) = candidates[rng.random_range(0..candidates.len())];
    let split_value = rng.random_range(lo..hi);

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| rows[i][split_dim] < split_value);

    if left.is_empty() || right.is_empty() {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    IsoNode::Internal {
        split_dim,
        split_value,
        left: Box::new(build_recursive(rows, left, depth + 1, max_depth, rng)),
        right: Box::new(build_recursive(rows, right, depth + 1, max_depth, rng)),
    }
}

/// Recursive path length; unresolved leaves add the expected remaining depth
fn path_length_recursive(node: &IsoNode, point: &[f64], depth: f64) -> f64 {
    match node {
        IsoNode::Leaf { size } => depth + average_path_length(*size),
        IsoNode::Internal {
            split_dim,
            split_value,
            left,
            right,
        } => {
            if point[*split_dim] < *split_value {
                path_length_recursive(left, point, depth + 1.0)
            } else {
                path_length_recursive(right, point, depth + 1.0)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// True when at least one column takes more than one value.
fn has_spread(rows: &[Vec<f64>]) -> bool {
    let first = &rows[0];
    rows[1..]
        .iter()
        .any(|row| row.iter().zip(first).any(|(a, b)| a != b))
}

/// Fitted isolation forest with its decision threshold
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IsolationForest {
    trees: Vec<IsoTree>,
    /// Subsample size actually used per tree
    sample_size: usize,
    dimensions: usize,
    contamination: f64,
    /// Scores strictly above this are outliers
    threshold: f64,
}

impl IsolationForest {
    /// Fit on (already normalized) rows.
    pub fn fit(rows: &[Vec<f64>], params: &ForestParams) -> Result<Self> {
        let dimensions = validate_rows(rows)?;
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            return Err(DetectionError::Retrain(format!(
                "contamination must be in (0, 0.5], got {}",
                params.contamination
            )));
        }

        let n_trees = params.n_trees.max(1);
        let sample_size = params.max_samples.max(1).min(rows.len());
        if sample_size < 2 {
            return Err(DetectionError::Retrain(format!(
                "need at least 2 rows per tree, got {sample_size}"
            )));
        }
        if !has_spread(rows) {
            return Err(DetectionError::Retrain(
                "every feature is constant across the training rows".to_string(),
            ));
        }
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..n_trees)
            .map(|_| {
                let indices = rand::seq::index::sample(&mut rng, rows.len(), sample_size).into_vec();
                IsoTree::fit(rows, indices, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            dimensions,
            contamination: params.contamination,
            threshold: 0.0,
        };

        let training_scores: Vec<f64> = rows.iter().map(|r| forest.raw_score(r)).collect();
        forest.threshold = stats::percentile(&training_scores, 100.0 * (1.0 - params.contamination));

        Ok(forest)
    }

    /// Anomaly score in (0, 1]; higher = more anomalous.
    pub fn score(&self, point: &[f64]) -> Result<f64> {
        if point.len() != self.dimensions {
            return Err(DetectionError::invalid(
                "features",
                format!("expected {} features, got {}", self.dimensions, point.len()),
            ));
        }
        Ok(self.raw_score(point))
    }

    /// Score plus the thresholded outlier decision.
    pub fn predict(&self, point: &[f64]) -> Result<(f64, bool)> {
        let score = self.score(point)?;
        Ok((score, score > self.threshold))
    }

    fn raw_score(&self, point: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(point)).sum();
        let mean_path = total / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        if norm <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / norm)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// (trees, subsample size)
    pub fn get_stats(&self) -> (usize, usize) {
        (self.trees.len(), self.sample_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10x10 grid in the unit square, z fixed near zero
    fn grid() -> Vec<Vec<f64>> {
        (0..100)
            .map(|i| vec![(i % 10) as f64 * 0.1, (i / 10) as f64 * 0.1, (i % 3) as f64 * 0.05])
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ~= 10.24
        assert!((average_path_length(256) - 10.24).abs() < 0.05);
    }

    #[test]
    fn test_outlier_scores_higher_than_inlier() {
        let forest = IsolationForest::fit(&grid(), &ForestParams::default()).unwrap();

        let inlier = forest.score(&[0.45, 0.45, 0.05]).unwrap();
        let outlier = forest.score(&[25.0, -30.0, 12.0]).unwrap();

        assert!(outlier > inlier, "outlier {outlier} <= inlier {inlier}");
        assert!(outlier > 0.0 && outlier <= 1.0);
        assert!(inlier > 0.0 && inlier <= 1.0);
    }

    #[test]
    fn test_far_outlier_crosses_threshold() {
        let forest = IsolationForest::fit(&grid(), &ForestParams::default()).unwrap();
        let (_, is_outlier) = forest.predict(&[40.0, 40.0, 40.0]).unwrap();
        assert!(is_outlier);

        let (_, center_flagged) = forest.predict(&[0.45, 0.45, 0.05]).unwrap();
        assert!(!center_flagged);
    }

    #[test]
    fn test_contamination_bounds_training_flags() {
        let rows = grid();
        let forest = IsolationForest::fit(&rows, &ForestParams::default()).unwrap();
        let flagged = rows
            .iter()
            .filter(|r| forest.predict(r).unwrap().1)
            .count();
        assert!(flagged <= 10, "flagged {flagged} of 100 at 10% contamination");
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let rows = grid();
        let a = IsolationForest::fit(&rows, &ForestParams::default()).unwrap();
        let b = IsolationForest::fit(&rows, &ForestParams::default()).unwrap();
        let point = [0.9, 0.1, 0.0];
        assert_eq!(a.score(&point).unwrap(), b.score(&point).unwrap());
        assert_eq!(a.threshold(), b.threshold());
    }

    #[test]
    fn test_subsample_capped_by_rows() {
        let forest = IsolationForest::fit(&grid(), &ForestParams::default()).unwrap();
        assert_eq!(forest.get_stats(), (100, 100));
    }

    #[test]
    fn test_point_past_training_range_is_isolated_at_root() {
        let forest = IsolationForest::fit(&grid(), &ForestParams::default()).unwrap();
        // Just outside the x range; a boundary point would score far lower
        let beyond = forest.score(&[0.95, 0.45, 0.05]).unwrap();
        let edge = forest.score(&[0.9, 0.45, 0.05]).unwrap();

        assert!((beyond - 2f64.powf(-1.0 / average_path_length(100))).abs() < 1e-12);
        assert!(beyond > edge);
        assert!(forest.predict(&[0.95, 0.45, 0.05]).unwrap().1);
    }

    #[test]
    fn test_rejects_degenerate_training_sets() {
        let single = vec![vec![1.0, 2.0, 3.0, 4.0]];
        let err = IsolationForest::fit(&single, &ForestParams::default()).unwrap_err();
        assert!(matches!(err, DetectionError::Retrain(_)));

        let constant = vec![vec![1.0, 2.0, 3.0]; 50];
        let err = IsolationForest::fit(&constant, &ForestParams::default()).unwrap_err();
        assert!(matches!(err, DetectionError::Retrain(_)));

        let one_per_tree = ForestParams {
            max_samples: 1,
            ..ForestParams::default()
        };
        assert!(IsolationForest::fit(&grid(), &one_per_tree).is_err());
    }

    #[test]
    fn test_rejects_bad_contamination_and_dims() {
        let params = ForestParams {
            contamination: 0.0,
            ..ForestParams::default()
        };
        assert!(IsolationForest::fit(&grid(), &params).is_err());

        let forest = IsolationForest::fit(&grid(), &ForestParams::default()).unwrap();
        assert!(forest.score(&[1.0, 2.0]).is_err());
    }
}
