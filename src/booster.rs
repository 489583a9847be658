//! Gradient-boosted regression trees for the revenue model
//!
//! Squared-error boosting with XGBoost-style leaf weights: each tree is fit
//! to the current residuals, leaves hold `sum(residual) / (count + lambda)`,
//! and a split is taken only when it improves that regularised objective.

use anyhow::anyhow;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Minimum objective gain for a split to be kept
const MIN_SPLIT_GAIN: f64 = 1e-9;

/// Boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum rows on each side of a split
    pub min_samples_leaf: usize,
    /// Row subsample ratio per tree
    pub subsample: f64,
    /// L2 regularisation on leaf weights
    pub reg_lambda: f64,
    pub seed: u64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 1.0,
            reg_lambda: 1.0,
            seed: 42,
        }
    }
}

impl BoostingConfig {
    fn validate(&self) -> crate::Result<()> {
        if self.n_estimators == 0 {
            anyhow::bail!("n_estimators must be at least 1");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            anyhow::bail!("learning_rate must be in (0, 1], got {}", self.learning_rate);
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            anyhow::bail!("subsample must be in (0, 1], got {}", self.subsample);
        }
        if self.reg_lambda < 0.0 {
            anyhow::bail!("reg_lambda must be non-negative");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Single regression tree over residuals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegressionTree {
    root: TreeNode,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    fn fit(x: &Array2<f64>, residuals: &Array1<f64>, rows: &[usize], config: &BoostingConfig) -> Self {
        Self {
            root: Self::grow(x, residuals, rows, 0, config),
        }
    }

    fn grow(
        x: &Array2<f64>,
        residuals: &Array1<f64>,
        rows: &[usize],
        depth: usize,
        config: &BoostingConfig,
    ) -> TreeNode {
        let sum: f64 = rows.iter().map(|&i| residuals[i]).sum();
        let leaf = TreeNode::Leaf {
            value: sum / (rows.len() as f64 + config.reg_lambda),
        };

        if depth >= config.max_depth || rows.len() < 2 * config.min_samples_leaf.max(1) {
            return leaf;
        }

        let Some(best) = Self::best_split(x, residuals, rows, sum, config) else {
            return leaf;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&i| x[[i, best.feature]] <= best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(Self::grow(x, residuals, &left_rows, depth + 1, config)),
            right: Box::new(Self::grow(x, residuals, &right_rows, depth + 1, config)),
        }
    }

    /// Exhaustive search over every feature and every distinct cut point
    fn best_split(
        x: &Array2<f64>,
        residuals: &Array1<f64>,
        rows: &[usize],
        total: f64,
        config: &BoostingConfig,
    ) -> Option<SplitCandidate> {
        let lambda = config.reg_lambda;
        let n = rows.len();
        let min_leaf = config.min_samples_leaf.max(1);
        let parent_score = total * total / (n as f64 + lambda);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..x.ncols() {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += residuals[sorted[k]];
                let left_n = k + 1;
                let right_n = n - left_n;

                let here = x[[sorted[k], feature]];
                let next = x[[sorted[k + 1], feature]];
                if here == next || left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / (left_n as f64 + lambda)
                    + right_sum * right_sum / (right_n as f64 + lambda)
                    - parent_score;

                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: BoostingConfig,
    n_features: usize,
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostingRegressor {
    /// Fit the booster on `x` (n_samples, n_features) against `y`
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, config: BoostingConfig) -> crate::Result<Self> {
        config.validate()?;

        let n_samples = x.nrows();
        if n_samples == 0 {
            anyhow::bail!("Cannot fit regressor on zero rows");
        }
        if n_samples != y.len() {
            anyhow::bail!(
                "Feature rows ({}) and targets ({}) differ in length",
                n_samples,
                y.len()
            );
        }

        let base_score = y.mean().ok_or_else(|| anyhow!("Empty target"))?;
        let mut predictions = Array1::from_elem(n_samples, base_score);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        let mut trees = Vec::with_capacity(config.n_estimators);

        for _ in 0..config.n_estimators {
            let residuals = y - &predictions;
            let rows = subsample_rows(n_samples, config.subsample, &mut rng);

            let tree = RegressionTree::fit(x, &residuals, &rows, &config);
            for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                predictions[i] += config.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            config,
            n_features: x.ncols(),
            base_score,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Predict one value per row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> crate::Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            anyhow::bail!(
                "Regressor expects {} features, got {}",
                self.n_features,
                x.ncols()
            );
        }

        Ok(x
            .axis_iter(Axis(0))
            .map(|row| {
                self.base_score
                    + self
                        .trees
                        .iter()
                        .map(|tree| self.config.learning_rate * tree.predict_row(row))
                        .sum::<f64>()
            })
            .collect())
    }

    /// Coefficient of determination on (`x`, `y`)
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> crate::Result<f64> {
        let predictions = self.predict(x)?;
        Ok(r2_score(y, &predictions))
    }
}

fn subsample_rows(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if ratio < 1.0 {
        let sample_size = ((n as f64) * ratio).ceil().max(1.0) as usize;
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
    }
    indices
}

/// R² of `predicted` against `actual`
pub fn r2_score(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    let mean = actual.mean().unwrap_or(0.0);
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect())
            .unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| row[0] * 2.0 + row[1] * 0.5 + 1.0)
            .collect();
        (x, y)
    }

    #[test]
    fn test_booster_beats_mean() {
        let (x, y) = create_regression_data();
        let config = BoostingConfig {
            n_estimators: 20,
            max_depth: 3,
            ..Default::default()
        };

        let model = GradientBoostingRegressor::fit(&x, &y, config).unwrap();
        assert_eq!(model.n_trees(), 20);

        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions.len(), 100);

        let mse: f64 = y
            .iter()
            .zip(predictions.iter())
            .map(|(yi, pi)| (yi - pi).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        let y_var = y.var(0.0);
        assert!(mse < y_var, "MSE ({}) should be less than variance ({})", mse, y_var);
        assert!(model.score(&x, &y).unwrap() > 0.9);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = create_regression_data();
        let config = BoostingConfig {
            n_estimators: 5,
            subsample: 0.7,
            ..Default::default()
        };

        let first = GradientBoostingRegressor::fit(&x, &y, config.clone()).unwrap();
        let second = GradientBoostingRegressor::fit(&x, &y, config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_constant_target() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = Array1::from_elem(4, 7.0);
        let model = GradientBoostingRegressor::fit(&x, &y, BoostingConfig::default()).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert!(predictions.iter().all(|p| (p - 7.0).abs() < 1e-9));
    }

    #[test]
    fn test_rejects_bad_input() {
        let x = Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap();
        let y = Array1::from_vec(vec![1.0]);
        assert!(GradientBoostingRegressor::fit(&x, &y, BoostingConfig::default()).is_err());

        let config = BoostingConfig {
            learning_rate: 0.0,
            ..Default::default()
        };
        let y = Array1::from_vec(vec![1.0, 2.0]);
        assert!(GradientBoostingRegressor::fit(&x, &y, config).is_err());

        let model = GradientBoostingRegressor::fit(&x, &y, BoostingConfig::default()).unwrap();
        let wide = Array2::zeros((1, 3));
        assert!(model.predict(&wide).is_err());
    }

    #[test]
    fn test_r2_score() {
        let actual = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(r2_score(&actual, &actual), 1.0);

        let mean_only = Array1::from_elem(3, 2.0);
        assert!(r2_score(&actual, &mean_only).abs() < 1e-12);
    }
}
