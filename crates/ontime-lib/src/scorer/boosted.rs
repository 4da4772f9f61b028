//! Gradient-boosted decision trees for binary classification
//!
//! Logistic loss, second-order leaf weights and histogram split finding over
//! quantile bins. Positive rows are up-weighted by `scale_pos_weight` to
//! compensate for class imbalance.

use super::{sigmoid, Scorer};
use crate::error::ScorerError;
use crate::features::{FeatureVector, FEATURE_COUNT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Minimum gain for a split to be kept
const MIN_SPLIT_GAIN: f64 = 1e-9;

/// Boosting hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows sampled per tree
    pub subsample: f64,
    /// Fraction of features sampled per tree
    pub colsample_bytree: f64,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// Minimum hessian sum in a child
    pub min_child_weight: f64,
    pub max_bins: usize,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 8,
            learning_rate: 0.01,
            subsample: 0.7,
            colsample_bytree: 0.8,
            lambda: 1.0,
            min_child_weight: 1.0,
            max_bins: 256,
            seed: 42,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> Result<(), ScorerError> {
        let invalid = |msg: &str| Err(ScorerError::InvalidParameters(msg.to_string()));

        if self.n_estimators == 0 {
            return invalid("n_estimators must be at least 1");
        }
        if self.max_depth == 0 {
            return invalid("max_depth must be at least 1");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return invalid("learning_rate must be positive");
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return invalid("subsample must be in (0, 1]");
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return invalid("colsample_bytree must be in (0, 1]");
        }
        if self.lambda < 0.0 || self.min_child_weight < 0.0 {
            return invalid("lambda and min_child_weight must be non-negative");
        }
        if !(2..=u16::MAX as usize).contains(&self.max_bins) {
            return invalid("max_bins must be between 2 and 65535");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `value <= threshold` go left
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A regression tree over raw (margin) space; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict(&self, features: &[f32]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every child index points forward and in bounds
    fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(idx, node)| match node {
                TreeNode::Leaf { value } => value.is_finite(),
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    *feature < FEATURE_COUNT
                        && *left > idx
                        && *right > idx
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
            })
    }
}

/// Fitted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    params: BoostingParams,
    scale_pos_weight: f64,
    /// Starting margin shared by all rows
    base_margin: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// A model that ignores its input and scores every row at `probability`
    pub fn constant(probability: f64) -> Self {
        let p = probability.clamp(1e-12, 1.0 - 1e-12);
        Self {
            params: BoostingParams::default(),
            scale_pos_weight: 1.0,
            base_margin: (p / (1.0 - p)).ln(),
            trees: Vec::new(),
        }
    }

    /// Fit on assembled feature rows and binary targets
    pub fn fit(
        rows: &[FeatureVector],
        targets: &[bool],
        params: &BoostingParams,
        scale_pos_weight: f64,
    ) -> Result<Self, ScorerError> {
        params.validate()?;
        if rows.len() != targets.len() {
            return Err(ScorerError::InvalidParameters(format!(
                "{} rows but {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if rows.is_empty() {
            return Err(ScorerError::InvalidParameters(
                "cannot fit on an empty dataset".to_string(),
            ));
        }
        if !(scale_pos_weight > 0.0 && scale_pos_weight.is_finite()) {
            return Err(ScorerError::InvalidParameters(format!(
                "scale_pos_weight must be positive, got {scale_pos_weight}"
            )));
        }

        let binned = BinnedMatrix::new(rows, params.max_bins);
        let weights: Vec<f64> = targets
            .iter()
            .map(|&late| if late { scale_pos_weight } else { 1.0 })
            .collect();
        let labels: Vec<f64> = targets.iter().map(|&late| if late { 1.0 } else { 0.0 }).collect();

        let base_margin = 0.0;
        let mut margins = vec![base_margin; rows.len()];
        let mut grad = vec![0.0; rows.len()];
        let mut hess = vec![0.0; rows.len()];
        let mut rng = StdRng::seed_from_u64(params.seed);
        let n_cols = ((params.colsample_bytree * FEATURE_COUNT as f64).round() as usize)
            .clamp(1, FEATURE_COUNT);

        let mut trees = Vec::with_capacity(params.n_estimators);
        for round in 0..params.n_estimators {
            for i in 0..rows.len() {
                let p = sigmoid(margins[i]);
                grad[i] = (p - labels[i]) * weights[i];
                hess[i] = (p * (1.0 - p)).max(1e-16) * weights[i];
            }

            let sampled_rows: Vec<usize> = if params.subsample < 1.0 {
                (0..rows.len())
                    .filter(|_| rng.random_bool(params.subsample))
                    .collect()
            } else {
                (0..rows.len()).collect()
            };
            if sampled_rows.is_empty() {
                continue;
            }

            let mut columns = rand::seq::index::sample(&mut rng, FEATURE_COUNT, n_cols).into_vec();
            columns.sort_unstable();

            let builder = TreeBuilder {
                binned: &binned,
                grad: &grad,
                hess: &hess,
                columns: &columns,
                params,
            };
            let tree = builder.build(sampled_rows);

            for (i, row) in rows.iter().enumerate() {
                margins[i] += tree.predict(row.as_slice());
            }
            debug!(round = round, nodes = tree.node_count(), "Boosting round complete");
            trees.push(tree);
        }

        info!(
            trees = trees.len(),
            rows = rows.len(),
            scale_pos_weight = scale_pos_weight,
            "Gradient boosted model fitted"
        );

        Ok(Self {
            params: params.clone(),
            scale_pos_weight,
            base_margin,
            trees,
        })
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn scale_pos_weight(&self) -> f64 {
        self.scale_pos_weight
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn margin(&self, features: &[f32]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    /// Structural checks for a deserialized model
    pub fn validate(&self) -> Result<(), ScorerError> {
        if !self.base_margin.is_finite() {
            return Err(ScorerError::InvalidParameters(
                "base margin is not finite".to_string(),
            ));
        }
        if let Some(idx) = self.trees.iter().position(|t| !t.is_well_formed()) {
            return Err(ScorerError::InvalidParameters(format!(
                "tree {idx} is malformed"
            )));
        }
        Ok(())
    }
}

impl Scorer for GradientBoostedTrees {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ScorerError> {
        Ok(sigmoid(self.margin(features.as_slice())))
    }

    fn kind(&self) -> &'static str {
        "boosted"
    }
}

/// Feature values quantized to per-column bins
struct BinnedMatrix {
    /// Upper bound of each bin, per feature
    cuts: Vec<Vec<f32>>,
    /// Row-major bin indices
    bins: Vec<u16>,
}

impl BinnedMatrix {
    fn new(rows: &[FeatureVector], max_bins: usize) -> Self {
        let cuts: Vec<Vec<f32>> = (0..FEATURE_COUNT)
            .map(|col| {
                let mut values: Vec<f32> = rows.iter().map(|r| r.as_slice()[col]).collect();
                values.sort_by(|a, b| a.total_cmp(b));
                values.dedup();
                quantile_cuts(&values, max_bins)
            })
            .collect();

        let mut bins = Vec::with_capacity(rows.len() * FEATURE_COUNT);
        for row in rows {
            for (col, value) in row.as_slice().iter().enumerate() {
                let col_cuts = &cuts[col];
                let bin = col_cuts.partition_point(|c| c < value).min(col_cuts.len() - 1);
                bins.push(bin as u16);
            }
        }
        Self { cuts, bins }
    }

    fn bin(&self, row: usize, col: usize) -> usize {
        self.bins[row * FEATURE_COUNT + col] as usize
    }
}

/// Bin upper bounds from sorted distinct values; the last cut is the maximum
fn quantile_cuts(distinct: &[f32], max_bins: usize) -> Vec<f32> {
    if distinct.len() <= max_bins {
        return distinct.to_vec();
    }
    let mut cuts: Vec<f32> = (1..=max_bins)
        .map(|b| {
            let idx = (b * distinct.len()).div_ceil(max_bins) - 1;
            distinct[idx.min(distinct.len() - 1)]
        })
        .collect();
    cuts.dedup();
    cuts
}

struct TreeBuilder<'a> {
    binned: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    columns: &'a [usize],
    params: &'a BoostingParams,
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn build(&self, rows: Vec<usize>) -> RegressionTree {
        let mut nodes = Vec::new();
        self.grow(rows, 0, &mut nodes);
        RegressionTree { nodes }
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.lambda) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn grow(&self, rows: Vec<usize>, depth: usize, nodes: &mut Vec<TreeNode>) -> usize {
        let idx = nodes.len();
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.hess[r]).sum();
        nodes.push(TreeNode::Leaf {
            value: self.leaf_value(g, h),
        });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return idx;
        }
        let Some(split) = self.best_split(&rows, g, h) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.binned.bin(r, split.feature) <= split.bin);

        let threshold = self.binned.cuts[split.feature][split.bin];
        let left = self.grow(left_rows, depth + 1, nodes);
        let right = self.grow(right_rows, depth + 1, nodes);
        nodes[idx] = TreeNode::Split {
            feature: split.feature,
            threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let parent = self.score(g, h);
        let mut best: Option<SplitCandidate> = None;

        for &feature in self.columns {
            let n_bins = self.binned.cuts[feature].len();
            if n_bins < 2 {
                continue;
            }
            let mut hist = vec![(0.0_f64, 0.0_f64); n_bins];
            for &r in rows {
                let slot = &mut hist[self.binned.bin(r, feature)];
                slot.0 += self.grad[r];
                slot.1 += self.hess[r];
            }

            let (mut gl, mut hl) = (0.0, 0.0);
            for (bin, (bg, bh)) in hist.iter().enumerate().take(n_bins - 1) {
                gl += bg;
                hl += bh;
                let (gr, hr) = (g - gl, h - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = self.score(gl, hl) + self.score(gr, hr) - parent;
                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Late exactly when the hour column is in the evening bank
    fn separable(n: usize) -> (Vec<FeatureVector>, Vec<bool>) {
        let mut rows = Vec::with_capacity(n);
        let mut targets = Vec::with_capacity(n);
        for i in 0..n {
            let hour = (i % 24) as f32;
            let mut values = [0.0_f32; FEATURE_COUNT];
            values[0] = (i % 5) as f32;
            values[3] = hour;
            values[4] = (i % 7) as f32;
            rows.push(FeatureVector::from_array(values));
            targets.push(hour >= 17.0);
        }
        (rows, targets)
    }

    fn fast_params() -> BoostingParams {
        BoostingParams {
            n_estimators: 20,
            max_depth: 3,
            learning_rate: 0.3,
            subsample: 1.0,
            colsample_bytree: 1.0,
            ..BoostingParams::default()
        }
    }

    #[test]
    fn test_learns_separable_data() {
        let (rows, targets) = separable(480);
        let model = GradientBoostedTrees::fit(&rows, &targets, &fast_params(), 1.0).unwrap();
        assert_eq!(model.tree_count(), 20);

        for (row, late) in rows.iter().zip(&targets) {
            let p = model.predict_proba(row).unwrap();
            assert!((0.0..=1.0).contains(&p));
            if *late {
                assert!(p > 0.5, "late row scored {p}");
            } else {
                assert!(p < 0.5, "on-time row scored {p}");
            }
        }
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let (rows, targets) = separable(240);
        let params = BoostingParams {
            n_estimators: 5,
            max_depth: 3,
            ..BoostingParams::default()
        };
        let a = GradientBoostedTrees::fit(&rows, &targets, &params, 2.0).unwrap();
        let b = GradientBoostedTrees::fit(&rows, &targets, &params, 2.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_positive_weight_raises_scores() {
        let (rows, targets) = separable(240);
        let params = BoostingParams {
            n_estimators: 5,
            max_depth: 1,
            learning_rate: 0.1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            ..BoostingParams::default()
        };
        let plain = GradientBoostedTrees::fit(&rows, &targets, &params, 1.0).unwrap();
        let weighted = GradientBoostedTrees::fit(&rows, &targets, &params, 5.0).unwrap();

        let avg = |m: &GradientBoostedTrees| {
            rows.iter().map(|r| m.predict_proba(r).unwrap()).sum::<f64>() / rows.len() as f64
        };
        assert!(avg(&weighted) > avg(&plain));
    }

    #[test]
    fn test_constant_model() {
        let model = GradientBoostedTrees::constant(0.7);
        let p = model
            .predict_proba(&FeatureVector::from_array([3.0; FEATURE_COUNT]))
            .unwrap();
        assert!((p - 0.7).abs() < 1e-9);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_input() {
        let (rows, targets) = separable(10);
        assert!(GradientBoostedTrees::fit(&rows, &targets[..5], &fast_params(), 1.0).is_err());
        assert!(GradientBoostedTrees::fit(&[], &[], &fast_params(), 1.0).is_err());
        assert!(GradientBoostedTrees::fit(&rows, &targets, &fast_params(), 0.0).is_err());

        let bad = BoostingParams {
            subsample: 0.0,
            ..BoostingParams::default()
        };
        assert!(GradientBoostedTrees::fit(&rows, &targets, &bad, 1.0).is_err());
    }

    #[test]
    fn test_quantile_cuts_bound_bins() {
        let distinct: Vec<f32> = (0..1000).map(|v| v as f32).collect();
        let cuts = quantile_cuts(&distinct, 16);
        assert!(cuts.len() <= 16);
        assert_eq!(*cuts.last().unwrap(), 999.0);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));

        let few = vec![1.0, 2.0, 3.0];
        assert_eq!(quantile_cuts(&few, 16), few);
    }

    #[test]
    fn test_malformed_tree_rejected() {
        let mut model = GradientBoostedTrees::constant(0.5);
        model.trees.push(RegressionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                left: 0,
                right: 5,
            }],
        });
        assert!(model.validate().is_err());
    }
}
