//! Decision Tree implementation
//!
//! CART trees over dense matrices with per-sample weights. Classification
//! trees split on weighted gini and store the positive-class fraction in
//! their leaves; regression trees split on weighted squared error and store
//! the leaf mean. Boosting models fit regression trees and may overwrite
//! leaf values afterwards.

use super::{check_features, validate_training, Classifier, ModelError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const IMPURITY_EPSILON: f64 = 1e-12;

/// Number of features examined at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    /// Same as `Sqrt` for classifiers
    Auto,
    Sqrt,
    Log2,
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            Self::All => n_features,
            Self::Auto | Self::Sqrt => (n_features as f64).sqrt() as usize,
            Self::Log2 => (n_features as f64).log2() as usize,
            Self::Fixed(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeTask {
    Classification,
    Regression,
}

/// Decision tree configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree (None = grow until pure)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Random seed for feature sampling
    pub seed: u64,
    pub task: TreeTask,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            seed: 3,
            task: TreeTask::Classification,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// Weighted sums over a set of samples
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    count: usize,
    w: f64,
    wy: f64,
    wy2: f64,
}

impl Stats {
    fn add(&mut self, w: f64, y: f64) {
        self.count += 1;
        self.w += w;
        self.wy += w * y;
        self.wy2 += w * y * y;
    }

    fn minus(&self, other: &Stats) -> Stats {
        Stats {
            count: self.count - other.count,
            w: self.w - other.w,
            wy: self.wy - other.wy,
            wy2: self.wy2 - other.wy2,
        }
    }

    fn mean(&self) -> f64 {
        if self.w > 0.0 {
            self.wy / self.w
        } else {
            0.0
        }
    }

    /// Weighted impurity mass: `w * gini` or the sum of squared errors
    fn cost(&self, task: TreeTask) -> f64 {
        if self.w <= 0.0 {
            return 0.0;
        }
        match task {
            TreeTask::Classification => {
                let p = self.mean();
                self.w * 2.0 * p * (1.0 - p)
            }
            TreeTask::Regression => (self.wy2 - self.wy * self.wy / self.w).max(0.0),
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    cost: f64,
}

/// Training inputs shared by every recursion level
struct TrainingSet<'a> {
    x: &'a Array2<f64>,
    targets: &'a Array1<f64>,
    weights: &'a [f64],
}

/// Decision Tree model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    nodes: Vec<Node>,
    n_features: Option<usize>,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            n_features: None,
        }
    }

    pub fn regression(config: TreeConfig) -> Self {
        Self::new(TreeConfig {
            task: TreeTask::Regression,
            ..config
        })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.n_features.is_some()
    }

    /// Fit on arbitrary targets with per-sample weights. Samples with zero
    /// weight are ignored.
    pub(crate) fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        targets: &Array1<f64>,
        weights: &[f64],
    ) -> Result<(), ModelError> {
        if x.nrows() != targets.len() || x.nrows() != weights.len() {
            return Err(ModelError::DimensionMismatch {
                expected: x.nrows(),
                got: targets.len().min(weights.len()),
            });
        }
        let indices: Vec<usize> = (0..x.nrows()).filter(|&i| weights[i] > 0.0).collect();
        if indices.is_empty() {
            return Err(ModelError::InvalidData("no samples with positive weight".to_string()));
        }

        let data = TrainingSet { x, targets, weights };
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.nodes.clear();
        self.build(&data, indices, 0, &mut rng);
        self.n_features = Some(x.ncols());
        Ok(())
    }

    /// Grow the subtree for `indices`, returning its node index
    fn build(
        &mut self,
        data: &TrainingSet<'_>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let mut stats = Stats::default();
        for &i in &indices {
            stats.add(data.weights[i], data.targets[i]);
        }

        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: stats.mean() });

        let n = indices.len();
        let impurity = stats.cost(self.config.task) / stats.w.max(f64::MIN_POSITIVE);
        let depth_reached = self.config.max_depth.is_some_and(|d| depth >= d);
        if depth_reached
            || n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf
            || impurity <= IMPURITY_EPSILON
        {
            return node_id;
        }

        let Some(split) = self.best_split(data, &indices, &stats, rng) else {
            return node_id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| data.x[[i, split.feature]] <= split.threshold);

        let left = self.build(data, left_idx, depth + 1, rng);
        let right = self.build(data, right_idx, depth + 1, rng);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn best_split(
        &self,
        data: &TrainingSet<'_>,
        indices: &[usize],
        parent: &Stats,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n_features = data.x.ncols();
        let budget = self.config.max_features.resolve(n_features);

        let mut features: Vec<usize> = (0..n_features).collect();
        if budget < n_features {
            features.shuffle(rng);
        }

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        let mut sorted = indices.to_vec();

        for feature in features {
            if visited >= budget {
                break;
            }

            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                let v = data.x[[i, feature]];
                (lo.min(v), hi.max(v))
            });
            // Constant features don't count against the budget
            if lo >= hi {
                continue;
            }
            visited += 1;

            sorted.sort_by(|&a, &b| data.x[[a, feature]].total_cmp(&data.x[[b, feature]]));

            let mut left = Stats::default();
            for k in 0..sorted.len() - 1 {
                let i = sorted[k];
                left.add(data.weights[i], data.targets[i]);

                let current = data.x[[i, feature]];
                let next = data.x[[sorted[k + 1], feature]];
                if current >= next {
                    continue;
                }

                let right = parent.minus(&left);
                if left.count < self.config.min_samples_leaf
                    || right.count < self.config.min_samples_leaf
                {
                    continue;
                }

                let cost = left.cost(self.config.task) + right.cost(self.config.task);
                if best.as_ref().map_or(true, |b| cost < b.cost) {
                    let mut threshold = (current + next) / 2.0;
                    if threshold >= next {
                        threshold = current;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        cost,
                    });
                }
            }
        }

        best
    }

    /// Index of the leaf `row` falls into
    pub(crate) fn leaf_of(&self, row: ArrayView1<f64>) -> usize {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { .. } => return node,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub(crate) fn set_leaf_value(&mut self, node: usize, new_value: f64) {
        if let Some(Node::Leaf { value }) = self.nodes.get_mut(node) {
            *value = new_value;
        }
    }

    /// Raw leaf value for every row
    pub fn predict_value(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let n_features = self.n_features.ok_or(ModelError::NotTrained)?;
        check_features(n_features, x)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| match &self.nodes[self.leaf_of(row)] {
                Node::Leaf { value } => *value,
                Node::Split { .. } => 0.0,
            })
            .collect())
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], node: usize) -> usize {
            match &nodes[node] {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_of(&self.nodes, 0)
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        validate_training(x, y)?;
        let weights = vec![1.0; x.nrows()];
        self.fit_weighted(x, y, &weights)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        self.predict_value(x)
    }

    fn unfitted(&self) -> Self {
        Self::new(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_data::{accuracy, separable};
    use ndarray::array;

    #[test]
    fn test_fits_separable_data() {
        let (x, y) = separable(20);
        let mut tree = DecisionTree::default();
        tree.fit(&x, &y).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert_eq!(accuracy(&pred, &y), 1.0);
        assert!(tree.n_leaves() >= 2);
    }

    #[test]
    fn test_max_depth_one_is_a_stump() {
        let (x, y) = separable(20);
        let mut tree = DecisionTree::new(TreeConfig {
            max_depth: Some(1),
            ..Default::default()
        });
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_weights_change_leaf_values() {
        let x = array![[0.0], [0.0], [1.0]];
        let y = array![0.0, 1.0, 1.0];
        let mut tree = DecisionTree::default();
        tree.fit_weighted(&x, &y, &[3.0, 1.0, 1.0]).unwrap();

        let proba = tree.predict_proba(&array![[0.0]]).unwrap();
        assert!((proba[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_regression_leaf_means() {
        let x = array![[1.0], [2.0], [10.0], [11.0]];
        let targets = array![1.0, 1.0, 5.0, 7.0];
        let mut tree = DecisionTree::regression(TreeConfig {
            max_depth: Some(1),
            ..Default::default()
        });
        tree.fit_weighted(&x, &targets, &[1.0; 4]).unwrap();

        let values = tree.predict_value(&array![[0.0], [20.0]]).unwrap();
        assert_eq!(values, array![1.0, 6.0]);
    }

    #[test]
    fn test_untrained_and_wrong_width() {
        let tree = DecisionTree::default();
        assert_eq!(tree.predict_proba(&array![[1.0]]), Err(ModelError::NotTrained));

        let (x, y) = separable(10);
        let mut tree = DecisionTree::default();
        tree.fit(&x, &y).unwrap();
        assert!(matches!(
            tree.predict_proba(&array![[1.0]]),
            Err(ModelError::DimensionMismatch { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(4000), 63);
        assert_eq!(MaxFeatures::Log2.resolve(4000), 11);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
        assert_eq!(MaxFeatures::Fixed(50).resolve(7), 7);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }
}
