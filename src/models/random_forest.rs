//! Random Forest implementation

use super::decision_tree::{DecisionTree, MaxFeatures, TreeConfig, TreeTask};
use super::{check_features, validate_training, Classifier, ModelError};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Maximum depth of each tree (None = unlimited)
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Auto,
            bootstrap: true,
            seed: 3,
        }
    }
}

/// Random Forest classifier: averages the positive-class probability of
/// its trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    n_features: Option<usize>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: None,
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Bootstrap draw expressed as per-sample multiplicities
    fn bootstrap_weights(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut weights = vec![0.0; n];
        for _ in 0..n {
            weights[rng.gen_range(0..n)] += 1.0;
        }
        weights
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        validate_training(x, y)?;
        if self.config.n_estimators == 0 {
            return Err(ModelError::InvalidData("n_estimators must be positive".to_string()));
        }

        let n = x.nrows();
        let config = &self.config;

        // Build trees in parallel
        let trees = (0..config.n_estimators)
            .into_par_iter()
            .map(|i| {
                let tree_seed = config.seed.wrapping_add(i as u64);
                let mut tree = DecisionTree::new(TreeConfig {
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split,
                    min_samples_leaf: config.min_samples_leaf,
                    max_features: config.max_features,
                    seed: tree_seed,
                    task: TreeTask::Classification,
                });

                let weights = if config.bootstrap {
                    Self::bootstrap_weights(n, tree_seed.wrapping_mul(31).wrapping_add(7))
                } else {
                    vec![1.0; n]
                };
                tree.fit_weighted(x, y, &weights)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        debug!("Random forest grew {} trees", trees.len());
        self.trees = trees;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let n_features = self.n_features.ok_or(ModelError::NotTrained)?;
        check_features(n_features, x)?;

        let mut total = Array1::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict_value(x)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn unfitted(&self) -> Self {
        Self::new(self.config.clone())
    }
}
