//! Gradient Boosting Machine for binary classification
//!
//! Binomial deviance loss: every stage fits a regression tree to the
//! negative gradient `y - p` and replaces its leaf values with one Newton
//! step `sum(r) / sum(p (1 - p))`.

use super::decision_tree::{DecisionTree, MaxFeatures, TreeConfig, TreeTask};
use super::{check_features, sigmoid, validate_training, Classifier, ModelError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// GBM hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmParams {
    /// Number of boosting stages (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to every stage
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    params: GbmParams,
    /// Prior log-odds
    init: Option<f64>,
    trees: Vec<DecisionTree>,
    n_features: Option<usize>,
}

impl GradientBoosting {
    pub fn new(params: GbmParams) -> Self {
        Self {
            params,
            init: None,
            trees: Vec::new(),
            n_features: None,
        }
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    pub fn n_stages(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let init = self.init.ok_or(ModelError::NotTrained)?;
        let n_features = self.n_features.ok_or(ModelError::NotTrained)?;
        check_features(n_features, x)?;

        let mut raw = Array1::from_elem(x.nrows(), init);
        for tree in &self.trees {
            raw.scaled_add(self.params.learning_rate, &tree.predict_value(x)?);
        }
        Ok(raw)
    }
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new(GbmParams::default())
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        validate_training(x, y)?;
        if self.params.n_estimators == 0 || self.params.learning_rate <= 0.0 {
            return Err(ModelError::InvalidData(
                "n_estimators and learning_rate must be positive".to_string(),
            ));
        }

        let prior = y.mean().unwrap_or(0.5);
        let init = (prior / (1.0 - prior)).ln();
        let mut raw = Array1::from_elem(y.len(), init);
        let weights = vec![1.0; y.len()];
        self.trees.clear();

        for stage in 0..self.params.n_estimators {
            let proba = raw.mapv(sigmoid);
            let residual = y - &proba;

            let mut tree = DecisionTree::new(TreeConfig {
                max_depth: Some(self.params.max_depth),
                min_samples_split: self.params.min_samples_split,
                min_samples_leaf: self.params.min_samples_leaf,
                max_features: MaxFeatures::All,
                seed: self.params.seed.wrapping_add(stage as u64),
                task: TreeTask::Regression,
            });
            tree.fit_weighted(x, &residual, &weights)?;

            // Newton step per leaf
            let leaves: Vec<usize> = x.axis_iter(Axis(0)).map(|row| tree.leaf_of(row)).collect();
            let mut sums: HashMap<usize, (f64, f64)> = HashMap::new();
            for (i, &leaf) in leaves.iter().enumerate() {
                let entry = sums.entry(leaf).or_insert((0.0, 0.0));
                entry.0 += residual[i];
                entry.1 += proba[i] * (1.0 - proba[i]);
            }
            let mut values: HashMap<usize, f64> = HashMap::new();
            for (leaf, (num, den)) in sums {
                let value = if den.abs() < 1e-150 { 0.0 } else { num / den };
                tree.set_leaf_value(leaf, value);
                values.insert(leaf, value);
            }

            for (i, leaf) in leaves.iter().enumerate() {
                raw[i] += self.params.learning_rate * values[leaf];
            }
            self.trees.push(tree);
        }

        debug!("Gradient boosting fitted {} stages", self.trees.len());
        self.init = Some(init);
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    fn unfitted(&self) -> Self {
        Self::new(self.params.clone())
    }
}
