//! AdaBoost (SAMME) over decision stumps

use super::decision_tree::{DecisionTree, MaxFeatures, TreeConfig, TreeTask};
use super::{check_features, sigmoid, validate_training, Classifier, ModelError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for AdaBoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 1.0,
            seed: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoost {
    params: AdaBoostParams,
    stumps: Vec<DecisionTree>,
    alphas: Vec<f64>,
    n_features: Option<usize>,
}

impl AdaBoost {
    pub fn new(params: AdaBoostParams) -> Self {
        Self {
            params,
            stumps: Vec::new(),
            alphas: Vec::new(),
            n_features: None,
        }
    }

    pub fn params(&self) -> &AdaBoostParams {
        &self.params
    }

    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    /// Weighted vote in [-1, 1]
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let n_features = self.n_features.ok_or(ModelError::NotTrained)?;
        check_features(n_features, x)?;

        let mut votes = Array1::zeros(x.nrows());
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            let pred = stump.predict_value(x)?;
            votes += &pred.mapv(|p| if p >= 0.5 { alpha } else { -alpha });
        }
        let total: f64 = self.alphas.iter().sum();
        if total > 0.0 {
            votes /= total;
        }
        Ok(votes)
    }
}

impl Default for AdaBoost {
    fn default() -> Self {
        Self::new(AdaBoostParams::default())
    }
}

impl Classifier for AdaBoost {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        validate_training(x, y)?;
        if self.params.n_estimators == 0 || self.params.learning_rate <= 0.0 {
            return Err(ModelError::InvalidData(
                "n_estimators and learning_rate must be positive".to_string(),
            ));
        }

        let n = x.nrows();
        let mut weights = vec![1.0 / n as f64; n];
        self.stumps.clear();
        self.alphas.clear();

        for m in 0..self.params.n_estimators {
            let mut stump = DecisionTree::new(TreeConfig {
                max_depth: Some(1),
                max_features: MaxFeatures::All,
                seed: self.params.seed.wrapping_add(m as u64),
                task: TreeTask::Classification,
                ..Default::default()
            });
            stump.fit_weighted(x, y, &weights)?;

            let pred = stump.predict_value(x)?;
            let missed: Vec<bool> = pred
                .iter()
                .zip(y)
                .map(|(&p, &t)| (p >= 0.5) != (t == 1.0))
                .collect();
            let error: f64 = weights
                .iter()
                .zip(&missed)
                .filter(|(_, &miss)| miss)
                .map(|(w, _)| w)
                .sum();

            if error <= 0.0 {
                // Perfect stump: it alone decides
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }
            if error >= 0.5 {
                if self.stumps.is_empty() {
                    return Err(ModelError::TrainingFailed(
                        "first weak learner is no better than chance".to_string(),
                    ));
                }
                break;
            }

            let alpha = self.params.learning_rate * ((1.0 - error) / error).ln();
            for (w, &miss) in weights.iter_mut().zip(&missed) {
                if miss {
                    *w *= alpha.exp();
                }
            }
            let total: f64 = weights.iter().sum();
            weights.iter_mut().for_each(|w| *w /= total);

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        debug!("AdaBoost kept {} stumps", self.stumps.len());
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self.decision_function(x)?.mapv(|d| sigmoid(2.0 * d)))
    }

    fn unfitted(&self) -> Self {
        Self::new(self.params.clone())
    }
}
