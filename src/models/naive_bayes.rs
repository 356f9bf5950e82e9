//! Multinomial Naive Bayes over non-negative features (term counts or
//! TF-IDF weights)

use super::{check_features, validate_training, Classifier, ModelError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultinomialNb {
    /// Additive (Laplace) smoothing
    alpha: f64,
    /// log P(class) for classes 0 and 1
    class_log_prior: Option<[f64; 2]>,
    /// log P(feature | class), one row per class
    feature_log_prob: Option<Array2<f64>>,
}

impl MultinomialNb {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            class_log_prior: None,
            feature_log_prob: None,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for MultinomialNb {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Classifier for MultinomialNb {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        validate_training(x, y)?;
        if x.iter().any(|&v| v < 0.0) {
            return Err(ModelError::InvalidData(
                "multinomial naive bayes needs non-negative features".to_string(),
            ));
        }

        let n_features = x.ncols();
        let mut counts = Array2::<f64>::zeros((2, n_features));
        let mut class_counts = [0.0; 2];
        for (row, &label) in x.axis_iter(Axis(0)).zip(y) {
            let class = label as usize;
            class_counts[class] += 1.0;
            let mut class_row = counts.row_mut(class);
            class_row += &row;
        }

        let n = y.len() as f64;
        let prior = [(class_counts[0] / n).ln(), (class_counts[1] / n).ln()];

        let smoothed = counts.mapv(|c| c + self.alpha);
        let totals = smoothed.sum_axis(Axis(1));
        let mut log_prob = smoothed.mapv(f64::ln);
        for (mut row, total) in log_prob.axis_iter_mut(Axis(0)).zip(totals.iter()) {
            row -= total.ln();
        }

        self.class_log_prior = Some(prior);
        self.feature_log_prob = Some(log_prob);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let (prior, log_prob) = match (&self.class_log_prior, &self.feature_log_prob) {
            (Some(p), Some(l)) => (p, l),
            _ => return Err(ModelError::NotTrained),
        };
        check_features(log_prob.ncols(), x)?;

        let joint = x.dot(&log_prob.t());
        Ok(joint
            .axis_iter(Axis(0))
            .map(|scores| {
                let s0 = scores[0] + prior[0];
                let s1 = scores[1] + prior[1];
                let max = s0.max(s1);
                let e0 = (s0 - max).exp();
                let e1 = (s1 - max).exp();
                e1 / (e0 + e1)
            })
            .collect())
    }

    fn unfitted(&self) -> Self {
        Self::new(self.alpha)
    }
}
