//! Classifiers
//!
//! Every model family implements [`Classifier`]; [`Estimator`] wraps them
//! all in one serializable enum so stage-one and stage-two models can be
//! stored, cloned and persisted uniformly.

mod adaboost;
mod decision_tree;
mod gbm;
pub mod grid_search;
mod logistic;
mod mlp;
mod naive_bayes;
mod random_forest;
pub mod stage_one;
mod svm;

pub use adaboost::{AdaBoost, AdaBoostParams};
pub use decision_tree::{DecisionTree, MaxFeatures, TreeConfig, TreeTask};
pub use gbm::{GbmParams, GradientBoosting};
pub use grid_search::{GridSearch, GridSearchResult, ParamGrid, ParamSet, ParamValue};
pub use logistic::LogisticRegression;
pub use mlp::{Mlp, MlpParams};
pub use naive_bayes::MultinomialNb;
pub use random_forest::{ForestConfig, RandomForest};
pub use stage_one::{
    default_lineup, FeatureSource, ModelPreset, ModelSpec, StageOneModel, StageOneModels,
};
pub use svm::{Kernel, SvmParams, SupportVectorMachine};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while training or querying a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model not trained")]
    NotTrained,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Training labels contain a single class")]
    SingleClass,

    #[error("Training failed: {0}")]
    TrainingFailed(String),
}

/// A binary classifier over dense feature matrices with 0/1 labels
pub trait Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError>;

    /// Probability of the positive class for every row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// A fresh untrained copy with the same hyperparameters
    fn unfitted(&self) -> Self
    where
        Self: Sized;
}

/// Check a training set: non-empty, aligned, finite, 0/1 labels with both
/// classes present
pub fn validate_training(x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ModelError::InvalidData("empty feature matrix".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(ModelError::DimensionMismatch {
            expected: x.nrows(),
            got: y.len(),
        });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::InvalidData("non-finite feature value".to_string()));
    }
    if y.iter().any(|&l| l != 0.0 && l != 1.0) {
        return Err(ModelError::InvalidData("labels must be 0 or 1".to_string()));
    }
    let positives = y.iter().filter(|&&l| l == 1.0).count();
    if positives == 0 || positives == y.len() {
        return Err(ModelError::SingleClass);
    }
    Ok(())
}

pub(crate) fn check_features(expected: usize, x: &Array2<f64>) -> Result<(), ModelError> {
    if x.ncols() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            got: x.ncols(),
        });
    }
    Ok(())
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let exp_z = z.exp();
        exp_z / (1.0 + exp_z)
    }
}

/// Any trainable model of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Estimator {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    AdaBoost(AdaBoost),
    NaiveBayes(MultinomialNb),
    GradientBoosting(GradientBoosting),
    Logistic(LogisticRegression),
    Mlp(Mlp),
    Svm(SupportVectorMachine),
}

impl Estimator {
    pub fn family(&self) -> &'static str {
        match self {
            Self::DecisionTree(_) => "decision_tree",
            Self::RandomForest(_) => "random_forest",
            Self::AdaBoost(_) => "adaboost",
            Self::NaiveBayes(_) => "naive_bayes",
            Self::GradientBoosting(_) => "gradient_boosting",
            Self::Logistic(_) => "logistic",
            Self::Mlp(_) => "mlp",
            Self::Svm(_) => "svm",
        }
    }
}

macro_rules! delegate {
    ($self:expr, $model:ident => $body:expr) => {
        match $self {
            Estimator::DecisionTree($model) => $body,
            Estimator::RandomForest($model) => $body,
            Estimator::AdaBoost($model) => $body,
            Estimator::NaiveBayes($model) => $body,
            Estimator::GradientBoosting($model) => $body,
            Estimator::Logistic($model) => $body,
            Estimator::Mlp($model) => $body,
            Estimator::Svm($model) => $body,
        }
    };
}

impl Classifier for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        delegate!(self, m => m.fit(x, y))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        delegate!(self, m => m.predict_proba(x))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        delegate!(self, m => m.predict(x))
    }

    fn unfitted(&self) -> Self {
        match self {
            Self::DecisionTree(m) => Self::DecisionTree(m.unfitted()),
            Self::RandomForest(m) => Self::RandomForest(m.unfitted()),
            Self::AdaBoost(m) => Self::AdaBoost(m.unfitted()),
            Self::NaiveBayes(m) => Self::NaiveBayes(m.unfitted()),
            Self::GradientBoosting(m) => Self::GradientBoosting(m.unfitted()),
            Self::Logistic(m) => Self::Logistic(m.unfitted()),
            Self::Mlp(m) => Self::Mlp(m.unfitted()),
            Self::Svm(m) => Self::Svm(m.unfitted()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_data {
    use ndarray::{Array1, Array2};

    /// Two well separated clusters on the first two features
    pub fn separable(n_per_class: usize) -> (Array2<f64>, Array1<f64>) {
        let n = n_per_class * 2;
        let mut x = Array2::zeros((n, 3));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let positive = i % 2 == 0;
            let jitter = ((i as f64 * 0.37).sin() * 0.1).abs();
            x[[i, 0]] = if positive { 1.0 + jitter } else { jitter };
            x[[i, 1]] = if positive { 0.8 - jitter } else { 0.1 + jitter };
            x[[i, 2]] = (i as f64 * 0.71).cos().abs();
            y[i] = if positive { 1.0 } else { 0.0 };
        }
        (x, y)
    }

    pub fn accuracy(pred: &Array1<f64>, y: &Array1<f64>) -> f64 {
        pred.iter().zip(y).filter(|(p, t)| p == t).count() as f64 / y.len() as f64
    }
}
