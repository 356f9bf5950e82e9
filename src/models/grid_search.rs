//! Exhaustive hyperparameter search
//!
//! Every candidate of a [`ParamGrid`] is applied to a base [`Estimator`],
//! scored by mean accuracy over stratified folds and the first candidate
//! with the highest score is refit on the full data. Candidates train
//! independently on a dedicated rayon pool.

use super::{Classifier, Estimator, MaxFeatures};
use crate::error::{PipelineError, Result};
use crate::ml::Evaluator;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

pub const DEFAULT_SEARCH_FOLDS: usize = 5;

/// One hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    None,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "{}", v),
            Self::None => write!(f, "None"),
        }
    }
}

impl ParamValue {
    fn as_usize(&self, key: &str) -> Result<usize> {
        match self {
            Self::Int(v) if *v >= 0 => Ok(*v as usize),
            other => Err(invalid(key, other)),
        }
    }

    fn as_f64(&self, key: &str) -> Result<f64> {
        match self {
            Self::Float(v) => Ok(*v),
            Self::Int(v) => Ok(*v as f64),
            other => Err(invalid(key, other)),
        }
    }

    fn as_bool(&self, key: &str) -> Result<bool> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(invalid(key, other)),
        }
    }

    fn as_optional_usize(&self, key: &str) -> Result<Option<usize>> {
        match self {
            Self::None => Ok(None),
            other => other.as_usize(key).map(Some),
        }
    }
}

fn invalid(key: &str, value: &ParamValue) -> PipelineError {
    PipelineError::configuration(format!("invalid value {} for parameter {}", value, key))
}

/// One point of a grid: parameter name to value
pub type ParamSet = BTreeMap<String, ParamValue>;

fn describe(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Named value lists whose cartesian product is searched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.params.insert(key.into(), values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of candidates, 0 if any list is empty
    pub fn n_candidates(&self) -> usize {
        if self.params.is_empty() {
            return 0;
        }
        self.params.values().map(Vec::len).product()
    }

    /// Every combination, keys in sorted order with the last key varying
    /// fastest
    pub fn candidates(&self) -> Result<Vec<ParamSet>> {
        if self.params.is_empty() {
            return Err(PipelineError::configuration("parameter grid is empty"));
        }
        if let Some((key, _)) = self.params.iter().find(|(_, values)| values.is_empty()) {
            return Err(PipelineError::configuration(format!(
                "parameter {} has no values",
                key
            )));
        }

        let mut candidates = vec![ParamSet::new()];
        for (key, values) in &self.params {
            candidates = candidates
                .into_iter()
                .flat_map(|partial| {
                    values.iter().map(move |value| {
                        let mut next = partial.clone();
                        next.insert(key.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(candidates)
    }

    pub fn random_forest() -> Self {
        Self::new()
            .with("n_estimators", ints(&[100, 200, 500]))
            .with("max_features", strs(&["auto", "sqrt", "log2"]))
            .with("bootstrap", vec![ParamValue::Bool(true), ParamValue::Bool(false)])
            .with(
                "max_depth",
                vec![
                    ParamValue::None,
                    ParamValue::Int(5),
                    ParamValue::Int(10),
                    ParamValue::Int(50),
                    ParamValue::Int(100),
                ],
            )
            .with("min_samples_split", ints(&[2, 5, 10]))
            .with("min_samples_leaf", ints(&[1, 2, 5, 10]))
    }

    pub fn adaboost() -> Self {
        Self::new()
            .with("n_estimators", ints(&[50, 100, 200]))
            .with("learning_rate", floats(&[0.1, 0.5, 1.0]))
    }

    pub fn gradient_boosting() -> Self {
        Self::new()
            .with("learning_rate", floats(&[0.1, 0.2, 0.5]))
            .with("n_estimators", ints(&[100, 200, 500]))
            .with("min_samples_split", ints(&[2, 5, 10]))
    }

    pub fn svm() -> Self {
        Self::new()
            .with("c", floats(&[0.1, 1.0, 2.0]))
            .with("kernel", strs(&["poly", "rbf"]))
            .with("shrinking", vec![ParamValue::Bool(true), ParamValue::Bool(false)])
    }

    /// The preset grid for an estimator family, if it has one
    pub fn for_family(family: &str) -> Option<Self> {
        match family {
            "random_forest" => Some(Self::random_forest()),
            "adaboost" => Some(Self::adaboost()),
            "gradient_boosting" => Some(Self::gradient_boosting()),
            "svm" => Some(Self::svm()),
            _ => None,
        }
    }
}

fn ints(values: &[i64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Int(v)).collect()
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Float(v)).collect()
}

fn strs(values: &[&str]) -> Vec<ParamValue> {
    values.iter().map(|v| ParamValue::Str(v.to_string())).collect()
}

fn max_features(key: &str, value: &ParamValue) -> Result<MaxFeatures> {
    match value {
        ParamValue::Str(s) => match s.as_str() {
            "auto" => Ok(MaxFeatures::Auto),
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            "all" => Ok(MaxFeatures::All),
            _ => Err(invalid(key, value)),
        },
        ParamValue::None => Ok(MaxFeatures::All),
        other => other.as_usize(key).map(MaxFeatures::Fixed),
    }
}

fn unknown(family: &str, key: &str) -> PipelineError {
    PipelineError::configuration(format!("{} has no tunable parameter {}", family, key))
}

/// A fresh untrained copy of `base` with `params` applied
pub fn apply_params(base: &Estimator, params: &ParamSet) -> Result<Estimator> {
    let family = base.family();
    match base {
        Estimator::RandomForest(rf) => {
            let mut config = rf.config().clone();
            for (key, value) in params {
                match key.as_str() {
                    "n_estimators" => config.n_estimators = value.as_usize(key)?,
                    "max_features" => config.max_features = max_features(key, value)?,
                    "bootstrap" => config.bootstrap = value.as_bool(key)?,
                    "max_depth" => config.max_depth = value.as_optional_usize(key)?,
                    "min_samples_split" => config.min_samples_split = value.as_usize(key)?,
                    "min_samples_leaf" => config.min_samples_leaf = value.as_usize(key)?,
                    _ => return Err(unknown(family, key)),
                }
            }
            Ok(Estimator::RandomForest(super::RandomForest::new(config)))
        }
        Estimator::AdaBoost(ada) => {
            let mut p = ada.params().clone();
            for (key, value) in params {
                match key.as_str() {
                    "n_estimators" => p.n_estimators = value.as_usize(key)?,
                    "learning_rate" => p.learning_rate = value.as_f64(key)?,
                    _ => return Err(unknown(family, key)),
                }
            }
            Ok(Estimator::AdaBoost(super::AdaBoost::new(p)))
        }
        Estimator::GradientBoosting(gb) => {
            let mut p = gb.params().clone();
            for (key, value) in params {
                match key.as_str() {
                    "n_estimators" => p.n_estimators = value.as_usize(key)?,
                    "learning_rate" => p.learning_rate = value.as_f64(key)?,
                    "max_depth" => p.max_depth = value.as_usize(key)?,
                    "min_samples_split" => p.min_samples_split = value.as_usize(key)?,
                    "min_samples_leaf" => p.min_samples_leaf = value.as_usize(key)?,
                    _ => return Err(unknown(family, key)),
                }
            }
            Ok(Estimator::GradientBoosting(super::GradientBoosting::new(p)))
        }
        Estimator::Svm(svm) => {
            let mut p = svm.params().clone();
            for (key, value) in params {
                match key.as_str() {
                    "c" => p.c = value.as_f64(key)?,
                    "shrinking" => p.shrinking = value.as_bool(key)?,
                    "kernel" => {
                        p.kernel = match value {
                            ParamValue::Str(s) if s == "rbf" => super::Kernel::Rbf,
                            ParamValue::Str(s) if s == "poly" => super::Kernel::Poly,
                            other => return Err(invalid(key, other)),
                        }
                    }
                    _ => return Err(unknown(family, key)),
                }
            }
            Ok(Estimator::Svm(super::SupportVectorMachine::new(p)))
        }
        _ if params.is_empty() => Ok(base.unfitted()),
        _ => Err(PipelineError::configuration(format!(
            "{} has no tunable parameters",
            family
        ))),
    }
}

/// Outcome of a search
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_params: ParamSet,
    pub best_score: f64,
    /// Every candidate with its mean validation accuracy, in grid order
    pub scores: Vec<(ParamSet, f64)>,
    /// The winning configuration refit on all rows
    pub best_estimator: Estimator,
}

#[derive(Debug, Clone)]
pub struct GridSearch {
    base: Estimator,
    grid: ParamGrid,
    folds: usize,
    n_jobs: usize,
}

impl GridSearch {
    pub fn new(base: Estimator, grid: ParamGrid) -> Self {
        Self {
            base,
            grid,
            folds: DEFAULT_SEARCH_FOLDS,
            n_jobs: 0,
        }
    }

    pub fn folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    /// Worker threads; 0 uses every core
    pub fn n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        let candidates = self.grid.candidates()?;
        // Reject bad keys before spending any training time
        let models = candidates
            .iter()
            .map(|params| apply_params(&self.base, params))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Grid search over {} candidates for {} with {}-fold CV",
            candidates.len(),
            self.base.family(),
            self.folds
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs)
            .build()
            .map_err(|e| PipelineError::configuration(format!("thread pool: {}", e)))?;

        let evaluator = Evaluator::new(self.folds);
        let scores: Vec<f64> = pool.install(|| {
            models
                .par_iter()
                .zip(candidates.par_iter())
                .map(|(model, params)| -> Result<f64> {
                    let fold_scores = evaluator.cross_validated_accuracy(model, x, y)?;
                    let score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                    debug!("[{}] mean accuracy {:.4}", describe(params), score);
                    Ok(score)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut best = 0;
        for (i, &score) in scores.iter().enumerate() {
            if score > scores[best] {
                best = i;
            }
        }

        let mut best_estimator = models[best].unfitted();
        best_estimator.fit(x, y)?;
        info!(
            "Best parameters [{}] with mean accuracy {:.4}",
            describe(&candidates[best]),
            scores[best]
        );

        Ok(GridSearchResult {
            best_params: candidates[best].clone(),
            best_score: scores[best],
            scores: candidates.into_iter().zip(scores).collect(),
            best_estimator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_data::separable;
    use crate::models::{AdaBoost, AdaBoostParams, MultinomialNb, SupportVectorMachine};

    #[test]
    fn test_candidates_cartesian_product() {
        let grid = ParamGrid::new()
            .with("b", ints(&[1, 2]))
            .with("a", vec![ParamValue::Bool(true), ParamValue::Bool(false)]);
        let candidates = grid.candidates().unwrap();

        assert_eq!(candidates.len(), 4);
        assert_eq!(grid.n_candidates(), 4);
        assert_eq!(candidates[0]["a"], ParamValue::Bool(true));
        assert_eq!(candidates[0]["b"], ParamValue::Int(1));
        assert_eq!(candidates[1]["b"], ParamValue::Int(2));
        assert_eq!(candidates[2]["a"], ParamValue::Bool(false));
    }

    #[test]
    fn test_preset_grid_sizes() {
        assert_eq!(ParamGrid::random_forest().n_candidates(), 3 * 3 * 2 * 5 * 3 * 4);
        assert_eq!(ParamGrid::adaboost().n_candidates(), 9);
        assert_eq!(ParamGrid::gradient_boosting().n_candidates(), 27);
        assert_eq!(ParamGrid::svm().n_candidates(), 12);
        assert!(ParamGrid::for_family("naive_bayes").is_none());
    }

    #[test]
    fn test_empty_grids_are_configuration_errors() {
        let base = Estimator::Svm(SupportVectorMachine::default());
        let (x, y) = separable(10);

        let empty = GridSearch::new(base.clone(), ParamGrid::new()).fit(&x, &y);
        assert!(matches!(empty, Err(PipelineError::Configuration(_))));

        let no_values = GridSearch::new(base, ParamGrid::new().with("c", vec![])).fit(&x, &y);
        assert!(matches!(no_values, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let base = Estimator::NaiveBayes(MultinomialNb::default());
        let mut params = ParamSet::new();
        params.insert("alpha".to_string(), ParamValue::Float(0.5));
        assert!(apply_params(&base, &params).is_err());

        let svm = Estimator::Svm(SupportVectorMachine::default());
        params.clear();
        params.insert("kernel".to_string(), ParamValue::Str("linear".to_string()));
        assert!(apply_params(&svm, &params).is_err());
    }

    #[test]
    fn test_search_picks_and_refits_best() {
        let (x, y) = separable(20);
        let base = Estimator::AdaBoost(AdaBoost::new(AdaBoostParams::default()));
        let grid = ParamGrid::new()
            .with("n_estimators", ints(&[5, 10]))
            .with("learning_rate", floats(&[0.5, 1.0]));

        let result = GridSearch::new(base, grid).folds(4).n_jobs(2).fit(&x, &y).unwrap();

        assert_eq!(result.scores.len(), 4);
        let max = result.scores.iter().map(|(_, s)| *s).fold(f64::MIN, f64::max);
        assert_eq!(result.best_score, max);
        // first best wins
        let first = result.scores.iter().position(|(_, s)| *s == max).unwrap();
        assert_eq!(result.best_params, result.scores[first].0);
        assert_eq!(result.best_estimator.predict(&x).unwrap().len(), x.nrows());
    }
}
