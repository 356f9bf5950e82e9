//! Model evaluation
//!
//! Includes:
//! - Classification metrics and reports
//! - Stratified k-fold cross-validation

pub mod cross_validation;
pub mod metrics;

pub use cross_validation::{stratified_folds, Evaluator, Fold, DEFAULT_FOLDS};
pub use metrics::{
    accuracy, f1_score, macro_f1, ClassMetrics, ClassificationReport, ConfusionMatrix,
};
