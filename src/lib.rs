//! # Review Stacking - "Awesome?" classification of grocery products
//!
//! This library predicts whether a grocery product is awesome (mean star
//! rating above 4.4) from the text of its reviews, using a two-stage stacked
//! ensemble.
//!
//! ## Modules
//!
//! - `data` - Review records, aggregated product rows and feature tables
//! - `sentiment` - Polarity scoring of review texts
//! - `features` - Per-product aggregation, stacking features and feature selection
//! - `nlp` - Tokenization and TF-IDF featurization
//! - `models` - Classifiers, stage-one lineup and grid search
//! - `ml` - Metrics and cross-validation
//! - `pipeline` - End-to-end training and prediction
//! - `utils` - Configuration

pub mod data;
pub mod error;
pub mod features;
pub mod ml;
pub mod models;
pub mod nlp;
pub mod pipeline;
pub mod sentiment;
pub mod utils;

pub use data::{FeatureTable, ProductFeatureRow, ReviewRecord};
pub use error::{PipelineError, Result};
pub use features::{FeatureSelector, ProductAggregator, StackingFeatureAssembler};
pub use models::{Classifier, Estimator, ModelError, StageOneModels};
pub use nlp::TextFeaturizer;
pub use pipeline::{PipelineArtifacts, StackingPipeline};
pub use sentiment::SentimentAnnotator;
pub use utils::Config;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{
        load_reviews, AnnotatedReviewRecord, FeatureTable, ProductFeatureRow, ReviewRecord,
    };
    pub use crate::error::{PipelineError, Result};
    pub use crate::features::{
        AggregationMode, FeatureSelection, FeatureSelector, ProductAggregator, SplitStrategy,
        StackingFeatureAssembler,
    };
    pub use crate::ml::{ClassificationReport, Evaluator};
    pub use crate::models::{
        Classifier, Estimator, GridSearch, ModelPreset, ModelSpec, ParamGrid, StageOneModels,
    };
    pub use crate::nlp::{FeaturizerConfig, TextFeaturizer};
    pub use crate::pipeline::{PipelineArtifacts, StackingPipeline, TrainingReport, TuneTarget};
    pub use crate::sentiment::{LexiconScorer, PolarityScorer, PolarityScores, SentimentAnnotator};
    pub use crate::utils::{load_config, Config};
}
