//! Stage-one models
//!
//! A stage-one model is a named estimator trained on exactly one text
//! feature matrix. The matrix is chosen by the name: names ending in
//! `bodies` read the review-body features, every other name reads the
//! summary features.

use super::{
    AdaBoost, AdaBoostParams, Classifier, DecisionTree, Estimator, ForestConfig, GbmParams,
    GradientBoosting, MaxFeatures, Mlp, MultinomialNb, RandomForest, TreeConfig,
};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

const BODIES_SUFFIX: &str = "bodies";

/// Which text matrix a model consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSource {
    Bodies,
    Summaries,
}

impl FeatureSource {
    pub fn from_model_name(name: &str) -> Self {
        if name.ends_with(BODIES_SUFFIX) {
            Self::Bodies
        } else {
            Self::Summaries
        }
    }

    /// Pick this source's matrix
    pub fn select<'a>(self, bodies: &'a Array2<f64>, summaries: &'a Array2<f64>) -> &'a Array2<f64> {
        match self {
            Self::Bodies => bodies,
            Self::Summaries => summaries,
        }
    }
}

/// Fixed hyperparameter configurations, all seeded with 3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPreset {
    RandomForest,
    RandomForestBodies,
    RandomForestSummaries,
    AdaBoost,
    AdaBoostBodies,
    AdaBoostSummaries,
    NaiveBayes,
    GradientBoosting,
    GradientBoostingBodies,
    GradientBoostingSummaries,
    Mlp,
    DecisionTree,
}

pub const PRESET_SEED: u64 = 3;

impl ModelPreset {
    /// Fresh untrained estimator for this preset
    pub fn build(self) -> Estimator {
        match self {
            Self::RandomForest => Estimator::RandomForest(RandomForest::new(ForestConfig {
                n_estimators: 100,
                seed: PRESET_SEED,
                ..Default::default()
            })),
            Self::RandomForestBodies => Estimator::RandomForest(RandomForest::new(ForestConfig {
                n_estimators: 500,
                bootstrap: false,
                max_depth: Some(50),
                max_features: MaxFeatures::Sqrt,
                min_samples_leaf: 1,
                min_samples_split: 2,
                seed: PRESET_SEED,
            })),
            Self::RandomForestSummaries => {
                Estimator::RandomForest(RandomForest::new(ForestConfig {
                    n_estimators: 100,
                    bootstrap: true,
                    max_depth: None,
                    max_features: MaxFeatures::Sqrt,
                    min_samples_leaf: 2,
                    min_samples_split: 10,
                    seed: PRESET_SEED,
                }))
            }
            Self::AdaBoost => Estimator::AdaBoost(AdaBoost::new(AdaBoostParams {
                n_estimators: 100,
                learning_rate: 1.0,
                seed: PRESET_SEED,
            })),
            Self::AdaBoostBodies => Estimator::AdaBoost(AdaBoost::new(AdaBoostParams {
                n_estimators: 200,
                learning_rate: 0.1,
                seed: PRESET_SEED,
            })),
            Self::AdaBoostSummaries => Estimator::AdaBoost(AdaBoost::new(AdaBoostParams {
                n_estimators: 50,
                learning_rate: 0.5,
                seed: PRESET_SEED,
            })),
            Self::NaiveBayes => Estimator::NaiveBayes(MultinomialNb::default()),
            Self::GradientBoosting => Estimator::GradientBoosting(GradientBoosting::new(GbmParams {
                n_estimators: 100,
                learning_rate: 0.1,
                seed: PRESET_SEED,
                ..Default::default()
            })),
            Self::GradientBoostingBodies => {
                Estimator::GradientBoosting(GradientBoosting::new(GbmParams {
                    n_estimators: 500,
                    learning_rate: 0.1,
                    min_samples_split: 2,
                    seed: PRESET_SEED,
                    ..Default::default()
                }))
            }
            Self::GradientBoostingSummaries => {
                Estimator::GradientBoosting(GradientBoosting::new(GbmParams {
                    n_estimators: 200,
                    learning_rate: 0.1,
                    min_samples_split: 10,
                    seed: PRESET_SEED,
                    ..Default::default()
                }))
            }
            Self::Mlp => Estimator::Mlp(Mlp::default()),
            Self::DecisionTree => Estimator::DecisionTree(DecisionTree::new(TreeConfig {
                seed: PRESET_SEED,
                ..Default::default()
            })),
        }
    }
}

/// Name and preset of one lineup member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub preset: ModelPreset,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, preset: ModelPreset) -> Self {
        Self {
            name: name.into(),
            preset,
        }
    }
}

/// The default lineup: tuned forests, boosters and gradient boosting per
/// source plus naive bayes on both sources
pub fn default_lineup() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("rf_bodies", ModelPreset::RandomForestBodies),
        ModelSpec::new("rf_summaries", ModelPreset::RandomForestSummaries),
        ModelSpec::new("ada_bodies", ModelPreset::AdaBoostBodies),
        ModelSpec::new("ada_summaries", ModelPreset::AdaBoostSummaries),
        ModelSpec::new("nb_bodies", ModelPreset::NaiveBayes),
        ModelSpec::new("nb_summaries", ModelPreset::NaiveBayes),
        ModelSpec::new("gbc_bodies", ModelPreset::GradientBoostingBodies),
        ModelSpec::new("gbc_summaries", ModelPreset::GradientBoostingSummaries),
    ]
}

/// A named predictor bound to one feature source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOneModel {
    pub name: String,
    pub source: FeatureSource,
    pub estimator: Estimator,
    trained: bool,
}

impl StageOneModel {
    pub fn new(name: impl Into<String>, estimator: Estimator) -> Self {
        let name = name.into();
        Self {
            source: FeatureSource::from_model_name(&name),
            name,
            estimator,
            trained: false,
        }
    }

    pub fn from_spec(spec: &ModelSpec) -> Self {
        Self::new(spec.name.clone(), spec.preset.build())
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Train on this model's own source matrix
    pub fn fit(
        &mut self,
        bodies: &Array2<f64>,
        summaries: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<()> {
        self.estimator.fit(self.source.select(bodies, summaries), y)?;
        self.trained = true;
        info!("Trained stage-one model {} on {:?}", self.name, self.source);
        Ok(())
    }

    /// Positive-class probability from this model's own source matrix
    pub fn predict_proba(
        &self,
        bodies: &Array2<f64>,
        summaries: &Array2<f64>,
    ) -> Result<Array1<f64>> {
        Ok(self.estimator.predict_proba(self.source.select(bodies, summaries))?)
    }
}

/// Ordered collection of uniquely named stage-one models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOneModels {
    models: Vec<StageOneModel>,
}

impl StageOneModels {
    pub fn new(models: Vec<StageOneModel>) -> Result<Self> {
        if models.is_empty() {
            return Err(PipelineError::configuration("stage-one lineup is empty"));
        }
        let mut names = HashSet::new();
        for model in &models {
            if !names.insert(model.name.as_str()) {
                return Err(PipelineError::configuration(format!(
                    "duplicate stage-one model name {}",
                    model.name
                )));
            }
        }
        Ok(Self { models })
    }

    pub fn from_specs(specs: &[ModelSpec]) -> Result<Self> {
        Self::new(specs.iter().map(StageOneModel::from_spec).collect())
    }

    /// Train every model; the first failure aborts the run
    pub fn fit_all(
        &mut self,
        bodies: &Array2<f64>,
        summaries: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<()> {
        for model in &mut self.models {
            model.fit(bodies, summaries, y)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&StageOneModel> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageOneModel> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_data::separable;

    #[test]
    fn test_source_from_name() {
        assert_eq!(FeatureSource::from_model_name("rf_bodies"), FeatureSource::Bodies);
        assert_eq!(FeatureSource::from_model_name("nb_summary"), FeatureSource::Summaries);
        assert_eq!(FeatureSource::from_model_name("bodies_rf"), FeatureSource::Summaries);
    }

    #[test]
    fn test_presets_carry_tuned_hyperparameters() {
        match ModelPreset::RandomForestBodies.build() {
            Estimator::RandomForest(rf) => {
                assert_eq!(rf.config().n_estimators, 500);
                assert!(!rf.config().bootstrap);
                assert_eq!(rf.config().max_depth, Some(50));
            }
            other => panic!("unexpected family {}", other.family()),
        }
        match ModelPreset::AdaBoostSummaries.build() {
            Estimator::AdaBoost(ada) => {
                assert_eq!(ada.params().n_estimators, 50);
                assert_eq!(ada.params().learning_rate, 0.5);
            }
            other => panic!("unexpected family {}", other.family()),
        }
        match ModelPreset::GradientBoostingSummaries.build() {
            Estimator::GradientBoosting(gb) => {
                assert_eq!(gb.params().n_estimators, 200);
                assert_eq!(gb.params().min_samples_split, 10);
            }
            other => panic!("unexpected family {}", other.family()),
        }
    }

    #[test]
    fn test_duplicate_and_empty_lineups_rejected() {
        let specs = vec![
            ModelSpec::new("nb_bodies", ModelPreset::NaiveBayes),
            ModelSpec::new("nb_bodies", ModelPreset::NaiveBayes),
        ];
        assert!(matches!(
            StageOneModels::from_specs(&specs),
            Err(PipelineError::Configuration(_))
        ));
        assert!(StageOneModels::from_specs(&[]).is_err());
    }

    #[test]
    fn test_models_read_their_own_matrix() {
        let (x, y) = separable(15);
        // summaries carry no signal and have a different width
        let noise = ndarray::Array2::from_elem((x.nrows(), 5), 0.5);

        let mut models = StageOneModels::from_specs(&[ModelSpec::new(
            "nb_bodies",
            ModelPreset::NaiveBayes,
        )])
        .unwrap();
        models.fit_all(&x, &noise, &y).unwrap();

        let model = models.get("nb_bodies").unwrap();
        assert!(model.is_trained());
        assert_eq!(model.predict_proba(&x, &noise).unwrap().len(), x.nrows());
    }

    #[test]
    fn test_default_lineup_is_valid() {
        let models = StageOneModels::from_specs(&default_lineup()).unwrap();
        assert_eq!(models.len(), 8);
        let bodies = models.iter().filter(|m| m.source == FeatureSource::Bodies).count();
        assert_eq!(bodies, 4);
    }
}
