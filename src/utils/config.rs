//! Configuration utilities

use crate::error::{PipelineError, Result};
use crate::features::{FeatureSelector, SplitStrategy};
use crate::models::stage_one::{default_lineup, ModelSpec};
use crate::models::{Kernel, SvmParams};
use crate::nlp::FeaturizerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataSettings,
    pub features: FeatureSettings,
    pub stage_one: StageOneSettings,
    pub stage_two: StageTwoSettings,
    pub selection: SelectionSettings,
    pub evaluation: EvaluationSettings,
    pub grid_search: GridSearchSettings,
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Newline-delimited JSON reviews with ratings
    pub training_reviews: PathBuf,
    /// Newline-delimited JSON reviews to score
    pub test_reviews: PathBuf,
    /// Where tables, predictions and artifacts are written
    pub output_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            training_reviews: PathBuf::from("Grocery_and_Gourmet_Food_Reviews_training.json"),
            test_reviews: PathBuf::from("Grocery_and_Gourmet_Food_Reviews_test.json"),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl DataSettings {
    pub fn artifacts_path(&self) -> PathBuf {
        self.output_dir.join("artifacts.json")
    }
}

/// Text featurizers for review bodies and summaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub bodies: FeaturizerConfig,
    pub summaries: FeaturizerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOneSettings {
    /// Share of training products used to fit stage one; the rest trains
    /// stage two
    pub fraction: f64,
    pub seed: u64,
    pub models: Vec<ModelSpec>,
}

impl Default for StageOneSettings {
    fn default() -> Self {
        Self {
            fraction: 0.5,
            seed: 3,
            models: default_lineup(),
        }
    }
}

/// The stacked support vector classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTwoSettings {
    pub c: f64,
    pub kernel: Kernel,
    pub shrinking: bool,
    /// Restrict stage two to a selected feature subset
    pub select_features: bool,
}

impl Default for StageTwoSettings {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: Kernel::Rbf,
            shrinking: true,
            select_features: false,
        }
    }
}

impl StageTwoSettings {
    pub fn svm_params(&self) -> SvmParams {
        SvmParams {
            c: self.c,
            kernel: self.kernel,
            shrinking: self.shrinking,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    pub min_size: usize,
    pub max_size: usize,
    pub holdout_fraction: f64,
    /// Unset draws a fresh split every run
    pub seed: Option<u64>,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        let selector = FeatureSelector::default();
        Self {
            min_size: selector.min_size,
            max_size: selector.max_size,
            holdout_fraction: selector.holdout_fraction,
            seed: None,
        }
    }
}

impl SelectionSettings {
    pub fn selector(&self) -> FeatureSelector {
        FeatureSelector {
            min_size: self.min_size,
            max_size: self.max_size,
            holdout_fraction: self.holdout_fraction,
            split: self.seed.map_or(SplitStrategy::Random, SplitStrategy::Seeded),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub folds: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self { folds: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchSettings {
    pub folds: usize,
    /// Worker threads; 0 uses every core
    pub n_jobs: usize,
}

impl Default for GridSearchSettings {
    fn default() -> Self {
        Self { folds: 5, n_jobs: 0 }
    }
}

impl Config {
    /// Parse a TOML document; missing sections and keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, featurizer) in [("bodies", &self.features.bodies), ("summaries", &self.features.summaries)] {
            let (min_n, max_n) = featurizer.ngram_range;
            if min_n == 0 || min_n > max_n {
                return Err(PipelineError::configuration(format!(
                    "features.{}: invalid ngram range ({}, {})",
                    name, min_n, max_n
                )));
            }
            if featurizer.max_features == 0 {
                return Err(PipelineError::configuration(format!(
                    "features.{}: max_features must be positive",
                    name
                )));
            }
        }

        check_fraction("stage_one.fraction", self.stage_one.fraction)?;
        check_fraction("selection.holdout_fraction", self.selection.holdout_fraction)?;

        if self.stage_one.models.is_empty() {
            return Err(PipelineError::configuration("stage_one.models is empty"));
        }
        let mut names = HashSet::new();
        for model in &self.stage_one.models {
            if !names.insert(model.name.as_str()) {
                return Err(PipelineError::configuration(format!(
                    "stage_one.models: duplicate name {}",
                    model.name
                )));
            }
        }

        if self.stage_two.c <= 0.0 {
            return Err(PipelineError::configuration("stage_two.c must be positive"));
        }
        if self.selection.min_size < 1 || self.selection.min_size > self.selection.max_size {
            return Err(PipelineError::configuration(format!(
                "selection sizes {}..={} are empty",
                self.selection.min_size, self.selection.max_size
            )));
        }
        if self.evaluation.folds < 2 {
            return Err(PipelineError::configuration("evaluation.folds must be at least 2"));
        }
        if self.grid_search.folds < 2 {
            return Err(PipelineError::configuration("grid_search.folds must be at least 2"));
        }
        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(PipelineError::configuration(format!(
            "{} must lie in (0, 1), got {}",
            name, value
        )))
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let config = Config::from_toml(&content)?;
    info!("Loaded configuration from {}", path.as_ref().display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelPreset;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stage_one.models.len(), 8);
        assert_eq!(config.evaluation.folds, 10);
        assert_eq!(config.features.bodies.max_features, 4000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [features.summaries]
            ngram_range = [1, 2]
            use_stemming = true

            [stage_one]
            models = [
                { name = "nb_bodies", preset = "naive_bayes" },
                { name = "rf_summaries", preset = "random_forest_summaries" },
            ]

            [stage_two]
            kernel = "poly"
            "#,
        )
        .unwrap();

        assert_eq!(config.features.summaries.ngram_range, (1, 2));
        assert!(config.features.summaries.use_stemming);
        assert_eq!(config.features.summaries.max_features, 4000);
        assert_eq!(config.stage_one.models[1].preset, ModelPreset::RandomForestSummaries);
        assert_eq!(config.stage_one.fraction, 0.5);
        assert_eq!(config.stage_two.svm_params().kernel, Kernel::Poly);
        assert_eq!(config.grid_search.folds, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_toml("[evaluation]\nfolds = 1").is_err());
        assert!(Config::from_toml("[features.bodies]\nngram_range = [2, 1]").is_err());
        assert!(Config::from_toml("[stage_one]\nfraction = 1.0").is_err());
        assert!(Config::from_toml("[selection]\nmin_size = 10\nmax_size = 5").is_err());
        assert!(Config::from_toml(
            "[stage_one]\nmodels = [{ name = \"a\", preset = \"mlp\" }, { name = \"a\", preset = \"mlp\" }]"
        )
        .is_err());
    }

    #[test]
    fn test_selection_seed_controls_split() {
        let mut settings = SelectionSettings::default();
        assert_eq!(settings.selector().split, SplitStrategy::Random);
        settings.seed = Some(7);
        assert_eq!(settings.selector().split, SplitStrategy::Seeded(7));
    }
}
