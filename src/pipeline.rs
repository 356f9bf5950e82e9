//! End-to-end stacking pipeline
//!
//! Training splits the labelled products in two. The first half fits the
//! text featurizers and the stage-one models; the second half is featurized
//! with the already-fitted vocabularies, passed through the stage-one models
//! and, together with its sentiment quantiles, trains the stage-two support
//! vector machine. Every fitted component is kept in [`PipelineArtifacts`].

use crate::data::{load_reviews, FeatureTable, ProductFeatureRow};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureSelection, ProductAggregator, StackingFeatureAssembler};
use crate::ml::{ClassificationReport, Evaluator};
use crate::models::{
    AdaBoost, AdaBoostParams, Classifier, Estimator, GbmParams, GradientBoosting, GridSearch,
    GridSearchResult, ModelPreset, ParamGrid, StageOneModels, SupportVectorMachine,
};
use crate::nlp::TextFeaturizer;
use crate::sentiment::SentimentAnnotator;
use crate::utils::Config;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Everything needed to score new products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifacts {
    pub bodies_featurizer: TextFeaturizer,
    pub summaries_featurizer: TextFeaturizer,
    pub stage_one: StageOneModels,
    pub stage_two: Estimator,
    /// Stacking columns the stage-two model was trained on, in order
    pub feature_columns: Vec<String>,
}

impl PipelineArtifacts {
    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        info!("Saved pipeline artifacts to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let artifacts: Self = serde_json::from_reader(reader)?;
        info!(
            "Loaded pipeline artifacts with {} stage-one models",
            artifacts.stage_one.len()
        );
        Ok(artifacts)
    }

    /// Text matrices of `rows` under the fitted vocabularies
    pub fn text_matrices(&self, rows: &[ProductFeatureRow]) -> Result<(Array2<f64>, Array2<f64>)> {
        let (bodies, summaries) = text_columns(rows);
        Ok((
            self.bodies_featurizer.transform(&bodies)?,
            self.summaries_featurizer.transform(&summaries)?,
        ))
    }

    /// Full stacking table of `rows`
    pub fn stacking_table(&self, rows: &[ProductFeatureRow]) -> Result<FeatureTable> {
        let (bodies, summaries) = self.text_matrices(rows)?;
        StackingFeatureAssembler::new().assemble(&self.stage_one, &summaries, &bodies, rows)
    }

    /// Positive-class probability per product, in row order
    pub fn predict_proba(&self, rows: &[ProductFeatureRow]) -> Result<Array1<f64>> {
        let table = self.stacking_table(rows)?.select_columns(&self.feature_columns)?;
        Ok(self.stage_two.predict_proba(&table.values)?)
    }
}

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub stage_one_products: usize,
    pub stage_two_products: usize,
    /// Stage-two F1 on every cross-validation fold
    pub cv_f1: Vec<f64>,
    /// Out-of-fold stage-two performance
    pub report: ClassificationReport,
    pub selection: Option<FeatureSelection>,
    /// The stage-two training table after any column selection
    pub stacking_table: FeatureTable,
    pub stacking_labels: Array1<f64>,
}

impl TrainingReport {
    pub fn mean_f1(&self) -> f64 {
        if self.cv_f1.is_empty() {
            0.0
        } else {
            self.cv_f1.iter().sum::<f64>() / self.cv_f1.len() as f64
        }
    }
}

/// Which matrix a hyperparameter search runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TuneTarget {
    Bodies,
    Summaries,
    Stacking,
}

pub struct StackingPipeline {
    config: Config,
    annotator: SentimentAnnotator,
}

impl StackingPipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            annotator: SentimentAnnotator::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load, annotate and aggregate a review file
    pub fn process(&self, path: &Path, aggregator: &ProductAggregator) -> Result<Vec<ProductFeatureRow>> {
        let reviews = load_reviews(path)?;
        let annotated = self.annotator.annotate(reviews);
        aggregator.aggregate(&annotated)
    }

    /// Seeded split into (stage-one, stage-two) products, each keeping input
    /// order
    pub fn split_products(
        &self,
        rows: &[ProductFeatureRow],
    ) -> Result<(Vec<ProductFeatureRow>, Vec<ProductFeatureRow>)> {
        let settings = &self.config.stage_one;
        let n_first = (rows.len() as f64 * settings.fraction).round() as usize;
        if n_first == 0 || n_first >= rows.len() {
            return Err(PipelineError::configuration(format!(
                "cannot split {} products with stage-one fraction {}",
                rows.len(),
                settings.fraction
            )));
        }

        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(settings.seed));
        let mut first = order[..n_first].to_vec();
        let mut second = order[n_first..].to_vec();
        first.sort_unstable();
        second.sort_unstable();

        let pick = |idx: &[usize]| idx.iter().map(|&i| rows[i].clone()).collect::<Vec<_>>();
        Ok((pick(&first), pick(&second)))
    }

    /// Fit featurizers and stage-one models on labelled products
    pub fn fit_stage_one(
        &self,
        rows: &[ProductFeatureRow],
    ) -> Result<(TextFeaturizer, TextFeaturizer, StageOneModels)> {
        let y = labels(rows)?;
        let (body_texts, summary_texts) = text_columns(rows);

        let mut bodies_featurizer = TextFeaturizer::new(self.config.features.bodies);
        let bodies = bodies_featurizer.fit_transform(&body_texts)?;
        let mut summaries_featurizer = TextFeaturizer::new(self.config.features.summaries);
        let summaries = summaries_featurizer.fit_transform(&summary_texts)?;

        let mut models = StageOneModels::from_specs(&self.config.stage_one.models)?;
        models.fit_all(&bodies, &summaries, &y)?;
        Ok((bodies_featurizer, summaries_featurizer, models))
    }

    /// Train every stage and report stage-two cross-validated performance
    pub fn train(&self, rows: &[ProductFeatureRow]) -> Result<(PipelineArtifacts, TrainingReport)> {
        let (first, second) = self.split_products(rows)?;
        info!(
            "Training on {} products: {} for stage one, {} for stage two",
            rows.len(),
            first.len(),
            second.len()
        );

        let (bodies_featurizer, summaries_featurizer, stage_one) = self.fit_stage_one(&first)?;
        let mut artifacts = PipelineArtifacts {
            bodies_featurizer,
            summaries_featurizer,
            stage_one,
            stage_two: Estimator::Svm(SupportVectorMachine::new(self.config.stage_two.svm_params())),
            feature_columns: Vec::new(),
        };

        let y = labels(&second)?;
        let mut table = artifacts.stacking_table(&second)?;
        let selection = if self.config.stage_two.select_features {
            let selection = self.config.selection.selector().select(&table, &y)?;
            table = table.select_columns(&selection.columns)?;
            Some(selection)
        } else {
            None
        };

        let evaluator = Evaluator::new(self.config.evaluation.folds);
        let cv_f1 = evaluator.cross_validated_f1(&artifacts.stage_two, &table.values, &y)?;
        let out_of_fold = evaluator.cross_validated_predictions(&artifacts.stage_two, &table.values, &y)?;
        let report = ClassificationReport::new(&y, &out_of_fold);

        artifacts.stage_two.fit(&table.values, &y)?;
        artifacts.feature_columns = table.columns.clone();

        let report = TrainingReport {
            stage_one_products: first.len(),
            stage_two_products: second.len(),
            cv_f1,
            report,
            selection,
            stacking_table: table,
            stacking_labels: y,
        };
        info!("Stage-two cross-validated F1 {:.4}", report.mean_f1());
        Ok((artifacts, report))
    }

    /// Score held-out labelled products with trained artifacts
    pub fn evaluate(
        &self,
        artifacts: &PipelineArtifacts,
        rows: &[ProductFeatureRow],
    ) -> Result<ClassificationReport> {
        let y = labels(rows)?;
        let pred = artifacts
            .predict_proba(rows)?
            .mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });
        let report = ClassificationReport::new(&y, &pred);
        info!("Held-out accuracy {:.4}, macro F1 {:.4}", report.accuracy, report.macro_f1);
        Ok(report)
    }

    /// Product ids with their positive-class probabilities
    pub fn predict(
        &self,
        artifacts: &PipelineArtifacts,
        rows: &[ProductFeatureRow],
    ) -> Result<Vec<(String, f64)>> {
        let proba = artifacts.predict_proba(rows)?;
        info!("Scored {} products", rows.len());
        Ok(rows
            .iter()
            .map(|r| r.product_id.clone())
            .zip(proba.iter().copied())
            .collect())
    }

    /// Search the best feature subset of the stage-two stacking table
    pub fn select_features(&self, rows: &[ProductFeatureRow]) -> Result<FeatureSelection> {
        let (table, y) = self.stage_two_table(rows)?;
        self.config.selection.selector().select(&table, &y)
    }

    /// Search the best feature subset of a saved stacking table
    pub fn select_features_from_table(&self, table: &FeatureTable, y: &Array1<f64>) -> Result<FeatureSelection> {
        self.config.selection.selector().select(table, y)
    }

    /// Grid search one estimator family on the chosen matrix
    pub fn tune(
        &self,
        rows: &[ProductFeatureRow],
        family: &str,
        target: TuneTarget,
    ) -> Result<GridSearchResult> {
        let grid = ParamGrid::for_family(family).ok_or_else(|| {
            PipelineError::configuration(format!("no parameter grid for {}", family))
        })?;
        let base = self.base_estimator(family)?;

        let (x, y) = match target {
            TuneTarget::Stacking => {
                let (table, y) = self.stage_two_table(rows)?;
                (table.values, y)
            }
            TuneTarget::Bodies | TuneTarget::Summaries => {
                let (bodies, summaries) = text_columns(rows);
                let (texts, config) = if target == TuneTarget::Bodies {
                    (bodies, self.config.features.bodies)
                } else {
                    (summaries, self.config.features.summaries)
                };
                let x = TextFeaturizer::new(config).fit_transform(&texts)?;
                (x, labels(rows)?)
            }
        };

        GridSearch::new(base, grid)
            .folds(self.config.grid_search.folds)
            .n_jobs(self.config.grid_search.n_jobs)
            .fit(&x, &y)
    }

    fn base_estimator(&self, family: &str) -> Result<Estimator> {
        match family {
            "random_forest" => Ok(ModelPreset::RandomForest.build()),
            "adaboost" => Ok(Estimator::AdaBoost(AdaBoost::new(AdaBoostParams::default()))),
            "gradient_boosting" => Ok(Estimator::GradientBoosting(GradientBoosting::new(
                GbmParams::default(),
            ))),
            "svm" => Ok(Estimator::Svm(SupportVectorMachine::new(
                self.config.stage_two.svm_params(),
            ))),
            other => Err(PipelineError::configuration(format!(
                "unknown estimator family {}",
                other
            ))),
        }
    }

    /// Stage one fitted on the first split, stacking table of the second
    fn stage_two_table(&self, rows: &[ProductFeatureRow]) -> Result<(FeatureTable, Array1<f64>)> {
        let (first, second) = self.split_products(rows)?;
        let (bodies_featurizer, summaries_featurizer, stage_one) = self.fit_stage_one(&first)?;
        let artifacts = PipelineArtifacts {
            bodies_featurizer,
            summaries_featurizer,
            stage_one,
            stage_two: Estimator::Svm(SupportVectorMachine::default()),
            feature_columns: Vec::new(),
        };
        Ok((artifacts.stacking_table(&second)?, labels(&second)?))
    }
}

/// Review-body and summary columns of `rows`
pub fn text_columns(rows: &[ProductFeatureRow]) -> (Vec<Option<&str>>, Vec<Option<&str>>) {
    rows.iter()
        .map(|r| (Some(r.reviews.as_str()), Some(r.summaries.as_str())))
        .unzip()
}

/// Labels of training rows as 0.0 / 1.0
pub fn labels(rows: &[ProductFeatureRow]) -> Result<Array1<f64>> {
    rows.iter()
        .map(|r| {
            r.label.map(f64::from).ok_or_else(|| {
                PipelineError::invariant(format!("product {} has no label", r.product_id))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AnnotatedReviewRecord, ReviewRecord};
    use crate::models::stage_one::ModelSpec;

    fn products(n: usize) -> Vec<ProductFeatureRow> {
        let annotator = SentimentAnnotator::new();
        let mut reviews = Vec::new();
        for i in 0..n {
            let id = format!("P{:02}", i);
            let (text, summary, rating) = if i % 2 == 0 {
                ("delicious fresh coffee, loved it", "excellent", 5.0)
            } else {
                ("stale bitter coffee, awful taste", "terrible", 2.0)
            };
            reviews.push(ReviewRecord::new(id.clone(), Some(text), Some(summary), rating, true));
            reviews.push(ReviewRecord::new(id, None, Some(summary), rating, i % 3 == 0));
        }
        let annotated: Vec<AnnotatedReviewRecord> = annotator.annotate(reviews);
        ProductAggregator::training().aggregate(&annotated).unwrap()
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.stage_one.models = vec![
            ModelSpec::new("nb_bodies", ModelPreset::NaiveBayes),
            ModelSpec::new("nb_summaries", ModelPreset::NaiveBayes),
        ];
        config.evaluation.folds = 3;
        config
    }

    #[test]
    fn test_split_preserves_order_and_covers_rows() {
        let rows = products(10);
        let pipeline = StackingPipeline::new(small_config());
        let (first, second) = pipeline.split_products(&rows).unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 5);
        assert!(first.windows(2).all(|w| w[0].product_id < w[1].product_id));
        let mut ids: Vec<&str> = first.iter().chain(&second).map(|r| r.product_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids.len(), 10);
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn test_labels_required() {
        let mut rows = products(2);
        rows[1].label = None;
        assert!(matches!(labels(&rows), Err(PipelineError::InvariantViolation(_))));
    }

    #[test]
    fn test_train_and_predict() {
        let rows = products(24);
        let pipeline = StackingPipeline::new(small_config());
        let (artifacts, report) = pipeline.train(&rows).unwrap();

        assert_eq!(report.cv_f1.len(), 3);
        assert_eq!(artifacts.feature_columns.len(), 2 + 24);
        assert_eq!(&artifacts.feature_columns[..2], ["nb_bodies", "nb_summaries"]);

        let predictions = pipeline.predict(&artifacts, &rows).unwrap();
        assert_eq!(predictions.len(), rows.len());
        assert_eq!(predictions[0].0, "P00");
        assert!(predictions.iter().all(|(_, p)| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_unknown_tune_family() {
        let pipeline = StackingPipeline::new(small_config());
        let result = pipeline.tune(&products(10), "naive_bayes", TuneTarget::Bodies);
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }
}
