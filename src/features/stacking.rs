//! Stage-two feature assembly
//!
//! Every stage-one model contributes one probability column, named after
//! the model and computed from the matrix its name designates. The 24
//! sentiment quantiles follow, metric by metric, text origin before summary
//! origin.

use crate::data::{
    quantile_column_name, FeatureTable, ProductFeatureRow, SentimentMetric, TextOrigin, PERCENTILES,
};
use crate::error::{PipelineError, Result};
use crate::models::StageOneModels;
use ndarray::Array2;
use tracing::debug;

/// Metric order of the quantile block in stacking tables
const STACKING_METRICS: [SentimentMetric; 4] = [
    SentimentMetric::Compound,
    SentimentMetric::Pos,
    SentimentMetric::Neg,
    SentimentMetric::Neu,
];

/// Names of the 24 quantile columns in stacking order
pub fn stacking_quantile_columns() -> Vec<(SentimentMetric, u8, TextOrigin)> {
    let mut columns = Vec::with_capacity(24);
    for metric in STACKING_METRICS {
        for pct in PERCENTILES {
            columns.push((metric, pct, TextOrigin::Text));
            columns.push((metric, pct, TextOrigin::Summary));
        }
    }
    columns
}

/// Builds the stage-two feature table
#[derive(Debug, Clone, Copy, Default)]
pub struct StackingFeatureAssembler;

impl StackingFeatureAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Column names of the assembled table for a model lineup
    pub fn column_names(&self, models: &StageOneModels) -> Vec<String> {
        models
            .names()
            .into_iter()
            .map(str::to_string)
            .chain(
                stacking_quantile_columns()
                    .into_iter()
                    .map(|(metric, pct, origin)| quantile_column_name(metric, pct, origin)),
            )
            .collect()
    }

    /// One row per product, in product order
    pub fn assemble(
        &self,
        models: &StageOneModels,
        summaries: &Array2<f64>,
        bodies: &Array2<f64>,
        products: &[ProductFeatureRow],
    ) -> Result<FeatureTable> {
        let n = products.len();
        if summaries.nrows() != n || bodies.nrows() != n {
            return Err(PipelineError::invariant(format!(
                "{} products but {} summary rows and {} body rows",
                n,
                summaries.nrows(),
                bodies.nrows()
            )));
        }

        let mut columns = Vec::with_capacity(models.len() + 24);
        for model in models.iter() {
            let proba = model.predict_proba(bodies, summaries)?;
            debug!("Stacking column {} from {:?}", model.name, model.source);
            columns.push((model.name.clone(), proba.to_vec()));
        }

        for (metric, pct, origin) in stacking_quantile_columns() {
            let values = products
                .iter()
                .map(|p| {
                    p.quantile(origin, metric, pct).ok_or_else(|| {
                        PipelineError::invariant(format!("percentile {} is not tracked", pct))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            columns.push((quantile_column_name(metric, pct, origin), values));
        }

        let row_ids = products.iter().map(|p| p.product_id.clone()).collect();
        FeatureTable::from_columns(row_ids, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Quartiles, SentimentQuantiles};
    use crate::models::test_data::separable;
    use crate::models::{Classifier, ModelPreset, ModelSpec};
    use ndarray::{s, Array2};

    fn product(id: &str, compound_median: f64) -> ProductFeatureRow {
        let text = SentimentQuantiles {
            compound: Quartiles {
                q25: compound_median - 0.1,
                q50: compound_median,
                q75: compound_median + 0.1,
            },
            ..Default::default()
        };
        ProductFeatureRow {
            product_id: id.to_string(),
            reviews: String::new(),
            summaries: String::new(),
            review_count: 1,
            verified_ratio: 1.0,
            label: None,
            summary_quantiles: SentimentQuantiles::default(),
            text_quantiles: text,
        }
    }

    #[test]
    fn test_quantile_column_order() {
        let names: Vec<String> = stacking_quantile_columns()
            .into_iter()
            .map(|(m, p, o)| quantile_column_name(m, p, o))
            .collect();
        assert_eq!(names.len(), 24);
        assert_eq!(&names[..3], ["compound25Text", "compound25Summary", "compound50Text"]);
        assert_eq!(names[6], "pos25Text");
        assert_eq!(names[23], "neu75Summary");
    }

    #[test]
    fn test_models_routed_by_name_suffix() {
        let (bodies, y) = separable(10);
        // summaries are a narrower matrix; a misrouted model would fail on width
        let summaries: Array2<f64> = bodies.slice(s![.., ..2]).to_owned();

        let mut models = StageOneModels::from_specs(&[
            ModelSpec::new("rf_bodies", ModelPreset::NaiveBayes),
            ModelSpec::new("nb_summary", ModelPreset::NaiveBayes),
        ])
        .unwrap();
        models.fit_all(&bodies, &summaries, &y).unwrap();

        let products: Vec<ProductFeatureRow> =
            (0..y.len()).map(|i| product(&format!("P{}", i), i as f64 / 100.0)).collect();
        let table = StackingFeatureAssembler::new()
            .assemble(&models, &summaries, &bodies, &products)
            .unwrap();

        assert_eq!(table.n_rows(), products.len());
        assert_eq!(table.n_columns(), 2 + 24);
        assert_eq!(table.columns, StackingFeatureAssembler::new().column_names(&models));

        let from_bodies = models.get("rf_bodies").unwrap().estimator.predict_proba(&bodies).unwrap();
        let from_summaries =
            models.get("nb_summary").unwrap().estimator.predict_proba(&summaries).unwrap();
        assert_eq!(table.column("rf_bodies").unwrap().to_owned(), from_bodies);
        assert_eq!(table.column("nb_summary").unwrap().to_owned(), from_summaries);

        assert_eq!(table.row_ids[3], "P3");
        assert_eq!(table.column("compound50Text").unwrap()[3], 0.03);
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let (bodies, y) = separable(5);
        let mut models =
            StageOneModels::from_specs(&[ModelSpec::new("nb_bodies", ModelPreset::NaiveBayes)])
                .unwrap();
        models.fit_all(&bodies, &bodies, &y).unwrap();

        let products = vec![product("P0", 0.0)];
        let result = StackingFeatureAssembler::new().assemble(&models, &bodies, &bodies, &products);
        assert!(matches!(result, Err(PipelineError::InvariantViolation(_))));
    }
}
