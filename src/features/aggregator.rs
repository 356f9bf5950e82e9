//! Per-product aggregation of annotated reviews
//!
//! Reviews are grouped by product id in first-seen order and each group is
//! reduced to a single [`ProductFeatureRow`] in one pass:
//!
//! - review bodies and summaries are space-joined in input order, with
//!   missing values written as the null placeholder
//! - review count and proportion of verified reviewers
//! - the awesome label (training mode only): mean rating > 4.4
//! - 25th/50th/75th percentiles of every sentiment dimension

use super::stats::{mean, quartiles};
use crate::data::{
    AnnotatedReviewRecord, ProductFeatureRow, Quartiles, SentimentMetric, SentimentQuantiles,
    TextOrigin, AWESOME_THRESHOLD,
};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Whether labels are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationMode {
    Training,
    Evaluation,
}

/// Reduces annotated reviews to one feature row per product
#[derive(Debug, Clone)]
pub struct ProductAggregator {
    mode: AggregationMode,
}

impl ProductAggregator {
    pub fn new(mode: AggregationMode) -> Self {
        Self { mode }
    }

    pub fn training() -> Self {
        Self::new(AggregationMode::Training)
    }

    pub fn evaluation() -> Self {
        Self::new(AggregationMode::Evaluation)
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Aggregate a closed batch of reviews
    pub fn aggregate(&self, reviews: &[AnnotatedReviewRecord]) -> Result<Vec<ProductFeatureRow>> {
        let groups = group_by_product(reviews);
        debug!("Grouped {} reviews into {} products", reviews.len(), groups.len());

        let rows = groups
            .into_iter()
            .map(|(product_id, group)| self.reduce_group(product_id, &group))
            .collect::<Result<Vec<_>>>()?;

        info!("Aggregated {} products ({:?} mode)", rows.len(), self.mode);
        Ok(rows)
    }

    /// Reduce one product's reviews to its feature row
    pub fn reduce_group(
        &self,
        product_id: &str,
        group: &[&AnnotatedReviewRecord],
    ) -> Result<ProductFeatureRow> {
        if group.is_empty() {
            return Err(PipelineError::invariant(format!(
                "product {} has no reviews",
                product_id
            )));
        }

        let reviews = join_texts(group.iter().map(|r| r.record.review_text_or_null()));
        let summaries = join_texts(group.iter().map(|r| r.record.summary_or_null()));

        let review_count = group.len();
        let verified = group.iter().filter(|r| r.record.verified).count();
        let verified_ratio = verified as f64 / review_count as f64;

        let label = match self.mode {
            AggregationMode::Training => {
                let ratings: Vec<f64> = group.iter().map(|r| r.record.rating).collect();
                Some(awesome_label(&ratings)?)
            }
            AggregationMode::Evaluation => None,
        };

        Ok(ProductFeatureRow {
            product_id: product_id.to_string(),
            reviews,
            summaries,
            review_count,
            verified_ratio,
            label,
            summary_quantiles: sentiment_quantiles(group, TextOrigin::Summary)?,
            text_quantiles: sentiment_quantiles(group, TextOrigin::Text)?,
        })
    }
}

/// Label of a product given all its ratings: 1 if the mean is strictly
/// above the threshold
pub fn awesome_label(ratings: &[f64]) -> Result<u8> {
    let mean_rating =
        mean(ratings).ok_or_else(|| PipelineError::invariant("cannot label a product without ratings"))?;
    Ok(u8::from(mean_rating > AWESOME_THRESHOLD))
}

/// Stable group-by over product id, preserving first-seen order
fn group_by_product(reviews: &[AnnotatedReviewRecord]) -> Vec<(&str, Vec<&AnnotatedReviewRecord>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&AnnotatedReviewRecord>)> = Vec::new();

    for review in reviews {
        let id = review.record.product_id.as_str();
        match index.get(id) {
            Some(&slot) => groups[slot].1.push(review),
            None => {
                index.insert(id, groups.len());
                groups.push((id, vec![review]));
            }
        }
    }

    groups
}

fn join_texts<'a>(texts: impl Iterator<Item = &'a str>) -> String {
    texts.collect::<Vec<_>>().join(" ")
}

fn sentiment_quantiles(
    group: &[&AnnotatedReviewRecord],
    origin: TextOrigin,
) -> Result<SentimentQuantiles> {
    let metric_quartiles = |metric: SentimentMetric| -> Result<Quartiles> {
        let values: Vec<f64> = group.iter().map(|r| metric.of(r.sentiment(origin))).collect();
        quartiles(&values).ok_or_else(|| PipelineError::invariant("quantile of an empty group"))
    };

    Ok(SentimentQuantiles {
        compound: metric_quartiles(SentimentMetric::Compound)?,
        neg: metric_quartiles(SentimentMetric::Neg)?,
        neu: metric_quartiles(SentimentMetric::Neu)?,
        pos: metric_quartiles(SentimentMetric::Pos)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ReviewRecord;
    use crate::sentiment::PolarityScores;
    use approx::assert_abs_diff_eq;

    fn annotated(id: &str, text: Option<&str>, rating: f64, verified: bool, compound: f64) -> AnnotatedReviewRecord {
        let scores = PolarityScores {
            compound,
            neg: 0.1,
            neu: 0.6,
            pos: 0.3,
        };
        AnnotatedReviewRecord {
            record: ReviewRecord::new(id, text, Some("summary"), rating, verified),
            text_sentiment: scores,
            summary_sentiment: PolarityScores {
                compound: -compound,
                ..scores
            },
        }
    }

    #[test]
    fn test_one_row_per_product_in_first_seen_order() {
        let reviews = vec![
            annotated("B", Some("x"), 5.0, true, 0.1),
            annotated("A", Some("y"), 4.0, false, 0.2),
            annotated("B", Some("z"), 3.0, true, 0.3),
        ];

        let rows = ProductAggregator::training().aggregate(&reviews).unwrap();

        let ids: Vec<&str> = rows.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_eq!(rows[0].review_count, 2);
        assert_eq!(rows[1].review_count, 1);
    }

    #[test]
    fn test_concatenation_is_ordered_and_null_safe() {
        let reviews = vec![
            annotated("P", Some("great"), 5.0, true, 0.0),
            annotated("P", None, 5.0, true, 0.0),
            annotated("P", Some("ok"), 5.0, true, 0.0),
        ];

        let rows = ProductAggregator::evaluation().aggregate(&reviews).unwrap();

        assert_eq!(rows[0].reviews, "great None ok");
        assert_eq!(rows[0].summaries, "summary summary summary");
    }

    #[test]
    fn test_verified_ratio() {
        let reviews = vec![
            annotated("P", Some("a"), 5.0, true, 0.0),
            annotated("P", Some("b"), 5.0, false, 0.0),
            annotated("P", Some("c"), 5.0, false, 0.0),
            annotated("P", Some("d"), 5.0, true, 0.0),
        ];

        let rows = ProductAggregator::training().aggregate(&reviews).unwrap();
        assert_abs_diff_eq!(rows[0].verified_ratio, 0.5);
    }

    #[test]
    fn test_label_threshold() {
        assert_eq!(awesome_label(&[5.0, 5.0, 5.0, 3.0]).unwrap(), 1);
        assert_eq!(awesome_label(&[4.0, 4.0, 4.0, 4.0]).unwrap(), 0);
        assert_eq!(awesome_label(&[4.4]).unwrap(), 0);
        assert!(awesome_label(&[]).is_err());
    }

    #[test]
    fn test_label_only_in_training_mode() {
        let reviews = vec![annotated("P", Some("a"), 5.0, true, 0.0)];

        let training = ProductAggregator::training().aggregate(&reviews).unwrap();
        let evaluation = ProductAggregator::evaluation().aggregate(&reviews).unwrap();

        assert_eq!(training[0].label, Some(1));
        assert_eq!(evaluation[0].label, None);
    }

    #[test]
    fn test_quantiles_per_product() {
        let reviews = vec![
            annotated("P", Some("a"), 5.0, true, 0.0),
            annotated("Q", Some("b"), 5.0, true, 0.9),
            annotated("P", Some("c"), 5.0, true, 0.4),
            annotated("P", Some("d"), 5.0, true, 0.8),
        ];

        let rows = ProductAggregator::training().aggregate(&reviews).unwrap();
        let p = &rows[0];

        assert_abs_diff_eq!(p.text_quantiles.compound.q25, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(p.text_quantiles.compound.q50, 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(p.text_quantiles.compound.q75, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(p.summary_quantiles.compound.q50, -0.4, epsilon = 1e-12);

        // Q is computed from its own single review only
        assert_abs_diff_eq!(rows[1].text_quantiles.compound.q25, 0.9);
        assert_abs_diff_eq!(rows[1].text_quantiles.compound.q75, 0.9);
    }

    #[test]
    fn test_empty_group_is_invariant_violation() {
        let err = ProductAggregator::training().reduce_group("P", &[]).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation(_)));
    }
}
