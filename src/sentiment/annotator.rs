//! Attach polarity scores to review records

use super::analyzer::{LexiconScorer, PolarityScorer, PolarityScores};
use crate::data::{coerce_text, AnnotatedReviewRecord, ReviewRecord};
use tracing::info;

/// Scores the summary and body of every review with a [`PolarityScorer`]
#[derive(Debug, Clone)]
pub struct SentimentAnnotator<S = LexiconScorer> {
    scorer: S,
}

impl SentimentAnnotator<LexiconScorer> {
    pub fn new() -> Self {
        Self {
            scorer: LexiconScorer::new(),
        }
    }
}

impl Default for SentimentAnnotator<LexiconScorer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PolarityScorer> SentimentAnnotator<S> {
    pub fn with_scorer(scorer: S) -> Self {
        Self { scorer }
    }

    /// Score a column of nullable texts. Missing values are scored as their
    /// placeholder text; output is positionally aligned with the input.
    pub fn score_texts<T: AsRef<str>>(&self, texts: &[Option<T>]) -> Vec<PolarityScores> {
        texts
            .iter()
            .map(|t| self.scorer.polarity_scores(coerce_text(t.as_ref().map(AsRef::as_ref))))
            .collect()
    }

    /// Annotate every record, preserving order
    pub fn annotate(&self, records: Vec<ReviewRecord>) -> Vec<AnnotatedReviewRecord> {
        let annotated: Vec<AnnotatedReviewRecord> = records
            .into_iter()
            .map(|record| {
                let text_sentiment = self.scorer.polarity_scores(record.review_text_or_null());
                let summary_sentiment = self.scorer.polarity_scores(record.summary_or_null());
                AnnotatedReviewRecord {
                    record,
                    text_sentiment,
                    summary_sentiment,
                }
            })
            .collect();

        info!("Sentiment scores added to {} reviews", annotated.len());
        annotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores a text by its length so alignment is easy to check
    struct LengthScorer;

    impl PolarityScorer for LengthScorer {
        fn polarity_scores(&self, text: &str) -> PolarityScores {
            PolarityScores {
                compound: text.len() as f64,
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_score_texts_aligned_and_null_safe() {
        let annotator = SentimentAnnotator::with_scorer(LengthScorer);
        let texts = vec![Some("great"), None, Some("ok")];

        let scores = annotator.score_texts(&texts);

        let compounds: Vec<f64> = scores.iter().map(|s| s.compound).collect();
        assert_eq!(compounds, vec![5.0, 4.0, 2.0]);
    }

    #[test]
    fn test_annotate_both_fields() {
        let annotator = SentimentAnnotator::with_scorer(LengthScorer);
        let records = vec![
            ReviewRecord::new("A", Some("tasty snack"), Some("yum"), 5.0, true),
            ReviewRecord::new("B", None, Some("meh"), 2.0, false),
        ];

        let annotated = annotator.annotate(records);

        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].text_sentiment.compound, 11.0);
        assert_eq!(annotated[0].summary_sentiment.compound, 3.0);
        assert_eq!(annotated[1].text_sentiment.compound, 4.0);
        assert_eq!(annotated[1].record.product_id, "B");
    }

    #[test]
    fn test_default_scorer() {
        let annotator = SentimentAnnotator::new();
        let annotated = annotator.annotate(vec![ReviewRecord::new(
            "A",
            Some("absolutely delicious"),
            Some("terrible"),
            5.0,
            true,
        )]);

        assert!(annotated[0].text_sentiment.compound > 0.0);
        assert!(annotated[0].summary_sentiment.compound < 0.0);
    }
}
