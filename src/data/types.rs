//! Core data types: raw reviews, annotated reviews and per-product rows

use crate::sentiment::PolarityScores;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Placeholder written wherever a text field is missing
pub const NULL_TEXT: &str = "None";

/// Percentiles reported for every sentiment dimension
pub const PERCENTILES: [u8; 3] = [25, 50, 75];

/// Mean rating a product must strictly exceed to be labelled awesome
pub const AWESOME_THRESHOLD: f64 = 4.4;

/// Coerce an optional text value to the string the pipeline operates on
pub fn coerce_text(value: Option<&str>) -> &str {
    value.unwrap_or(NULL_TEXT)
}

/// Accept strings, nulls and any other JSON scalar for a text field.
/// Non-string values keep their JSON text form.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// One raw product review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Product identifier (ASIN)
    #[serde(rename = "asin")]
    pub product_id: String,
    /// Long-form review body
    #[serde(rename = "reviewText", default, deserialize_with = "lenient_text")]
    pub review_text: Option<String>,
    /// Short-form review headline
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: Option<String>,
    /// Star rating
    #[serde(rename = "overall")]
    pub rating: f64,
    /// Whether the reviewer is a verified purchaser
    #[serde(default)]
    pub verified: bool,
}

impl ReviewRecord {
    pub fn new(
        product_id: impl Into<String>,
        review_text: Option<&str>,
        summary: Option<&str>,
        rating: f64,
        verified: bool,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            review_text: review_text.map(str::to_string),
            summary: summary.map(str::to_string),
            rating,
            verified,
        }
    }

    pub fn review_text_or_null(&self) -> &str {
        coerce_text(self.review_text.as_deref())
    }

    pub fn summary_or_null(&self) -> &str {
        coerce_text(self.summary.as_deref())
    }
}

/// A review with sentiment scores for both of its text fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedReviewRecord {
    pub record: ReviewRecord,
    /// Scores of the review body
    pub text_sentiment: PolarityScores,
    /// Scores of the summary
    pub summary_sentiment: PolarityScores,
}

impl AnnotatedReviewRecord {
    pub fn sentiment(&self, origin: TextOrigin) -> &PolarityScores {
        match origin {
            TextOrigin::Summary => &self.summary_sentiment,
            TextOrigin::Text => &self.text_sentiment,
        }
    }
}

/// Which text field a sentiment statistic was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextOrigin {
    Summary,
    Text,
}

impl TextOrigin {
    pub const ALL: [TextOrigin; 2] = [TextOrigin::Summary, TextOrigin::Text];

    /// Column-name suffix
    pub fn suffix(self) -> &'static str {
        match self {
            TextOrigin::Summary => "Summary",
            TextOrigin::Text => "Text",
        }
    }
}

/// The four polarity dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentMetric {
    Compound,
    Neg,
    Neu,
    Pos,
}

impl SentimentMetric {
    pub const ALL: [SentimentMetric; 4] = [
        SentimentMetric::Compound,
        SentimentMetric::Neg,
        SentimentMetric::Neu,
        SentimentMetric::Pos,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SentimentMetric::Compound => "compound",
            SentimentMetric::Neg => "neg",
            SentimentMetric::Neu => "neu",
            SentimentMetric::Pos => "pos",
        }
    }

    pub fn of(self, scores: &PolarityScores) -> f64 {
        match self {
            SentimentMetric::Compound => scores.compound,
            SentimentMetric::Neg => scores.neg,
            SentimentMetric::Neu => scores.neu,
            SentimentMetric::Pos => scores.pos,
        }
    }
}

/// Name of a quantile column, e.g. `compound25Summary`
pub fn quantile_column_name(metric: SentimentMetric, percentile: u8, origin: TextOrigin) -> String {
    format!("{}{}{}", metric.name(), percentile, origin.suffix())
}

/// 25th / 50th / 75th percentile of one dimension
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quartiles {
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
}

impl Quartiles {
    pub fn get(&self, percentile: u8) -> Option<f64> {
        match percentile {
            25 => Some(self.q25),
            50 => Some(self.q50),
            75 => Some(self.q75),
            _ => None,
        }
    }

    pub fn is_monotonic(&self) -> bool {
        self.q25 <= self.q50 && self.q50 <= self.q75
    }
}

/// Quartiles of all four dimensions for one text origin
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentQuantiles {
    pub compound: Quartiles,
    pub neg: Quartiles,
    pub neu: Quartiles,
    pub pos: Quartiles,
}

impl SentimentQuantiles {
    pub fn metric(&self, metric: SentimentMetric) -> &Quartiles {
        match metric {
            SentimentMetric::Compound => &self.compound,
            SentimentMetric::Neg => &self.neg,
            SentimentMetric::Neu => &self.neu,
            SentimentMetric::Pos => &self.pos,
        }
    }
}

/// One aggregated row per product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFeatureRow {
    pub product_id: String,
    /// All review bodies, space-joined in input order
    pub reviews: String,
    /// All summaries, space-joined in input order
    pub summaries: String,
    pub review_count: usize,
    pub verified_ratio: f64,
    /// Present only for training rows
    pub label: Option<u8>,
    pub summary_quantiles: SentimentQuantiles,
    pub text_quantiles: SentimentQuantiles,
}

impl ProductFeatureRow {
    pub fn quantiles(&self, origin: TextOrigin) -> &SentimentQuantiles {
        match origin {
            TextOrigin::Summary => &self.summary_quantiles,
            TextOrigin::Text => &self.text_quantiles,
        }
    }

    /// A single quantile value; `None` for a percentile that is not tracked
    pub fn quantile(&self, origin: TextOrigin, metric: SentimentMetric, percentile: u8) -> Option<f64> {
        self.quantiles(origin).metric(metric).get(percentile)
    }

    /// The 24 quantile features as named columns, summary block first
    pub fn quantile_columns(&self) -> Vec<(String, f64)> {
        let mut columns = Vec::with_capacity(24);
        for origin in TextOrigin::ALL {
            let quantiles = self.quantiles(origin);
            for metric in SentimentMetric::ALL {
                let quartiles = quantiles.metric(metric);
                for (pct, value) in PERCENTILES.iter().zip([quartiles.q25, quartiles.q50, quartiles.q75]) {
                    columns.push((quantile_column_name(metric, *pct, origin), value));
                }
            }
        }
        columns
    }
}
