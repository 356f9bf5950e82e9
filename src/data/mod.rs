//! Data structures and I/O
//!
//! Provides review records, aggregated product rows and feature tables.

pub mod loader;
mod table;
mod types;

pub use loader::{load_reviews, parse_reviews, write_predictions, write_product_table};
pub use table::FeatureTable;
pub use types::{
    coerce_text, quantile_column_name, AnnotatedReviewRecord, ProductFeatureRow, Quartiles,
    ReviewRecord, SentimentMetric, SentimentQuantiles, TextOrigin, AWESOME_THRESHOLD, NULL_TEXT,
    PERCENTILES,
};
