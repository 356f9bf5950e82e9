//! Feature engineering
//!
//! Includes:
//! - Per-product aggregation of annotated reviews
//! - Stage-two (stacking) feature assembly
//! - Feature subset selection by recursive elimination

pub mod aggregator;
pub mod selection;
pub mod stacking;
pub mod stats;

pub use aggregator::{awesome_label, AggregationMode, ProductAggregator};
pub use selection::{eliminate, FeatureSelection, FeatureSelector, SplitStrategy};
pub use stacking::{stacking_quantile_columns, StackingFeatureAssembler};
