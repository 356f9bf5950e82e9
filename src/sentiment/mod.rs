//! Sentiment scoring
//!
//! Includes:
//! - A valence lexicon for product reviews
//! - A rule-based polarity scorer
//! - The annotator that attaches scores to review records

mod analyzer;
mod annotator;
mod lexicon;

pub use analyzer::{LexiconScorer, PolarityScorer, PolarityScores};
pub use annotator::SentimentAnnotator;
pub use lexicon::{ReviewLexicon, SentimentLexicon, BOOST_INCREMENT};
