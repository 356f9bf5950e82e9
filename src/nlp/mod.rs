//! Text processing
//!
//! Includes:
//! - Tokenization (word pattern and stemming)
//! - English stop words
//! - TF-IDF featurization

mod stop_words;
mod tokenizer;
mod vectorizer;

pub use stop_words::{is_stop_word, ENGLISH_STOP_WORDS};
pub use tokenizer::{ngrams, stem, TokenizerKind};
pub use vectorizer::{FeaturizerConfig, TextFeaturizer, DEFAULT_MAX_FEATURES};
