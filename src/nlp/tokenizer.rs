//! Text tokenizers
//!
//! Two tokenizations are used by the featurizer:
//! - the default word pattern (`\b\w\w+\b`, two or more word characters)
//! - a stemming tokenizer that splits on words and punctuation runs and
//!   reduces every token to its English stem

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());
static WORD_OR_PUNCT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+|[^\w\s]+").unwrap());
static STEMMER: LazyLock<Stemmer> = LazyLock::new(|| Stemmer::create(Algorithm::English));

/// How a document is split into terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TokenizerKind {
    /// Lowercased words of at least two characters
    #[default]
    Word,
    /// Lowercased word and punctuation tokens, stemmed
    Stemming,
}

impl TokenizerKind {
    pub fn from_stemming(use_stemming: bool) -> Self {
        if use_stemming {
            Self::Stemming
        } else {
            Self::Word
        }
    }

    /// Tokenize a document
    pub fn tokenize(self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        match self {
            Self::Word => WORD_REGEX
                .find_iter(&lower)
                .map(|m| m.as_str().to_string())
                .collect(),
            Self::Stemming => WORD_OR_PUNCT_REGEX
                .find_iter(&lower)
                .map(|m| stem(m.as_str()))
                .collect(),
        }
    }
}

/// English stem of a single token
pub fn stem(token: &str) -> String {
    STEMMER.stem(token).into_owned()
}

/// All n-grams of `tokens` for every n in `min_n..=max_n`, joined by a
/// single space. Unigrams come first.
pub fn ngrams(tokens: &[String], min_n: usize, max_n: usize) -> Vec<String> {
    let mut grams = Vec::new();
    for n in min_n.max(1)..=max_n {
        if n == 1 {
            grams.extend(tokens.iter().cloned());
            continue;
        }
        grams.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    grams
}
