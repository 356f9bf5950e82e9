//! TF-IDF text featurizer
//!
//! Fits a vocabulary bounded by `max_features` on one text column and maps
//! any text column to an L2-normalised TF-IDF matrix over that vocabulary.

use super::stop_words::is_stop_word;
use super::tokenizer::{ngrams, TokenizerKind};
use crate::data::coerce_text;
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

pub const DEFAULT_MAX_FEATURES: usize = 4000;

/// Featurizer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturizerConfig {
    pub ngram_range: (usize, usize),
    pub use_stemming: bool,
    pub max_features: usize,
}

impl Default for FeaturizerConfig {
    fn default() -> Self {
        Self {
            ngram_range: (1, 1),
            use_stemming: false,
            max_features: DEFAULT_MAX_FEATURES,
        }
    }
}

/// Vocabulary and idf weights learned by [`TextFeaturizer::fit`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedVocabulary {
    /// Terms in column order (alphabetical)
    terms: Vec<String>,
    idf: Vec<f64>,
}

/// TF-IDF vectorizer over a capped vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFeaturizer {
    config: FeaturizerConfig,
    fitted: Option<FittedVocabulary>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TextFeaturizer {
    pub fn new(config: FeaturizerConfig) -> Self {
        Self {
            config,
            fitted: None,
            index: HashMap::new(),
        }
    }

    pub fn config(&self) -> &FeaturizerConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Learned terms in column order
    pub fn vocabulary(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|f| f.terms.as_slice())
    }

    pub fn n_features(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.terms.len())
    }

    fn analyze(&self, text: &str) -> Vec<String> {
        let tokenizer = TokenizerKind::from_stemming(self.config.use_stemming);
        let mut tokens = tokenizer.tokenize(text);
        if tokenizer == TokenizerKind::Word {
            tokens.retain(|t| !is_stop_word(t));
        }
        let (min_n, max_n) = self.config.ngram_range;
        ngrams(&tokens, min_n, max_n)
    }

    /// Learn vocabulary and idf from a nullable text column
    pub fn fit<T: AsRef<str>>(&mut self, texts: &[Option<T>]) -> Result<()> {
        let (min_n, max_n) = self.config.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(PipelineError::configuration(format!(
                "invalid ngram range ({}, {})",
                min_n, max_n
            )));
        }
        if self.config.max_features == 0 {
            return Err(PipelineError::configuration("max_features must be positive"));
        }

        let documents: Vec<Vec<String>> = texts
            .iter()
            .map(|t| self.analyze(coerce_text(t.as_ref().map(AsRef::as_ref))))
            .collect();

        let mut corpus_counts: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &documents {
            let mut seen = HashSet::new();
            for term in doc {
                *corpus_counts.entry(term.as_str()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, usize)> = corpus_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.config.max_features);

        let mut terms: Vec<String> = ranked.iter().map(|(t, _)| t.to_string()).collect();
        terms.sort();

        let n_docs = documents.len() as f64;
        let idf = terms
            .iter()
            .map(|t| {
                let df = doc_freq.get(t.as_str()).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        info!(
            "Fitted featurizer on {} documents, vocabulary of {} terms",
            documents.len(),
            terms.len()
        );

        self.fitted = Some(FittedVocabulary { terms, idf });
        self.rebuild_index();
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .fitted
            .as_ref()
            .map(|f| f.terms.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect())
            .unwrap_or_default();
    }

    /// Map a nullable text column to a TF-IDF matrix using the fitted
    /// vocabulary. Unknown terms contribute nothing.
    pub fn transform<T: AsRef<str>>(&self, texts: &[Option<T>]) -> Result<Array2<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            PipelineError::configuration("featurizer transform called before fit")
        })?;

        // Index is skipped by serde; rebuild lazily for reloaded featurizers
        let rebuilt;
        let index = if self.index.len() == fitted.terms.len() {
            &self.index
        } else {
            rebuilt = fitted
                .terms
                .iter()
                .enumerate()
                .map(|(i, t)| (t.clone(), i))
                .collect::<HashMap<_, _>>();
            &rebuilt
        };

        let mut matrix = Array2::zeros((texts.len(), fitted.terms.len()));
        for (row, text) in texts.iter().enumerate() {
            for term in self.analyze(coerce_text(text.as_ref().map(AsRef::as_ref))) {
                if let Some(&col) = index.get(&term) {
                    matrix[[row, col]] += 1.0;
                }
            }

            let mut row_view = matrix.row_mut(row);
            for (value, idf) in row_view.iter_mut().zip(&fitted.idf) {
                *value *= idf;
            }
            let norm = row_view.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row_view.mapv_inplace(|v| v / norm);
            }
        }

        Ok(matrix)
    }

    pub fn fit_transform<T: AsRef<str>>(&mut self, texts: &[Option<T>]) -> Result<Array2<f64>> {
        self.fit(texts)?;
        self.transform(texts)
    }
}

impl Default for TextFeaturizer {
    fn default() -> Self {
        Self::new(FeaturizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn corpus() -> Vec<Option<&'static str>> {
        vec![
            Some("delicious crunchy cookies"),
            Some("stale cookies and bland taste"),
            None,
            Some("delicious tea"),
        ]
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let featurizer = TextFeaturizer::default();
        let err = featurizer.transform(&[Some("tea")]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_vocabulary_sorted_and_stop_words_removed() {
        let mut featurizer = TextFeaturizer::default();
        featurizer.fit(&corpus()).unwrap();

        let vocab = featurizer.vocabulary().unwrap();
        let mut sorted = vocab.to_vec();
        sorted.sort();
        assert_eq!(vocab, sorted.as_slice());
        assert!(!vocab.iter().any(|t| t == "and"));
        assert!(vocab.iter().any(|t| t == "cookies"));
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let mut featurizer = TextFeaturizer::new(FeaturizerConfig {
            max_features: 2,
            ..Default::default()
        });
        featurizer.fit(&corpus()).unwrap();

        assert_eq!(featurizer.vocabulary().unwrap(), ["cookies", "delicious"]);
    }

    #[test]
    fn test_rows_are_l2_normalised_and_unknown_terms_ignored() {
        let mut featurizer = TextFeaturizer::default();
        let train = featurizer.fit_transform(&corpus()).unwrap();

        let norm: f64 = train.row(0).iter().map(|v| v * v).sum::<f64>().sqrt();
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-12);

        let unseen = featurizer.transform(&[Some("quinoa")]).unwrap();
        assert_eq!(unseen.ncols(), featurizer.n_features());
        assert!(unseen.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_bigrams_and_stemming() {
        let mut featurizer = TextFeaturizer::new(FeaturizerConfig {
            ngram_range: (1, 2),
            use_stemming: true,
            ..Default::default()
        });
        featurizer.fit(&[Some("loved the cookies")]).unwrap();

        let vocab = featurizer.vocabulary().unwrap();
        assert!(vocab.iter().any(|t| t == "love the"));
        assert!(vocab.iter().any(|t| t == "cooki"));
    }

    #[test]
    fn test_reload_preserves_transform() {
        let mut featurizer = TextFeaturizer::default();
        featurizer.fit(&corpus()).unwrap();

        let json = serde_json::to_string(&featurizer).unwrap();
        let reloaded: TextFeaturizer = serde_json::from_str(&json).unwrap();

        let texts = [Some("delicious cookies")];
        assert_eq!(
            featurizer.transform(&texts).unwrap(),
            reloaded.transform(&texts).unwrap()
        );
    }

    #[test]
    fn test_invalid_ngram_range() {
        let mut featurizer = TextFeaturizer::new(FeaturizerConfig {
            ngram_range: (2, 1),
            ..Default::default()
        });
        assert!(featurizer.fit(&corpus()).is_err());
    }
}
