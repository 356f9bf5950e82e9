//! Valence lexicon for product reviews
//!
//! Word valences use a -4.0 ..= 4.0 scale. Boosters carry a signed
//! increment that is added to (or subtracted from) the next scored word.

use std::collections::{HashMap, HashSet};

/// Increment applied by a booster word
pub const BOOST_INCREMENT: f64 = 0.293;

/// Lookup interface for sentiment lexicons
pub trait SentimentLexicon {
    /// Valence of a lowercase word
    fn get_score(&self, word: &str) -> Option<f64>;

    /// Check if the word carries a valence
    fn contains(&self, word: &str) -> bool {
        self.get_score(word).is_some()
    }

    /// All words with a valence
    fn words(&self) -> Vec<&str>;
}

/// Review-oriented lexicon
#[derive(Debug, Clone)]
pub struct ReviewLexicon {
    valence: HashMap<String, f64>,
    boosters: HashMap<String, f64>,
    negations: HashSet<String>,
}

impl ReviewLexicon {
    pub fn new() -> Self {
        let positive = [
            ("love", 3.2),
            ("loved", 2.9),
            ("loves", 2.7),
            ("awesome", 3.1),
            ("amazing", 2.8),
            ("excellent", 2.7),
            ("fantastic", 2.6),
            ("perfect", 2.7),
            ("wonderful", 2.7),
            ("outstanding", 3.0),
            ("superb", 3.1),
            ("delicious", 2.7),
            ("yummy", 2.4),
            ("tasty", 2.2),
            ("great", 3.1),
            ("best", 3.2),
            ("favorite", 2.0),
            ("good", 1.9),
            ("nice", 1.8),
            ("fresh", 1.3),
            ("happy", 2.7),
            ("glad", 2.0),
            ("enjoy", 2.2),
            ("enjoyed", 2.3),
            ("recommend", 1.5),
            ("recommended", 1.6),
            ("satisfied", 1.8),
            ("pleased", 1.9),
            ("fine", 0.8),
            ("ok", 0.9),
            ("okay", 0.9),
            ("like", 1.5),
            ("liked", 1.8),
            ("fun", 2.3),
            ("healthy", 1.7),
            ("smooth", 1.4),
            ("rich", 1.3),
            ("sweet", 2.0),
            ("wow", 2.8),
            ("win", 2.8),
            ("worth", 0.9),
            ("thanks", 1.9),
            ("easy", 1.9),
            ("fast", 0.9),
            ("quality", 1.2),
            ("addictive", 1.2),
            ("bargain", 1.4),
            ("beautiful", 2.9),
            ("convenient", 1.5),
            ("impressed", 2.1),
        ];

        let negative = [
            ("bad", -2.5),
            ("terrible", -2.1),
            ("horrible", -2.5),
            ("awful", -2.0),
            ("worst", -3.1),
            ("disgusting", -2.4),
            ("gross", -2.1),
            ("nasty", -2.6),
            ("hate", -2.7),
            ("hated", -3.2),
            ("disappointed", -1.9),
            ("disappointing", -2.2),
            ("disappointment", -2.3),
            ("stale", -1.5),
            ("bland", -1.0),
            ("bitter", -1.8),
            ("broken", -1.4),
            ("damaged", -2.2),
            ("expired", -1.3),
            ("poor", -2.1),
            ("waste", -1.8),
            ("wasted", -2.2),
            ("sick", -2.3),
            ("weird", -0.7),
            ("wrong", -2.1),
            ("sad", -2.1),
            ("sorry", -0.3),
            ("problem", -1.7),
            ("refund", -0.6),
            ("return", -0.2),
            ("returned", -0.4),
            ("overpriced", -1.6),
            ("expensive", -0.9),
            ("rotten", -2.9),
            ("moldy", -2.0),
            ("fake", -2.1),
            ("useless", -1.8),
            ("ugh", -1.8),
            ("yuck", -2.5),
            ("fail", -2.5),
        ];

        let boosters = [
            ("absolutely", BOOST_INCREMENT),
            ("amazingly", BOOST_INCREMENT),
            ("completely", BOOST_INCREMENT),
            ("extremely", BOOST_INCREMENT),
            ("highly", BOOST_INCREMENT),
            ("incredibly", BOOST_INCREMENT),
            ("really", BOOST_INCREMENT),
            ("so", BOOST_INCREMENT),
            ("super", BOOST_INCREMENT),
            ("totally", BOOST_INCREMENT),
            ("very", BOOST_INCREMENT),
            ("most", BOOST_INCREMENT),
            ("barely", -BOOST_INCREMENT),
            ("hardly", -BOOST_INCREMENT),
            ("kinda", -BOOST_INCREMENT),
            ("slightly", -BOOST_INCREMENT),
            ("somewhat", -BOOST_INCREMENT),
            ("marginally", -BOOST_INCREMENT),
            ("partly", -BOOST_INCREMENT),
        ];

        let negations = [
            "not", "no", "never", "neither", "nor", "nothing", "nowhere", "none", "without",
            "dont", "don't", "doesnt", "doesn't", "didnt", "didn't", "cant", "can't", "cannot",
            "couldnt", "couldn't", "wont", "won't", "wouldnt", "wouldn't", "shouldnt",
            "shouldn't", "isnt", "isn't", "arent", "aren't", "wasnt", "wasn't", "werent",
            "weren't", "havent", "haven't", "hasnt", "hasn't", "hadnt", "hadn't",
        ];

        Self {
            valence: positive
                .iter()
                .chain(negative.iter())
                .map(|(w, s)| (w.to_string(), *s))
                .collect(),
            boosters: boosters.iter().map(|(w, s)| (w.to_string(), *s)).collect(),
            negations: negations.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_negation(&self, word: &str) -> bool {
        self.negations.contains(word) || word.ends_with("n't")
    }

    /// Signed increment of a booster word
    pub fn booster(&self, word: &str) -> Option<f64> {
        self.boosters.get(word).copied()
    }

    /// Add or override a word valence
    pub fn add_word(&mut self, word: &str, score: f64) {
        self.valence.insert(word.to_lowercase(), score);
    }
}

impl Default for ReviewLexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentLexicon for ReviewLexicon {
    fn get_score(&self, word: &str) -> Option<f64> {
        self.valence.get(word).copied()
    }

    fn words(&self) -> Vec<&str> {
        self.valence.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_lexicon_polarity() {
        let lexicon = ReviewLexicon::new();

        assert!(lexicon.get_score("delicious").unwrap() > 0.0);
        assert!(lexicon.get_score("stale").unwrap() < 0.0);
        assert!(lexicon.get_score("table").is_none());
    }

    #[test]
    fn test_negation_detection() {
        let lexicon = ReviewLexicon::new();

        assert!(lexicon.is_negation("not"));
        assert!(lexicon.is_negation("mustn't"));
        assert!(!lexicon.is_negation("good"));
    }

    #[test]
    fn test_booster_sign() {
        let lexicon = ReviewLexicon::new();

        assert!(lexicon.booster("very").unwrap() > 0.0);
        assert!(lexicon.booster("slightly").unwrap() < 0.0);
    }
}
