//! Polarity scoring
//!
//! [`PolarityScorer`] is the seam the pipeline depends on; [`LexiconScorer`]
//! is the built-in implementation, a rule-based valence scorer.

use super::lexicon::{ReviewLexicon, SentimentLexicon};
use serde::{Deserialize, Serialize};

const CAPS_INCREMENT: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const NORMALIZATION_ALPHA: f64 = 15.0;
const LOOKBACK: usize = 3;

/// Four-dimensional polarity of a text
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PolarityScores {
    /// Normalized overall valence in [-1, 1]
    pub compound: f64,
    /// Proportion of negative valence
    pub neg: f64,
    /// Proportion of neutral tokens
    pub neu: f64,
    /// Proportion of positive valence
    pub pos: f64,
}

/// Maps a text to polarity scores
pub trait PolarityScorer {
    fn polarity_scores(&self, text: &str) -> PolarityScores;
}

/// Rule-based scorer backed by a valence lexicon
#[derive(Debug, Clone, Default)]
pub struct LexiconScorer {
    lexicon: ReviewLexicon,
}

impl LexiconScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lexicon(lexicon: ReviewLexicon) -> Self {
        Self { lexicon }
    }

    /// Valence of the token at `i`, after caps, booster and negation rules
    fn token_valence(&self, tokens: &[Token], i: usize, cap_diff: bool) -> f64 {
        let token = &tokens[i];
        if self.lexicon.booster(&token.lower).is_some() {
            return 0.0;
        }
        let Some(mut valence) = self.lexicon.get_score(&token.lower) else {
            return 0.0;
        };

        if cap_diff && token.is_upper {
            valence += CAPS_INCREMENT * valence.signum();
        }

        let mut negated = false;
        for back in 1..=LOOKBACK.min(i) {
            let previous = &tokens[i - back];
            if let Some(increment) = self.lexicon.booster(&previous.lower) {
                let damping = match back {
                    1 => 1.0,
                    2 => 0.95,
                    _ => 0.9,
                };
                valence += increment * valence.signum() * damping;
            }
            if self.lexicon.is_negation(&previous.lower) {
                negated = true;
            }
        }

        if negated {
            valence *= NEGATION_SCALAR;
        }
        valence
    }
}

impl PolarityScorer for LexiconScorer {
    fn polarity_scores(&self, text: &str) -> PolarityScores {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return PolarityScores::default();
        }

        let n_upper = tokens.iter().filter(|t| t.is_upper).count();
        let cap_diff = n_upper > 0 && n_upper < tokens.len();

        let mut sentiments: Vec<f64> = (0..tokens.len())
            .map(|i| self.token_valence(&tokens, i, cap_diff))
            .collect();

        // Contrastive conjunction shifts weight to the clause after it
        if let Some(but_idx) = tokens.iter().position(|t| t.lower == "but") {
            for (i, s) in sentiments.iter_mut().enumerate() {
                if i < but_idx {
                    *s *= 0.5;
                } else if i > but_idx {
                    *s *= 1.5;
                }
            }
        }

        let emphasis = text.matches('!').count().min(MAX_EXCLAMATIONS) as f64 * EXCLAMATION_INCREMENT;

        let mut total: f64 = sentiments.iter().sum();
        if total > 0.0 {
            total += emphasis;
        } else if total < 0.0 {
            total -= emphasis;
        }
        let compound = normalize(total);

        let mut pos_sum = 0.0;
        let mut neg_sum = 0.0;
        let mut neu_count = 0.0;
        for s in sentiments.drain(..) {
            if s > 0.0 {
                pos_sum += s + 1.0;
            } else if s < 0.0 {
                neg_sum += s - 1.0;
            } else {
                neu_count += 1.0;
            }
        }

        if pos_sum > neg_sum.abs() {
            pos_sum += emphasis;
        } else if pos_sum < neg_sum.abs() {
            neg_sum -= emphasis;
        }

        let denom = pos_sum + neg_sum.abs() + neu_count;
        PolarityScores {
            compound: round_to(compound, 4),
            neg: round_to((neg_sum / denom).abs(), 3),
            neu: round_to((neu_count / denom).abs(), 3),
            pos: round_to((pos_sum / denom).abs(), 3),
        }
    }
}

struct Token {
    lower: String,
    is_upper: bool,
}

/// Whitespace tokens with surrounding punctuation stripped; single
/// characters are dropped
fn tokenize(text: &str) -> Vec<Token> {
    text.split_whitespace()
        .map(|raw| raw.trim_matches(|c: char| c.is_ascii_punctuation() && c != '\''))
        .filter(|w| w.chars().count() > 1)
        .map(|w| Token {
            lower: w.to_lowercase(),
            is_upper: w.chars().any(char::is_alphabetic)
                && w.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase),
        })
        .collect()
}

fn normalize(score: f64) -> f64 {
    (score / (score * score + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_positive_review() {
        let scorer = LexiconScorer::new();
        let scores = scorer.polarity_scores("These cookies are delicious and fresh");

        assert!(scores.compound > 0.5);
        assert!(scores.pos > scores.neg);
    }

    #[test]
    fn test_negative_review() {
        let scorer = LexiconScorer::new();
        let scores = scorer.polarity_scores("Stale, bland and a total waste of money");

        assert!(scores.compound < 0.0);
        assert!(scores.neg > scores.pos);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let scorer = LexiconScorer::new();

        let plain = scorer.polarity_scores("this tea is good");
        let negated = scorer.polarity_scores("this tea is not good");

        assert!(plain.compound > 0.0);
        assert!(negated.compound < 0.0);
    }

    #[test]
    fn test_booster_and_caps_intensify() {
        let scorer = LexiconScorer::new();

        let base = scorer.polarity_scores("the sauce is good");
        let boosted = scorer.polarity_scores("the sauce is very good");
        let shouted = scorer.polarity_scores("the sauce is GOOD");

        assert!(boosted.compound > base.compound);
        assert!(shouted.compound > base.compound);
    }

    #[test]
    fn test_empty_and_neutral_text() {
        let scorer = LexiconScorer::new();

        assert_eq!(scorer.polarity_scores(""), PolarityScores::default());

        let neutral = scorer.polarity_scores("None");
        assert_abs_diff_eq!(neutral.neu, 1.0);
        assert_abs_diff_eq!(neutral.compound, 0.0);
    }

    #[test]
    fn test_proportions_sum_to_one() {
        let scorer = LexiconScorer::new();
        let scores = scorer.polarity_scores("Great coffee but the bag arrived damaged!");

        assert_abs_diff_eq!(scores.pos + scores.neg + scores.neu, 1.0, epsilon = 0.002);
        assert!((-1.0..=1.0).contains(&scores.compound));
    }
}
