//! Feature subset search
//!
//! For every subset size in the configured range, recursive feature
//! elimination around a logistic regression picks that many columns on a
//! 90/10 train/holdout split, and the subset is scored by macro F1 on the
//! holdout. A later size replaces the best only with a strictly greater
//! score.

use crate::data::FeatureTable;
use crate::error::{PipelineError, Result};
use crate::ml::macro_f1;
use crate::models::{Classifier, LogisticRegression};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const MIN_SUBSET_SIZE: usize = 5;
pub const MAX_SUBSET_SIZE: usize = 32;
pub const HOLDOUT_FRACTION: f64 = 0.1;

/// How the train/holdout split is drawn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Fresh unseeded shuffle on every call
    #[default]
    Random,
    Seeded(u64),
    /// Explicit row indices
    Fixed { train: Vec<usize>, test: Vec<usize> },
}

impl SplitStrategy {
    /// Row indices of (train, holdout)
    pub fn split(&self, n_rows: usize, holdout_fraction: f64) -> Result<(Vec<usize>, Vec<usize>)> {
        let shuffled = match self {
            Self::Fixed { train, test } => {
                if let Some(&bad) = train.iter().chain(test).find(|&&i| i >= n_rows) {
                    return Err(PipelineError::configuration(format!(
                        "split index {} out of range for {} rows",
                        bad, n_rows
                    )));
                }
                return Ok((train.clone(), test.clone()));
            }
            Self::Random => {
                let mut rows: Vec<usize> = (0..n_rows).collect();
                rows.shuffle(&mut rand::thread_rng());
                rows
            }
            Self::Seeded(seed) => {
                let mut rows: Vec<usize> = (0..n_rows).collect();
                rows.shuffle(&mut ChaCha8Rng::seed_from_u64(*seed));
                rows
            }
        };

        let n_test = (n_rows as f64 * holdout_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n_rows {
            return Err(PipelineError::configuration(format!(
                "cannot hold out {} of {} rows",
                n_test, n_rows
            )));
        }
        let (test, train) = shuffled.split_at(n_test);
        Ok((train.to_vec(), test.to_vec()))
    }
}

/// The winning subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection {
    /// Selected column names, in table order
    pub columns: Vec<String>,
    pub size: usize,
    pub f1: f64,
    /// Holdout macro F1 for every size tried
    pub scores: Vec<(usize, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelector {
    pub min_size: usize,
    pub max_size: usize,
    pub holdout_fraction: f64,
    pub split: SplitStrategy,
}

impl Default for FeatureSelector {
    fn default() -> Self {
        Self {
            min_size: MIN_SUBSET_SIZE,
            max_size: MAX_SUBSET_SIZE,
            holdout_fraction: HOLDOUT_FRACTION,
            split: SplitStrategy::Random,
        }
    }
}

impl FeatureSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_split(mut self, split: SplitStrategy) -> Self {
        self.split = split;
        self
    }

    pub fn select(&self, table: &FeatureTable, y: &Array1<f64>) -> Result<FeatureSelection> {
        let available = table.n_columns();
        if available < self.min_size {
            return Err(PipelineError::InsufficientFeatures {
                available,
                required: self.min_size,
            });
        }
        if table.n_rows() != y.len() {
            return Err(PipelineError::invariant(format!(
                "{} table rows but {} labels",
                table.n_rows(),
                y.len()
            )));
        }

        let (train, test) = self.split.split(table.n_rows(), self.holdout_fraction)?;
        let x_train = table.values.select(Axis(0), &train);
        let y_train = y.select(Axis(0), &train);
        let x_test = table.values.select(Axis(0), &test);
        let y_test = y.select(Axis(0), &test);

        let max_size = self.max_size.min(available);
        let mut best: Option<(Vec<usize>, usize, f64)> = None;
        let mut scores = Vec::new();

        for size in self.min_size..=max_size {
            let support = eliminate(&x_train, &y_train, size)?;

            let mut model = LogisticRegression::default();
            model.fit(&x_train.select(Axis(1), &support), &y_train)?;
            let pred = model.predict(&x_test.select(Axis(1), &support))?;
            let f1 = macro_f1(&y_test, &pred);
            debug!("Subset size {}: holdout macro F1 {:.4}", size, f1);
            scores.push((size, f1));

            let improves = best.as_ref().map_or(true, |(_, _, best_f1)| f1 > *best_f1);
            if improves {
                best = Some((support, size, f1));
            }
        }

        let (support, size, f1) = best.ok_or_else(|| {
            PipelineError::configuration(format!(
                "empty subset size range {}..={}",
                self.min_size, max_size
            ))
        })?;
        info!("Selected {} features with holdout macro F1 {:.4}", size, f1);

        Ok(FeatureSelection {
            columns: support.iter().map(|&j| table.columns[j].clone()).collect(),
            size,
            f1,
            scores,
        })
    }
}

/// Recursive feature elimination: refit and drop the column with the
/// smallest absolute coefficient until `keep` remain. Returns the surviving
/// column indices in ascending order.
pub fn eliminate(x: &Array2<f64>, y: &Array1<f64>, keep: usize) -> Result<Vec<usize>> {
    let mut support: Vec<usize> = (0..x.ncols()).collect();
    while support.len() > keep {
        let mut model = LogisticRegression::default();
        model.fit(&x.select(Axis(1), &support), y)?;
        let coefficients = model
            .coefficients()
            .ok_or_else(|| PipelineError::invariant("fitted model has no coefficients"))?;

        let weakest = coefficients
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |(arg, min), (i, c)| {
                if c.abs() < min {
                    (i, c.abs())
                } else {
                    (arg, min)
                }
            })
            .0;
        support.remove(weakest);
    }
    Ok(support)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Column 0 separates the classes; the rest are bounded noise
    fn separable_table(n: usize, n_columns: usize) -> (FeatureTable, Array1<f64>) {
        let y: Array1<f64> = (0..n).map(|i| (i % 2) as f64).collect();
        let mut columns = vec![(
            "signal".to_string(),
            y.iter().map(|&l| if l == 1.0 { 3.0 } else { -3.0 }).collect(),
        )];
        for j in 1..n_columns {
            columns.push((
                format!("noise{}", j),
                (0..n).map(|i| ((i * 7 + j * 13) as f64).sin() * 0.5).collect(),
            ));
        }
        let ids = (0..n).map(|i| format!("P{}", i)).collect();
        (FeatureTable::from_columns(ids, columns).unwrap(), y)
    }

    #[test]
    fn test_separating_feature_selected_with_perfect_f1() {
        let (table, y) = separable_table(60, 8);
        let selector = FeatureSelector {
            max_size: 5,
            ..FeatureSelector::new().with_split(SplitStrategy::Seeded(3))
        };
        let selection = selector.select(&table, &y).unwrap();

        assert_eq!(selection.size, 5);
        assert!(selection.columns.contains(&"signal".to_string()));
        assert_eq!(selection.f1, 1.0);
    }

    #[test]
    fn test_sizes_clamped_to_available_columns() {
        let (table, y) = separable_table(60, 7);
        let selection = FeatureSelector::new()
            .with_split(SplitStrategy::Seeded(11))
            .select(&table, &y)
            .unwrap();

        let sizes: Vec<usize> = selection.scores.iter().map(|(s, _)| *s).collect();
        assert_eq!(sizes, vec![5, 6, 7]);
        assert_eq!(selection.columns.len(), selection.size);
    }

    #[test]
    fn test_ties_keep_first_size() {
        let (table, y) = separable_table(60, 7);
        let selection = FeatureSelector::new()
            .with_split(SplitStrategy::Seeded(5))
            .select(&table, &y)
            .unwrap();

        // every size keeps the signal column and scores 1.0
        assert!(selection.scores.iter().all(|(_, f1)| *f1 == 1.0));
        assert_eq!(selection.size, 5);
    }

    #[test]
    fn test_too_few_columns() {
        let (table, y) = separable_table(20, 4);
        let err = FeatureSelector::new().select(&table, &y).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientFeatures {
                available: 4,
                required: 5
            }
        ));
    }

    #[test]
    fn test_fixed_split() {
        let split = SplitStrategy::Fixed {
            train: vec![0, 1, 2],
            test: vec![3],
        };
        assert_eq!(split.split(4, 0.1).unwrap(), (vec![0, 1, 2], vec![3]));
        assert!(split.split(3, 0.1).is_err());

        let (train, test) = SplitStrategy::Seeded(1).split(20, 0.1).unwrap();
        assert_eq!((train.len(), test.len()), (18, 2));
    }
}
