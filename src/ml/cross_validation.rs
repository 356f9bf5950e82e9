//! K-fold cross-validation
//!
//! Folds are stratified and drawn without shuffling: the samples of each
//! class, in input order, are dealt into consecutive folds so that every
//! fold receives as even a share of each class as possible.

use super::metrics::{accuracy, f1_score};
use crate::error::{PipelineError, Result};
use crate::models::Classifier;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

pub const DEFAULT_FOLDS: usize = 10;

/// One train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified k-fold assignment for binary labels
pub fn stratified_folds(y: &Array1<f64>, k: usize) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(PipelineError::configuration(format!(
            "cross-validation needs at least 2 folds, got {}",
            k
        )));
    }
    if k > y.len() {
        return Err(PipelineError::configuration(format!(
            "cannot split {} samples into {} folds",
            y.len(),
            k
        )));
    }

    let classes: Vec<usize> = y.iter().map(|&l| usize::from(l >= 0.5)).collect();
    let n_negative = classes.iter().filter(|&&c| c == 0).count();

    // Deal the class-sorted labels round-robin; fold i gets the counts of
    // every k-th sorted label starting at i
    let mut allocation = vec![[0usize; 2]; k];
    for position in 0..classes.len() {
        let class = usize::from(position >= n_negative);
        allocation[position % k][class] += 1;
    }

    let mut test_fold = vec![0usize; classes.len()];
    for class in 0..2 {
        let fold_of_member: Vec<usize> = (0..k)
            .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]))
            .collect();
        let members = (0..classes.len()).filter(|&i| classes[i] == class);
        for (slot, i) in members.enumerate() {
            test_fold[i] = fold_of_member[slot];
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..classes.len()).partition(|&i| test_fold[i] == fold);
            Fold { train, test }
        })
        .collect())
}

/// Scores a model by retraining fresh copies on k-fold splits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluator {
    folds: usize,
}

impl Evaluator {
    pub fn new(folds: usize) -> Self {
        Self { folds }
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Score on every held-out fold with `scorer(y_true, y_pred)`
    pub fn cross_validated_scores<C, F>(
        &self,
        model: &C,
        x: &Array2<f64>,
        y: &Array1<f64>,
        scorer: F,
    ) -> Result<Vec<f64>>
    where
        C: Classifier,
        F: Fn(&Array1<f64>, &Array1<f64>) -> f64,
    {
        check_rows(x, y)?;
        stratified_folds(y, self.folds)?
            .iter()
            .enumerate()
            .map(|(i, fold)| -> Result<f64> {
                let mut fresh = model.unfitted();
                fresh.fit(&x.select(Axis(0), &fold.train), &y.select(Axis(0), &fold.train))?;
                let pred = fresh.predict(&x.select(Axis(0), &fold.test))?;
                let score = scorer(&y.select(Axis(0), &fold.test), &pred);
                debug!("Fold {}: score {:.4}", i + 1, score);
                Ok(score)
            })
            .collect()
    }

    /// Positive-class F1 on each held-out fold; one score per fold
    pub fn cross_validated_f1<C: Classifier>(
        &self,
        model: &C,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<Vec<f64>> {
        self.cross_validated_scores(model, x, y, f1_score)
    }

    pub fn cross_validated_accuracy<C: Classifier>(
        &self,
        model: &C,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<Vec<f64>> {
        self.cross_validated_scores(model, x, y, accuracy)
    }

    /// Out-of-fold 0/1 predictions aligned with the input rows
    pub fn cross_validated_predictions<C: Classifier>(
        &self,
        model: &C,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<Array1<f64>> {
        check_rows(x, y)?;
        let mut predictions = Array1::zeros(y.len());
        for fold in stratified_folds(y, self.folds)? {
            let mut fresh = model.unfitted();
            fresh.fit(&x.select(Axis(0), &fold.train), &y.select(Axis(0), &fold.train))?;
            let pred = fresh.predict(&x.select(Axis(0), &fold.test))?;
            for (&row, &p) in fold.test.iter().zip(pred.iter()) {
                predictions[row] = p;
            }
        }
        Ok(predictions)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(DEFAULT_FOLDS)
    }
}

fn check_rows(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::invariant(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelError;
    use ndarray::array;

    /// Predicts the training-set majority class
    #[derive(Debug, Clone, Default)]
    struct MajorityClassifier {
        majority: Option<f64>,
    }

    impl Classifier for MajorityClassifier {
        fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> std::result::Result<(), ModelError> {
            let positives = y.iter().filter(|&&v| v == 1.0).count();
            self.majority = Some(if positives * 2 >= y.len() { 1.0 } else { 0.0 });
            Ok(())
        }

        fn predict_proba(&self, x: &Array2<f64>) -> std::result::Result<Array1<f64>, ModelError> {
            let m = self.majority.ok_or(ModelError::NotTrained)?;
            Ok(Array1::from_elem(x.nrows(), m))
        }

        fn unfitted(&self) -> Self {
            Self::default()
        }
    }

    /// Predicts the first feature thresholded at 0.5
    #[derive(Debug, Clone, Default)]
    struct ThresholdClassifier {
        trained: bool,
    }

    impl Classifier for ThresholdClassifier {
        fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> std::result::Result<(), ModelError> {
            self.trained = true;
            Ok(())
        }

        fn predict_proba(&self, x: &Array2<f64>) -> std::result::Result<Array1<f64>, ModelError> {
            if !self.trained {
                return Err(ModelError::NotTrained);
            }
            Ok(x.column(0).to_owned())
        }

        fn unfitted(&self) -> Self {
            Self::default()
        }
    }

    fn dataset(n: usize) -> (Array2<f64>, Array1<f64>) {
        let y: Array1<f64> = (0..n).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }).collect();
        let x = Array2::from_shape_fn((n, 1), |(i, _)| y[i]);
        (x, y)
    }

    #[test]
    fn test_folds_partition_rows_and_stratify() {
        let (_, y) = dataset(30);
        let folds = stratified_folds(&y, 10).unwrap();

        assert_eq!(folds.len(), 10);
        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort();
        assert_eq!(seen, (0..30).collect::<Vec<_>>());

        for fold in &folds {
            assert_eq!(fold.test.len(), 3);
            assert_eq!(fold.train.len() + fold.test.len(), 30);
            let positives = fold.test.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 1);
        }
    }

    #[test]
    fn test_fold_count_validation() {
        let y = array![0.0, 1.0, 0.0];
        assert!(stratified_folds(&y, 1).is_err());
        assert!(stratified_folds(&y, 4).is_err());
    }

    #[test]
    fn test_cross_validated_f1_returns_one_score_per_fold() {
        let (x, y) = dataset(40);
        let scores = Evaluator::default()
            .cross_validated_f1(&ThresholdClassifier::default(), &x, &y)
            .unwrap();

        assert_eq!(scores.len(), 10);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        assert!(scores.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_out_of_fold_predictions_are_aligned() {
        let (x, y) = dataset(30);
        let pred = Evaluator::new(5)
            .cross_validated_predictions(&ThresholdClassifier::default(), &x, &y)
            .unwrap();
        assert_eq!(pred, y);

        let majority = Evaluator::new(5)
            .cross_validated_predictions(&MajorityClassifier::default(), &x, &y)
            .unwrap();
        assert!(majority.iter().all(|&p| p == 0.0));
    }
}
