//! Classification metrics for evaluating binary classifiers
//!
//! Labels and predictions are 0/1 values; anything >= 0.5 counts as the
//! positive class. Undefined ratios (empty denominators) are reported as 0.

use ndarray::Array1;
use serde::Serialize;
use std::fmt;

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t >= 0.5, p >= 0.5) {
                (true, true) => cm.tp += 1,
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// The same matrix with the roles of the two classes swapped
    pub fn flipped(&self) -> Self {
        Self {
            tp: self.tn,
            tn: self.tp,
            fp: self.fn_,
            fn_: self.fp,
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Recall: TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    ConfusionMatrix::from_predictions(y_true, y_pred).accuracy()
}

/// F1 of the positive class
pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    ConfusionMatrix::from_predictions(y_true, y_pred).f1()
}

/// Unweighted mean of the per-class F1 scores. Only classes present in
/// either labels or predictions are averaged.
pub fn macro_f1(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let cm = ConfusionMatrix::from_predictions(y_true, y_pred);
    let negative = cm.flipped();

    let mut scores = Vec::with_capacity(2);
    if cm.tp + cm.fn_ + cm.fp > 0 {
        scores.push(cm.f1());
    }
    if negative.tp + negative.fn_ + negative.fp > 0 {
        scores.push(negative.f1());
    }
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_matrix(label: u8, cm: &ConfusionMatrix) -> Self {
        Self {
            label,
            precision: cm.precision(),
            recall: cm.recall(),
            f1: cm.f1(),
            support: cm.tp + cm.fn_,
        }
    }
}

/// Per-class metrics plus accuracy and macro averages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_f1: f64,
    pub confusion_matrix: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn new(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred);
        Self {
            classes: [
                ClassMetrics::from_matrix(0, &cm.flipped()),
                ClassMetrics::from_matrix(1, &cm),
            ],
            accuracy: cm.accuracy(),
            macro_f1: macro_f1(y_true, y_pred),
            confusion_matrix: cm,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>8} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        for class in &self.classes {
            writeln!(
                f,
                "{:>8} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                class.label, class.precision, class.recall, class.f1, class.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>8} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.confusion_matrix.total()
        )?;
        write!(
            f,
            "{:>8} {:>10} {:>10} {:>10.2} {:>10}",
            "macro",
            "",
            "",
            self.macro_f1,
            self.confusion_matrix.total()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_confusion_matrix() {
        let y_true = array![1.0, 1.0, 0.0, 0.0, 1.0];
        let y_pred = array![1.0, 0.0, 0.0, 1.0, 1.0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred);

        assert_eq!(cm, ConfusionMatrix { tp: 2, tn: 1, fp: 1, fn_: 1 });
        assert_abs_diff_eq!(cm.accuracy(), 0.6);
        assert_abs_diff_eq!(cm.precision(), 2.0 / 3.0);
        assert_abs_diff_eq!(cm.recall(), 2.0 / 3.0);
    }

    #[test]
    fn test_f1_and_macro_f1() {
        let y_true = array![1.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 0.0, 0.0];

        // positive: p=1, r=0.5 -> 2/3; negative: p=2/3, r=1 -> 0.8
        assert_abs_diff_eq!(f1_score(&y_true, &y_pred), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(macro_f1(&y_true, &y_pred), (2.0 / 3.0 + 0.8) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_cases_are_zero_or_one() {
        let all_negative = array![0.0, 0.0];
        assert_eq!(f1_score(&all_negative, &all_negative), 0.0);
        assert_eq!(macro_f1(&all_negative, &all_negative), 1.0);
        assert_eq!(macro_f1(&array![1.0, 0.0], &array![1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_report_supports() {
        let report = ClassificationReport::new(&array![1.0, 0.0, 0.0], &array![1.0, 0.0, 1.0]);

        assert_eq!(report.classes[0].support, 2);
        assert_eq!(report.classes[1].support, 1);
        assert!(report.to_string().contains("precision"));
    }
}
