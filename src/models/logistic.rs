//! Logistic Regression for binary classification
//!
//! L2-penalised (inverse strength `c`), unpenalised intercept, fitted with
//! Newton iterations. Used as the reference model for recursive feature
//! elimination, where `coefficients()` ranks the columns.

use super::{check_features, sigmoid, validate_training, Classifier, ModelError};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

const INTERCEPT_RIDGE: f64 = 1e-10;

/// Logistic Regression classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse of regularization strength
    c: f64,
    max_iter: usize,
    tolerance: f64,
    coefficients: Option<Array1<f64>>,
    intercept: Option<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(1.0, 100, 1e-8)
    }
}

impl LogisticRegression {
    pub fn new(c: f64, max_iter: usize, tolerance: f64) -> Self {
        Self {
            c,
            max_iter,
            tolerance,
            coefficients: None,
            intercept: None,
        }
    }

    /// Create with L2 regularization of inverse strength `c`
    pub fn with_l2(c: f64) -> Self {
        Self::new(c, 100, 1e-8)
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> Option<f64> {
        self.intercept
    }

    /// Log-odds for every row
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let weights = self.coefficients.as_ref().ok_or(ModelError::NotTrained)?;
        let bias = self.intercept.ok_or(ModelError::NotTrained)?;
        check_features(weights.len(), x)?;
        Ok(x.dot(weights) + bias)
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        validate_training(x, y)?;
        if self.c <= 0.0 {
            return Err(ModelError::InvalidData("c must be positive".to_string()));
        }

        let (n, d) = x.dim();
        let mut design = Array2::<f64>::ones((n, d + 1));
        design.slice_mut(s![.., ..d]).assign(x);

        let mut ridge = Array1::from_elem(d + 1, 1.0 / self.c);
        ridge[d] = INTERCEPT_RIDGE;

        let mut theta = Array1::<f64>::zeros(d + 1);
        for _ in 0..self.max_iter {
            let proba = design.dot(&theta).mapv(sigmoid);
            let gradient = design.t().dot(&(&proba - y)) + &(&ridge * &theta);

            let curvature = proba.mapv(|p| (p * (1.0 - p)).max(1e-12));
            let weighted = &design * &curvature.view().insert_axis(Axis(1));
            let mut hessian = design.t().dot(&weighted);
            for j in 0..=d {
                hessian[[j, j]] += ridge[j];
            }

            let step = solve_spd(hessian, &gradient).ok_or_else(|| {
                ModelError::TrainingFailed("singular hessian in logistic regression".to_string())
            })?;
            theta -= &step;

            if step.iter().all(|v| v.abs() < self.tolerance) {
                break;
            }
        }

        if theta.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::TrainingFailed("logistic regression diverged".to_string()));
        }

        self.coefficients = Some(theta.slice(s![..d]).to_owned());
        self.intercept = Some(theta[d]);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    fn unfitted(&self) -> Self {
        Self::new(self.c, self.max_iter, self.tolerance)
    }
}

/// Solve `a x = b` for symmetric positive definite `a` by Cholesky
fn solve_spd(mut a: Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for j in 0..n {
        let mut diag = a[[j, j]];
        for k in 0..j {
            diag -= a[[j, k]] * a[[j, k]];
        }
        if diag <= 0.0 || !diag.is_finite() {
            return None;
        }
        let diag = diag.sqrt();
        a[[j, j]] = diag;
        for i in j + 1..n {
            let mut v = a[[i, j]];
            for k in 0..j {
                v -= a[[i, k]] * a[[j, k]];
            }
            a[[i, j]] = v / diag;
        }
    }

    // L z = b, then L^T x = z
    let mut z = b.clone();
    for i in 0..n {
        for k in 0..i {
            z[i] -= a[[i, k]] * z[k];
        }
        z[i] /= a[[i, i]];
    }
    for i in (0..n).rev() {
        for k in i + 1..n {
            z[i] -= a[[k, i]] * z[k];
        }
        z[i] /= a[[i, i]];
    }
    Some(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_data::{accuracy, separable};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_solve_spd() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = solve_spd(a, &b).unwrap();

        assert_abs_diff_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fits_separable_data() {
        let (x, y) = separable(30);
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();

        assert_eq!(accuracy(&model.predict(&x).unwrap(), &y), 1.0);
        let coef = model.coefficients().unwrap();
        assert!(coef[0] > 0.0);
    }

    #[test]
    fn test_informative_feature_has_largest_weight() {
        let (x, y) = separable(30);
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!(coef[0].abs() > coef[2].abs());
    }

    #[test]
    fn test_not_trained() {
        let model = LogisticRegression::default();
        assert_eq!(model.predict_proba(&array![[1.0]]), Err(ModelError::NotTrained));
    }
}
