//! Support vector classifier (the stage-two model)
//!
//! C-SVC solved with SMO using maximal-violating-pair working set
//! selection. Kernel rows are computed on demand so memory stays linear in
//! the number of samples. The positive-class probability is the logistic
//! squash of the decision value.

use super::{check_features, sigmoid, validate_training, Classifier, ModelError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const TAU: f64 = 1e-12;
const SHRINK_INTERVAL: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Rbf,
    Poly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    /// Penalty on margin violations
    pub c: f64,
    pub kernel: Kernel,
    /// Polynomial degree
    pub degree: i32,
    /// Polynomial independent term
    pub coef0: f64,
    /// Skip bound variables during working set selection
    pub shrinking: bool,
    /// Stopping tolerance on the KKT gap
    pub tolerance: f64,
    pub max_iter: usize,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: Kernel::Rbf,
            degree: 3,
            coef0: 0.0,
            shrinking: true,
            tolerance: 1e-3,
            max_iter: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SupportVectors {
    vectors: Array2<f64>,
    /// `y_i * alpha_i` per support vector
    dual_coef: Array1<f64>,
    rho: f64,
    gamma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportVectorMachine {
    params: SvmParams,
    model: Option<SupportVectors>,
}

impl SupportVectorMachine {
    pub fn new(params: SvmParams) -> Self {
        Self {
            params,
            model: None,
        }
    }

    pub fn params(&self) -> &SvmParams {
        &self.params
    }

    pub fn n_support(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.dual_coef.len())
    }

    fn kernel(&self, gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self.params.kernel {
            Kernel::Rbf => {
                let dist: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * dist).exp()
            }
            Kernel::Poly => (gamma * a.dot(&b) + self.params.coef0).powi(self.params.degree),
        }
    }

    fn kernel_row(&self, gamma: f64, x: &Array2<f64>, i: usize) -> Vec<f64> {
        let xi = x.row(i);
        x.axis_iter(Axis(0)).map(|xt| self.kernel(gamma, xi, xt)).collect()
    }

    /// Signed distance to the separating surface
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let model = self.model.as_ref().ok_or(ModelError::NotTrained)?;
        check_features(model.vectors.ncols(), x)?;

        Ok(x.axis_iter(Axis(0))
            .map(|row| {
                model
                    .vectors
                    .axis_iter(Axis(0))
                    .zip(&model.dual_coef)
                    .map(|(sv, &coef)| coef * self.kernel(model.gamma, sv, row))
                    .sum::<f64>()
                    - model.rho
            })
            .collect())
    }
}

/// `1 / (n_features * Var(X))`, or 1 for constant input
pub fn scale_gamma(x: &Array2<f64>) -> f64 {
    let var = x.var(0.0);
    if var > 0.0 {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

impl Default for SupportVectorMachine {
    fn default() -> Self {
        Self::new(SvmParams::default())
    }
}

impl Classifier for SupportVectorMachine {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        validate_training(x, y)?;
        let c = self.params.c;
        if c <= 0.0 {
            return Err(ModelError::InvalidData("c must be positive".to_string()));
        }

        let n = x.nrows();
        let gamma = scale_gamma(x);
        let signs: Vec<f64> = y.iter().map(|&l| if l == 1.0 { 1.0 } else { -1.0 }).collect();
        let diag: Vec<f64> = (0..n).map(|i| self.kernel(gamma, x.row(i), x.row(i))).collect();

        let mut alpha = vec![0.0; n];
        let mut grad = vec![-1.0; n];
        let mut active: Vec<usize> = (0..n).collect();
        let mut iterations = 0;

        let in_up = |t: usize, a: &[f64]| (signs[t] > 0.0 && a[t] < c) || (signs[t] < 0.0 && a[t] > 0.0);
        let in_low = |t: usize, a: &[f64]| (signs[t] > 0.0 && a[t] > 0.0) || (signs[t] < 0.0 && a[t] < c);

        loop {
            // Maximal violating pair over the active set
            let mut i = None;
            let mut j = None;
            let mut g_max = f64::NEG_INFINITY;
            let mut g_min = f64::INFINITY;
            for &t in &active {
                let v = -signs[t] * grad[t];
                if in_up(t, &alpha) && v > g_max {
                    g_max = v;
                    i = Some(t);
                }
                if in_low(t, &alpha) && v < g_min {
                    g_min = v;
                    j = Some(t);
                }
            }

            let converged = match (i, j) {
                (Some(_), Some(_)) => g_max - g_min < self.params.tolerance,
                _ => true,
            };
            if converged {
                if active.len() < n {
                    // Re-check optimality on the full set
                    active = (0..n).collect();
                    continue;
                }
                break;
            }
            let (Some(i), Some(j)) = (i, j) else { break };

            if iterations >= self.params.max_iter {
                warn!("SVM solver hit max_iter={} before converging", self.params.max_iter);
                break;
            }
            iterations += 1;

            let k_i = self.kernel_row(gamma, x, i);
            let k_j = self.kernel_row(gamma, x, j);
            let (old_i, old_j) = (alpha[i], alpha[j]);

            if signs[i] != signs[j] {
                let quad = (diag[i] + diag[j] - 2.0 * k_i[j]).max(TAU);
                let delta = (-grad[i] - grad[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;
                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > 0.0 {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = c - diff;
                    }
                } else if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            } else {
                let quad = (diag[i] + diag[j] - 2.0 * k_i[j]).max(TAU);
                let delta = (grad[i] - grad[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;
                if sum > c {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = sum - c;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c {
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = sum - c;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let d_i = alpha[i] - old_i;
            let d_j = alpha[j] - old_j;
            for t in 0..n {
                grad[t] += signs[t] * (signs[i] * k_i[t] * d_i + signs[j] * k_j[t] * d_j);
            }

            if self.params.shrinking && iterations % SHRINK_INTERVAL == 0 {
                // A bound variable that can only move one way and sits past
                // the opposite extreme cannot form a violating pair
                active.retain(|&t| {
                    let v = -signs[t] * grad[t];
                    let (up, low) = (in_up(t, &alpha), in_low(t, &alpha));
                    let idle_up = up && !low && v < g_min;
                    let idle_low = low && !up && v > g_max;
                    !(idle_up || idle_low)
                });
            }
        }

        // Offset from free vectors, or the midpoint of the feasible range
        let mut free_sum = 0.0;
        let mut free_count = 0usize;
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        for t in 0..n {
            let yg = signs[t] * grad[t];
            if alpha[t] > 0.0 && alpha[t] < c {
                free_sum += yg;
                free_count += 1;
            } else if (alpha[t] >= c && signs[t] < 0.0) || (alpha[t] <= 0.0 && signs[t] > 0.0) {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        }
        let rho = if free_count > 0 {
            free_sum / free_count as f64
        } else {
            (upper + lower) / 2.0
        };

        let support: Vec<usize> = (0..n).filter(|&t| alpha[t] > 0.0).collect();
        let vectors = x.select(Axis(0), &support);
        let dual_coef: Array1<f64> = support.iter().map(|&t| signs[t] * alpha[t]).collect();

        debug!(
            "SVM converged after {} iterations with {} support vectors",
            iterations,
            support.len()
        );

        self.model = Some(SupportVectors {
            vectors,
            dual_coef,
            rho,
            gamma,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    fn unfitted(&self) -> Self {
        Self::new(self.params.clone())
    }
}
