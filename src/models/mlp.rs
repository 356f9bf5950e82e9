//! Multi-layer perceptron with one ReLU hidden layer and a sigmoid output,
//! trained with Adam on log loss

use super::{check_features, sigmoid, validate_training, Classifier, ModelError};
use ndarray::{Array, Array1, Array2, Axis, Dimension};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;
const NO_CHANGE_EPOCHS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden_units: usize,
    pub learning_rate: f64,
    /// L2 penalty
    pub alpha: f64,
    pub batch_size: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_units: 100,
            learning_rate: 1e-3,
            alpha: 1e-4,
            batch_size: 200,
            max_iter: 200,
            tolerance: 1e-4,
            seed: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layers {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array1<f64>,
    b2: f64,
}

impl Layers {
    /// Glorot-uniform initialisation
    fn init(n_in: usize, n_hidden: usize, rng: &mut ChaCha8Rng) -> Self {
        let bound1 = (6.0 / (n_in + n_hidden) as f64).sqrt();
        let bound2 = (6.0 / (n_hidden + 1) as f64).sqrt();
        Self {
            w1: Array2::from_shape_fn((n_in, n_hidden), |_| rng.gen_range(-bound1..bound1)),
            b1: Array1::from_shape_fn(n_hidden, |_| rng.gen_range(-bound1..bound1)),
            w2: Array1::from_shape_fn(n_hidden, |_| rng.gen_range(-bound2..bound2)),
            b2: rng.gen_range(-bound2..bound2),
        }
    }

    fn hidden(&self, x: &Array2<f64>) -> Array2<f64> {
        (x.dot(&self.w1) + &self.b1).mapv(|v| v.max(0.0))
    }

    fn output(&self, hidden: &Array2<f64>) -> Array1<f64> {
        (hidden.dot(&self.w2) + self.b2).mapv(sigmoid)
    }
}

/// First and second moment estimates for one parameter
#[derive(Debug, Clone)]
struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }

    fn step(&mut self, param: &mut Array<f64, D>, grad: &Array<f64, D>, lr_t: f64) {
        self.m.zip_mut_with(grad, |m, &g| *m = BETA1 * *m + (1.0 - BETA1) * g);
        self.v.zip_mut_with(grad, |v, &g| *v = BETA2 * *v + (1.0 - BETA2) * g * g);
        ndarray::Zip::from(param)
            .and(&self.m)
            .and(&self.v)
            .for_each(|p, &m, &v| *p -= lr_t * m / (v.sqrt() + ADAM_EPSILON));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    params: MlpParams,
    layers: Option<Layers>,
}

impl Mlp {
    pub fn new(params: MlpParams) -> Self {
        Self {
            params,
            layers: None,
        }
    }

    pub fn params(&self) -> &MlpParams {
        &self.params
    }
}

impl Default for Mlp {
    fn default() -> Self {
        Self::new(MlpParams::default())
    }
}

impl Classifier for Mlp {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        validate_training(x, y)?;
        let p = &self.params;
        if p.hidden_units == 0 || p.batch_size == 0 || p.learning_rate <= 0.0 {
            return Err(ModelError::InvalidData(
                "hidden_units, batch_size and learning_rate must be positive".to_string(),
            ));
        }

        let n = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(p.seed);
        let mut layers = Layers::init(x.ncols(), p.hidden_units, &mut rng);

        let mut mw1 = Moments::zeros_like(&layers.w1);
        let mut mb1 = Moments::zeros_like(&layers.b1);
        let mut mw2 = Moments::zeros_like(&layers.w2);
        let mut mb2 = Moments::zeros_like(&Array1::from_elem(1, layers.b2));

        let mut order: Vec<usize> = (0..n).collect();
        let mut step = 0i32;
        let mut best_loss = f64::INFINITY;
        let mut stale_epochs = 0;

        for epoch in 0..p.max_iter {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(p.batch_size.min(n)) {
                let xb = x.select(Axis(0), batch);
                let yb = y.select(Axis(0), batch);
                let m = batch.len() as f64;

                let hidden = layers.hidden(&xb);
                let out = layers.output(&hidden);
                epoch_loss += out
                    .iter()
                    .zip(&yb)
                    .map(|(&o, &target)| {
                        let o = o.clamp(1e-15, 1.0 - 1e-15);
                        -(target * o.ln() + (1.0 - target) * (1.0 - o).ln())
                    })
                    .sum::<f64>();

                let d_out = (&out - &yb) / m;
                let g_w2 = hidden.t().dot(&d_out) + &(&layers.w2 * (p.alpha / m));
                let g_b2 = Array1::from_elem(1, d_out.sum());

                let mut d_hidden = d_out
                    .view()
                    .insert_axis(Axis(1))
                    .dot(&layers.w2.view().insert_axis(Axis(0)));
                d_hidden.zip_mut_with(&hidden, |d, &h| {
                    if h <= 0.0 {
                        *d = 0.0;
                    }
                });
                let g_w1 = xb.t().dot(&d_hidden) + &(&layers.w1 * (p.alpha / m));
                let g_b1 = d_hidden.sum_axis(Axis(0));

                step += 1;
                let lr_t = p.learning_rate * (1.0 - BETA2.powi(step)).sqrt() / (1.0 - BETA1.powi(step));
                mw1.step(&mut layers.w1, &g_w1, lr_t);
                mb1.step(&mut layers.b1, &g_b1, lr_t);
                mw2.step(&mut layers.w2, &g_w2, lr_t);
                let mut b2 = Array1::from_elem(1, layers.b2);
                mb2.step(&mut b2, &g_b2, lr_t);
                layers.b2 = b2[0];
            }

            epoch_loss /= n as f64;
            if epoch_loss > best_loss - p.tolerance {
                stale_epochs += 1;
            } else {
                stale_epochs = 0;
            }
            best_loss = best_loss.min(epoch_loss);
            if stale_epochs >= NO_CHANGE_EPOCHS {
                debug!("MLP stopped after {} epochs", epoch + 1);
                break;
            }
        }

        if layers.w1.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::TrainingFailed("MLP weights diverged".to_string()));
        }
        self.layers = Some(layers);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let layers = self.layers.as_ref().ok_or(ModelError::NotTrained)?;
        check_features(layers.w1.nrows(), x)?;
        Ok(layers.output(&layers.hidden(x)))
    }

    fn unfitted(&self) -> Self {
        Self::new(self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_data::{accuracy, separable};

    #[test]
    fn test_mlp_learns_separable_data() {
        let (x, y) = separable(30);
        let mut model = Mlp::new(MlpParams {
            hidden_units: 16,
            learning_rate: 0.05,
            max_iter: 300,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        assert!(accuracy(&model.predict(&x).unwrap(), &y) >= 0.95);
    }

    #[test]
    fn test_seeded_training_is_reproducible() {
        let (x, y) = separable(10);
        let params = MlpParams {
            hidden_units: 8,
            max_iter: 20,
            ..Default::default()
        };

        let mut a = Mlp::new(params.clone());
        let mut b = Mlp::new(params);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }
}
