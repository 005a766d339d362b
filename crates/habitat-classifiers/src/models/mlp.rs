//! One-hidden-layer perceptron with a softmax output, trained with Adam.
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{ClassifierSpec, ModelType};
use crate::error::{HabitatError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::softmax_rows;
use crate::preprocessing::{fit_scaler, Scaler};

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const ADAM_EPS: f32 = 1e-8;
const TOL: f32 = 1e-4;
const N_ITER_NO_CHANGE: usize = 10;

/// First and second moment estimates of one parameter tensor.
struct Moments<D: ndarray::Dimension> {
    m: ndarray::Array<f32, D>,
    v: ndarray::Array<f32, D>,
}

impl<D: ndarray::Dimension> Moments<D> {
    fn like(param: &ndarray::Array<f32, D>) -> Self {
        Self {
            m: ndarray::Array::zeros(param.raw_dim()),
            v: ndarray::Array::zeros(param.raw_dim()),
        }
    }

    fn step(&mut self, param: &mut ndarray::Array<f32, D>, grad: &ndarray::Array<f32, D>, lr: f32) {
        self.m.zip_mut_with(grad, |m, &g| *m = BETA1 * *m + (1.0 - BETA1) * g);
        self.v.zip_mut_with(grad, |v, &g| *v = BETA2 * *v + (1.0 - BETA2) * g * g);
        ndarray::Zip::from(param)
            .and(&self.m)
            .and(&self.v)
            .for_each(|p, &m, &v| *p -= lr * m / (v.sqrt() + ADAM_EPS));
    }
}

pub struct MLPClassifier {
    name: String,
    hidden_units: usize,
    alpha: f32,
    learning_rate: f32,
    max_iter: usize,
    batch_size: usize,
    seed: u64,
    scaler: Option<Scaler>,
    w1: Array2<f32>,
    b1: Array1<f32>,
    w2: Array2<f32>,
    b2: Array1<f32>,
}

impl MLPClassifier {
    pub fn new(spec: &ClassifierSpec) -> Self {
        let (hidden_units, alpha, learning_rate, max_iter, batch_size) = match &spec.model_type {
            ModelType::MLP {
                hidden_units,
                alpha,
                learning_rate,
                max_iter,
                batch_size,
            } => (*hidden_units, *alpha, *learning_rate, *max_iter, *batch_size),
            _ => (100, 0.1, 1e-3, 500, 200),
        };
        Self {
            name: spec.name.clone(),
            hidden_units: hidden_units.max(1),
            alpha: alpha as f32,
            learning_rate: learning_rate as f32,
            max_iter,
            batch_size: batch_size.max(1),
            seed: spec.seed,
            scaler: None,
            w1: Array2::zeros((0, 0)),
            b1: Array1::zeros(0),
            w2: Array2::zeros((0, 0)),
            b2: Array1::zeros(0),
        }
    }

    /// Glorot-uniform initialisation.
    fn init_layer(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> (Array2<f32>, Array1<f32>) {
        let bound = (6.0 / (fan_in + fan_out) as f32).sqrt();
        let w = Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-bound..bound));
        let b = Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound));
        (w, b)
    }

    fn forward(&self, z: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
        let hidden = (z.dot(&self.w1) + &self.b1).mapv(|v| v.max(0.0));
        let mut out = hidden.dot(&self.w2) + &self.b2;
        softmax_rows(&mut out);
        (hidden, out)
    }
}

impl ClassifierModel for MLPClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[usize], n_classes: usize) -> Result<()> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(HabitatError::model_fit(
                &self.name,
                format!("{} rows and {} labels", n, y.len()),
            ));
        }

        let scaler = fit_scaler(x);
        let z = scaler.transform(x);
        let mut onehot = Array2::<f32>::zeros((n, n_classes));
        for (i, &class) in y.iter().enumerate() {
            onehot[[i, class]] = 1.0;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let (w1, b1) = Self::init_layer(&mut rng, z.ncols(), self.hidden_units);
        let (w2, b2) = Self::init_layer(&mut rng, self.hidden_units, n_classes);
        self.w1 = w1;
        self.b1 = b1;
        self.w2 = w2;
        self.b2 = b2;

        let mut mw1 = Moments::like(&self.w1);
        let mut mb1 = Moments::like(&self.b1);
        let mut mw2 = Moments::like(&self.w2);
        let mut mb2 = Moments::like(&self.b2);

        let batch_size = self.batch_size.min(n);
        let mut order: Vec<usize> = (0..n).collect();
        let mut best_loss = f32::INFINITY;
        let mut no_improvement = 0;
        let mut t: i32 = 0;

        for epoch in 0..self.max_iter {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0f32;

            for batch in order.chunks(batch_size) {
                let xb = z.select(Axis(0), batch);
                let yb = onehot.select(Axis(0), batch);
                let m = batch.len() as f32;

                let (hidden, proba) = self.forward(&xb);
                let ce: f32 = proba
                    .iter()
                    .zip(yb.iter())
                    .filter(|(_, target)| **target > 0.0)
                    .map(|(&p, _)| -(p.max(1e-10)).ln())
                    .sum();
                let penalty = 0.5 * self.alpha * (self.w1.mapv(|v| v * v).sum() + self.w2.mapv(|v| v * v).sum());
                epoch_loss += ce + penalty * m / n as f32;

                // Backward pass; cross-entropy over softmax gives (p - y).
                let delta_out = (proba - &yb) / m;
                let grad_w2 = hidden.t().dot(&delta_out) + &(&self.w2 * (self.alpha / m));
                let grad_b2 = delta_out.sum_axis(Axis(0));
                let mut delta_hidden = delta_out.dot(&self.w2.t());
                delta_hidden.zip_mut_with(&hidden, |d, &h| {
                    if h <= 0.0 {
                        *d = 0.0;
                    }
                });
                let grad_w1 = xb.t().dot(&delta_hidden) + &(&self.w1 * (self.alpha / m));
                let grad_b1 = delta_hidden.sum_axis(Axis(0));

                t += 1;
                let lr = self.learning_rate * (1.0 - BETA2.powi(t)).sqrt() / (1.0 - BETA1.powi(t));
                mw1.step(&mut self.w1, &grad_w1, lr);
                mb1.step(&mut self.b1, &grad_b1, lr);
                mw2.step(&mut self.w2, &grad_w2, lr);
                mb2.step(&mut self.b2, &grad_b2, lr);
            }

            let loss = epoch_loss / n as f32;
            if loss > best_loss - TOL {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(loss);
            if no_improvement > N_ITER_NO_CHANGE {
                log::debug!("{} stopped after {} epochs (loss {:.5})", self.name, epoch + 1, loss);
                break;
            }
        }

        self.scaler = Some(scaler);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let scaler = self
            .scaler
            .as_ref()
            .ok_or_else(|| HabitatError::model_fit(&self.name, "model has not been fitted"))?;
        let (_, proba) = self.forward(&scaler.transform(x));
        Ok(proba)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
